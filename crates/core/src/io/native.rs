//! GeoTIFF reading/writing on top of the `tiff` crate
//!
//! Georeferencing goes through the ModelPixelScale/ModelTiepoint tags, the CRS
//! through the EPSG code in the GeoKey directory and invalid cells through the
//! GDAL_NODATA ascii tag, which is enough for other GIS tools to open the files.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray64Float, GrayI32, RGBA8};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Read a single-band GeoTIFF file into a raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::nodata_sentinel))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let rows = height as usize;
    let cols = width as usize;

    let data: Vec<T> = match decoder.read_image()? {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => return Err(Error::Tiff("unsupported pixel format".to_string())),
    };
    if data.len() != rows * cols {
        return Err(Error::Tiff(format!(
            "expected {} single-band samples, found {}",
            rows * cols,
            data.len()
        )));
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));

    let nodata = decoder
        .get_tag_ascii_string(Tag::Unknown(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok())
        .and_then(|v| num_traits::cast::<f64, T>(v));
    raster.set_nodata(nodata.or_else(|| {
        // Integer grids written without the tag still use the sentinel
        let sentinel = T::nodata_sentinel();
        sentinel.to_f64().filter(|v| !v.is_nan()).map(|_| sentinel)
    }));

    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT)).ok()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::Unknown(GEO_KEY_DIRECTORY)).ok()?;
    // Header is 4 shorts, then (key, location, count, value) entries
    keys.get(4..)?
        .chunks_exact(4)
        .find(|entry| {
            (entry[0] == PROJECTED_CS_TYPE_KEY || entry[0] == GEOGRAPHIC_TYPE_KEY) && entry[1] == 0
        })
        .map(|entry| CRS::from_epsg(entry[3] as u32))
}

/// Write a float raster as a 64-bit float GeoTIFF
pub fn write_geotiff<P: AsRef<Path>>(raster: &Raster<f64>, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    encode_raster_f64(raster, file)
}

/// Write a float raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer(raster: &Raster<f64>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_raster_f64(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_raster_f64<W: Write + Seek>(raster: &Raster<f64>, writer: W) -> Result<()> {
    let data: Vec<f64> = raster.data().iter().copied().collect();
    let nodata = raster.nodata().filter(|v| !v.is_nan()).map(|v| v.to_string());
    encode::<Gray64Float, W>(
        writer,
        raster.shape(),
        raster.transform(),
        raster.crs(),
        nodata.as_deref().or(Some("nan")),
        &data,
    )
}

/// Write a class raster as a signed 32-bit GeoTIFF. Invalid cells keep the
/// raster's nodata value, which is recorded in the GDAL_NODATA tag.
pub fn write_class_geotiff<P: AsRef<Path>>(raster: &Raster<i32>, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let data: Vec<i32> = raster.data().iter().copied().collect();
    let nodata = raster.nodata().unwrap_or(i32::MIN).to_string();
    encode::<GrayI32, _>(
        file,
        raster.shape(),
        raster.transform(),
        raster.crs(),
        Some(nodata.as_str()),
        &data,
    )
}

/// Write interleaved RGBA bytes (`rows * cols * 4`) as a georeferenced TIFF
pub fn write_rgba_tiff<P: AsRef<Path>>(
    rgba: &[u8],
    shape: (usize, usize),
    transform: &GeoTransform,
    crs: Option<&CRS>,
    path: P,
) -> Result<()> {
    let (rows, cols) = shape;
    if rgba.len() != rows * cols * 4 {
        return Err(Error::SizeMismatch {
            er: rows,
            ec: cols * 4,
            ar: rgba.len(),
            ac: 1,
        });
    }
    let file = File::create(path.as_ref())?;
    encode::<RGBA8, _>(file, shape, transform, crs, None, rgba)
}

fn encode<C, W>(
    writer: W,
    shape: (usize, usize),
    gt: &GeoTransform,
    crs: Option<&CRS>,
    nodata: Option<&str>,
    data: &[C::Inner],
) -> Result<()>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    W: Write + Seek,
{
    let (rows, cols) = shape;
    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<C>(cols as u32, rows as u32)?;

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])?;
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])?;

    let geokeys = geokey_directory(crs);
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geokeys.as_slice())?;

    if let Some(text) = nodata {
        image.encoder().write_tag(Tag::Unknown(GDAL_NODATA), text)?;
    }

    image.write_data(data)?;
    Ok(())
}

fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    // ModelType: 1 projected, 2 geographic. RasterType 1: pixel is area.
    let geographic = crs.is_some_and(CRS::is_geographic);
    let mut entries: Vec<[u16; 4]> = vec![
        [GT_MODEL_TYPE_KEY, 0, 1, if geographic { 2 } else { 1 }],
        [GT_RASTER_TYPE_KEY, 0, 1, 1],
    ];
    if let Some(code) = crs.and_then(CRS::epsg).and_then(|c| u16::try_from(c).ok()) {
        let key = if geographic {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        };
        entries.push([key, 0, 1, code]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.into_iter().flatten());
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ndvi_tile() -> Raster<f64> {
        let mut r = Raster::from_vec(vec![0.1, 0.2, f64::NAN, 0.8, -0.3, 0.5], 2, 3)
            .unwrap()
            .with_transform(GeoTransform::new(36.8, -1.2, 0.0001, -0.0001));
        r.set_crs(Some(CRS::wgs84()));
        r
    }

    #[test]
    fn test_float_buffer_roundtrip_keeps_georeferencing() {
        let raster = ndvi_tile();
        let bytes = write_geotiff_to_buffer(&raster).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(back.shape(), (2, 3));
        assert!(!back.is_valid_at(0, 2));
        assert_relative_eq!(back.get(1, 0).unwrap(), 0.8);
        assert_relative_eq!(back.transform().origin_x, 36.8, epsilon = 1e-12);
        assert_relative_eq!(back.transform().pixel_height, -0.0001, epsilon = 1e-15);
        assert_eq!(back.crs().and_then(CRS::epsg), Some(4326));
    }

    #[test]
    fn test_class_raster_file_keeps_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.tif");
        let template = ndvi_tile();
        let mut classes: Raster<i32> = template.invalid_like();
        classes.set(0, 0, 3).unwrap();
        classes.set(1, 2, 2).unwrap();
        write_class_geotiff(&classes, &path).unwrap();

        let back: Raster<i32> = read_geotiff(&path).unwrap();
        assert_eq!(back.get(0, 0).unwrap(), 3);
        assert!(!back.is_valid_at(0, 1));
        assert_eq!(back.valid_count(), 2);
    }

    #[test]
    fn test_geokeys_projected_epsg() {
        let keys = geokey_directory(Some(&CRS::utm37s()));
        assert_eq!(keys[3], 3);
        assert!(keys.chunks_exact(4).any(|e| e[0] == PROJECTED_CS_TYPE_KEY && e[3] == 32737));
    }
}
