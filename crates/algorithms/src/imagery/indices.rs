//! Normalized-difference spectral indices
//!
//! Band names follow the Sentinel-2 MSI convention (B3 green, B4 red,
//! B8 near infrared, B12 shortwave infrared).

use crate::maybe_rayon::*;
use ardhi_core::raster::Raster;
use ardhi_core::{Error, Image, Result};
use serde::Deserialize;
use std::str::FromStr;

/// Named normalized-difference indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index, (B8 - B4) / (B8 + B4)
    Ndvi,
    /// Normalized Burn Ratio, (B8 - B12) / (B8 + B12)
    Nbr,
    /// Normalized Difference Water Index (McFeeters), (B3 - B8) / (B3 + B8)
    Ndwi,
}

impl SpectralIndex {
    /// (positive band, negative band)
    pub fn bands(self) -> (&'static str, &'static str) {
        match self {
            SpectralIndex::Ndvi => ("B8", "B4"),
            SpectralIndex::Nbr => ("B8", "B12"),
            SpectralIndex::Ndwi => ("B3", "B8"),
        }
    }

    /// Output band name
    pub fn name(self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Nbr => "NBR",
            SpectralIndex::Ndwi => "NDWI",
        }
    }
}

impl FromStr for SpectralIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ndvi" => Ok(SpectralIndex::Ndvi),
            "nbr" => Ok(SpectralIndex::Nbr),
            "ndwi" => Ok(SpectralIndex::Ndwi),
            _ => Err(Error::InvalidParameter {
                name: "index",
                value: s.to_string(),
                reason: "expected ndvi, nbr or ndwi".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Generic normalized difference
// ---------------------------------------------------------------------------

/// Compute `(band_a - band_b) / (band_a + band_b)`.
///
/// The result is invalid (NaN) wherever either input is invalid or the sum
/// is exactly zero, so undefined ratios never leak as infinities.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    band_a.ensure_same_grid(band_b)?;

    let (rows, cols) = band_a.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, slot) in row_data.iter_mut().enumerate() {
                let a = unsafe { band_a.get_unchecked(row, col) };
                let b = unsafe { band_b.get_unchecked(row, col) };
                if !band_a.is_valid(a) || !band_b.is_valid(b) {
                    continue;
                }
                let sum = a + b;
                if sum == 0.0 {
                    continue;
                }
                *slot = (a - b) / sum;
            }
            row_data
        })
        .collect();

    band_a.with_data(data, None)
}

/// Append `name = nd(band_a, band_b)` to a copy of `image`
pub fn add_normalized_difference(image: &Image, band_a: &str, band_b: &str, name: &str) -> Result<Image> {
    let nd = normalized_difference(image.band(band_a)?, image.band(band_b)?)?;
    let mut out = image.clone();
    out.add_band(name, nd)?;
    Ok(out)
}

/// Append a named index band (`NDVI`, `NBR`, `NDWI`) to a copy of `image`
pub fn add_index(image: &Image, index: SpectralIndex) -> Result<Image> {
    let (a, b) = index.bands();
    add_normalized_difference(image, a, b, index.name())
}

/// NDVI raster of an image
pub fn ndvi(image: &Image) -> Result<Raster<f64>> {
    index_raster(image, SpectralIndex::Ndvi)
}

/// NBR raster of an image
pub fn nbr(image: &Image) -> Result<Raster<f64>> {
    index_raster(image, SpectralIndex::Nbr)
}

/// NDWI raster of an image
pub fn ndwi(image: &Image) -> Result<Raster<f64>> {
    index_raster(image, SpectralIndex::Ndwi)
}

fn index_raster(image: &Image, index: SpectralIndex) -> Result<Raster<f64>> {
    let (a, b) = index.bands();
    normalized_difference(image.band(a)?, image.band(b)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ardhi_core::{Error, GeoTransform};

    fn band(values: Vec<f64>) -> Raster<f64> {
        Raster::from_vec(values, 2, 2)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0))
    }

    #[test]
    fn test_nd_basic_and_undefined() {
        let a = band(vec![0.5, 0.0, f64::NAN, 0.3]);
        let b = band(vec![0.1, 0.0, 0.2, -0.3]);
        let nd = normalized_difference(&a, &b).unwrap();
        assert_relative_eq!(nd.get(0, 0).unwrap(), 0.4 / 0.6, epsilon = 1e-12);
        assert!(!nd.is_valid_at(0, 1));
        assert!(!nd.is_valid_at(1, 0));
        assert!(!nd.is_valid_at(1, 1));
    }

    #[test]
    fn test_nd_antisymmetric() {
        let a = band(vec![0.31, 0.05, 0.7, 0.12]);
        let b = band(vec![0.08, 0.22, 0.1, 0.12]);
        let ab = normalized_difference(&a, &b).unwrap();
        let ba = normalized_difference(&b, &a).unwrap();
        for (x, y) in ab.data().iter().zip(ba.data().iter()) {
            assert_relative_eq!(*x, -*y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_add_index_is_non_destructive() {
        let image = Image::new("composite")
            .with_band("B4", band(vec![0.1; 4]))
            .unwrap()
            .with_band("B8", band(vec![0.3; 4]))
            .unwrap();
        let with_ndvi = add_index(&image, SpectralIndex::Ndvi).unwrap();
        assert_eq!(with_ndvi.band_names(), vec!["B4", "B8", "NDVI"]);
        assert_eq!(image.band_count(), 2);
        assert_relative_eq!(with_ndvi.band("NDVI").unwrap().get(0, 0).unwrap(), 0.5, epsilon = 1e-12);
        assert!(matches!(nbr(&image), Err(Error::MissingBand { .. })));
    }

    #[test]
    fn test_index_names_parse() {
        assert_eq!("NBR".parse::<SpectralIndex>().unwrap(), SpectralIndex::Nbr);
        assert_eq!("ndvi".parse::<SpectralIndex>().unwrap().bands(), ("B8", "B4"));
        assert!("evi".parse::<SpectralIndex>().is_err());
    }
}
