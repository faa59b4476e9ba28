//! Multi-band images and ordered image collections

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};
use crate::vector::{AttributeValue, Properties};
use crate::CRS;
use chrono::{DateTime, Utc};
use geo_types::Rect;

/// Property holding an image's acquisition timestamp
pub const TIME_START: &str = "time_start";

/// A named band of an [`Image`]
#[derive(Debug, Clone)]
pub struct Band {
    pub name: String,
    pub raster: Raster<f64>,
}

/// A multi-band image: uniquely named bands on one shared grid plus scalar
/// properties.
///
/// `id` is the acquisition identity used to pair an image with its
/// auxiliary quality image.
#[derive(Debug, Clone)]
pub struct Image {
    id: String,
    bands: Vec<Band>,
    properties: Properties,
}

impl Image {
    /// An image with no bands yet
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bands: Vec::new(),
            properties: Properties::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    // Bands

    /// Append a band. Fails on a duplicate name or a grid that differs from
    /// the bands already present.
    pub fn add_band(&mut self, name: impl Into<String>, raster: Raster<f64>) -> Result<()> {
        let name = name.into();
        if self.has_band(&name) {
            return Err(Error::DuplicateBand(name));
        }
        if let Some(first) = self.bands.first() {
            first.raster.ensure_same_grid(&raster)?;
        }
        self.bands.push(Band { name, raster });
        Ok(())
    }

    /// Builder-style [`Image::add_band`]
    pub fn with_band(mut self, name: impl Into<String>, raster: Raster<f64>) -> Result<Self> {
        self.add_band(name, raster)?;
        Ok(self)
    }

    /// Replace the data of an existing band, or append it when absent
    pub fn put_band(&mut self, name: &str, raster: Raster<f64>) -> Result<()> {
        match self.bands.iter().position(|b| b.name == name) {
            Some(i) => {
                if self.bands.len() > 1 {
                    let other = if i == 0 { 1 } else { 0 };
                    self.bands[other].raster.ensure_same_grid(&raster)?;
                }
                self.bands[i].raster = raster;
                Ok(())
            }
            None => self.add_band(name, raster),
        }
    }

    /// Stack the bands of `other` onto this image. Names already present get
    /// `suffix` appended, so stacking two dates of the same sensor works.
    pub fn add_bands(&mut self, other: &Image, suffix: &str) -> Result<()> {
        for band in &other.bands {
            let mut name = band.name.clone();
            while self.has_band(&name) {
                name.push_str(suffix);
            }
            self.add_band(name, band.raster.clone())?;
        }
        Ok(())
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.bands.iter().any(|b| b.name == name)
    }

    /// Band raster by name, [`Error::MissingBand`] when absent
    pub fn band(&self, name: &str) -> Result<&Raster<f64>> {
        self.bands
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.raster)
            .ok_or_else(|| Error::missing_band(name, &self.id))
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn bands_mut(&mut self) -> &mut [Band] {
        &mut self.bands
    }

    pub fn band_names(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.name.clone()).collect()
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// New image with only the requested bands, in request order.
    ///
    /// A selector ending in `*` matches every band with that prefix (`"B*"`),
    /// anything else must match a band name exactly.
    pub fn select(&self, selectors: &[&str]) -> Result<Image> {
        let mut out = Image {
            id: self.id.clone(),
            bands: Vec::new(),
            properties: self.properties.clone(),
        };
        for sel in selectors {
            if let Some(prefix) = sel.strip_suffix('*') {
                for band in self.bands.iter().filter(|b| b.name.starts_with(prefix)) {
                    if !out.has_band(&band.name) {
                        out.bands.push(band.clone());
                    }
                }
            } else {
                let raster = self.band(sel)?;
                if !out.has_band(sel) {
                    out.bands.push(Band {
                        name: sel.to_string(),
                        raster: raster.clone(),
                    });
                }
            }
        }
        Ok(out)
    }

    /// Copy of this image with every band renamed by `f`
    pub fn rename<F: Fn(&str) -> String>(&self, f: F) -> Result<Image> {
        let mut out = Image {
            id: self.id.clone(),
            bands: Vec::new(),
            properties: self.properties.clone(),
        };
        for band in &self.bands {
            out.add_band(f(&band.name), band.raster.clone())?;
        }
        Ok(out)
    }

    /// Copy of this image with the valid samples of `band` multiplied by
    /// `factor`. Invalid samples stay invalid; other bands and every
    /// property, including the acquisition time, are kept.
    pub fn scale(&self, band: &str, factor: f64) -> Result<Image> {
        let raster = self.band(band)?;
        let data: Vec<f64> = raster
            .data()
            .iter()
            .map(|&v| if raster.is_valid(v) { v * factor } else { f64::NAN })
            .collect();
        let scaled = raster.with_data(data, None)?;
        let mut out = self.clone();
        out.put_band(band, scaled)?;
        Ok(out)
    }

    // Grid

    /// Shape shared by every band, `None` for a band-less image
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.bands.first().map(|b| b.raster.shape())
    }

    pub fn transform(&self) -> Option<&GeoTransform> {
        self.bands.first().map(|b| b.raster.transform())
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.bands.first().and_then(|b| b.raster.crs())
    }

    /// Footprint of the image grid, `None` for a band-less image
    pub fn footprint(&self) -> Option<Rect<f64>> {
        self.bands.first().map(|b| b.raster.footprint())
    }

    /// First band, used as the grid template for derived rasters
    pub fn template(&self) -> Result<&Raster<f64>> {
        self.bands
            .first()
            .map(|b| &b.raster)
            .ok_or_else(|| Error::Other(format!("image '{}' has no bands", self.id)))
    }

    // Properties

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Builder-style [`Image::set_property`]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Acquisition timestamp from the [`TIME_START`] property
    pub fn time_start(&self) -> Option<DateTime<Utc>> {
        self.property(TIME_START).and_then(AttributeValue::as_time)
    }
}

/// An ordered sequence of images. Every operation returns a new collection.
#[derive(Debug, Clone, Default)]
pub struct ImageCollection {
    images: Vec<Image>,
}

impl ImageCollection {
    pub fn new(images: Vec<Image>) -> Self {
        Self { images }
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Image> {
        self.images.iter()
    }

    pub fn first(&self) -> Option<&Image> {
        self.images.first()
    }

    /// Image with the given acquisition id
    pub fn find(&self, id: &str) -> Option<&Image> {
        self.images.iter().find(|img| img.id() == id)
    }

    /// [`Error::EmptyCollection`] when empty, naming the stage that emptied it
    pub fn require_non_empty(&self, stage: &str) -> Result<&Self> {
        if self.images.is_empty() {
            return Err(Error::empty_collection(stage));
        }
        Ok(self)
    }

    /// Apply a fallible per-image function, order preserved
    pub fn try_map<F>(&self, f: F) -> Result<ImageCollection>
    where
        F: Fn(&Image) -> Result<Image>,
    {
        let images = self.images.iter().map(f).collect::<Result<Vec<_>>>()?;
        Ok(ImageCollection { images })
    }

    /// Images for which `predicate` holds, order preserved
    pub fn retain_where<P>(&self, predicate: P) -> ImageCollection
    where
        P: Fn(&Image) -> bool,
    {
        ImageCollection {
            images: self.images.iter().filter(|img| predicate(img)).cloned().collect(),
        }
    }

    /// Concatenate two collections
    pub fn merge(&self, other: &ImageCollection) -> ImageCollection {
        let mut images = self.images.clone();
        images.extend(other.images.iter().cloned());
        ImageCollection { images }
    }

    /// [`Image::select`] on every image
    pub fn select(&self, selectors: &[&str]) -> Result<ImageCollection> {
        self.try_map(|img| img.select(selectors))
    }
}

impl FromIterator<Image> for ImageCollection {
    fn from_iter<I: IntoIterator<Item = Image>>(iter: I) -> Self {
        Self {
            images: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ImageCollection {
    type Item = Image;
    type IntoIter = std::vec::IntoIter<Image>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(value: f64) -> Raster<f64> {
        Raster::filled(3, 3, value).with_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0))
    }

    fn s2_image() -> Image {
        Image::new("S2A_20190105")
            .with_band("B2", band(1.0))
            .unwrap()
            .with_band("B3", band(2.0))
            .unwrap()
            .with_band("B4", band(3.0))
            .unwrap()
            .with_band("cs", band(0.9))
            .unwrap()
    }

    #[test]
    fn test_duplicate_band_rejected() {
        let mut img = s2_image();
        assert!(matches!(img.add_band("B2", band(0.0)), Err(Error::DuplicateBand(_))));
    }

    #[test]
    fn test_band_grid_must_match() {
        let mut img = s2_image();
        let shifted = Raster::filled(3, 3, 1.0).with_transform(GeoTransform::new(10.0, 3.0, 1.0, -1.0));
        assert!(img.add_band("B8", shifted).is_err());
    }

    #[test]
    fn test_select_prefix_wildcard() {
        let img = s2_image();
        let selected = img.select(&["B*"]).unwrap();
        assert_eq!(selected.band_names(), vec!["B2", "B3", "B4"]);
        assert!(matches!(img.select(&["B8"]), Err(Error::MissingBand { .. })));
    }

    #[test]
    fn test_add_bands_suffixes_duplicates() {
        let mut a = s2_image().select(&["B4"]).unwrap();
        let b = s2_image().select(&["B4"]).unwrap();
        a.add_bands(&b, "_1").unwrap();
        assert_eq!(a.band_names(), vec!["B4", "B4_1"]);
    }

    #[test]
    fn test_scale_keeps_properties_and_invalid_samples() {
        let mut tmmx = band(312.0);
        tmmx.set(0, 0, f64::NAN).unwrap();
        let img = Image::new("202301")
            .with_band("tmmx", tmmx)
            .unwrap()
            .with_band("pr", band(40.0))
            .unwrap()
            .with_property(TIME_START, chrono::DateTime::from_timestamp(1_672_531_200, 0).unwrap());

        let scaled = img.scale("tmmx", 0.1).unwrap();
        let t = scaled.band("tmmx").unwrap();
        assert!(t.get(0, 0).unwrap().is_nan());
        assert!((t.get(1, 1).unwrap() - 31.2).abs() < 1e-9);
        assert_eq!(scaled.band("pr").unwrap().get(1, 1).unwrap(), 40.0);
        assert_eq!(scaled.time_start(), img.time_start());
        assert_eq!(scaled.band_names(), vec!["tmmx", "pr"]);
        assert!(matches!(img.scale("tmin", 0.1), Err(Error::MissingBand { .. })));
    }

    #[test]
    fn test_collection_require_non_empty() {
        let empty = ImageCollection::default();
        assert!(matches!(
            empty.require_non_empty("date filter"),
            Err(Error::EmptyCollection { .. })
        ));
    }
}
