//! Image-to-RGBA rendering driven by visualization parameters.

use crate::error::{ColormapError, Result};
use crate::scheme::{Palette, Rgb};
use ardhi_core::raster::{Raster, RasterElement};
use ardhi_core::Image;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// RGBA written for invalid samples
pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

fn default_min() -> f64 {
    0.0
}

fn default_max() -> f64 {
    1.0
}

/// How to display an image: one band through a palette or grayscale, or
/// three bands as red, green and blue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisParams {
    pub bands: Vec<String>,
    #[serde(default = "default_min")]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palette: Option<Vec<String>>,
}

impl VisParams {
    /// Single band through a palette
    pub fn palette(band: impl Into<String>, min: f64, max: f64, palette: &[&str]) -> Self {
        Self {
            bands: vec![band.into()],
            min,
            max,
            palette: Some(palette.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// Three bands as true or false colour
    pub fn rgb(bands: [&str; 3], min: f64, max: f64) -> Self {
        Self {
            bands: bands.iter().map(|s| s.to_string()).collect(),
            min,
            max,
            palette: None,
        }
    }

    /// Parse from JSON; unknown keys are an error
    pub fn from_json(text: &str) -> Result<Self> {
        let vis: VisParams = serde_json::from_str(text)?;
        vis.validate()?;
        Ok(vis)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check the parameters are self-consistent and return the palette, if any
    pub fn validate(&self) -> Result<Option<Palette>> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min < self.max) {
            return Err(ColormapError::InvalidVisParams(format!(
                "min ({}) must be below max ({})",
                self.min, self.max
            )));
        }
        match (self.bands.len(), &self.palette) {
            (1, Some(entries)) => Palette::parse(entries).map(Some),
            (1, None) | (3, None) => Ok(None),
            (3, Some(_)) => Err(ColormapError::InvalidVisParams(
                "a palette needs exactly one band".into(),
            )),
            (n, _) => Err(ColormapError::InvalidVisParams(format!(
                "expected 1 or 3 bands, got {}",
                n
            ))),
        }
    }

    fn normalize(&self, v: f64) -> f64 {
        (v - self.min) / (self.max - self.min)
    }
}

fn to_byte(t: f64) -> u8 {
    (t.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Render `image` to interleaved RGBA, `rows * cols * 4` bytes in row-major
/// order. Samples invalid in any displayed band are transparent.
pub fn render_image(image: &Image, vis: &VisParams) -> Result<Vec<u8>> {
    let palette = vis.validate()?;
    let bands = vis
        .bands
        .iter()
        .map(|b| image.band(b))
        .collect::<ardhi_core::Result<Vec<_>>>()?;

    let n = bands[0].len();
    let mut rgba = vec![0u8; n * 4];
    let columns: Vec<_> = bands.iter().map(|b| b.data().iter().copied().collect::<Vec<f64>>()).collect();

    for i in 0..n {
        let offset = i * 4;
        let px: Option<Vec<f64>> = columns
            .iter()
            .zip(&bands)
            .map(|(col, band)| Some(col[i]).filter(|v| band.is_valid(*v)))
            .collect();
        let Some(px) = px else {
            rgba[offset..offset + 4].copy_from_slice(&TRANSPARENT);
            continue;
        };

        let color = match (&palette, px.as_slice()) {
            (Some(p), [v]) => Some(p.evaluate(vis.normalize(*v))),
            (None, [v]) => {
                let g = to_byte(vis.normalize(*v));
                Some(Rgb::new(g, g, g))
            }
            (_, [r, g, b]) => Some(Rgb::new(
                to_byte(vis.normalize(*r)),
                to_byte(vis.normalize(*g)),
                to_byte(vis.normalize(*b)),
            )),
            _ => None,
        };
        let pixel = color.map_or(TRANSPARENT, |Rgb { r, g, b }| [r, g, b, 255]);
        rgba[offset..offset + 4].copy_from_slice(&pixel);
    }

    Ok(rgba)
}

/// Min and max of the valid samples, widened when the raster is constant
/// and defaulting to [0, 1] when nothing is valid.
pub fn data_range<T: RasterElement>(raster: &Raster<T>) -> (f64, f64) {
    let stats = raster.statistics();
    match (stats.min, stats.max) {
        (Some(min), Some(max)) if (max - min).abs() < f64::EPSILON => (min, min + 1.0),
        (Some(min), Some(max)) => (min, max),
        _ => (0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ardhi_core::GeoTransform;

    fn image() -> Image {
        let gt = GeoTransform::new(0.0, 2.0, 1.0, -1.0);
        let band = |v: Vec<f64>| Raster::from_vec(v, 2, 2).unwrap().with_transform(gt);
        Image::new("composite")
            .with_band("B4", band(vec![0.0, 0.2, 0.4, f64::NAN]))
            .unwrap()
            .with_band("B3", band(vec![0.0, 0.2, 0.4, 0.1]))
            .unwrap()
            .with_band("B2", band(vec![0.4, 0.2, 0.0, 0.1]))
            .unwrap()
    }

    #[test]
    fn true_colour_stretch() {
        let rgba = render_image(&image(), &VisParams::rgb(["B4", "B3", "B2"], 0.0, 0.4)).unwrap();
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[0..4], &[0, 0, 255, 255]);
        assert_eq!(&rgba[4..8], &[128, 128, 128, 255]);
        assert_eq!(&rgba[8..12], &[255, 255, 0, 255]);
        // invalid red band makes the whole pixel transparent
        assert_eq!(&rgba[12..16], &TRANSPARENT);
    }

    #[test]
    fn palette_render() {
        let vis = VisParams::palette("B3", 0.0, 0.4, &["black", "#ffffff"]);
        let rgba = render_image(&image(), &vis).unwrap();
        assert_eq!(&rgba[4..8], &[128, 128, 128, 255]);
        assert_eq!(&rgba[8..12], &[255, 255, 255, 255]);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(VisParams::rgb(["B4", "B3", "B2"], 0.3, 0.3).validate().is_err());
        let mut vis = VisParams::rgb(["B4", "B3", "B2"], 0.0, 0.3);
        vis.palette = Some(vec!["red".into()]);
        assert!(vis.validate().is_err());
        vis.bands.pop();
        vis.palette = None;
        assert!(vis.validate().is_err());
        assert!(VisParams::palette("B3", 0.0, 1.0, &["red", "notacolour"]).validate().is_err());
    }

    #[test]
    fn json_rejects_unknown_keys() {
        let ok = VisParams::from_json(r#"{"bands": ["NDVI"], "min": -1, "max": 1, "palette": ["red", "yellow", "green"]}"#);
        assert!(ok.is_ok());
        let bad = VisParams::from_json(r#"{"bands": ["NDVI"], "gamma": 1.4}"#);
        assert!(matches!(bad, Err(ColormapError::Json(_))));
        let defaults = VisParams::from_json(r#"{"bands": ["NDVI"]}"#).unwrap();
        assert_eq!((defaults.min, defaults.max), (0.0, 1.0));
    }

    #[test]
    fn missing_band_is_an_error() {
        let err = render_image(&image(), &VisParams::palette("NDVI", 0.0, 1.0, &["red"])).unwrap_err();
        assert!(matches!(err, ColormapError::Core(ardhi_core::Error::MissingBand { .. })));
    }

    #[test]
    fn data_range_edge_cases() {
        let r = Raster::from_vec(vec![10.0, 50.0, 100.0], 1, 3).unwrap();
        assert_eq!(data_range(&r), (10.0, 100.0));
        assert_eq!(data_range(&Raster::filled(2, 2, 42.0_f64)), (42.0, 43.0));
        assert_eq!(data_range(&Raster::filled(1, 2, f64::NAN)), (0.0, 1.0));
    }
}
