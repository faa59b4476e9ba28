//! Per-pixel reduction of an image collection to one image
//!
//! The output grid and band set come from the first image. Images on other
//! grids are sampled at the output pixel centres (nearest pixel). Inside each
//! output row, images are visited in collection order, so the mosaic rule
//! "first valid image wins" holds with any number of threads.

use crate::maybe_rayon::*;
use ardhi_core::{Error, GeoTransform, Image, ImageCollection, Raster, Result};
use serde::Deserialize;
use tracing::debug;

/// Reduction applied per pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeMethod {
    /// Median of all valid samples
    #[default]
    Median,
    /// First valid sample in collection order
    Mosaic,
}

/// Parameters for [`composite`]
#[derive(Debug, Clone, Default)]
pub struct CompositeParams {
    pub method: CompositeMethod,
    /// Bands to keep (names or `prefix*`); all bands of the first image when `None`
    pub bands: Option<Vec<String>>,
}

/// Reduce `collection` with the method in `params`
pub fn composite(collection: &ImageCollection, params: &CompositeParams) -> Result<Image> {
    let source = match &params.bands {
        Some(bands) => {
            let selectors: Vec<&str> = bands.iter().map(String::as_str).collect();
            collection.select(&selectors)?
        }
        None => collection.clone(),
    };
    match params.method {
        CompositeMethod::Median => median_composite(&source),
        CompositeMethod::Mosaic => mosaic(&source),
    }
}

/// Per-band, per-pixel median of valid samples. Pixels with no valid sample
/// in any image stay invalid.
pub fn median_composite(collection: &ImageCollection) -> Result<Image> {
    reduce(collection, "median", |samples| {
        if samples.is_empty() {
            return f64::NAN;
        }
        samples.sort_by(f64::total_cmp);
        let n = samples.len();
        if n % 2 == 1 {
            samples[n / 2]
        } else {
            (samples[n / 2 - 1] + samples[n / 2]) / 2.0
        }
    })
}

/// Priority overlay: each pixel takes the first valid sample in collection
/// order; later images only fill gaps.
pub fn mosaic(collection: &ImageCollection) -> Result<Image> {
    reduce(collection, "mosaic", |samples| {
        samples.first().copied().unwrap_or(f64::NAN)
    })
}

/// How one input band maps onto the output grid
struct Source<'a> {
    raster: &'a Raster<f64>,
    aligned: bool,
}

impl Source<'_> {
    fn sample(&self, target: &GeoTransform, row: usize, col: usize) -> Option<f64> {
        if self.aligned {
            let v = unsafe { self.raster.get_unchecked(row, col) };
            return self.raster.is_valid(v).then_some(v);
        }
        let (x, y) = target.pixel_to_geo(col, row);
        let (rows, cols) = self.raster.shape();
        let (r, c) = self.raster.transform().pixel_index(x, y, rows, cols)?;
        self.raster.valid_value(r, c)
    }
}

/// Shared driver: `reducer` receives the valid samples of one pixel in
/// collection order.
fn reduce<F>(collection: &ImageCollection, label: &str, reducer: F) -> Result<Image>
where
    F: Fn(&mut Vec<f64>) -> f64 + Sync,
{
    collection.require_non_empty(&format!("{} composite input", label))?;
    let first = collection
        .first()
        .ok_or_else(|| Error::empty_collection(label))?;
    let template = first.template()?;
    let (rows, cols) = template.shape();
    let target = *template.transform();

    let mut out = Image::new(format!("{}_composite", label));
    for band_name in first.band_names() {
        let sources = collection
            .iter()
            .map(|image| {
                let raster = image.band(&band_name)?;
                Ok(Source {
                    raster,
                    aligned: raster.same_grid(template),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let data: Vec<f64> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut row_data = vec![f64::NAN; cols];
                let mut samples = Vec::with_capacity(sources.len());
                for (col, slot) in row_data.iter_mut().enumerate() {
                    samples.clear();
                    samples.extend(sources.iter().filter_map(|s| s.sample(&target, row, col)));
                    *slot = reducer(&mut samples);
                }
                row_data
            })
            .collect();

        out.add_band(band_name, template.with_data(data, None)?)?;
    }

    debug!(
        method = label,
        images = collection.len(),
        bands = out.band_count(),
        rows,
        cols,
        "built composite"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn image(id: &str, b4: Vec<f64>) -> Image {
        let band = Raster::from_vec(b4, 2, 2)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        Image::new(id).with_band("B4", band).unwrap()
    }

    #[test]
    fn test_median_skips_invalid() {
        let nan = f64::NAN;
        let col = ImageCollection::new(vec![
            image("a", vec![1.0, nan, 5.0, nan]),
            image("b", vec![3.0, 2.0, 1.0, nan]),
            image("c", vec![2.0, nan, 4.0, nan]),
        ]);
        let out = median_composite(&col).unwrap();
        let b4 = out.band("B4").unwrap();
        assert_relative_eq!(b4.get(0, 0).unwrap(), 2.0);
        assert_relative_eq!(b4.get(0, 1).unwrap(), 2.0);
        assert_relative_eq!(b4.get(1, 0).unwrap(), 4.0);
        assert!(!b4.is_valid_at(1, 1));
    }

    #[test]
    fn test_median_of_even_count_averages_middle() {
        let col = ImageCollection::new(vec![image("a", vec![1.0; 4]), image("b", vec![2.0; 4])]);
        let out = median_composite(&col).unwrap();
        assert_relative_eq!(out.band("B4").unwrap().get(0, 0).unwrap(), 1.5);
    }

    #[test]
    fn test_mosaic_first_valid_wins() {
        let nan = f64::NAN;
        let col = ImageCollection::new(vec![
            image("a", vec![1.0, nan, 1.0, nan]),
            image("b", vec![2.0, 2.0, nan, nan]),
        ]);
        let b4 = mosaic(&col).unwrap().band("B4").unwrap().clone();
        assert_eq!(b4.get(0, 0).unwrap(), 1.0);
        assert_eq!(b4.get(0, 1).unwrap(), 2.0);
        assert_eq!(b4.get(1, 0).unwrap(), 1.0);
        assert!(!b4.is_valid_at(1, 1));
    }

    #[test]
    fn test_empty_collection_fails() {
        let empty = ImageCollection::default();
        assert!(matches!(median_composite(&empty), Err(Error::EmptyCollection { .. })));
        assert!(matches!(mosaic(&empty), Err(Error::EmptyCollection { .. })));
    }

    #[test]
    fn test_misaligned_image_sampled_by_location() {
        let shifted = Raster::from_vec(vec![7.0, 8.0, 9.0, 10.0], 2, 2)
            .unwrap()
            .with_transform(GeoTransform::new(1.0, 2.0, 1.0, -1.0));
        let b = Image::new("b").with_band("B4", shifted).unwrap();
        let nan = f64::NAN;
        let col = ImageCollection::new(vec![image("a", vec![nan; 4]), b]);
        let out = mosaic(&col).unwrap();
        let b4 = out.band("B4").unwrap();
        // output col 1 overlaps the shifted image's col 0
        assert_eq!(b4.get(0, 1).unwrap(), 7.0);
        assert_eq!(b4.get(1, 1).unwrap(), 9.0);
        assert!(!b4.is_valid_at(0, 0));
    }

    #[test]
    fn test_missing_band_in_later_image() {
        let other = Image::new("b")
            .with_band(
                "B8",
                Raster::filled(2, 2, 0.3).with_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0)),
            )
            .unwrap();
        let col = ImageCollection::new(vec![image("a", vec![1.0; 4]), other]);
        assert!(matches!(median_composite(&col), Err(Error::MissingBand { .. })));
    }
}
