//! Quality-score cloud masking
//!
//! Auxiliary quality images (e.g. a per-pixel clear-sky score) are paired with
//! base images by acquisition id, never by position, and their score band
//! gates every band of the base image. Masked samples become invalid (NaN).

use crate::maybe_rayon::*;
use ardhi_core::{Error, Image, ImageCollection, Raster, Result};
use tracing::{debug, warn};

/// Parameters for [`mask_low_quality`]
#[derive(Debug, Clone)]
pub struct CloudMaskParams {
    /// Band holding the clear-sky score
    pub qa_band: String,
    /// Samples whose score is below this value are masked
    pub clear_threshold: f64,
}

impl Default for CloudMaskParams {
    fn default() -> Self {
        Self {
            qa_band: "cs".to_string(),
            clear_threshold: 0.5,
        }
    }
}

/// Add the `aux_bands` of the auxiliary image sharing each base image's id.
///
/// A base image with no partner gets the auxiliary bands fully invalid, so a
/// later [`mask_low_quality`] removes all of its samples.
pub fn link_collection(
    base: &ImageCollection,
    aux: &ImageCollection,
    aux_bands: &[&str],
) -> Result<ImageCollection> {
    base.try_map(|image| {
        let mut linked = image.clone();
        match aux.find(image.id()) {
            Some(partner) => {
                for band in aux_bands {
                    linked.add_band(*band, partner.band(band)?.clone())?;
                }
            }
            None => {
                warn!(image = image.id(), "no auxiliary image with matching id");
                let template = image.template()?;
                for band in aux_bands {
                    linked.add_band(*band, template.invalid_like::<f64>())?;
                }
            }
        }
        Ok(linked)
    })
}

/// Invalidate every band sample whose quality score is invalid or below
/// `params.clear_threshold`. Applying it twice gives the same image.
pub fn mask_low_quality(image: &Image, params: &CloudMaskParams) -> Result<Image> {
    let qa = image.band(&params.qa_band)?;
    let (rows, cols) = qa.shape();
    let threshold = params.clear_threshold;

    let keep: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_keep = vec![false; cols];
            for (col, slot) in row_keep.iter_mut().enumerate() {
                let score = unsafe { qa.get_unchecked(row, col) };
                *slot = qa.is_valid(score) && score >= threshold;
            }
            row_keep
        })
        .collect();

    let mut out = image.clone();
    for band in out.bands_mut() {
        apply_keep(&mut band.raster, &keep)?;
    }

    let kept = keep.iter().filter(|k| **k).count();
    if kept == 0 {
        warn!(image = image.id(), "cloud mask removed every sample");
    }
    debug!(image = image.id(), kept, total = keep.len(), "applied cloud mask");
    Ok(out)
}

fn apply_keep(raster: &mut Raster<f64>, keep: &[bool]) -> Result<()> {
    if raster.len() != keep.len() {
        return Err(Error::GridMismatch(format!(
            "mask has {} samples, band has {}",
            keep.len(),
            raster.len()
        )));
    }
    for (value, k) in raster.data_mut().iter_mut().zip(keep) {
        if !k {
            *value = f64::NAN;
        }
    }
    Ok(())
}

/// [`mask_low_quality`] over a collection, order preserved
pub fn mask_collection(collection: &ImageCollection, params: &CloudMaskParams) -> Result<ImageCollection> {
    let images: Vec<Image> = collection
        .images()
        .par_iter()
        .map(|image| mask_low_quality(image, params))
        .collect::<Result<Vec<_>>>()?;
    Ok(ImageCollection::new(images))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ardhi_core::GeoTransform;

    fn raster(values: Vec<f64>) -> Raster<f64> {
        Raster::from_vec(values, 2, 2)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0))
    }

    fn s2(id: &str) -> Image {
        Image::new(id)
            .with_band("B4", raster(vec![0.10, 0.12, 0.14, 0.16]))
            .unwrap()
            .with_band("B8", raster(vec![0.40, 0.42, 0.44, 0.46]))
            .unwrap()
    }

    fn cs(id: &str, scores: Vec<f64>) -> Image {
        Image::new(id).with_band("cs", raster(scores)).unwrap()
    }

    #[test]
    fn test_link_by_id_not_position() {
        let base = ImageCollection::new(vec![s2("t1"), s2("t2")]);
        let aux = ImageCollection::new(vec![cs("t2", vec![0.9; 4]), cs("t1", vec![0.1; 4])]);
        let linked = link_collection(&base, &aux, &["cs"]).unwrap();
        assert_eq!(linked.images()[0].band("cs").unwrap().get(0, 0).unwrap(), 0.1);
        assert_eq!(linked.images()[1].band("cs").unwrap().get(0, 0).unwrap(), 0.9);
    }

    #[test]
    fn test_unpaired_image_is_fully_masked() {
        let base = ImageCollection::new(vec![s2("lonely")]);
        let linked = link_collection(&base, &ImageCollection::default(), &["cs"]).unwrap();
        let masked = mask_collection(&linked, &CloudMaskParams::default()).unwrap();
        assert_eq!(masked.images()[0].band("B8").unwrap().valid_count(), 0);
    }

    #[test]
    fn test_mask_threshold_is_inclusive() {
        let image = s2("t1").with_band("cs", raster(vec![0.2, 0.5, 0.8, f64::NAN])).unwrap();
        let masked = mask_low_quality(&image, &CloudMaskParams::default()).unwrap();
        let b4 = masked.band("B4").unwrap();
        assert!(!b4.is_valid_at(0, 0));
        assert!(b4.is_valid_at(0, 1));
        assert!(b4.is_valid_at(1, 0));
        assert!(!b4.is_valid_at(1, 1));
    }

    #[test]
    fn test_mask_is_idempotent() {
        let image = s2("t1").with_band("cs", raster(vec![0.49, 0.51, 0.7, 0.3])).unwrap();
        let params = CloudMaskParams::default();
        let once = mask_low_quality(&image, &params).unwrap();
        let twice = mask_low_quality(&once, &params).unwrap();
        for name in once.band_names() {
            let a = once.band(&name).unwrap();
            let b = twice.band(&name).unwrap();
            for (x, y) in a.data().iter().zip(b.data().iter()) {
                assert!(x == y || (x.is_nan() && y.is_nan()));
            }
        }
    }

    #[test]
    fn test_missing_qa_band() {
        let params = CloudMaskParams::default();
        assert!(matches!(mask_low_quality(&s2("t1"), &params), Err(Error::MissingBand { .. })));
    }
}
