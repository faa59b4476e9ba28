//! Region mean time series over an image collection

use crate::maybe_rayon::*;
use crate::region::Region;
use ardhi_core::{Image, ImageCollection, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

/// Mean of one band inside a region for one image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub id: String,
    pub time: Option<DateTime<Utc>>,
    /// `None` when no valid sample falls inside the region
    pub mean: Option<f64>,
    pub count: usize,
}

/// Mean of `band` over the valid pixels of `image` inside `region`
pub fn region_mean(image: &Image, band: &str, region: &Region) -> Result<(Option<f64>, usize)> {
    let raster = image.band(band)?;
    let (sum, count) = region
        .pixels(raster)
        .into_iter()
        .filter_map(|(row, col)| raster.valid_value(row, col))
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    Ok(((count > 0).then(|| sum / count as f64), count))
}

/// One point per image, in collection order.
///
/// Images without any valid sample in the region get `mean: None` rather
/// than zero, so gaps stay distinguishable from dark pixels.
pub fn region_mean_series(collection: &ImageCollection, band: &str, region: &Region) -> Result<Vec<SeriesPoint>> {
    region.require_non_empty()?;
    collection.require_non_empty("region mean series input")?;

    let points = collection
        .images()
        .par_iter()
        .map(|image| {
            let (mean, count) = region_mean(image, band, region)?;
            Ok(SeriesPoint {
                id: image.id().to_string(),
                time: image.time_start(),
                mean,
                count,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let gaps = points.iter().filter(|p| p.mean.is_none()).count();
    if gaps > 0 {
        warn!(gaps, band, region = region.label(), "images with no valid samples in region");
    }
    debug!(images = points.len(), band, "computed region mean series");
    Ok(points)
}
