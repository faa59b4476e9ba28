//! Zonal statistics
//!
//! Summarises the valid samples of a raster inside each zone polygon of a
//! feature collection. Zones are named by one of their properties.

use crate::maybe_rayon::*;
use crate::region::Region;
use ardhi_core::raster::Raster;
use ardhi_core::vector::{AttributeValue, Feature, FeatureCollection};
use ardhi_core::Result;
use serde::Serialize;
use tracing::{debug, warn};

/// Statistics of one zone. Everything but `count` is `None` when the zone
/// covers no valid sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZonalResult {
    pub zone: AttributeValue,
    pub count: usize,
    pub sum: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
}

impl ZonalResult {
    fn from_values(zone: AttributeValue, mut vals: Vec<f64>) -> Self {
        let count = vals.len();
        if count == 0 {
            return Self {
                zone,
                count,
                sum: None,
                mean: None,
                std_dev: None,
                min: None,
                max: None,
                median: None,
            };
        }

        let sum: f64 = vals.iter().sum();
        let mean = sum / count as f64;
        let var = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;

        vals.sort_by(f64::total_cmp);
        let median = if count % 2 == 0 {
            (vals[count / 2 - 1] + vals[count / 2]) / 2.0
        } else {
            vals[count / 2]
        };

        Self {
            zone,
            count,
            sum: Some(sum),
            mean: Some(mean),
            std_dev: Some(var.sqrt()),
            min: vals.first().copied(),
            max: vals.last().copied(),
            median: Some(median),
        }
    }

    /// Geometry-less feature holding the zone key and its statistics
    pub fn to_feature(&self, key: &str) -> Feature {
        let mut f = Feature::table_row()
            .with_property(key, self.zone.clone())
            .with_property("count", self.count as i64);
        let stats = [
            ("sum", self.sum),
            ("mean", self.mean),
            ("std_dev", self.std_dev),
            ("min", self.min),
            ("max", self.max),
            ("median", self.median),
        ];
        for (name, value) in stats {
            f.set_property(name, value.map_or(AttributeValue::Null, AttributeValue::Float));
        }
        f
    }
}

/// Statistics of `values` inside each zone of `zones`, in order of first
/// appearance.
///
/// Features sharing the same `key` value are dissolved into one zone, so a
/// ward split over several polygons is reported once and a pixel covered by
/// two of its parts counts once. Features without geometry are skipped. A
/// feature lacking `key` is grouped under [`AttributeValue::Null`].
pub fn zonal_statistics(values: &Raster<f64>, zones: &FeatureCollection, key: &str) -> Result<Vec<ZonalResult>> {
    let mut dissolved: Vec<(AttributeValue, Region)> = Vec::new();
    for feature in zones.iter() {
        let Some(geometry) = feature.geometry.as_ref() else {
            continue;
        };
        let zone = feature.get_property(key).cloned().unwrap_or(AttributeValue::Null);
        match dissolved.iter_mut().find(|(z, _)| *z == zone) {
            Some((_, region)) => region.absorb(geometry),
            None => {
                let region = Region::from_geometry(zone.to_string(), geometry);
                dissolved.push((zone, region));
            }
        }
    }

    let results: Vec<ZonalResult> = dissolved
        .into_par_iter()
        .map(|(zone, region)| {
            let vals: Vec<f64> = region
                .pixels(values)
                .into_iter()
                .filter_map(|(row, col)| values.valid_value(row, col))
                .collect();
            ZonalResult::from_values(zone, vals)
        })
        .collect();

    let empty = results.iter().filter(|r| r.count == 0).count();
    if empty > 0 {
        warn!(empty, "zones without valid samples");
    }
    debug!(zones = results.len(), key, "computed zonal statistics");
    Ok(results)
}

/// Zonal results as a table of geometry-less features
pub fn zonal_table(results: &[ZonalResult], key: &str) -> FeatureCollection {
    results.iter().map(|r| r.to_feature(key)).collect()
}
