//! Sample extraction: band values at labelled feature locations
//!
//! Each point feature samples the pixel that contains it, each polygon every
//! pixel whose centre it contains. A sample is kept only when every band is
//! valid at that pixel, so features over masked ground yield no rows.

use crate::maybe_rayon::*;
use crate::region::Region;
use ardhi_core::vector::{AttributeValue, Feature, FeatureCollection, Properties};
use ardhi_core::{Error, Image, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// One sampled pixel: band values in table column order plus the copied
/// feature properties.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub values: Vec<f64>,
    pub properties: Properties,
}

impl SampleRow {
    pub fn property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Integer class label stored under `key`
    pub fn label(&self, key: &str) -> Result<i32> {
        let value = self.property(key).ok_or_else(|| Error::MissingProperty {
            property: key.to_string(),
            owner: "sample row".to_string(),
        })?;
        value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| Error::InvalidParameter {
                name: "label",
                value: value.to_string(),
                reason: format!("'{}' must hold an integer class index", key),
            })
    }
}

/// Table of sampled pixels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTable {
    pub band_names: Vec<String>,
    pub rows: Vec<SampleRow>,
}

impl SampleTable {
    pub fn new(band_names: Vec<String>) -> Self {
        Self {
            band_names,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column index of a band, [`Error::MissingBand`] when absent
    pub fn column(&self, band: &str) -> Result<usize> {
        self.band_names
            .iter()
            .position(|b| b == band)
            .ok_or_else(|| Error::missing_band(band, "sample table"))
    }

    /// Add a seeded uniform [0, 1) property to every row
    pub fn random_column(&self, name: &str, seed: u64) -> SampleTable {
        let mut rng = StdRng::seed_from_u64(seed);
        let rows = self
            .rows
            .iter()
            .map(|r| {
                let mut row = r.clone();
                row.properties
                    .insert(name.to_string(), AttributeValue::Float(rng.gen::<f64>()));
                row
            })
            .collect();
        SampleTable {
            band_names: self.band_names.clone(),
            rows,
        }
    }

    /// Rows for which `predicate` holds, order preserved
    pub fn filter<P>(&self, predicate: P) -> SampleTable
    where
        P: Fn(&SampleRow) -> bool,
    {
        SampleTable {
            band_names: self.band_names.clone(),
            rows: self.rows.iter().filter(|r| predicate(r)).cloned().collect(),
        }
    }

    /// Rows as geometry-less features, band values stored as properties
    pub fn to_features(&self) -> FeatureCollection {
        self.rows
            .iter()
            .map(|row| {
                let mut f = Feature::table_row();
                f.properties = row.properties.clone();
                for (name, value) in self.band_names.iter().zip(&row.values) {
                    f.set_property(name.clone(), *value);
                }
                f
            })
            .collect()
    }
}

/// Sample every band of `image` under each feature, copying the listed
/// `properties` (e.g. the class label) onto each row.
pub fn sample_regions(image: &Image, features: &FeatureCollection, properties: &[&str]) -> Result<SampleTable> {
    let template = image.template()?;
    let band_names = image.band_names();
    let bands: Vec<_> = image.bands().iter().map(|b| &b.raster).collect();

    let rows: Vec<SampleRow> = features
        .features
        .par_iter()
        .flat_map(|feature| {
            let Some(geometry) = feature.geometry.as_ref() else {
                return Vec::new();
            };
            let mut props = Properties::new();
            for key in properties {
                if let Some(v) = feature.get_property(key) {
                    props.insert(key.to_string(), v.clone());
                }
            }
            Region::from_geometry("sample", geometry)
                .pixels(template)
                .into_iter()
                .filter_map(|(row, col)| {
                    let values = bands
                        .iter()
                        .map(|b| b.valid_value(row, col))
                        .collect::<Option<Vec<f64>>>()?;
                    Some(SampleRow {
                        values,
                        properties: props.clone(),
                    })
                })
                .collect::<Vec<_>>()
        })
        .collect();

    debug!(features = features.len(), rows = rows.len(), "sampled regions");
    Ok(SampleTable { band_names, rows })
}
