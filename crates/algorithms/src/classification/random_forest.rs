//! Random forest classifier over sample tables and images
//!
//! Each tree is grown on a bootstrap resample of the training rows with
//! `mtry` features tried per split; prediction is a majority vote. Tree `i`
//! draws from a generator seeded with `seed + i`, so a fixed seed gives the
//! same forest whatever the thread count.

use super::decision_tree::{DecisionTree, TreeParams};
use crate::maybe_rayon::*;
use crate::sampling::SampleTable;
use ardhi_core::vector::AttributeValue;
use ardhi_core::{Error, Image, Raster, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Parameters for [`RandomForest::train`]
#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Features tried per split; `None` means `floor(sqrt(n_features))`
    pub mtry: Option<usize>,
    pub min_samples_leaf: usize,
    pub max_depth: Option<usize>,
    /// Bootstrap size as a fraction of the training rows
    pub bag_fraction: f64,
    /// `None` draws a fresh seed, so repeated runs differ
    pub seed: Option<u64>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 50,
            mtry: None,
            min_samples_leaf: 1,
            max_depth: None,
            bag_fraction: 1.0,
            seed: None,
        }
    }
}

/// Trained forest. Immutable; predicts on rows, tables and images.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    band_names: Vec<String>,
    /// Sorted distinct labels; tree outputs index into this
    classes: Vec<i32>,
    label: String,
}

impl RandomForest {
    /// Fit a forest on `table`, predicting the integer property `label` from
    /// `input_bands`.
    ///
    /// Fails with [`Error::TrainingDataInsufficient`] on an empty table or a
    /// single distinct label, and [`Error::MissingBand`] when an input band is
    /// not a table column.
    pub fn train(
        table: &SampleTable,
        label: &str,
        input_bands: &[&str],
        params: &ForestParams,
    ) -> Result<Self> {
        if table.is_empty() {
            return Err(Error::TrainingDataInsufficient("training table has no rows".into()));
        }
        if input_bands.is_empty() {
            return Err(Error::InvalidParameter {
                name: "input_bands",
                value: "[]".into(),
                reason: "at least one band is required".into(),
            });
        }
        if params.n_trees == 0 {
            return Err(Error::InvalidParameter {
                name: "n_trees",
                value: "0".into(),
                reason: "a forest needs at least one tree".into(),
            });
        }
        if !(params.bag_fraction > 0.0 && params.bag_fraction <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "bag_fraction",
                value: params.bag_fraction.to_string(),
                reason: "must be in (0, 1]".into(),
            });
        }

        let columns = input_bands
            .iter()
            .map(|b| table.column(b))
            .collect::<Result<Vec<_>>>()?;
        let n_features = columns.len();
        let mtry = match params.mtry {
            None => ((n_features as f64).sqrt().floor() as usize).max(1),
            Some(m) if m >= 1 && m <= n_features => m,
            Some(m) => {
                return Err(Error::InvalidParameter {
                    name: "mtry",
                    value: m.to_string(),
                    reason: format!("must be between 1 and {}", n_features),
                })
            }
        };

        let labels = table
            .rows
            .iter()
            .map(|row| row.label(label))
            .collect::<Result<Vec<_>>>()?;
        let classes: Vec<i32> = labels.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if classes.len() < 2 {
            return Err(Error::TrainingDataInsufficient(format!(
                "'{}' has a single distinct value ({}); at least two classes are required",
                label, classes[0]
            )));
        }

        let x: Vec<Vec<f64>> = table
            .rows
            .iter()
            .map(|row| columns.iter().map(|&c| row.values[c]).collect())
            .collect();
        let y: Vec<usize> = labels
            .iter()
            .map(|l| classes.binary_search(l).unwrap_or(0))
            .collect();

        let base_seed = params.seed.unwrap_or_else(rand::random);
        let n_rows = x.len();
        let bag = ((n_rows as f64 * params.bag_fraction).round() as usize).max(1);
        let tree_params = TreeParams {
            mtry,
            min_samples_leaf: params.min_samples_leaf,
            max_depth: params.max_depth,
        };
        let n_classes = classes.len();

        let trees: Vec<DecisionTree> = (0..params.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(i as u64));
                let sample: Vec<usize> = (0..bag).map(|_| rng.gen_range(0..n_rows)).collect();
                DecisionTree::fit(&x, &y, n_classes, sample, tree_params, &mut rng)
            })
            .collect();

        info!(
            trees = trees.len(),
            rows = n_rows,
            features = n_features,
            classes = n_classes,
            mtry,
            "trained random forest"
        );

        Ok(Self {
            trees,
            band_names: input_bands.iter().map(|b| b.to_string()).collect(),
            classes,
            label: label.to_string(),
        })
    }

    /// Majority-vote label for one feature vector in [`RandomForest::band_names`] order
    pub fn predict_values(&self, values: &[f64]) -> i32 {
        let mut votes = vec![0usize; self.classes.len()];
        for tree in &self.trees {
            votes[tree.predict(values)] += 1;
        }
        let mut best = 0;
        for (class, &v) in votes.iter().enumerate() {
            if v > votes[best] {
                best = class;
            }
        }
        self.classes[best]
    }

    /// Classify every pixel of `image`. Pixels where any input band is
    /// invalid stay invalid; they are never given a default class.
    pub fn predict(&self, image: &Image) -> Result<Raster<i32>> {
        let bands = self
            .band_names
            .iter()
            .map(|b| image.band(b))
            .collect::<Result<Vec<_>>>()?;
        let template = bands[0];
        let (rows, cols) = template.shape();

        let data: Vec<i32> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut row_data = vec![i32::MIN; cols];
                let mut values = vec![0.0; bands.len()];
                for (col, slot) in row_data.iter_mut().enumerate() {
                    let mut valid = true;
                    for (v, band) in values.iter_mut().zip(&bands) {
                        let x = unsafe { band.get_unchecked(row, col) };
                        if !band.is_valid(x) {
                            valid = false;
                            break;
                        }
                        *v = x;
                    }
                    if valid {
                        *slot = self.predict_values(&values);
                    }
                }
                row_data
            })
            .collect();

        let classified = template.with_data(data, Some(i32::MIN))?;
        debug!(valid = classified.valid_count(), total = classified.len(), "classified image");
        Ok(classified)
    }

    /// Copy of `table` with each row's prediction stored as `output`
    pub fn classify_table(&self, table: &SampleTable, output: &str) -> Result<SampleTable> {
        let columns = self
            .band_names
            .iter()
            .map(|b| table.column(b))
            .collect::<Result<Vec<_>>>()?;
        let mut out = table.clone();
        for row in out.rows.iter_mut() {
            let values: Vec<f64> = columns.iter().map(|&c| row.values[c]).collect();
            let predicted = self.predict_values(&values);
            row.properties
                .insert(output.to_string(), AttributeValue::Int(predicted as i64));
        }
        Ok(out)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn classes(&self) -> &[i32] {
        &self.classes
    }

    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    /// Property the forest was trained to predict
    pub fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::SampleRow;
    use ardhi_core::vector::Properties;
    use ardhi_core::GeoTransform;

    fn row(b4: f64, b8: f64, landcover: i64) -> SampleRow {
        let mut properties = Properties::new();
        properties.insert("landcover".into(), AttributeValue::Int(landcover));
        SampleRow {
            values: vec![b4, b8],
            properties,
        }
    }

    /// Turbid water: brighter red, very low NIR. Vegetation: dark red, high NIR.
    fn training() -> SampleTable {
        let mut table = SampleTable::new(vec!["B4".into(), "B8".into()]);
        for i in 0..20 {
            let j = i as f64 * 0.001;
            table.rows.push(row(0.10 + j, 0.02 + j, 2));
            table.rows.push(row(0.03 + j, 0.45 + j, 3));
        }
        table
    }

    fn seeded() -> ForestParams {
        ForestParams {
            n_trees: 10,
            seed: Some(42),
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_single_label_is_insufficient() {
        let mut table = SampleTable::new(vec!["B4".into(), "B8".into()]);
        table.rows.push(row(0.1, 0.2, 3));
        table.rows.push(row(0.1, 0.3, 3));
        let err = RandomForest::train(&table, "landcover", &["B4", "B8"], &seeded()).unwrap_err();
        assert!(matches!(err, Error::TrainingDataInsufficient(_)));

        let empty = SampleTable::new(vec!["B4".into()]);
        let err = RandomForest::train(&empty, "landcover", &["B4"], &seeded()).unwrap_err();
        assert!(matches!(err, Error::TrainingDataInsufficient(_)));
    }

    #[test]
    fn test_unknown_band_or_label() {
        let table = training();
        assert!(matches!(
            RandomForest::train(&table, "landcover", &["B4", "B12"], &seeded()),
            Err(Error::MissingBand { .. })
        ));
        assert!(matches!(
            RandomForest::train(&table, "class", &["B4", "B8"], &seeded()),
            Err(Error::MissingProperty { .. })
        ));
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let table = training();
        let a = RandomForest::train(&table, "landcover", &["B4", "B8"], &seeded()).unwrap();
        let b = RandomForest::train(&table, "landcover", &["B4", "B8"], &seeded()).unwrap();
        let points = [[0.05, 0.1], [0.05, 0.2], [0.05, 0.3], [0.2, 0.25]];
        for p in points {
            assert_eq!(a.predict_values(&p), b.predict_values(&p));
        }
        assert_eq!(a.classes(), &[2, 3]);
    }

    #[test]
    fn test_predict_leaves_invalid_pixels_invalid() {
        let forest = RandomForest::train(&training(), "landcover", &["B4", "B8"], &seeded()).unwrap();
        let gt = GeoTransform::new(0.0, 1.0, 1.0, -1.0);
        let image = Image::new("composite")
            .with_band("B4", Raster::from_vec(vec![0.11, 0.04, f64::NAN], 1, 3).unwrap().with_transform(gt))
            .unwrap()
            .with_band("B8", Raster::from_vec(vec![0.03, 0.46, 0.3], 1, 3).unwrap().with_transform(gt))
            .unwrap();
        let classified = forest.predict(&image).unwrap();
        assert_eq!(classified.get(0, 0).unwrap(), 2);
        assert_eq!(classified.get(0, 1).unwrap(), 3);
        assert!(!classified.is_valid_at(0, 2));
    }

    #[test]
    fn test_classify_table_adds_column() {
        let table = training();
        let forest = RandomForest::train(&table, "landcover", &["B4", "B8"], &seeded()).unwrap();
        let classified = forest.classify_table(&table, "classification").unwrap();
        let agree = classified
            .rows
            .iter()
            .filter(|r| r.label("classification").unwrap() == r.label("landcover").unwrap())
            .count();
        assert_eq!(agree, table.len());
    }
}
