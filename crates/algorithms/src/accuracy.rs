//! Train/validation splitting and confusion-matrix accuracy
//!
//! Every ratio here is `None` when its denominator is zero (empty validation
//! set, class never observed or never predicted), never NaN.

use crate::classification::RandomForest;
use crate::sampling::SampleTable;
use ardhi_core::vector::AttributeValue;
use ardhi_core::Result;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Property written by [`evaluate`] before tabulating
pub const PREDICTION_COLUMN: &str = "classification";

/// Parameters for [`split`]
#[derive(Debug, Clone)]
pub struct SplitParams {
    /// Rows with `random < fraction` go to training
    pub fraction: f64,
    pub seed: u64,
    /// Name of the random column added to the table
    pub column: String,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            fraction: 0.6,
            seed: 0,
            column: "random".to_string(),
        }
    }
}

/// Partition a table into (training, validation) with a seeded random
/// column. The same seed always gives the same partition.
pub fn split(table: &SampleTable, params: &SplitParams) -> (SampleTable, SampleTable) {
    let with_random = table.random_column(&params.column, params.seed);
    let draw = |row: &crate::sampling::SampleRow| {
        row.property(&params.column)
            .and_then(AttributeValue::as_f64)
            .unwrap_or(1.0)
    };
    let training = with_random.filter(|r| draw(r) < params.fraction);
    let validation = with_random.filter(|r| draw(r) >= params.fraction);
    debug!(
        training = training.len(),
        validation = validation.len(),
        fraction = params.fraction,
        "split samples"
    );
    (training, validation)
}

/// Square tabulation of (actual, predicted) label pairs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfusionMatrix {
    /// Labels in ascending order; row and column order of `counts`
    classes: Vec<i32>,
    /// `counts[actual][predicted]`
    counts: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    /// Tabulate label pairs. The class axis is the union of actual and
    /// predicted labels.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (i32, i32)>,
    {
        let pairs: Vec<(i32, i32)> = pairs.into_iter().collect();
        let classes: Vec<i32> = pairs
            .iter()
            .flat_map(|&(a, p)| [a, p])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: BTreeMap<i32, usize> = classes.iter().enumerate().map(|(i, c)| (*c, i)).collect();

        let n = classes.len();
        let mut counts = vec![vec![0u64; n]; n];
        for (a, p) in pairs {
            counts[index[&a]][index[&p]] += 1;
        }
        Self { classes, counts }
    }

    /// Tabulate two integer properties of a sample table
    pub fn from_table(table: &SampleTable, actual: &str, predicted: &str) -> Result<Self> {
        let pairs = table
            .rows
            .iter()
            .map(|r| Ok((r.label(actual)?, r.label(predicted)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_pairs(pairs))
    }

    pub fn classes(&self) -> &[i32] {
        &self.classes
    }

    pub fn counts(&self) -> &[Vec<u64>] {
        &self.counts
    }

    /// Count for an (actual, predicted) pair; 0 for unseen labels
    pub fn count(&self, actual: i32, predicted: i32) -> u64 {
        match (self.position(actual), self.position(predicted)) {
            (Some(a), Some(p)) => self.counts[a][p],
            _ => 0,
        }
    }

    fn position(&self, class: i32) -> Option<usize> {
        self.classes.binary_search(&class).ok()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    fn diagonal(&self) -> u64 {
        (0..self.classes.len()).map(|i| self.counts[i][i]).sum()
    }

    /// Overall accuracy `trace / total`, `None` for an empty matrix
    pub fn accuracy(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| self.diagonal() as f64 / total as f64)
    }

    /// Per-class producer's accuracy (recall): diagonal over row sum
    pub fn producers_accuracy(&self) -> Vec<(i32, Option<f64>)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let row: u64 = self.counts[i].iter().sum();
                (c, (row > 0).then(|| self.counts[i][i] as f64 / row as f64))
            })
            .collect()
    }

    /// Per-class consumer's accuracy (precision): diagonal over column sum
    pub fn consumers_accuracy(&self) -> Vec<(i32, Option<f64>)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(j, &c)| {
                let col: u64 = self.counts.iter().map(|r| r[j]).sum();
                (c, (col > 0).then(|| self.counts[j][j] as f64 / col as f64))
            })
            .collect()
    }

    /// Cohen's kappa; `None` when empty or when chance agreement is total
    pub fn kappa(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let n = total as f64;
        let observed = self.diagonal() as f64 / n;
        let expected: f64 = (0..self.classes.len())
            .map(|i| {
                let row: u64 = self.counts[i].iter().sum();
                let col: u64 = self.counts.iter().map(|r| r[i]).sum();
                (row as f64 / n) * (col as f64 / n)
            })
            .sum();
        if (1.0 - expected).abs() < f64::EPSILON {
            return None;
        }
        Some((observed - expected) / (1.0 - expected))
    }
}

/// Classify `validation` with `forest` and tabulate against `label`.
///
/// An empty validation set gives an empty matrix whose accuracy is `None`.
pub fn evaluate(forest: &RandomForest, validation: &SampleTable, label: &str) -> Result<ConfusionMatrix> {
    if validation.is_empty() {
        warn!("validation set is empty; accuracy is undefined");
    }
    let classified = forest.classify_table(validation, PREDICTION_COLUMN)?;
    ConfusionMatrix::from_table(&classified, label, PREDICTION_COLUMN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_accuracy_and_kappa() {
        // 0 urban, 2 water, 3 vegetation
        let pairs = vec![(0, 0), (0, 0), (0, 3), (2, 2), (2, 2), (3, 3), (3, 3), (3, 0)];
        let cm = ConfusionMatrix::from_pairs(pairs);
        assert_eq!(cm.classes(), &[0, 2, 3]);
        assert_eq!(cm.total(), 8);
        assert_eq!(cm.count(0, 3), 1);
        assert_eq!(cm.count(1, 1), 0);
        assert_relative_eq!(cm.accuracy().unwrap(), 6.0 / 8.0);

        let producers = cm.producers_accuracy();
        assert_relative_eq!(producers[0].1.unwrap(), 2.0 / 3.0);
        let consumers = cm.consumers_accuracy();
        assert_relative_eq!(consumers[2].1.unwrap(), 2.0 / 3.0);

        // po = 0.75, pe = (3*3 + 2*2 + 3*3) / 64
        let pe = 22.0 / 64.0;
        assert_relative_eq!(cm.kappa().unwrap(), (0.75 - pe) / (1.0 - pe), epsilon = 1e-12);
    }

    #[test]
    fn test_empty_matrix_is_undefined() {
        let cm = ConfusionMatrix::from_pairs(Vec::new());
        assert_eq!(cm.accuracy(), None);
        assert_eq!(cm.kappa(), None);
        assert!(cm.producers_accuracy().is_empty());
    }

    #[test]
    fn test_predicted_only_class_has_undefined_producers_accuracy() {
        let cm = ConfusionMatrix::from_pairs(vec![(1, 1), (1, 4)]);
        let producers = cm.producers_accuracy();
        assert_eq!(producers[1], (4, None));
        assert_eq!(cm.consumers_accuracy()[1], (4, Some(0.0)));
    }
}
