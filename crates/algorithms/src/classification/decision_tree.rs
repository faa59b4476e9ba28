//! CART decision tree used as the forest's base learner
//!
//! Array-based node storage; splits minimise weighted Gini impurity over a
//! random subset of features at each node. Samples with `value <= threshold`
//! go left.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// A node in the tree
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Leaf {
        /// Class index into the forest's class list
        class: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Growth limits for one tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    /// Features tried per split
    pub mtry: usize,
    pub min_samples_leaf: usize,
    pub max_depth: Option<usize>,
}

/// A fitted classification tree
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    n_features: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl DecisionTree {
    /// Grow a tree on the rows of `x` listed in `sample` (repeats allowed,
    /// as produced by bootstrapping). `y` holds class indices `< n_classes`.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        sample: Vec<usize>,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut nodes = vec![TreeNode::Leaf { class: 0 }];
        // (node slot, rows reaching it, depth)
        let mut pending: Vec<(usize, Vec<usize>, usize)> = vec![(0, sample, 0)];

        while let Some((slot, rows, depth)) = pending.pop() {
            let counts = class_counts(y, &rows, n_classes);
            let majority = majority_class(&counts);

            let depth_reached = params.max_depth.is_some_and(|d| depth >= d);
            let pure = counts.iter().filter(|c| **c > 0).count() <= 1;
            if depth_reached || pure || rows.len() < 2 * params.min_samples_leaf.max(1) {
                nodes[slot] = TreeNode::Leaf { class: majority };
                continue;
            }

            let Some(best) = find_split(x, y, n_classes, &rows, n_features, params, rng) else {
                nodes[slot] = TreeNode::Leaf { class: majority };
                continue;
            };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .partition(|&&r| x[r][best.feature] <= best.threshold);

            let left = nodes.len();
            nodes.push(TreeNode::Leaf { class: majority });
            let right = nodes.len();
            nodes.push(TreeNode::Leaf { class: majority });
            nodes[slot] = TreeNode::Split {
                feature: best.feature,
                threshold: best.threshold,
                left,
                right,
            };
            pending.push((left, left_rows, depth + 1));
            pending.push((right, right_rows, depth + 1));
        }

        Self { nodes, n_features }
    }

    /// Class index for one feature vector
    pub fn predict(&self, features: &[f64]) -> usize {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { class } => return *class,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = features.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if v <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Longest root-to-leaf path
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            match &self.nodes[idx] {
                TreeNode::Leaf { .. } => deepest = deepest.max(d),
                TreeNode::Split { left, right, .. } => {
                    stack.push((*left, d + 1));
                    stack.push((*right, d + 1));
                }
            }
        }
        deepest
    }
}

fn class_counts(y: &[usize], rows: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &r in rows {
        counts[y[r]] += 1;
    }
    counts
}

/// Most frequent class; ties go to the lower class index
fn majority_class(counts: &[usize]) -> usize {
    let mut best = 0;
    for (class, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = class;
        }
    }
    best
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let t = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / t).powi(2)).sum::<f64>()
}

/// Best Gini split over `mtry` randomly chosen features. When none of them
/// can split the node, the remaining features are tried in random order.
fn find_split(
    x: &[Vec<f64>],
    y: &[usize],
    n_classes: usize,
    rows: &[usize],
    n_features: usize,
    params: TreeParams,
    rng: &mut StdRng,
) -> Option<BestSplit> {
    let mut features: Vec<usize> = (0..n_features).collect();
    features.shuffle(rng);

    let min_leaf = params.min_samples_leaf.max(1);
    let mut best: Option<BestSplit> = None;
    let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(rows.len());

    for (tried, &feature) in features.iter().enumerate() {
        if tried >= params.mtry && best.is_some() {
            break;
        }

        sorted.clear();
        sorted.extend(rows.iter().map(|&r| (x[r][feature], y[r])));
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total = sorted.len();
        let mut left = vec![0usize; n_classes];
        let mut right = vec![0usize; n_classes];
        for &(_, c) in &sorted {
            right[c] += 1;
        }

        for i in 0..total - 1 {
            let c = sorted[i].1;
            left[c] += 1;
            right[c] -= 1;

            let n_left = i + 1;
            let n_right = total - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let (v, next) = (sorted[i].0, sorted[i + 1].0);
            if v == next {
                continue;
            }

            let impurity = (n_left as f64 * gini(&left, n_left) + n_right as f64 * gini(&right, n_right))
                / total as f64;
            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                best = Some(BestSplit {
                    feature,
                    threshold: v + (next - v) / 2.0,
                    impurity,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn params() -> TreeParams {
        TreeParams {
            mtry: 2,
            min_samples_leaf: 1,
            max_depth: None,
        }
    }

    #[test]
    fn test_separable_data_is_fit_exactly() {
        let x = vec![vec![0.1, 5.0], vec![0.2, 4.0], vec![0.8, 5.0], vec![0.9, 4.0]];
        let y = vec![0, 0, 1, 1];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&x, &y, 2, (0..4).collect(), params(), &mut rng);

        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
        for (row, class) in x.iter().zip(&y) {
            assert_eq!(tree.predict(row), *class);
        }
        assert_eq!(tree.predict(&[0.45, 0.0]), 0);
        assert_eq!(tree.predict(&[0.55, 0.0]), 1);
    }

    #[test]
    fn test_constant_features_make_a_leaf() {
        let x = vec![vec![1.0], vec![1.0], vec![1.0]];
        let y = vec![1, 0, 1];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&x, &y, 2, (0..3).collect(), params(), &mut rng);
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict(&[1.0]), 1);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x: Vec<Vec<f64>> = (0..16).map(|i| vec![i as f64]).collect();
        let y: Vec<usize> = (0..16).map(|i| i % 4).collect();
        let mut rng = StdRng::seed_from_u64(3);
        let limited = TreeParams {
            max_depth: Some(2),
            ..params()
        };
        let tree = DecisionTree::fit(&x, &y, 4, (0..16).collect(), limited, &mut rng);
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn test_majority_ties_go_low() {
        assert_eq!(majority_class(&[2, 2, 1]), 0);
        assert_eq!(majority_class(&[0, 1, 3]), 2);
    }
}
