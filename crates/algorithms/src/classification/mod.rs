//! Supervised pixel classification
//!
//! - **DecisionTree**: CART base learner (Gini, random feature subsets)
//! - **RandomForest**: bootstrap ensemble with majority vote, trained on
//!   sample tables and applied to images or tables

mod decision_tree;
mod random_forest;

pub use decision_tree::{DecisionTree, TreeNode, TreeParams};
pub use random_forest::{ForestParams, RandomForest};
