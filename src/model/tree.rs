//! Decision tree structure for a pre-trained classifier

use crate::error::{BloodwiseError, Result};
use serde::{Deserialize, Serialize};

/// Decision tree node
///
/// Samples go left when `x[feature] <= threshold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// Leaf node with a class distribution (counts or probabilities)
    Leaf {
        value: Vec<f64>,
        n_samples: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        impurity: Option<f64>,
    },
    /// Internal node with split
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    /// Build a leaf from a class distribution
    pub fn leaf(value: Vec<f64>, n_samples: usize) -> Self {
        TreeNode::Leaf {
            value,
            n_samples,
            impurity: None,
        }
    }

    /// Build a split node
    pub fn split(
        feature: usize,
        threshold: f64,
        left: TreeNode,
        right: TreeNode,
        impurity: f64,
    ) -> Self {
        let n_samples = left.n_samples() + right.n_samples();
        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
            n_samples,
            impurity,
        }
    }

    /// Number of training samples that reached this node
    pub fn n_samples(&self) -> usize {
        match self {
            TreeNode::Leaf { n_samples, .. } | TreeNode::Split { n_samples, .. } => *n_samples,
        }
    }

    /// Cover as used by the attribution method
    pub fn cover(&self) -> f64 {
        self.n_samples() as f64
    }

    /// Node impurity; leaves without a stored value use the Gini index
    pub fn impurity(&self) -> f64 {
        match self {
            TreeNode::Leaf { value, impurity, .. } => impurity.unwrap_or_else(|| gini(value)),
            TreeNode::Split { impurity, .. } => *impurity,
        }
    }
}

/// Gini index of a normalised class distribution
fn gini(distribution: &[f64]) -> f64 {
    1.0 - distribution.iter().map(|p| p * p).sum::<f64>()
}

/// A single tree of a forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: TreeNode,
}

impl DecisionTree {
    pub fn new(root: TreeNode) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Check structure against the model shape and normalise leaf values
    pub(crate) fn validate(&mut self, n_features: usize, n_classes: usize) -> Result<()> {
        validate_node(&mut self.root, n_features, n_classes)
    }

    /// Class distribution of the leaf reached by `sample`
    pub fn leaf_distribution(&self, sample: &[f64]) -> &[f64] {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return value,
                TreeNode::Split { feature, threshold, left, right, .. } => {
                    node = if sample[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Unnormalised mean-decrease-in-impurity per feature
    pub fn impurity_decrease(&self, n_features: usize) -> Vec<f64> {
        let mut importances = vec![0.0; n_features];
        accumulate_decrease(&self.root, &mut importances);
        importances
    }
}

fn validate_node(node: &mut TreeNode, n_features: usize, n_classes: usize) -> Result<()> {
    match node {
        TreeNode::Leaf { value, .. } => {
            if value.len() != n_classes {
                return Err(BloodwiseError::ModelLoad(format!(
                    "leaf has {} class values, expected {}",
                    value.len(),
                    n_classes
                )));
            }
            if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(BloodwiseError::ModelLoad(
                    "leaf values must be finite and non-negative".to_string(),
                ));
            }
            let total: f64 = value.iter().sum();
            if total <= 0.0 {
                return Err(BloodwiseError::ModelLoad(
                    "leaf values must have a positive sum".to_string(),
                ));
            }
            for v in value.iter_mut() {
                *v /= total;
            }
            Ok(())
        }
        TreeNode::Split { feature, threshold, left, right, .. } => {
            if *feature >= n_features {
                return Err(BloodwiseError::ModelLoad(format!(
                    "split on feature {} but the model has {} features",
                    feature, n_features
                )));
            }
            if threshold.is_nan() {
                return Err(BloodwiseError::ModelLoad("split threshold is NaN".to_string()));
            }
            validate_node(left, n_features, n_classes)?;
            validate_node(right, n_features, n_classes)
        }
    }
}

fn accumulate_decrease(node: &TreeNode, importances: &mut [f64]) {
    if let TreeNode::Split { feature, left, right, .. } = node {
        importances[*feature] += node.cover() * node.impurity()
            - left.cover() * left.impurity()
            - right.cover() * right.impurity();
        accumulate_decrease(left, importances);
        accumulate_decrease(right, importances);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> DecisionTree {
        DecisionTree::new(TreeNode::split(
            0,
            0.5,
            TreeNode::leaf(vec![4.0, 0.0], 4),
            TreeNode::leaf(vec![0.0, 6.0], 6),
            0.48,
        ))
    }

    #[test]
    fn test_validate_normalises_counts() {
        let mut tree = stump();
        tree.validate(1, 2).unwrap();

        assert_eq!(tree.leaf_distribution(&[0.0]), &[1.0, 0.0]);
        assert_eq!(tree.leaf_distribution(&[0.9]), &[0.0, 1.0]);
        // threshold is inclusive on the left
        assert_eq!(tree.leaf_distribution(&[0.5]), &[1.0, 0.0]);
    }

    #[test]
    fn test_validate_rejects_bad_structure() {
        let mut tree = stump();
        assert!(matches!(tree.validate(1, 3), Err(BloodwiseError::ModelLoad(_))));

        let mut tree = DecisionTree::new(TreeNode::split(
            4,
            1.0,
            TreeNode::leaf(vec![1.0], 1),
            TreeNode::leaf(vec![1.0], 1),
            0.0,
        ));
        assert!(tree.validate(2, 1).is_err());

        let mut tree = DecisionTree::new(TreeNode::leaf(vec![0.0, 0.0], 3));
        assert!(tree.validate(1, 2).is_err());
    }

    #[test]
    fn test_impurity_decrease() {
        let mut tree = stump();
        tree.validate(2, 2).unwrap();

        let decrease = tree.impurity_decrease(2);
        // pure leaves: 10 * 0.48 - 0 - 0
        assert!((decrease[0] - 4.8).abs() < 1e-9);
        assert_eq!(decrease[1], 0.0);
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{"root": {"type": "split", "feature": 0, "threshold": 1.5,
            "n_samples": 3, "impurity": 0.44,
            "left": {"type": "leaf", "value": [2, 0], "n_samples": 2},
            "right": {"type": "leaf", "value": [0, 1], "n_samples": 1}}}"#;
        let tree: DecisionTree = serde_json::from_str(json).unwrap();
        assert_eq!(tree.root().n_samples(), 3);
        assert_eq!(tree.leaf_distribution(&[2.0]), &[0.0, 1.0]);
    }
}
