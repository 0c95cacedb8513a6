//! Path-dependent TreeSHAP attributions for tree ensembles
//!
//! Computes exact Shapley values for a single tree in polynomial time by
//! tracking, along each root-to-leaf path, the proportion of feature subsets
//! that flow through every split. Cover (`n_samples`) provides the
//! conditional expectations, so no background dataset is needed.

use crate::error::{BloodwiseError, Result};
use crate::model::{DecisionTree, TreeNode};
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for attribution calculations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapConfig {
    /// Verify that attributions sum to the prediction
    pub check_additivity: bool,
    /// Tolerance for the additivity check
    pub tolerance: f64,
}

impl ShapConfig {
    pub fn new() -> Self {
        Self {
            check_additivity: true,
            tolerance: 1e-6,
        }
    }

    pub fn with_additivity_check(mut self, enabled: bool) -> Self {
        self.check_additivity = enabled;
        self
    }
}

impl Default for ShapConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Attributions for one class of one prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapExplanation {
    /// Expected model output for the class over the training distribution
    pub base_value: f64,
    /// Per-feature contributions, in model feature order
    pub values: Array1<f64>,
}

impl ShapExplanation {
    /// Reconstructed model output (`base_value + Σφ`)
    pub fn output(&self) -> f64 {
        self.base_value + self.values.sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

/// Explain `sample` for `class`, averaging over all trees of the ensemble
pub fn explain_ensemble(
    trees: &[DecisionTree],
    sample: &[f64],
    n_features: usize,
    class: usize,
) -> Result<ShapExplanation> {
    if trees.is_empty() {
        return Err(BloodwiseError::Explanation("ensemble has no trees".to_string()));
    }
    if sample.len() != n_features {
        return Err(BloodwiseError::Explanation(format!(
            "sample has {} features, model expects {}",
            sample.len(),
            n_features
        )));
    }

    let per_tree: Vec<ShapExplanation> = trees
        .par_iter()
        .map(|tree| explain_tree(tree, sample, n_features, class))
        .collect::<Result<Vec<_>>>()?;

    let n_trees = per_tree.len() as f64;
    let mut values = Array1::zeros(n_features);
    let mut base_value = 0.0;
    for explanation in &per_tree {
        values += &explanation.values;
        base_value += explanation.base_value;
    }

    Ok(ShapExplanation {
        base_value: base_value / n_trees,
        values: values / n_trees,
    })
}

/// Explain `sample` for `class` on a single tree
pub fn explain_tree(
    tree: &DecisionTree,
    sample: &[f64],
    n_features: usize,
    class: usize,
) -> Result<ShapExplanation> {
    check_covers(tree.root())?;

    let base_value = expected_value(tree.root(), class)?;
    let mut phi = vec![0.0; n_features];
    recurse(tree.root(), sample, class, &mut phi, &[], 1.0, 1.0, None)?;

    Ok(ShapExplanation {
        base_value,
        values: Array1::from_vec(phi),
    })
}

fn check_covers(node: &TreeNode) -> Result<()> {
    if node.n_samples() == 0 {
        return Err(BloodwiseError::Explanation(
            "tree contains a node with zero cover".to_string(),
        ));
    }
    if let TreeNode::Split { left, right, .. } = node {
        check_covers(left)?;
        check_covers(right)?;
    }
    Ok(())
}

fn leaf_value(value: &[f64], class: usize) -> Result<f64> {
    value.get(class).copied().ok_or_else(|| {
        BloodwiseError::Explanation(format!("class {} out of range for leaf", class))
    })
}

/// Cover-weighted expectation of the class probability below `node`
fn expected_value(node: &TreeNode, class: usize) -> Result<f64> {
    match node {
        TreeNode::Leaf { value, .. } => leaf_value(value, class),
        TreeNode::Split { left, right, .. } => {
            let cover = node.cover();
            Ok(left.cover() / cover * expected_value(left, class)?
                + right.cover() / cover * expected_value(right, class)?)
        }
    }
}

fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / denom;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / denom;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].weight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].weight = path[i].weight * denom / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total weight of the path with element `index` removed
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].weight - tmp * zero_fraction * (depth - i) as f64 / denom;
        } else {
            total += path[i].weight / zero_fraction / ((depth - i) as f64 / denom);
        }
    }
    total
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    node: &TreeNode,
    sample: &[f64],
    class: usize,
    phi: &mut [f64],
    parent_path: &[PathElement],
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) -> Result<()> {
    let mut path = parent_path.to_vec();
    extend_path(&mut path, zero_fraction, one_fraction, feature);

    match node {
        TreeNode::Leaf { value, .. } => {
            let leaf = leaf_value(value, class)?;
            for i in 1..path.len() {
                let weight = unwound_path_sum(&path, i);
                let element = path[i];
                if let Some(f) = element.feature {
                    phi[f] += weight * (element.one_fraction - element.zero_fraction) * leaf;
                }
            }
            Ok(())
        }
        TreeNode::Split { feature: split, threshold, left, right, .. } => {
            let (hot, cold) = if sample[*split] <= *threshold {
                (left.as_ref(), right.as_ref())
            } else {
                (right.as_ref(), left.as_ref())
            };

            // a feature seen earlier on the path is merged rather than repeated
            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;
            if let Some(k) = (1..path.len()).find(|&k| path[k].feature == Some(*split)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind_path(&mut path, k);
            }

            let cover = node.cover();
            recurse(
                hot,
                sample,
                class,
                phi,
                &path,
                hot.cover() / cover * incoming_zero,
                incoming_one,
                Some(*split),
            )?;
            recurse(
                cold,
                sample,
                class,
                phi,
                &path,
                cold.cover() / cover * incoming_zero,
                0.0,
                Some(*split),
            )
        }
    }
}
