//! Pre-trained model artifacts
//!
//! The classifier and label encoder are produced by an external training
//! pipeline and loaded read-only. [`Classifier`] is the seam between the
//! predictor and a concrete model so that alternative models (or test
//! doubles) can be swapped in.

mod encoder;
mod forest;
mod tree;

pub use encoder::LabelEncoder;
pub use forest::ForestClassifier;
pub use tree::{DecisionTree, TreeNode};

use crate::error::{BloodwiseError, Result};
use crate::explainability::ShapExplanation;
use ndarray::{Array1, Array2, ArrayView1};

/// A trained multi-class classifier
pub trait Classifier: Send + Sync + std::fmt::Debug {
    /// Number of input features
    fn n_features(&self) -> usize;

    /// Number of classes the model predicts
    fn n_classes(&self) -> usize;

    /// Training-schema column names, in input order
    fn feature_names(&self) -> Option<&[String]>;

    /// Class probabilities, one row per sample
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Predicted class index per sample
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.rows().into_iter().map(argmax).collect())
    }

    /// Static, input-independent importances learned during training
    fn feature_importances(&self) -> Option<Array1<f64>>;

    /// Additive per-feature attributions of `row` for `class`
    fn shap_values(&self, _row: &Array1<f64>, _class: usize) -> Result<ShapExplanation> {
        Err(BloodwiseError::Explanation(
            "model does not support tree attributions".to_string(),
        ))
    }
}

/// Index of the largest value; the lowest index wins ties
pub(crate) fn argmax(values: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}
