//! Random forest classifier loaded from a JSON artifact

use super::tree::DecisionTree;
use super::Classifier;
use crate::error::{BloodwiseError, Result};
use crate::explainability::{tree_shap, ShapExplanation};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Random forest classifier
///
/// Probabilities are the mean of the per-tree leaf distributions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestClassifier {
    /// Training-schema column names
    #[serde(default)]
    feature_names: Vec<String>,
    /// Number of features (inferred from `feature_names` when omitted)
    #[serde(default)]
    n_features: usize,
    /// Number of classes
    n_classes: usize,
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Stored importances; computed from impurity decrease when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    feature_importances: Option<Vec<f64>>,
}

impl ForestClassifier {
    /// Create a classifier from already-built trees
    pub fn new(feature_names: Vec<String>, n_classes: usize, trees: Vec<DecisionTree>) -> Result<Self> {
        let mut forest = Self {
            n_features: feature_names.len(),
            feature_names,
            n_classes,
            trees,
            feature_importances: None,
        };
        forest.validate()?;
        Ok(forest)
    }

    /// Attach importances computed by the training pipeline
    pub fn with_feature_importances(mut self, importances: Vec<f64>) -> Result<Self> {
        self.feature_importances = Some(importances);
        self.validate()?;
        Ok(self)
    }

    /// Load a classifier from a JSON artifact
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            BloodwiseError::ModelLoad(format!("cannot read model {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Parse and validate a classifier from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let mut forest: Self = serde_json::from_str(json)
            .map_err(|e| BloodwiseError::ModelLoad(format!("invalid model artifact: {}", e)))?;
        forest.validate()?;
        Ok(forest)
    }

    fn validate(&mut self) -> Result<()> {
        if !self.feature_names.is_empty() {
            if self.n_features != 0 && self.n_features != self.feature_names.len() {
                return Err(BloodwiseError::ModelLoad(format!(
                    "n_features = {} but {} feature names given",
                    self.n_features,
                    self.feature_names.len()
                )));
            }
            self.n_features = self.feature_names.len();
        }
        if self.n_features == 0 {
            return Err(BloodwiseError::ModelLoad("model declares no features".to_string()));
        }
        if self.n_classes == 0 {
            return Err(BloodwiseError::ModelLoad("model declares no classes".to_string()));
        }
        if self.trees.is_empty() {
            return Err(BloodwiseError::ModelLoad("model contains no trees".to_string()));
        }
        if let Some(importances) = &self.feature_importances {
            if importances.len() != self.n_features {
                return Err(BloodwiseError::ModelLoad(format!(
                    "{} feature importances for {} features",
                    importances.len(),
                    self.n_features
                )));
            }
        }

        let (n_features, n_classes) = (self.n_features, self.n_classes);
        for tree in &mut self.trees {
            tree.validate(n_features, n_classes)?;
        }
        Ok(())
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn impurity_importances(&self) -> Option<Array1<f64>> {
        let mut total_importances = vec![0.0; self.n_features];

        for tree in &self.trees {
            let imp = tree.impurity_decrease(self.n_features);
            let tree_total: f64 = imp.iter().sum();
            if tree_total > 0.0 {
                for (acc, val) in total_importances.iter_mut().zip(&imp) {
                    *acc += val / tree_total;
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        for imp in &mut total_importances {
            *imp /= n_trees;
        }

        // Normalize
        let total: f64 = total_importances.iter().sum();
        if total <= 0.0 {
            return None;
        }
        for imp in &mut total_importances {
            *imp /= total;
        }

        Some(Array1::from_vec(total_importances))
    }
}

impl Classifier for ForestClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn feature_names(&self) -> Option<&[String]> {
        if self.feature_names.is_empty() {
            None
        } else {
            Some(&self.feature_names)
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features {
            return Err(BloodwiseError::ModelInput(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        let n_trees = self.trees.len() as f64;
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));

        for (i, row) in x.rows().into_iter().enumerate() {
            let sample = row.to_vec();
            let summed = self
                .trees
                .par_iter()
                .map(|tree| Array1::from(tree.leaf_distribution(&sample).to_vec()))
                .reduce(|| Array1::zeros(self.n_classes), |a, b| a + b);
            proba.row_mut(i).assign(&(summed / n_trees));
        }

        Ok(proba)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        match &self.feature_importances {
            Some(stored) => Some(Array1::from_vec(stored.clone())),
            None => self.impurity_importances(),
        }
    }

    fn shap_values(&self, row: &Array1<f64>, class: usize) -> Result<ShapExplanation> {
        if class >= self.n_classes {
            return Err(BloodwiseError::Explanation(format!(
                "class {} out of range for {} classes",
                class, self.n_classes
            )));
        }
        tree_shap::explain_ensemble(&self.trees, &row.to_vec(), self.n_features, class)
    }
}
