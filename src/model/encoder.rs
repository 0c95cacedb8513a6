//! Label encoder mapping class indices to disease names

use crate::error::{BloodwiseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Label encoder (index <-> class name)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Create an encoder from an ordered class list
    pub fn from_classes(classes: Vec<String>) -> Result<Self> {
        let encoder = Self { classes };
        encoder.validate()?;
        Ok(encoder)
    }

    /// Fit the encoder to labels: classes are the sorted unique values
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        let mut classes: Vec<String> = labels.iter().map(|s| s.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        Self::from_classes(classes)
    }

    /// Load an encoder from a JSON artifact
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            BloodwiseError::ModelLoad(format!("cannot read encoder {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Parse and validate an encoder from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let encoder: Self = serde_json::from_str(json)
            .map_err(|e| BloodwiseError::ModelLoad(format!("invalid encoder artifact: {}", e)))?;
        encoder.validate()?;
        Ok(encoder)
    }

    fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(BloodwiseError::ModelLoad("label encoder has no classes".to_string()));
        }
        let mut seen = HashSet::new();
        for class in &self.classes {
            if !seen.insert(class.as_str()) {
                return Err(BloodwiseError::ModelLoad(format!(
                    "label encoder lists class '{}' twice",
                    class
                )));
            }
        }
        Ok(())
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Map labels to class indices
    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                self.classes
                    .iter()
                    .position(|c| c == label)
                    .ok_or_else(|| BloodwiseError::ModelInput(format!("unknown label '{}'", label)))
            })
            .collect()
    }

    /// Map class indices back to labels
    pub fn inverse_transform(&self, indices: &[usize]) -> Result<Vec<String>> {
        indices
            .iter()
            .map(|&idx| {
                self.classes.get(idx).cloned().ok_or_else(|| {
                    BloodwiseError::ModelLoad(format!(
                        "class index {} out of range for encoder with {} classes",
                        idx,
                        self.classes.len()
                    ))
                })
            })
            .collect()
    }
}
