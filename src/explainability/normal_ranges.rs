//! Reference values for the deviation heuristic

use crate::error::{BloodwiseError, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Typical adult reference value per blood test
const DEFAULT_REFERENCES: [(&str, f64); 23] = [
    ("Glucose", 100.0),
    ("Cholesterol", 200.0),
    ("Hemoglobin", 14.0),
    ("Platelets", 250.0),
    ("White Blood Cells", 7.5),
    ("Red Blood Cells", 5.0),
    ("HCT", 45.0),
    ("MCH", 30.0),
    ("MCHC", 34.0),
    ("MCV", 90.0),
    ("RDW", 13.0),
    ("Neutrophils", 60.0),
    ("Lymphocytes", 30.0),
    ("Monocytes", 8.0),
    ("Eosinophils", 3.0),
    ("Basophils", 1.0),
    ("AST", 25.0),
    ("ALT", 25.0),
    ("ALP", 100.0),
    ("Bilirubin", 1.0),
    ("Protein", 7.0),
    ("Albumin", 4.0),
    ("Insulin", 10.0),
];

/// Immutable mapping from feature name to a positive reference value
#[derive(Debug, Clone, PartialEq)]
pub struct NormalRangeTable {
    references: BTreeMap<String, f64>,
}

impl Default for NormalRangeTable {
    fn default() -> Self {
        Self {
            references: DEFAULT_REFERENCES
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
        }
    }
}

impl NormalRangeTable {
    /// Build a table; every reference must be finite and positive
    pub fn new(references: BTreeMap<String, f64>) -> Result<Self> {
        for (name, value) in &references {
            if !value.is_finite() || *value <= 0.0 {
                return Err(BloodwiseError::Config(format!(
                    "reference value for '{}' must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(Self { references })
    }

    /// Load a table from a JSON object of `name: reference` pairs
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            BloodwiseError::Config(format!("cannot read normal ranges {}: {}", path.display(), e))
        })?;
        let references: BTreeMap<String, f64> = serde_json::from_str(&json)
            .map_err(|e| BloodwiseError::Config(format!("invalid normal ranges: {}", e)))?;
        Self::new(references)
    }

    pub fn reference(&self, feature: &str) -> Option<f64> {
        self.references.get(feature).copied()
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}
