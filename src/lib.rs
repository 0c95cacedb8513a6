//! Bloodwise - Blood-test disease prediction
//!
//! Loads a pre-trained tree-ensemble classifier and its label encoder, reads
//! one patient's blood-test values from CSV, predicts a condition with a
//! confidence score and reports the top contributing factors.
//!
//! # Modules
//!
//! ## Core
//! - [`model`] - Classifier and label encoder artifacts
//! - [`data`] - Patient record loading
//! - [`explainability`] - Factor ranking (TreeSHAP, impurity, deviation)
//! - [`inference`] - Single-patient prediction pipeline
//!
//! ## Services
//! - [`server`] - HTTP server with the `/predict` endpoint
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core modules
pub mod model;
pub mod data;
pub mod explainability;
pub mod inference;

// Services
pub mod server;
pub mod cli;

pub use error::{BloodwiseError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{BloodwiseError, Result};

    // Artifacts
    pub use crate::model::{Classifier, ForestClassifier, LabelEncoder, DecisionTree, TreeNode};

    // Input
    pub use crate::data::PatientRecord;

    // Explainability
    pub use crate::explainability::{
        Factor, ImportanceRanker, ImportanceStrategy, NormalRangeTable, RankedImportances, ShapConfig,
    };

    // Inference
    pub use crate::inference::{InferenceConfig, Prediction, PredictionResult, Predictor};
}
