//! Error types for the Bloodwise prediction pipeline

use thiserror::Error;

/// Result type alias for Bloodwise operations
pub type Result<T> = std::result::Result<T, BloodwiseError>;

/// Main error type for the prediction pipeline
#[derive(Error, Debug)]
pub enum BloodwiseError {
    /// The input file is missing, unreadable or not valid CSV
    #[error("Input file error: {0}")]
    InputFile(String),

    /// The patient row does not match the model's schema
    #[error("Model input error: {0}")]
    ModelInput(String),

    /// A model or encoder artifact could not be loaded or is inconsistent
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// The attribution method rejected the model or input
    #[error("Explanation error: {0}")]
    Explanation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<polars::error::PolarsError> for BloodwiseError {
    fn from(err: polars::error::PolarsError) -> Self {
        BloodwiseError::InputFile(err.to_string())
    }
}
