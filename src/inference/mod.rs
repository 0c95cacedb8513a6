//! Prediction pipeline
//!
//! Ties the loaded artifacts to the factor ranker:
//! - Model input row construction from a patient record
//! - Class prediction and confidence
//! - Label decoding through the encoder
//! - Contributing factor ranking with fallback

mod config;
mod engine;

pub use config::InferenceConfig;
pub use engine::{humanize_feature_name, Prediction, PredictionResult, Predictor};
