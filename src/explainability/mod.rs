//! Contributing factor explanations
//!
//! Provides the three factor-ranking strategies used to explain a single
//! prediction:
//! - TreeSHAP attributions for the predicted class
//! - Impurity-based model importances
//! - Deviation from reference blood-test values

pub mod tree_shap;
mod normal_ranges;
mod ranking;

pub use normal_ranges::NormalRangeTable;
pub use ranking::{top_factors, Factor, ImportanceRanker, ImportanceStrategy, RankedImportances, DEFAULT_TOP_K};
pub use tree_shap::{ShapConfig, ShapExplanation};
