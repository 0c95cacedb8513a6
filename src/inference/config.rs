//! Inference configuration

use crate::explainability::{ImportanceStrategy, NormalRangeTable, ShapConfig, DEFAULT_TOP_K};

/// Configuration for a single-patient prediction
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Strategy tried first when ranking factors
    pub strategy: ImportanceStrategy,

    /// Number of factors reported
    pub top_k: usize,

    /// Reference values for the deviation strategy
    pub normal_ranges: NormalRangeTable,

    /// Render factor names as "White Blood Cells" instead of "white_blood_cells"
    pub humanize_names: bool,

    /// Attribution settings
    pub shap: ShapConfig,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            strategy: ImportanceStrategy::default(),
            top_k: DEFAULT_TOP_K,
            normal_ranges: NormalRangeTable::default(),
            humanize_names: false,
            shap: ShapConfig::default(),
        }
    }
}

impl InferenceConfig {
    /// Create a new inference configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the primary ranking strategy
    pub fn with_strategy(mut self, strategy: ImportanceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Builder method to set the number of reported factors
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_normal_ranges(mut self, normal_ranges: NormalRangeTable) -> Self {
        self.normal_ranges = normal_ranges;
        self
    }

    pub fn with_humanized_names(mut self, enabled: bool) -> Self {
        self.humanize_names = enabled;
        self
    }

    pub fn with_shap_config(mut self, shap: ShapConfig) -> Self {
        self.shap = shap;
        self
    }
}
