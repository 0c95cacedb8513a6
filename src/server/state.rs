//! Application state management

use crate::explainability::NormalRangeTable;
use crate::inference::{InferenceConfig, Predictor};

use super::ServerConfig;

/// Application state shared across handlers
///
/// The predictor is loaded once at startup and only read afterwards.
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    pub predictor: Predictor,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig, predictor: Predictor) -> Self {
        Self {
            config,
            predictor,
            started_at: chrono::Utc::now(),
        }
    }

    /// Load the model artifacts named by `config`
    pub fn load(config: ServerConfig) -> crate::Result<Self> {
        let normal_ranges = match &config.normal_ranges_path {
            Some(path) => NormalRangeTable::load(path)?,
            None => NormalRangeTable::default(),
        };
        let inference = InferenceConfig::new()
            .with_strategy(config.strategy)
            .with_normal_ranges(normal_ranges)
            .with_humanized_names(true);

        let predictor = Predictor::load(&config.model_path, &config.encoder_path, inference)?;
        Ok(Self::new(config, predictor))
    }

    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }
}
