//! Single-patient prediction
//!
//! [`Predictor`] owns the loaded artifacts and runs one patient record
//! through the classifier, the label encoder and the factor ranker.

use super::InferenceConfig;
use crate::data::PatientRecord;
use crate::error::{BloodwiseError, Result};
use crate::explainability::{Factor, ImportanceRanker, ImportanceStrategy};
use crate::model::{Classifier, ForestClassifier, LabelEncoder};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Predicted class and its probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// Probability of the predicted class, in [0, 1]
    pub confidence: f64,
    pub class_index: usize,
}

/// Prediction plus its top contributing factors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub patient_name: String,
    pub prediction: String,
    pub confidence: f64,
    pub factors: Vec<Factor>,
    /// Strategy that produced `factors`
    #[serde(skip)]
    pub strategy: ImportanceStrategy,
}

/// Loaded model, encoder and ranker
#[derive(Debug, Clone)]
pub struct Predictor {
    model: Arc<dyn Classifier>,
    encoder: LabelEncoder,
    ranker: ImportanceRanker,
    config: InferenceConfig,
}

impl Predictor {
    /// Build a predictor from already loaded artifacts
    pub fn new(model: Arc<dyn Classifier>, encoder: LabelEncoder, config: InferenceConfig) -> Result<Self> {
        if encoder.len() != model.n_classes() {
            return Err(BloodwiseError::ModelLoad(format!(
                "label encoder has {} classes but the model predicts {}",
                encoder.len(),
                model.n_classes()
            )));
        }

        let ranker = ImportanceRanker::new(config.normal_ranges.clone())
            .with_top_k(config.top_k)
            .with_shap_config(config.shap.clone());

        Ok(Self {
            model,
            encoder,
            ranker,
            config,
        })
    }

    /// Load the forest and encoder artifacts from disk
    pub fn load(
        model_path: impl AsRef<Path>,
        encoder_path: impl AsRef<Path>,
        config: InferenceConfig,
    ) -> Result<Self> {
        let start = Instant::now();
        let model = ForestClassifier::load(model_path.as_ref())?;
        let encoder = LabelEncoder::load(encoder_path.as_ref())?;

        info!(
            model = %model_path.as_ref().display(),
            trees = model.n_trees(),
            features = model.n_features(),
            classes = encoder.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded model artifacts"
        );

        Self::new(Arc::new(model), encoder, config)
    }

    pub fn model(&self) -> &Arc<dyn Classifier> {
        &self.model
    }

    pub fn encoder(&self) -> &LabelEncoder {
        &self.encoder
    }

    /// Predict the class of one patient
    pub fn predict(&self, record: &PatientRecord) -> Result<Prediction> {
        let row = record.feature_row(self.model.feature_names(), self.model.n_features())?;
        let x = row.insert_axis(Axis(0));

        let class_index = self
            .model
            .predict(&x)?
            .first()
            .copied()
            .ok_or_else(|| BloodwiseError::ModelInput("model returned no prediction".to_string()))?;
        let proba = self.model.predict_proba(&x)?;
        let confidence = proba
            .get([0, class_index])
            .copied()
            .filter(|p| p.is_finite())
            .ok_or_else(|| {
                BloodwiseError::ModelInput(format!("no probability for class {}", class_index))
            })?
            .clamp(0.0, 1.0);

        let label = self
            .encoder
            .inverse_transform(&[class_index])?
            .into_iter()
            .next()
            .ok_or_else(|| BloodwiseError::ModelLoad("label encoder returned no label".to_string()))?;

        debug!(patient = %record.name, label = %label, confidence, "Predicted class");

        Ok(Prediction {
            label,
            confidence,
            class_index,
        })
    }

    /// Predict and explain one patient
    pub fn run(&self, record: &PatientRecord) -> Result<PredictionResult> {
        let prediction = self.predict(record)?;
        let ranked = self
            .ranker
            .rank(record, self.model.as_ref(), prediction.class_index, self.config.strategy);

        let factors = if self.config.humanize_names {
            ranked
                .factors
                .into_iter()
                .map(|f| Factor {
                    name: humanize_feature_name(&f.name),
                    value: f.value,
                })
                .collect()
        } else {
            ranked.factors
        };

        Ok(PredictionResult {
            patient_name: record.name.clone(),
            prediction: prediction.label,
            confidence: prediction.confidence,
            factors,
            strategy: ranked.strategy,
        })
    }
}

/// "white_blood_cells" -> "White Blood Cells"
///
/// Only the first letter of each word changes, so acronyms such as "HCT"
/// stay intact.
pub fn humanize_feature_name(name: &str) -> String {
    name.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
