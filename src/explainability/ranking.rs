//! Top contributing factor ranking
//!
//! Three interchangeable strategies turn a prediction into a ranked list of
//! factors. A strategy that fails hands over to the next one in the chain
//! `attribution -> impurity -> deviation`; deviation always succeeds.

use super::normal_ranges::NormalRangeTable;
use super::tree_shap::ShapConfig;
use crate::data::PatientRecord;
use crate::error::{BloodwiseError, Result};
use crate::model::Classifier;
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default number of factors reported
pub const DEFAULT_TOP_K: usize = 5;

/// How factor scores are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceStrategy {
    /// |TreeSHAP| attribution for the predicted class
    #[default]
    Attribution,
    /// Model-intrinsic impurity-based importances
    Impurity,
    /// Relative distance of each value from its reference
    Deviation,
}

impl ImportanceStrategy {
    /// Next strategy to try when this one fails
    pub fn fallback(self) -> Option<Self> {
        match self {
            ImportanceStrategy::Attribution => Some(ImportanceStrategy::Impurity),
            ImportanceStrategy::Impurity => Some(ImportanceStrategy::Deviation),
            ImportanceStrategy::Deviation => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportanceStrategy::Attribution => "attribution",
            ImportanceStrategy::Impurity => "impurity",
            ImportanceStrategy::Deviation => "deviation",
        }
    }
}

impl std::fmt::Display for ImportanceStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImportanceStrategy {
    type Err = BloodwiseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "attribution" | "shap" => Ok(ImportanceStrategy::Attribution),
            "impurity" | "model" => Ok(ImportanceStrategy::Impurity),
            "deviation" | "normal_range" => Ok(ImportanceStrategy::Deviation),
            other => Err(BloodwiseError::Config(format!(
                "unknown importance strategy '{}' (expected attribution, impurity or deviation)",
                other
            ))),
        }
    }
}

/// A named contributing factor and its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub name: String,
    pub value: f64,
}

/// Ranked factors together with the strategy that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct RankedImportances {
    pub strategy: ImportanceStrategy,
    pub factors: Vec<Factor>,
}

/// Ranks contributing factors for a single prediction
#[derive(Debug, Clone)]
pub struct ImportanceRanker {
    normal_ranges: NormalRangeTable,
    top_k: usize,
    shap: ShapConfig,
}

impl Default for ImportanceRanker {
    fn default() -> Self {
        Self::new(NormalRangeTable::default())
    }
}

impl ImportanceRanker {
    pub fn new(normal_ranges: NormalRangeTable) -> Self {
        Self {
            normal_ranges,
            top_k: DEFAULT_TOP_K,
            shap: ShapConfig::default(),
        }
    }

    /// Set the number of factors kept
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_shap_config(mut self, shap: ShapConfig) -> Self {
        self.shap = shap;
        self
    }

    /// Rank factors with `strategy`, falling back along the chain on failure
    pub fn rank(
        &self,
        record: &PatientRecord,
        model: &dyn Classifier,
        predicted_class: usize,
        strategy: ImportanceStrategy,
    ) -> RankedImportances {
        let mut current = strategy;
        loop {
            let attempt = match current {
                ImportanceStrategy::Attribution => self.attribution_scores(record, model, predicted_class),
                ImportanceStrategy::Impurity => self.impurity_scores(record, model),
                ImportanceStrategy::Deviation => Ok(self.deviation_scores(record)),
            };

            match attempt {
                Ok(scores) => {
                    debug!(strategy = %current, candidates = scores.len(), "Ranked contributing factors");
                    return RankedImportances {
                        strategy: current,
                        factors: top_factors(scores, self.top_k),
                    };
                }
                Err(e) => {
                    let next = current.fallback().unwrap_or(ImportanceStrategy::Deviation);
                    warn!(strategy = %current, fallback = %next, error = %e, "Importance strategy failed");
                    current = next;
                }
            }
        }
    }

    /// |φ| per feature for the predicted class
    pub fn attribution_scores(
        &self,
        record: &PatientRecord,
        model: &dyn Classifier,
        predicted_class: usize,
    ) -> Result<Vec<Factor>> {
        let row = record.feature_row(model.feature_names(), model.n_features())?;
        let explanation = model.shap_values(&row, predicted_class)?;

        if self.shap.check_additivity {
            let proba = model.predict_proba(&row.clone().insert_axis(Axis(0)))?;
            let expected = proba
                .get([0, predicted_class])
                .copied()
                .ok_or_else(|| BloodwiseError::Explanation(format!("class {} out of range", predicted_class)))?;
            let error = (explanation.output() - expected).abs();
            if !(error <= self.shap.tolerance) {
                return Err(BloodwiseError::Explanation(format!(
                    "attributions do not sum to the prediction (error {:.3e})",
                    error
                )));
            }
        }

        let names = input_names(record, model);
        if names.len() != explanation.values.len() {
            return Err(BloodwiseError::Explanation(format!(
                "{} attributions for {} features",
                explanation.values.len(),
                names.len()
            )));
        }

        Ok(names
            .into_iter()
            .zip(explanation.values.iter())
            .map(|(name, phi)| Factor { name, value: phi.abs() })
            .collect())
    }

    /// Static model importances, independent of the input values
    pub fn impurity_scores(&self, record: &PatientRecord, model: &dyn Classifier) -> Result<Vec<Factor>> {
        let importances = model.feature_importances().ok_or_else(|| {
            BloodwiseError::Explanation("model exposes no feature importances".to_string())
        })?;

        let names = input_names(record, model);
        if names.len() != importances.len() {
            return Err(BloodwiseError::Explanation(format!(
                "{} importances for {} features",
                importances.len(),
                names.len()
            )));
        }

        Ok(names
            .into_iter()
            .zip(importances.iter())
            .map(|(name, &value)| Factor { name, value })
            .collect())
    }

    /// `|value - reference| / reference`, normalised by the maximum
    ///
    /// Features without a reference are skipped. When nothing deviates the
    /// scores are left as they are.
    pub fn deviation_scores(&self, record: &PatientRecord) -> Vec<Factor> {
        let mut factors: Vec<Factor> = record
            .values()
            .iter()
            .filter(|(_, value)| value.is_finite())
            .filter_map(|(name, value)| {
                self.normal_ranges.reference(name).map(|reference| Factor {
                    name: name.clone(),
                    value: ((value - reference) / reference).abs(),
                })
            })
            .collect();

        let max = factors.iter().map(|f| f.value).fold(0.0, f64::max);
        if max > 0.0 {
            for factor in &mut factors {
                factor.value /= max;
            }
        }
        factors
    }
}

/// Column names matching the model's input order
fn input_names(record: &PatientRecord, model: &dyn Classifier) -> Vec<String> {
    match model.feature_names() {
        Some(names) => names.to_vec(),
        None => record.values().iter().map(|(name, _)| name.clone()).collect(),
    }
}

/// Stable descending sort, truncated to `k`; ties keep input order
pub fn top_factors(mut factors: Vec<Factor>, k: usize) -> Vec<Factor> {
    factors.sort_by(|a, b| b.value.total_cmp(&a.value));
    factors.truncate(k);
    factors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explainability::ShapExplanation;
    use crate::model::{ForestClassifier, DecisionTree, TreeNode};
    use ndarray::{array, Array1, Array2};

    fn record(values: &[(&str, f64)]) -> PatientRecord {
        PatientRecord::new(
            "Jane Doe",
            values.iter().map(|(n, v)| (n.to_string(), *v)).collect(),
        )
    }

    /// Classifier whose explanation support is configurable
    #[derive(Debug)]
    struct StubClassifier {
        names: Vec<String>,
        importances: Option<Array1<f64>>,
        attributions: Option<Array1<f64>>,
    }

    impl Classifier for StubClassifier {
        fn n_features(&self) -> usize {
            self.names.len()
        }

        fn n_classes(&self) -> usize {
            2
        }

        fn feature_names(&self) -> Option<&[String]> {
            Some(&self.names)
        }

        fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
            Ok(Array2::from_shape_fn((x.nrows(), 2), |(_, c)| if c == 0 { 0.25 } else { 0.75 }))
        }

        fn feature_importances(&self) -> Option<Array1<f64>> {
            self.importances.clone()
        }

        fn shap_values(&self, _row: &Array1<f64>, _class: usize) -> Result<ShapExplanation> {
            match &self.attributions {
                Some(values) => Ok(ShapExplanation {
                    base_value: 0.75 - values.sum(),
                    values: values.clone(),
                }),
                None => Err(BloodwiseError::Explanation("unsupported".to_string())),
            }
        }
    }

    fn stub(importances: Option<Array1<f64>>, attributions: Option<Array1<f64>>) -> StubClassifier {
        StubClassifier {
            names: vec!["Glucose".to_string(), "Hemoglobin".to_string(), "Insulin".to_string()],
            importances,
            attributions,
        }
    }

    fn patient() -> PatientRecord {
        record(&[("Glucose", 250.0), ("Hemoglobin", 10.5), ("Insulin", 12.0)])
    }

    fn names(ranked: &RankedImportances) -> Vec<&str> {
        ranked.factors.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("attribution".parse::<ImportanceStrategy>().unwrap(), ImportanceStrategy::Attribution);
        assert_eq!("SHAP".parse::<ImportanceStrategy>().unwrap(), ImportanceStrategy::Attribution);
        assert_eq!("impurity".parse::<ImportanceStrategy>().unwrap(), ImportanceStrategy::Impurity);
        assert_eq!("deviation".parse::<ImportanceStrategy>().unwrap(), ImportanceStrategy::Deviation);
        assert!("random".parse::<ImportanceStrategy>().is_err());
        assert_eq!(ImportanceStrategy::Impurity.to_string(), "impurity");
    }

    #[test]
    fn test_fallback_chain_order() {
        assert_eq!(ImportanceStrategy::Attribution.fallback(), Some(ImportanceStrategy::Impurity));
        assert_eq!(ImportanceStrategy::Impurity.fallback(), Some(ImportanceStrategy::Deviation));
        assert_eq!(ImportanceStrategy::Deviation.fallback(), None);
    }

    #[test]
    fn test_deviation_example() {
        let ranker = ImportanceRanker::default();
        let ranked = ranker.rank(&patient(), &stub(None, None), 1, ImportanceStrategy::Deviation);

        assert_eq!(ranked.strategy, ImportanceStrategy::Deviation);
        // Glucose: 1.5, Hemoglobin: 0.25, Insulin: 0.2
        assert_eq!(names(&ranked), vec!["Glucose", "Hemoglobin", "Insulin"]);
        assert_eq!(ranked.factors[0].value, 1.0);
        assert!((ranked.factors[1].value - 0.25 / 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_deviation_skips_unknown_features_and_stays_in_unit_range() {
        let ranker = ImportanceRanker::default();
        let factors = ranker.deviation_scores(&record(&[
            ("Glucose", 80.0),
            ("TSH", 9.0),
            ("Platelets", 450.0),
            ("ALT", 25.0),
        ]));

        assert_eq!(factors.len(), 3);
        assert!(factors.iter().all(|f| (0.0..=1.0).contains(&f.value)));
        assert!(factors.iter().all(|f| f.name != "TSH"));
    }

    #[test]
    fn test_deviation_empty_match_set() {
        let ranker = ImportanceRanker::default();
        let factors = ranker.deviation_scores(&record(&[("TSH", 9.0), ("T3", 1.0)]));
        assert!(factors.is_empty());
    }

    #[test]
    fn test_deviation_all_at_reference() {
        let ranker = ImportanceRanker::default();
        let factors = ranker.deviation_scores(&record(&[("Glucose", 100.0), ("ALT", 25.0)]));
        assert_eq!(factors.len(), 2);
        assert!(factors.iter().all(|f| f.value == 0.0));
    }

    #[test]
    fn test_custom_normal_ranges_are_used() {
        let mut references = std::collections::BTreeMap::new();
        references.insert("TSH".to_string(), 2.0);
        let ranker = ImportanceRanker::new(NormalRangeTable::new(references).unwrap());

        let factors = ranker.deviation_scores(&record(&[("Glucose", 250.0), ("TSH", 5.0)]));
        assert_eq!(factors, vec![Factor { name: "TSH".to_string(), value: 1.0 }]);
    }

    #[test]
    fn test_attribution_ranks_by_magnitude() {
        let ranker = ImportanceRanker::default();
        let model = stub(None, Some(array![0.05, -0.30, 0.10]));
        let ranked = ranker.rank(&patient(), &model, 1, ImportanceStrategy::Attribution);

        assert_eq!(ranked.strategy, ImportanceStrategy::Attribution);
        assert_eq!(names(&ranked), vec!["Hemoglobin", "Insulin", "Glucose"]);
        assert!((ranked.factors[0].value - 0.30).abs() < 1e-12);
    }

    #[test]
    fn test_attribution_falls_back_to_impurity() {
        let ranker = ImportanceRanker::default();
        let model = stub(Some(array![0.2, 0.5, 0.3]), None);
        let ranked = ranker.rank(&patient(), &model, 1, ImportanceStrategy::Attribution);

        assert_eq!(ranked.strategy, ImportanceStrategy::Impurity);
        assert_eq!(names(&ranked), vec!["Hemoglobin", "Insulin", "Glucose"]);
    }

    #[test]
    fn test_impurity_falls_back_to_deviation() {
        let ranker = ImportanceRanker::default();
        let ranked = ranker.rank(&patient(), &stub(None, None), 1, ImportanceStrategy::Attribution);

        assert_eq!(ranked.strategy, ImportanceStrategy::Deviation);
        assert_eq!(ranked.factors[0].name, "Glucose");
    }

    #[test]
    fn test_missing_feature_triggers_fallback() {
        let ranker = ImportanceRanker::default();
        let model = stub(Some(array![0.2, 0.5, 0.3]), Some(array![0.1, 0.1, 0.1]));
        let partial = record(&[("Glucose", 250.0), ("Hemoglobin", 10.5)]);

        let ranked = ranker.rank(&partial, &model, 1, ImportanceStrategy::Attribution);
        assert_eq!(ranked.strategy, ImportanceStrategy::Impurity);
    }

    #[test]
    fn test_failed_additivity_check_falls_back() {
        #[derive(Debug)]
        struct Inconsistent(StubClassifier);

        impl Classifier for Inconsistent {
            fn n_features(&self) -> usize {
                self.0.n_features()
            }
            fn n_classes(&self) -> usize {
                2
            }
            fn feature_names(&self) -> Option<&[String]> {
                self.0.feature_names()
            }
            fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
                self.0.predict_proba(x)
            }
            fn feature_importances(&self) -> Option<Array1<f64>> {
                self.0.feature_importances()
            }
            fn shap_values(&self, _row: &Array1<f64>, _class: usize) -> Result<ShapExplanation> {
                Ok(ShapExplanation { base_value: 0.0, values: array![0.1, 0.1, 0.1] })
            }
        }

        let model = Inconsistent(stub(Some(array![0.2, 0.5, 0.3]), None));
        let ranker = ImportanceRanker::default();
        let ranked = ranker.rank(&patient(), &model, 1, ImportanceStrategy::Attribution);
        assert_eq!(ranked.strategy, ImportanceStrategy::Impurity);

        let lenient = ImportanceRanker::default()
            .with_shap_config(ShapConfig::default().with_additivity_check(false));
        let ranked = lenient.rank(&patient(), &model, 1, ImportanceStrategy::Attribution);
        assert_eq!(ranked.strategy, ImportanceStrategy::Attribution);
    }

    #[test]
    fn test_top_k_truncates_and_keeps_ties_in_input_order() {
        let factors: Vec<Factor> = ["a", "b", "c", "d", "e", "f", "g"]
            .iter()
            .zip([0.5, 0.9, 0.5, 0.1, 0.5, 0.9, 0.2])
            .map(|(n, v)| Factor { name: n.to_string(), value: v })
            .collect();

        let top = top_factors(factors, DEFAULT_TOP_K);
        let order: Vec<&str> = top.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(order, vec!["b", "f", "a", "c", "e"]);
        assert!(top.windows(2).all(|w| w[0].value >= w[1].value));
    }

    #[test]
    fn test_ranking_a_real_forest_with_every_strategy() {
        let tree = DecisionTree::new(TreeNode::split(
            0,
            126.0,
            TreeNode::leaf(vec![9.0, 1.0], 10),
            TreeNode::split(
                1,
                12.0,
                TreeNode::leaf(vec![1.0, 4.0], 5),
                TreeNode::leaf(vec![3.0, 2.0], 5),
                0.42,
            ),
            0.5,
        ));
        let model = ForestClassifier::new(
            vec!["Glucose".to_string(), "Hemoglobin".to_string(), "Insulin".to_string()],
            2,
            vec![tree],
        )
        .unwrap();

        let ranker = ImportanceRanker::default().with_top_k(2);
        for strategy in [
            ImportanceStrategy::Attribution,
            ImportanceStrategy::Impurity,
            ImportanceStrategy::Deviation,
        ] {
            let ranked = ranker.rank(&patient(), &model, 1, strategy);
            assert_eq!(ranked.strategy, strategy);
            assert_eq!(ranked.factors.len(), 2);
            assert!(ranked.factors[0].value >= ranked.factors[1].value);
        }
    }
}
