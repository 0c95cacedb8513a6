//! Integration test: prediction pipeline over JSON artifacts

use bloodwise::prelude::*;
use std::io::Write;

const MODEL_JSON: &str = r#"{
    "feature_names": ["Glucose", "Hemoglobin", "Cholesterol", "Platelets", "ALT", "AST"],
    "n_classes": 3,
    "trees": [
        {"root": {"type": "split", "feature": 0, "threshold": 126.0, "n_samples": 30, "impurity": 0.66,
            "left": {"type": "split", "feature": 1, "threshold": 12.0, "n_samples": 20, "impurity": 0.6,
                "left": {"type": "leaf", "value": [8, 1, 1], "n_samples": 10},
                "right": {"type": "leaf", "value": [0, 1, 9], "n_samples": 10}},
            "right": {"type": "leaf", "value": [1, 8, 1], "n_samples": 10}}},
        {"root": {"type": "split", "feature": 2, "threshold": 240.0, "n_samples": 20, "impurity": 0.62,
            "left": {"type": "split", "feature": 4, "threshold": 40.0, "n_samples": 10, "impurity": 0.54,
                "left": {"type": "leaf", "value": [1, 1, 3], "n_samples": 5},
                "right": {"type": "leaf", "value": [0, 2, 3], "n_samples": 5}},
            "right": {"type": "leaf", "value": [1, 7, 2], "n_samples": 10}}}
    ]
}"#;

const ENCODER_JSON: &str = r#"{"classes": ["Anemia", "Diabetes", "Healthy"]}"#;

fn predictor(config: InferenceConfig) -> Predictor {
    let model = ForestClassifier::from_json(MODEL_JSON).unwrap();
    let encoder = LabelEncoder::from_json(ENCODER_JSON).unwrap();
    Predictor::new(std::sync::Arc::new(model), encoder, config).unwrap()
}

fn patients() -> Vec<PatientRecord> {
    let csv = [
        "Name,Glucose,Hemoglobin,Cholesterol,Platelets,ALT,AST\nA,250,13.5,180,260,30,22\n",
        "Name,Glucose,Hemoglobin,Cholesterol,Platelets,ALT,AST\nB,90,10.1,260,150,55,61\n",
        "Name,Glucose,Hemoglobin,Cholesterol,Platelets,ALT,AST\nC,100,14,200,250,25,25\n",
        "Name,AST,ALT,Platelets,Cholesterol,Hemoglobin,Glucose,Extra\nD,40,12,400,150,12.5,120,7\n",
    ];
    csv.iter()
        .map(|c| PatientRecord::from_csv_bytes(c.as_bytes()).unwrap())
        .collect()
}

#[test]
fn test_results_hold_for_every_strategy() {
    for strategy in [
        ImportanceStrategy::Attribution,
        ImportanceStrategy::Impurity,
        ImportanceStrategy::Deviation,
    ] {
        let predictor = predictor(InferenceConfig::new().with_strategy(strategy));
        for record in patients() {
            let result = predictor.run(&record).unwrap();

            assert_eq!(result.strategy, strategy);
            assert!(result.factors.len() <= 5);
            assert!(result.factors.windows(2).all(|w| w[0].value >= w[1].value));
            assert!((0.0..=1.0).contains(&result.confidence));

            let prediction = predictor.predict(&record).unwrap();
            let proba = predictor
                .model()
                .predict_proba(&record.feature_row(predictor.model().feature_names(), 6).unwrap().insert_axis(ndarray::Axis(0)))
                .unwrap();
            assert!((prediction.confidence - proba[[0, prediction.class_index]]).abs() < 1e-12);
            assert_eq!(
                predictor.encoder().transform(&[prediction.label.as_str()]).unwrap(),
                vec![prediction.class_index]
            );
        }
    }
}

#[test]
fn test_deviation_scores_are_normalised() {
    let predictor = predictor(InferenceConfig::new().with_strategy(ImportanceStrategy::Deviation));
    for record in patients() {
        let result = predictor.run(&record).unwrap();
        assert!(result.factors.iter().all(|f| (0.0..=1.0).contains(&f.value)));
    }
}

#[test]
fn test_attribution_is_additive_for_the_predicted_class() {
    let predictor = predictor(InferenceConfig::default());
    let record = &patients()[1];
    let prediction = predictor.predict(record).unwrap();

    let row = record.feature_row(predictor.model().feature_names(), 6).unwrap();
    let explanation = predictor.model().shap_values(&row, prediction.class_index).unwrap();
    assert!((explanation.output() - prediction.confidence).abs() < 1e-9);
}

#[test]
fn test_missing_model_feature_is_an_input_error() {
    let predictor = predictor(InferenceConfig::default());
    let record = PatientRecord::from_csv_bytes(b"Name,Glucose,Hemoglobin\nE,250,13\n").unwrap();
    assert!(matches!(
        predictor.run(&record),
        Err(BloodwiseError::ModelInput(_))
    ));
}

#[test]
fn test_load_from_files_with_custom_ranges() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    let encoder_path = dir.path().join("encoder.json");
    std::fs::write(&model_path, MODEL_JSON).unwrap();
    std::fs::write(&encoder_path, ENCODER_JSON).unwrap();

    let mut ranges = tempfile::NamedTempFile::new().unwrap();
    write!(ranges, r#"{{"ALT": 20, "AST": 20}}"#).unwrap();
    let table = NormalRangeTable::load(ranges.path()).unwrap();

    let config = InferenceConfig::new()
        .with_strategy(ImportanceStrategy::Deviation)
        .with_normal_ranges(table);
    let predictor = Predictor::load(&model_path, &encoder_path, config).unwrap();

    let result = predictor.run(&patients()[1]).unwrap();
    let names: Vec<&str> = result.factors.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["AST", "ALT"]);
}

#[test]
fn test_encoder_size_must_match_model() {
    let model = ForestClassifier::from_json(MODEL_JSON).unwrap();
    let encoder = LabelEncoder::from_json(r#"{"classes": ["Anemia", "Healthy"]}"#).unwrap();
    let result = Predictor::new(std::sync::Arc::new(model), encoder, InferenceConfig::default());
    assert!(matches!(result, Err(BloodwiseError::ModelLoad(_))));
}
