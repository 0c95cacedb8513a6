//! Request handlers

use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::data::PatientRecord;
use crate::inference::PredictionResult;

use super::error::{Result, ServerError};
use super::state::AppState;

const NO_FILE: &str = "No file provided";

/// Multipart form field carrying the CSV upload
pub const FILE_FIELD: &str = "file";

// ============================================================================
// Prediction
// ============================================================================

/// Keep the status the multipart reader assigned (413 for oversize bodies)
fn upload_error(err: MultipartError) -> ServerError {
    ServerError::Upload {
        status: err.status(),
        message: err.body_text(),
    }
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>> {
    let mut multipart = multipart.map_err(|_| ServerError::BadRequest(NO_FILE.to_string()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(upload_error)?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.csv").to_string();
        let data = field
            .bytes()
            .await
            .map_err(upload_error)?;
        upload = Some((file_name, data));
        break;
    }

    let (file_name, data) = upload.ok_or_else(|| ServerError::BadRequest(NO_FILE.to_string()))?;
    info!(file = %file_name, bytes = data.len(), "Received prediction request");

    let worker_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        let record = PatientRecord::from_csv_bytes(&data)?;
        worker_state.predictor.run(&record)
    })
    .await
    .map_err(|e| ServerError::Internal(format!("prediction task failed: {}", e)))??;

    info!(
        patient = %result.patient_name,
        prediction = %result.prediction,
        confidence = result.confidence,
        strategy = %result.strategy,
        "Prediction complete"
    );

    Ok(Json(result))
}

/// CORS preflight without the CORS headers
pub async fn predict_options() -> StatusCode {
    StatusCode::OK
}

// ============================================================================
// System
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "strategy": state.config.strategy.as_str(),
        "uptime_secs": state.uptime_secs(),
    }))
}
