//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::BloodwiseError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Reading the upload failed; carries the status the extractor chose
    #[error("Upload error: {message}")]
    Upload { status: StatusCode, message: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Prediction(#[from] BloodwiseError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Upload { status, message } => {
                tracing::warn!(status = status.as_u16(), detail = %message, "Upload rejected");
                (*status, message.clone())
            }
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            ServerError::Prediction(e) => {
                tracing::error!(error = %e, "Prediction failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
