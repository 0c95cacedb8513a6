//! Bloodwise prediction server
//!
//! Accepts CSV uploads of a single patient's blood tests and returns the
//! predicted condition with its top contributing factors.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use handlers::FILE_FIELD;
pub use state::AppState;

use crate::explainability::ImportanceStrategy;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: String,
    pub encoder_path: String,
    pub strategy: ImportanceStrategy,
    pub normal_ranges_path: Option<String>,
    pub max_upload_size: usize,
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("API_PORT", 5000),
            model_path: std::env::var("MODEL_PATH")
                .unwrap_or_else(|_| "models/disease_prediction_model.json".to_string()),
            encoder_path: std::env::var("ENCODER_PATH")
                .unwrap_or_else(|_| "models/disease_label_encoder.json".to_string()),
            strategy: env_or("IMPORTANCE_STRATEGY", ImportanceStrategy::Deviation),
            normal_ranges_path: std::env::var("NORMAL_RANGES_PATH").ok(),
            max_upload_size: env_or("MAX_UPLOAD_SIZE", 10 * 1024 * 1024), // 10MB
            cors_origin: std::env::var("CORS_ORIGIN").ok(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    parse_or_default(key, std::env::var(key).ok(), default)
}

/// Parse `raw` if set; an unparseable value is logged and replaced by `default`
fn parse_or_default<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T
where
    T::Err: Display,
{
    match raw {
        None => default,
        Some(value) => match value.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(key, value = %value, error = %e, "Invalid environment value, using default");
                default
            }
        },
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(
        model = %config.model_path,
        encoder = %config.encoder_path,
        strategy = %config.strategy,
        "Loading model artifacts"
    );

    let state = Arc::new(AppState::load(config.clone())?);
    if config.cors_origin.is_none() {
        warn!("CORS_ORIGIN not set, allowing requests from any origin");
    }
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        address = %addr,
        max_upload_size_mb = config.max_upload_size / 1024 / 1024,
        started_at = %start_time.to_rfc3339(),
        "Bloodwise server starting"
    );
    info!(url = %format!("http://{}/predict", addr), "Prediction endpoint available");
    info!(url = %format!("http://{}/health", addr), "Health endpoint available");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    // Graceful shutdown on ctrl+c
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install ctrl+c handler");
            std::future::pending::<()>().await;
        }
        let stop_time = chrono::Utc::now();
        let uptime = stop_time.signed_duration_since(start_time);
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
