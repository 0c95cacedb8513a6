//! Bloodwise CLI Module
//!
//! Command-line interface for single-patient prediction, human-readable
//! reports and the prediction server.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::data::PatientRecord;
use crate::error::{BloodwiseError, Result};
use crate::explainability::{Factor, ImportanceStrategy, NormalRangeTable, DEFAULT_TOP_K};
use crate::inference::{InferenceConfig, PredictionResult, Predictor};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width
const BAR_WIDTH: usize = 32;

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "bloodwise")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Blood-test disease prediction with explainable contributing factors")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict one patient and print the result as JSON
    Predict {
        #[command(flatten)]
        input: PatientArgs,

        /// Factor ranking strategy (attribution, impurity, deviation)
        #[arg(long, default_value = "impurity")]
        strategy: ImportanceStrategy,
    },

    /// Print a human-readable analysis report
    Report {
        #[command(flatten)]
        input: PatientArgs,

        /// Factor ranking strategy (attribution, impurity, deviation)
        #[arg(long, default_value = "attribution")]
        strategy: ImportanceStrategy,

        /// Skip the factor bar chart
        #[arg(long)]
        no_chart: bool,
    },

    /// Start the prediction server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "API_PORT", default_value = "5000")]
        port: u16,

        /// Host to bind to
        #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Model artifact (JSON)
        #[arg(long, env = "MODEL_PATH", default_value = "models/disease_prediction_model.json")]
        model: String,

        /// Label encoder artifact (JSON)
        #[arg(long, env = "ENCODER_PATH", default_value = "models/disease_label_encoder.json")]
        encoder: String,

        /// Factor ranking strategy (attribution, impurity, deviation)
        #[arg(long, env = "IMPORTANCE_STRATEGY", default_value = "deviation")]
        strategy: ImportanceStrategy,

        /// Custom reference values (JSON object of name: value)
        #[arg(long, env = "NORMAL_RANGES_PATH")]
        normal_ranges: Option<String>,
    },
}

/// Patient file and model artifacts
#[derive(Args, Debug, Clone)]
pub struct PatientArgs {
    /// Patient CSV file (Name column plus blood-test columns)
    pub csv: PathBuf,

    /// Model artifact (JSON)
    pub model: PathBuf,

    /// Label encoder artifact (JSON)
    pub encoder: PathBuf,

    /// Custom reference values (JSON object of name: value)
    #[arg(long, env = "NORMAL_RANGES_PATH")]
    pub normal_ranges: Option<PathBuf>,

    /// Number of factors to report
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,
}

impl Commands {
    /// Default log filter for this command
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Commands::Serve { .. } => "bloodwise=info",
            _ => "bloodwise=warn",
        }
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

fn load_normal_ranges(path: Option<&Path>) -> Result<NormalRangeTable> {
    match path {
        Some(path) => NormalRangeTable::load(path),
        None => Ok(NormalRangeTable::default()),
    }
}

/// Load the artifacts and run one patient through the predictor
pub fn run_prediction(
    input: &PatientArgs,
    strategy: ImportanceStrategy,
    humanize_names: bool,
) -> Result<PredictionResult> {
    let config = InferenceConfig::new()
        .with_strategy(strategy)
        .with_top_k(input.top_k)
        .with_normal_ranges(load_normal_ranges(input.normal_ranges.as_deref())?)
        .with_humanized_names(humanize_names);

    let record = PatientRecord::from_csv_path(&input.csv)?;
    let predictor = Predictor::load(&input.model, &input.encoder, config)?;
    predictor.run(&record)
}

/// Print the prediction as a single JSON object on stdout
pub fn cmd_predict(input: &PatientArgs, strategy: ImportanceStrategy) -> anyhow::Result<()> {
    let result = run_prediction(input, strategy, false)?;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

pub fn cmd_report(input: &PatientArgs, strategy: ImportanceStrategy, no_chart: bool) -> anyhow::Result<()> {
    let result = run_prediction(input, strategy, true)?;
    print_report(&result);

    if !no_chart {
        match render_bar_chart(&result.factors, BAR_WIDTH) {
            Ok(lines) => {
                section("Factor Chart");
                let mut stdout = std::io::stdout().lock();
                for line in lines {
                    if let Err(e) = writeln!(stdout, "  {}", line) {
                        warn!(error = %e, "Could not draw factor chart");
                        break;
                    }
                }
            }
            Err(e) => warn!(error = %e, "Skipping factor chart"),
        }
    }

    println!();
    println!(
        "  {}",
        dim("Note: This is an AI-assisted analysis and should be reviewed by a healthcare professional.")
    );
    println!();
    Ok(())
}

fn print_report(result: &PredictionResult) {
    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Blood Test Analysis Report".white().bold()));
    line_box_center(&format!("{}", accent(&result.patient_name)));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Predicted condition ", &result.prediction));
    line_box(&kv("Confidence level    ", &format!("{:.1}%", result.confidence * 100.0)));
    line_box(&kv("Ranking method      ", result.strategy.as_str()));
    line_box_empty();
    line_box_bottom();

    section("Top Contributing Factors");
    if result.factors.is_empty() {
        println!("  {}", muted("No factors matched the reference table"));
    }
    for factor in &result.factors {
        println!("  {:<24} {}", muted(&factor.name), format!("{:.4}", factor.value).white().bold());
    }
}

/// Horizontal bars scaled to the largest factor
pub fn render_bar_chart(factors: &[Factor], width: usize) -> Result<Vec<String>> {
    if factors.is_empty() {
        return Err(BloodwiseError::Explanation("no factors to chart".to_string()));
    }
    if let Some(bad) = factors.iter().find(|f| !f.value.is_finite() || f.value < 0.0) {
        return Err(BloodwiseError::Explanation(format!(
            "cannot chart score {} for '{}'",
            bad.value, bad.name
        )));
    }

    let max = factors.iter().map(|f| f.value).fold(0.0, f64::max);
    let label_width = factors.iter().map(|f| f.name.chars().count()).max().unwrap_or(0);

    Ok(factors
        .iter()
        .map(|f| {
            let filled = if max > 0.0 {
                ((f.value / max) * width as f64).round() as usize
            } else {
                0
            };
            format!(
                "{:<label_width$}  {}{} {:.4}",
                f.name,
                "█".repeat(filled),
                "░".repeat(width - filled),
                f.value,
                label_width = label_width
            )
        })
        .collect())
}

pub async fn cmd_serve(
    host: &str,
    port: u16,
    model: &str,
    encoder: &str,
    strategy: ImportanceStrategy,
    normal_ranges: Option<String>,
) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Bloodwise".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Predict ", &format!("POST http://{}:{}/predict", host, port)));
    line_box(&kv("Health  ", &format!("GET  http://{}:{}/health", host, port)));
    line_box(&kv("Method  ", strategy.as_str()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    let config = ServerConfig {
        host: host.to_string(),
        port,
        model_path: model.to_string(),
        encoder_path: encoder.to_string(),
        strategy,
        normal_ranges_path: normal_ranges,
        ..Default::default()
    };

    run_server(config).await
}
