//! Bloodwise - Main Entry Point
//!
//! Blood-test disease prediction from the command line or over HTTP.

use bloodwise::cli::{cmd_predict, cmd_report, cmd_serve, Cli, Commands};
use clap::error::ErrorKind;
use clap::Parser;

/// Argument errors for `predict` are reported as JSON like its results
fn exit_on_parse_error(err: clap::Error) -> ! {
    let is_predict = std::env::args().nth(1).as_deref() == Some("predict");
    let is_info = matches!(
        err.kind(),
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
    );
    if is_predict && !is_info {
        eprintln!("{}", serde_json::json!({ "error": "Invalid arguments" }));
        std::process::exit(1);
    }
    err.exit()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::try_parse().unwrap_or_else(|e| exit_on_parse_error(e));

    // Logs go to stderr, stdout is reserved for results
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.command.default_log_filter().into()),
        )
        .init();

    match cli.command {
        Commands::Predict { input, strategy } => {
            if let Err(e) = cmd_predict(&input, strategy) {
                eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
                std::process::exit(1);
            }
        }
        Commands::Report { input, strategy, no_chart } => {
            cmd_report(&input, strategy, no_chart)?;
        }
        Commands::Serve { port, host, model, encoder, strategy, normal_ranges } => {
            cmd_serve(&host, port, &model, &encoder, strategy, normal_ranges).await?;
        }
    }

    Ok(())
}
