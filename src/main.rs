//! Ollama Model Manager - command line entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ollama_model_manager::{
    LifecycleEngine, OperationOutcome, OperationRequest, OperationShell, config::ManagerConfig,
    metrics, models::records_from_payload,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(name = "omm")]
#[command(about = "Manage locally installed Ollama models", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    log_format: String,

    /// Print Prometheus metrics to stderr on exit
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List installed models
    List {
        /// Print the raw JSON record list
        #[arg(long)]
        json: bool,
    },
    /// Copy a model's GGUF file and Modelfile out of the daemon's store
    Export {
        /// Model name, e.g. llama3:8b
        model: String,
        /// Destination GGUF path
        destination: PathBuf,
    },
    /// Register a GGUF file as a new model
    Import {
        /// GGUF file to import
        file: PathBuf,
        /// Model name (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Remove a model
    Delete { model: String },
    /// Pull the latest version of a model
    Update { model: String },
}

impl Command {
    fn list_as_json(&self) -> bool {
        matches!(self, Command::List { json: true })
    }

    fn into_request(self) -> OperationRequest {
        match self {
            Command::List { .. } => OperationRequest::List,
            Command::Export { model, destination } => OperationRequest::Export { model, destination },
            Command::Import { file, name } => OperationRequest::Import {
                source: file,
                model_name: name,
            },
            Command::Delete { model } => OperationRequest::Delete { model },
            Command::Update { model } => OperationRequest::Update { model },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<bool> {
    let cli = Cli::parse();

    // Setup logging; stdout is reserved for operation output
    match cli.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    let config = ManagerConfig::load(cli.config).context("Failed to load configuration")?;
    config.validate()?;

    tracing::debug!(
        binary_path = ?config.binary_path,
        models_dir = ?config.resolved_models_dir(),
        "Configuration loaded"
    );

    let prometheus_handle = if cli.metrics {
        Some(metrics::setup_metrics()?)
    } else {
        None
    };

    let as_json = cli.command.list_as_json();
    let request = cli.command.into_request();
    eprintln!("{}", request.status_text());

    let shell = OperationShell::new(Arc::new(LifecycleEngine::new(config)));
    let (_, outcome) = shell.submit(request).await;

    let ok = tokio::select! {
        outcome = outcome => match outcome {
            Ok(outcome) => report(&outcome, as_json)?,
            Err(_) => {
                eprintln!("Operation ended without a result");
                false
            }
        },
        _ = shutdown_signal() => {
            shell.cancel().await;
            eprintln!("Operation cancelled");
            false
        }
    };

    if let Some(handle) = prometheus_handle {
        eprintln!("{}", handle.render());
    }

    Ok(ok)
}

/// Print an outcome; the list payload is rendered as a table unless JSON was asked for
fn report(outcome: &OperationOutcome, as_json: bool) -> Result<bool> {
    if !outcome.ok {
        eprintln!("Error: {}", outcome.payload);
        return Ok(false);
    }

    if as_json || !outcome.payload.starts_with('[') {
        println!("{}", outcome.payload);
        return Ok(true);
    }

    let records =
        records_from_payload(&outcome.payload).context("Failed to decode model list")?;
    if records.is_empty() {
        println!("No models installed");
        return Ok(true);
    }

    let width = records
        .iter()
        .map(|r| r.full_name().len())
        .max()
        .unwrap_or(0)
        .max(4);
    println!("{:<width$}  {:>10}  MODIFIED", "NAME", "SIZE");
    for record in &records {
        println!(
            "{:<width$}  {:>10}  {}",
            record.full_name(),
            record.size(),
            record.modified_date()
        );
    }

    Ok(true)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}
