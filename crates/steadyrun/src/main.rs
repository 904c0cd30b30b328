//! steadyrun CLI
//!
//! Converges one container service to the state described in its config
//! file and reports the outcome through the exit code:
//! 0 success, 1 fatal, 2 unconfirmed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use steadyrun_core::{ConvergeError, ConvergenceOrchestrator, Outcome};
use steadyrun_gateway::HttpGateway;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod collaborators;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "steadyrun")]
#[command(about = "Converge a managed container service to its desired state", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the service
    Apply {
        /// Image tag to deploy (overrides service.image_tag)
        #[arg(long)]
        image_tag: Option<String>,
    },
    /// Delete the service
    Delete,
    /// Show what apply would change, without changing anything
    Plan {
        /// Image tag to compare against (overrides service.image_tag)
        #[arg(long)]
        image_tag: Option<String>,
    },
}

fn init_tracing(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn exit_code(outcome: Outcome) -> ExitCode {
    match outcome {
        Outcome::Fatal => ExitCode::from(1),
        Outcome::Unconfirmed => ExitCode::from(2),
    }
}

fn orchestrator(config: &Config) -> Result<ConvergenceOrchestrator> {
    let gateway = HttpGateway::with_timeout(
        &config.provider.endpoint,
        Duration::from_secs(config.provider.request_timeout_secs),
    )?;
    Ok(ConvergenceOrchestrator::new(
        Arc::new(gateway),
        collaborators::from_config(config),
        config.converge(),
    ))
}

async fn run(
    command: Commands,
    config: &Config,
    engine: &ConvergenceOrchestrator,
) -> Result<std::result::Result<String, ConvergeError>> {
    let identity = config.service.identity();

    let output = match command {
        Commands::Apply { image_tag } => {
            let desired = config.service.desired(image_tag.as_deref())?;
            match engine.converge(&identity, &desired).await {
                Ok(report) => Ok(serde_json::to_string_pretty(&report)?),
                Err(err) => Err(err),
            }
        }
        Commands::Delete => match engine.destroy(&identity).await {
            Ok(report) => Ok(serde_json::to_string_pretty(&report)?),
            Err(err) => Err(err),
        },
        Commands::Plan { image_tag } => {
            let desired = config.service.desired(image_tag.as_deref())?;
            match engine.preview(&identity, &desired).await {
                Ok(preview) => Ok(serde_json::to_string_pretty(&serde_json::json!({
                    "identity": identity,
                    "preview": preview,
                }))?),
                Err(err) => Err(err),
            }
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let path = config::locate(cli.config.as_deref()).ok_or_else(|| {
        eyre::eyre!(
            "no config file found; pass --config or set {}",
            config::CONFIG_ENV
        )
    })?;
    let config = Config::load(&path)?;

    init_tracing(&config.log_level, cli.log_json);
    info!(path = %path.display(), identity = %config.service.identity(), "loaded configuration");

    let engine = orchestrator(&config)?;

    match run(cli.command, &config, &engine).await? {
        Ok(output) => {
            println!("{output}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let outcome = err.outcome();
            error!(error = %err, ?outcome, retryable = err.is_retryable(), "run failed");
            if outcome == Outcome::Unconfirmed {
                eprintln!("steadyrun: {err}\nthe service may still be progressing; halt dependent automation");
            } else {
                eprintln!("steadyrun: {err}");
            }
            Ok(exit_code(outcome))
        }
    }
}
