//! havoc — chaos testing orchestrator.
//!
//! Reads a declarative configuration, waits for the configured ready
//! condition, captures each system's desired state, executes the chaos
//! scenarios and waits for self-healing after every kill. A structured
//! report of the run is written when `--report` is given, on every exit
//! path.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use havoc_core::{AfterParser, ChaosMaker, Config, Hook, AFTER_READY_KIND};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "havoc")]
#[command(about = "Chaos testing orchestrator: destroy resources, verify the system heals")]
#[command(version)]
struct Cli {
    /// Configuration yaml describing systems, readiness and scenarios
    #[arg(long)]
    config: PathBuf,

    /// Where to write the execution report
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    register_plugins();

    let configuration = tokio::fs::read_to_string(&cli.config)
        .await
        .with_context(|| {
            format!(
                "failed to read contents of configuration file '{}'",
                cli.config.display()
            )
        })?;

    let mut config = Config::new();
    config
        .parse(&configuration)
        .await
        .context("failed to parse configuration")?;

    let mut chaos_maker = ChaosMaker::new(config);
    let outcome = chaos_maker.create_chaos(Hook::new()).await;

    // The report is flushed whether or not the run succeeded; write errors
    // are logged but never change the run's outcome.
    if let Some(path) = &cli.report {
        write_report(&chaos_maker, path);
    }

    outcome.context("failure in chaos")?;
    info!("chaos run completed successfully");

    Ok(())
}

fn register_plugins() {
    havoc_kube::register();
    havoc_rego::register();
    havoc_core::register_ready_parser(AFTER_READY_KIND, AfterParser);
}

fn write_report(chaos_maker: &ChaosMaker, path: &Path) {
    let file = match File::create(path) {
        Ok(file) => file,
        Err(err) => {
            error!("failed to create report file '{}': {err}", path.display());
            return;
        }
    };

    if let Err(err) = chaos_maker.reporter.report(file) {
        error!("failed to write report into file '{}': {err}", path.display());
        return;
    }

    info!("report written to '{}'", path.display());
}
