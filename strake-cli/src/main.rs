//! Strake CLI
//!
//! Executes jobs and pipelines from a declarative config file against the
//! local container engine. The config is loaded and resolved once; the
//! directory holding it becomes the source path mounted into containers
//! that ask for it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strake_core::{Config, secrets};
use strake_runner::{CancellationToken, Engine, PodmanBackend, PodmanImagePuller, RunOptions};

#[derive(Parser)]
#[command(name = "strake")]
#[command(about = "Runs declaratively-defined CI jobs and pipelines", long_about = None)]
struct Cli {
    /// Path to the pipeline config file
    #[arg(
        short = 'f',
        long,
        env = "STRAKE_FILE",
        default_value = "Strakefile.yaml"
    )]
    file: PathBuf,

    /// Path to a secrets file whose entries are injected into every job
    #[arg(long, env = "STRAKE_SECRETS_FILE")]
    secrets_file: Option<PathBuf>,

    /// Treat the targets as pipeline names instead of job names
    #[arg(short, long)]
    pipeline: bool,

    /// Display the execution plan without executing anything
    #[arg(short, long)]
    debug: bool,

    /// Let the jobs of a stage (or of a flat job list) run concurrently
    #[arg(short, long)]
    concurrently: bool,

    /// Names of the jobs or pipelines to execute
    #[arg(required = true)]
    targets: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strake=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .file
        .canonicalize()
        .with_context(|| format!("config file {} not found", cli.file.display()))?;
    let source_path = config_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::from_file(&config_path)?;
    let secrets = match &cli.secrets_file {
        Some(path) => secrets::from_file(path)?,
        None => Vec::new(),
    };

    // One token for the whole invocation; Ctrl-C reaches every in-flight
    // job through it.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; cancelling in-flight jobs");
                cancel.cancel();
            }
        });
    }

    let engine = Engine::new(
        Arc::new(PodmanBackend::new()),
        Arc::new(PodmanImagePuller::new()),
    );
    let options = RunOptions {
        dry_run: cli.debug,
        concurrent: cli.concurrently,
    };

    let result = if cli.pipeline {
        engine
            .execute_pipelines(
                cancel.clone(),
                &config,
                &secrets,
                &source_path,
                &cli.targets,
                options,
            )
            .await
    } else {
        engine
            .execute_jobs(
                cancel.clone(),
                &config,
                &secrets,
                &source_path,
                &cli.targets,
                options,
            )
            .await
    };

    match result {
        Ok(()) => {
            if cancel.is_cancelled() {
                println!("{}", "cancelled".yellow());
            } else if !cli.debug {
                println!("{}", "ok".green());
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
