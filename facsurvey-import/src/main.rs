//! Facility survey import (facsurvey-import) - Main entry point
//!
//! Runs one import batch against the configured survey source and prints
//! the resulting summary as JSON on stdout. Ctrl+C cancels the batch:
//! records already in flight finish, fetched records not yet started are
//! staged as pending for a later `replay`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use facsurvey_common::config::load_toml_config;
use facsurvey_import::{build_orchestrator, CliOverrides, ImportConfig, SourceClient};

/// Command-line arguments for facsurvey-import
#[derive(Parser, Debug)]
#[command(name = "facsurvey-import")]
#[command(about = "Import facility survey submissions into the local database")]
#[command(version)]
struct Args {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Survey source data endpoint
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Survey source API token
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// SQLite database file
    #[arg(long = "database", global = true)]
    database_path: Option<PathBuf>,

    /// Records processed in parallel
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Owner recorded on facilities created by this run
    #[arg(long, global = true)]
    owner_user_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import submissions collected in [start, end)
    Range {
        /// First day included (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// First day excluded (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
    },
    /// Import one submission by its source id
    Id {
        external_id: String,
    },
    /// Process staged records still pending
    Replay,
    /// Re-queue failed staged records and process them again
    RetryFailed,
    /// Re-queue records left in processing by a run that died, then replay
    Recover {
        /// Only rows untouched for at least this many seconds
        #[arg(long, default_value_t = 600)]
        older_than_secs: u64,
    },
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            database_path: self.database_path.clone(),
            concurrency: self.concurrency,
            owner_user_id: self.owner_user_id.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before logging so [logging] level can apply; its own
    // messages are emitted once the subscriber is up
    let toml_config = load_toml_config(args.config.as_deref());

    let default_level = toml_config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let toml_config = toml_config.context("Failed to load configuration file")?;
    let config = ImportConfig::resolve(&args.overrides(), &toml_config)
        .context("Invalid configuration")?;

    info!("Starting facsurvey-import v{}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database_path.display());
    info!("Source: {}", config.source.base_url);

    let pool = facsurvey_common::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let source = SourceClient::new(&config.source).context("Failed to build source client")?;
    let orchestrator = build_orchestrator(&config, pool, Arc::new(source))
        .await
        .context("Failed to set up import")?;

    let cancel_token = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel_token.clone()));

    let summary = match args.command {
        Command::Range { start, end } => {
            if start >= end {
                bail!("--start ({}) must be before --end ({})", start, end);
            }
            orchestrator
                .import_by_date_range(start, end, &cancel_token)
                .await
        }
        Command::Id { external_id } => {
            orchestrator
                .import_by_id(external_id.trim(), &cancel_token)
                .await
        }
        Command::Replay => orchestrator.replay_pending(&cancel_token).await,
        Command::RetryFailed => orchestrator.retry_failed(&cancel_token).await,
        Command::Recover { older_than_secs } => {
            orchestrator
                .recover_stale(Duration::from_secs(older_than_secs), &cancel_token)
                .await
        }
    }
    .context("Import batch aborted")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
    );

    info!("{}", summary.message);
    Ok(())
}

/// Cancel the running batch on Ctrl+C or SIGTERM
async fn cancel_on_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling import");
        },
        _ = terminate => {
            info!("Received terminate signal, cancelling import");
        },
    }
    cancel_token.cancel();
}
