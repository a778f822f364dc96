//! Reindexer Main Entry Point
//!
//! `reindexer index [--forced]` rebuilds every configured collection;
//! `reindexer info` prints the cluster's indices, aliases and nodes.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use reindexer::notifier::NotificationMessage;
use reindexer::{Dependencies, IndexingError};
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "reindexer", version, about = "Zero-downtime reindexer for reference datasets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the indices of every configured collection.
    Index {
        /// Skip the freshness check and fall back to local snapshots.
        #[arg(short, long)]
        forced: bool,
    },
    /// Print the cluster's indices, aliases and nodes.
    Info,
}

/// Initialize tracing/logging.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reindexer=info"));

    let json = env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();

        info!(
            service_name = "reindexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();

        info!(
            service_name = "reindexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }
}

async fn run_index(deps: Dependencies, forced: bool) -> Result<(), IndexingError> {
    let report = deps.orchestrator.run(forced).await;

    if let Some(notifier) = &deps.notifier {
        let message = NotificationMessage::from_report(&deps.env, &report);
        notifier.notify(&message).await;
    }

    if report.has_failures() {
        return Err(IndexingError::RunFailed(report.error_count()));
    }
    Ok(())
}

async fn run_info(deps: Dependencies) -> Result<(), IndexingError> {
    let overview = deps.provider.describe_cluster().await?;

    println!("== Indices ==\n{}", overview.indices);
    println!("== Aliases ==\n{}", overview.aliases);
    println!("== Nodes ==\n{}", overview.nodes);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    init_tracing();

    info!(command = ?cli.command, "Starting reindexer");

    let deps = match Dependencies::new().await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let result = match cli.command {
        Command::Index { forced } => run_index(deps, forced).await,
        Command::Info => run_info(deps).await,
    };

    match &result {
        Ok(()) => info!("Reindexer completed successfully"),
        Err(e) => error!(error = %e, "Reindexer failed"),
    }
    result
}
