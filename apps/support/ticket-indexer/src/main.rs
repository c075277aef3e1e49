//! Ticket Indexer
//!
//! Keeps the `zendesk_tickets` vector table in sync with solved Zendesk tickets.
//! Can run as a one-shot job under an external timer or as a scheduled service.

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use eyre::Result;
use std::sync::Arc;
use tracing::info;

mod config;
mod indexer;
mod scheduler;

use config::IndexerConfig;

#[derive(Parser)]
#[command(name = "ticket-indexer")]
#[command(about = "Index solved Zendesk tickets into a pgvector table")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single indexing pass and exit
    Run,

    /// Run as a scheduled service
    Schedule {
        /// Cron expression for scheduling (default: INDEXER_CRON, or hourly)
        #[arg(short, long)]
        cron: Option<String>,
    },

    /// Show the watermark and stored row count
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let cli = Cli::parse();

    let config = IndexerConfig::from_env()?;
    let environment = Environment::from_env();
    init_tracing(&environment);

    observability::init_metrics(config.metrics_addr)?;

    let service = indexer::build_service(&config).await?;

    match cli.command {
        Commands::Run => {
            info!("Starting one-time indexing run");

            let report = service.run_once().await;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !report.is_completed() {
                eyre::bail!(
                    "Indexing run aborted: {}",
                    report.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        Commands::Schedule { cron } => {
            let cron = cron.unwrap_or_else(|| config.cron.clone());
            scheduler::run_scheduled(Arc::new(service), &cron).await?;
        }

        Commands::Status => {
            let status = service.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
