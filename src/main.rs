// Entry point for the African-exchange ingestion jobs.
mod marketdata {
    // Yahoo chart API caller.
    pub mod api_caller;
    // Response structures for the chart API.
    pub mod response;
}
// HTTP plumbing.
mod http {
    // Shared HTTP clients.
    pub mod client;
    // Persistent retry loop for flaky endpoints.
    pub mod retry;
}
// Data models and errors.
mod model;
// Normalizer primitives.
mod clean;
// Manifest CSV readers.
mod manifest;
// HTML table extraction.
mod html_table;
// Per-source outcome reporting.
mod report;
// Per-exchange jobs.
mod jobs {
    pub mod actions;
    pub mod brvm;
    pub mod dse;
    pub mod jse;
    pub mod nse;
}
// Data storage module.
mod store {
    /// Corporate-action tables.
    pub mod actions;
    /// Exchange OHLCV tables.
    pub mod ohlcv;
    /// SQLite database interaction.
    pub mod sqlite;
}
// SQLite-to-Postgres mirror.
mod migrate;
// The sequential update pipeline.
mod pipeline;
// module storing defaults
mod constants;

use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenv::dotenv;

// Command-line argument parser.
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

// Subcommands for the application.
#[derive(Subcommand, Debug)]
enum Commands {
    // Download a BRVM price-page snapshot.
    BrvmFetch {
        #[arg(default_value = constants::BRVM_SNAPSHOT_DIR)]
        snapshot_dir: String,
    },
    // Parse and load the accumulated BRVM snapshots.
    Brvm {
        #[arg(default_value = constants::BRVM_SNAPSHOT_DIR)]
        snapshot_dir: String,
    },
    // Fetch the DSE endpoints from the manifest and load the latest records.
    Dse {
        #[arg(default_value = constants::DSE_MANIFEST)]
        manifest: String,
    },
    // Fetch one day of JSE bars for the manifest tickers.
    Jse {
        // Defaults to the equities list, or the index list with --indices.
        manifest: Option<String>,
        // Trading day; prompted for interactively when not given.
        #[arg(long)]
        date: Option<NaiveDate>,
        // Load the index list into the indices table instead.
        #[arg(long)]
        indices: bool,
    },
    // Parse and load the NSE snapshots.
    Nse {
        #[arg(default_value = constants::NSE_SNAPSHOT_DIR)]
        snapshot_dir: String,
    },
    // Load the NSE corporate-action CSV files.
    NseActions {
        #[arg(default_value = constants::NSE_ACTIONS_DIR)]
        actions_dir: String,
    },
    // Mirror the local database into the Postgres server.
    Migrate,
    // Run every job in sequence with the cleanup scripts between them.
    Pipeline {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
// Main function entry point.
async fn main() -> ExitCode {
    dotenv().ok();

    env_logger::init();

    let args = Args::parse();

    let result = match args.command {
        Commands::BrvmFetch { snapshot_dir } => jobs::brvm::fetch(&snapshot_dir).await,
        Commands::Brvm { snapshot_dir } => {
            open_connection().and_then(|conn| jobs::brvm::run(&snapshot_dir, conn))
        }
        Commands::Dse { manifest } => match open_connection() {
            Ok(conn) => jobs::dse::run(&manifest, conn).await,
            Err(err) => Err(err),
        },
        Commands::Jse {
            manifest,
            date,
            indices,
        } => match open_connection() {
            Ok(conn) => {
                let manifest = manifest
                    .unwrap_or_else(|| jobs::jse::default_manifest(indices).to_string());
                jobs::jse::run(&manifest, date, indices, conn).await
            }
            Err(err) => Err(err),
        },
        Commands::Nse { snapshot_dir } => {
            open_connection().and_then(|conn| jobs::nse::run(&snapshot_dir, conn))
        }
        Commands::NseActions { actions_dir } => {
            open_connection().and_then(|conn| jobs::actions::run(&actions_dir, conn))
        }
        Commands::Migrate => match open_connection() {
            Ok(conn) => migrate::run(conn).await,
            Err(err) => Err(err),
        },
        Commands::Pipeline { date } => pipeline::run(date).await,
    };

    match result {
        Ok(_) => {
            log::info!("done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            // Non-zero exit so an outer scheduler can gate on it.
            log::error!("job failed: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn open_connection() -> model::Result<rusqlite::Connection> {
    store::sqlite::init_connection()
}
