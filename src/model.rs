use std::{env::VarError, io};

use chrono::NaiveDate;
use thiserror::Error;

use crate::http::client;

/// The canonical daily trading record shared by every exchange job.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvRecord {
    pub trade_date: NaiveDate,        // Trading day.
    pub ticker: String,               // Exchange ticker code.
    pub company_name: Option<String>, // Listed company name, where the source has one.
    pub opening_price: Option<f64>,   // Opening price.
    pub high: Option<f64>,            // Intraday high.
    pub low: Option<f64>,             // Intraday low.
    pub closing_price: f64,           // Closing price.
    pub volume: Option<i64>,          // Shares traded.
}

/// Per-run source metadata stored alongside each record as extra columns,
/// outside the shared schema.
#[derive(Debug, Clone)]
pub struct SourceMeta {
    pub source: String,     // Source URL or snapshot file.
    pub fetched_at: String, // Exchange-local fetch timestamp.
    pub attempts: u32,      // Fetch attempts spent on this source.
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Job-level errors. Per-source failures are folded into the run report
/// instead; these are the fatal conditions that end a job.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("manifest {0} has no usable entries")]
    EmptyManifest(String),
    #[error("manifest {0} has no '{1}' column")]
    MissingManifestColumn(String, String),
    #[error("no snapshots matching {1} in {0}")]
    NoSnapshots(String, String),
    #[error("nothing loaded: {0}")]
    NothingLoaded(String),
    #[error("bad date input: {0}")]
    BadDateInput(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("http error: {0}")]
    Http(#[from] client::RequestError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("environment variable not set: {0}")]
    EnvVarNotSet(#[from] VarError),
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),
}
