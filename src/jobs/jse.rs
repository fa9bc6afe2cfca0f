//! JSE (Johannesburg) jobs: one daily bar per manifest ticker from the
//! Yahoo chart API, for a single requested trading day. The equities and
//! indices variants differ only in manifest, target table and whether
//! missing tickers are reported to a CSV.

use std::io::Write;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;

use crate::marketdata::api_caller;
use crate::report::{RunReport, SourceOutcome};
use crate::{constants, manifest, model, store};

/// The manifest used when none is given: the equities list, or the
/// index list for the indices variant.
pub fn default_manifest(indices: bool) -> &'static str {
    if indices {
        constants::JSE_INDICES_MANIFEST
    } else {
        constants::JSE_MANIFEST
    }
}

pub async fn run(
    manifest_path: &str,
    date: Option<NaiveDate>, // Prompted for interactively when absent.
    indices: bool,
    mut conn: Connection,
) -> model::Result<()> {
    let tickers = manifest::read_ticker_manifest(manifest_path)?;
    let date = match date {
        Some(date) => date,
        None => prompt_for_date()?,
    };

    let (table, label) = if indices {
        (constants::JSE_INDICES_TABLE, "jse-indices")
    } else {
        (constants::JSE_TABLE, "jse")
    };
    log::info!("{label}: {} tickers for {}", tickers.len(), date);

    store::ohlcv::create_table(&conn, table)?;

    let mut report = RunReport::new();
    let mut batch = Vec::new();
    let mut missing: Vec<String> = Vec::new();

    for (i, ticker) in tickers.iter().enumerate() {
        log::info!("{label}: downloading {} for {}", ticker, date);
        let source = format!("{}/{}", constants::YAHOO_CHART_URL, ticker);

        match api_caller::daily_bar(ticker, date).await {
            Ok(Some(record)) => {
                let meta = model::SourceMeta {
                    source: source.clone(),
                    fetched_at: now_local(),
                    attempts: 1,
                };
                batch.push((record, meta));
                report.record(&source, now_local(), SourceOutcome::Loaded { rows: 1 });
            }
            Ok(None) => {
                log::warn!("{label}: no data for {} on {}", ticker, date);
                missing.push(ticker.clone());
                report.record(&source, now_local(), SourceOutcome::Skipped {
                    reason: format!("no data for {date}"),
                });
            }
            Err(err) => {
                log::error!("{label}: failed {}: {}", ticker, err);
                missing.push(ticker.clone());
                report.record(&source, now_local(), SourceOutcome::Failed {
                    reason: err.to_string(),
                    status_code: err.status_code(),
                    attempts: 1,
                });
            }
        }

        if i + 1 < tickers.len() {
            tokio::time::sleep(Duration::from_millis(constants::INTER_SOURCE_DELAY_MS)).await;
        }
    }

    // The equities run reports tickers that came back empty.
    if !indices && !missing.is_empty() {
        let path = missing_report_path(date);
        write_missing_csv(&path, date, &missing)?;
        log::warn!("{label}: {} missing tickers written to {}", missing.len(), path);
    }

    if batch.is_empty() {
        report.log_summary(label);
        return Err(model::IngestError::NothingLoaded(format!(
            "no JSE data for any ticker on {date}"
        )));
    }

    let appended = store::ohlcv::append_records(&mut conn, table, &batch)?;
    log::info!("{label}: appended {} rows to {} for {}", appended, table, date);
    report.log_summary(label);
    Ok(())
}

fn now_local() -> String {
    Utc::now()
        .with_timezone(&constants::JSE_TZ)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn prompt_for_date() -> model::Result<NaiveDate> {
    print!("Enter the date to fetch (YYYY-MM-DD): ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let trimmed = line.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| model::IngestError::BadDateInput(trimmed.into()))
}

fn missing_report_path(date: NaiveDate) -> String {
    format!("missing_JSE_data_{}.csv", date.format("%Y-%m-%d"))
}

fn write_missing_csv(path: &str, date: NaiveDate, missing: &[String]) -> model::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["ticker", "missing_date"])?;
    let date = date.format("%Y-%m-%d").to_string();
    for ticker in missing {
        writer.write_record([ticker.as_str(), date.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}
