//! BRVM (Abidjan) jobs. `fetch` downloads the price page to a
//! timestamped snapshot; `run` parses the accumulated snapshots, appends
//! them and deletes them once loaded. Numbers on the page are French
//! formatted: spaces for thousands, comma as the decimal mark.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use scraper::{Html, Selector};

use crate::http::client;
use crate::report::{RunReport, SourceOutcome};
use crate::{clean, constants, html_table, model, store};

lazy_static::lazy_static! {
    static ref HEADER_SEANCE: Selector = Selector::parse("p.header-seance").unwrap();
    static ref MAIN_BLOCK: Selector = Selector::parse("section#block-system-main").unwrap();
}

const SNAPSHOT_PREFIX: &str = "brvm_stocks_";

/// Downloads the BRVM price page into the snapshot directory. The site's
/// certificate chain does not verify, so the lax client is used.
pub async fn fetch(snapshot_dir: &str) -> model::Result<()> {
    log::info!("brvm: downloading {}", constants::BRVM_PAGE_URL);
    let page = client::get_text(constants::BRVM_PAGE_URL, true).await?;
    log::info!("brvm: got {} characters", page.len());

    // Cheap sanity checks on what came back.
    if !page.contains("<table") {
        log::warn!("brvm: page has no table tags");
    }
    if !page.contains("SONATEL") {
        log::warn!("brvm: SONATEL not present on the page");
    }
    if !page.contains("Closing price") {
        log::warn!("brvm: price header not present on the page");
    }

    std::fs::create_dir_all(snapshot_dir)?;
    let timestamp = Utc::now()
        .with_timezone(&constants::BRVM_TZ)
        .format("%Y%m%d_%H%M%S");
    let path = Path::new(snapshot_dir).join(format!("{SNAPSHOT_PREFIX}{timestamp}.html"));
    std::fs::write(&path, &page)?;
    log::info!("brvm: snapshot saved to {}", path.display());
    Ok(())
}

pub fn run(snapshot_dir: &str, mut conn: Connection) -> model::Result<()> {
    let files = list_snapshots(snapshot_dir)?;
    log::info!("brvm: {} snapshot(s) in {}", files.len(), snapshot_dir);

    store::ohlcv::create_table(&conn, constants::BRVM_TABLE)?;

    let mut report = RunReport::new();
    let mut batch: Vec<(model::OhlcvRecord, model::SourceMeta)> = Vec::new();
    let mut loaded_files: Vec<&PathBuf> = Vec::new();

    for file in &files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string_lossy().into_owned());

        let html = match std::fs::read_to_string(file) {
            Ok(html) => html,
            Err(err) => {
                log::error!("brvm: cannot read {}: {}", name, err);
                report.record(&name, now_local(), SourceOutcome::Failed {
                    reason: err.to_string(),
                    status_code: None,
                    attempts: 1,
                });
                continue;
            }
        };

        match parse_snapshot(&name, &html) {
            Ok(records) => {
                let kept = records.len();
                for record in records {
                    let meta = model::SourceMeta {
                        source: name.clone(),
                        fetched_at: now_local(),
                        attempts: 1,
                    };
                    batch.push((record, meta));
                }
                log::info!("brvm: {} -> {} stocks", name, kept);
                report.record(&name, now_local(), SourceOutcome::Loaded { rows: kept });
                loaded_files.push(file);
            }
            Err(reason) => {
                log::error!("brvm: skipping {}: {}", name, reason);
                report.record(&name, now_local(), SourceOutcome::Skipped { reason });
            }
        }
    }

    if batch.is_empty() {
        report.log_summary("brvm");
        return Err(model::IngestError::NothingLoaded(
            "no BRVM snapshot produced any records".into(),
        ));
    }

    batch.sort_by(|a, b| (a.0.trade_date, &a.0.ticker).cmp(&(b.0.trade_date, &b.0.ticker)));
    let appended = store::ohlcv::append_records(&mut conn, constants::BRVM_TABLE, &batch)?;
    log::info!("brvm: appended {} rows to {}", appended, constants::BRVM_TABLE);

    // Snapshots are consumed once loaded; skipped and unreadable ones
    // stay on disk for the next run.
    for file in loaded_files {
        if let Err(err) = std::fs::remove_file(file) {
            log::warn!("brvm: could not delete {}: {}", file.display(), err);
        } else {
            log::info!("brvm: deleted {}", file.display());
        }
    }

    report.log_summary("brvm");
    Ok(())
}

fn list_snapshots(snapshot_dir: &str) -> model::Result<Vec<PathBuf>> {
    let dir = Path::new(snapshot_dir);
    if !dir.is_dir() {
        return Err(model::IngestError::FileNotFound(snapshot_dir.into()));
    }
    let mut files: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == "html")
                && path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(SNAPSHOT_PREFIX))
        })
        .collect();
    if files.is_empty() {
        return Err(model::IngestError::NoSnapshots(
            snapshot_dir.into(),
            format!("{SNAPSHOT_PREFIX}*.html"),
        ));
    }
    files.sort();
    Ok(files)
}

fn now_local() -> String {
    Utc::now()
        .with_timezone(&constants::BRVM_TZ)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Extracts one snapshot: the session date from the `header-seance`
/// element, then the stock rows from the table under the main block.
pub fn parse_snapshot(filename: &str, html: &str) -> Result<Vec<model::OhlcvRecord>, String> {
    let document = Html::parse_document(html);

    let header = document
        .select(&HEADER_SEANCE)
        .next()
        .map(|el| el.text().collect::<String>())
        .ok_or_else(|| format!("no header-seance element in {filename}"))?;
    let trade_date = session_date(&header)
        .ok_or_else(|| format!("unparsable session date in {filename}: {}", header.trim()))?;

    let rows = html_table::rows_under(&document, &MAIN_BLOCK)
        .ok_or_else(|| format!("no table under the main block in {filename}"))?;

    let records = rows
        .get(1..)
        .unwrap_or(&[])
        .iter()
        .filter(|cells| cells.len() >= 7)
        .filter_map(|cells| normalize_row(cells, trade_date))
        .collect();
    Ok(records)
}

// The header reads "Friday, 14 March, 2025 - Session ...": the date is
// the text before the first dash.
fn session_date(header: &str) -> Option<NaiveDate> {
    let date_part = header.split('-').next()?.trim();
    NaiveDate::parse_from_str(date_part, "%A, %d %B, %Y").ok()
}

fn normalize_row(cells: &[String], trade_date: NaiveDate) -> Option<model::OhlcvRecord> {
    let ticker = clean::non_null(&cells[0])?;
    let closing_price = clean::parse_f64_fr(&cells[5])?;

    Some(model::OhlcvRecord {
        trade_date,
        ticker: ticker.to_string(),
        company_name: clean::non_null(&cells[1]).map(str::to_string),
        opening_price: clean::parse_f64_fr(&cells[4]),
        high: None, // Not published on the page.
        low: None,
        closing_price,
        volume: clean::parse_i64(&cells[2]),
    })
}
