//! NSE (Nairobi) equities job: parse previously downloaded HTML
//! snapshots, one trading day per file, the date encoded in the filename.
//! The price table interleaves sector headers and advertisement
//! fragments with the security rows; those are filtered out.

use std::path::Path;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use rusqlite::Connection;
use scraper::Html;

use crate::report::{RunReport, SourceOutcome};
use crate::{clean, constants, html_table, model, store};

lazy_static::lazy_static! {
    // e.g. "NSE Friday, March 14, 2025.html"
    static ref FILENAME_DATE: Regex = Regex::new(r"([A-Za-z]+ \d{1,2}, \d{4})").unwrap();
}

// The raw NSE price table, positionally. Short rows are padded.
const RAW_COLUMNS: usize = 13;
const COL_CODE: usize = 0;
const COL_NAME: usize = 1;
const COL_LOW_DAY: usize = 4;
const COL_HIGH_DAY: usize = 5;
const COL_PRICE: usize = 6;
const COL_VOLUME: usize = 11;

pub fn run(snapshot_dir: &str, mut conn: Connection) -> model::Result<()> {
    let files = list_snapshots(snapshot_dir)?;
    log::info!("nse: {} snapshot(s) in {}", files.len(), snapshot_dir);

    store::ohlcv::create_table(&conn, constants::NSE_TABLE)?;

    let mut report = RunReport::new();
    let mut batch: Vec<(model::OhlcvRecord, model::SourceMeta)> = Vec::new();

    for file in &files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string_lossy().into_owned());

        let html = match std::fs::read_to_string(file) {
            Ok(html) => html,
            Err(err) => {
                log::error!("nse: cannot read {}: {}", name, err);
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
                log::info!("nse: {} -> {} records", name, kept);
                report.record(&name, now_local(), SourceOutcome::Loaded { rows: kept });
            }
            Err(reason) => {
                log::error!("nse: skipping {}: {}", name, reason);
                report.record(&name, now_local(), SourceOutcome::Skipped { reason });
            }
        }
    }

    if batch.is_empty() {
        report.log_summary("nse");
        return Err(model::IngestError::NothingLoaded(
            "no NSE snapshot produced any records".into(),
        ));
    }

    batch.sort_by(|a, b| (a.0.trade_date, &a.0.ticker).cmp(&(b.0.trade_date, &b.0.ticker)));
    let appended = store::ohlcv::append_records(&mut conn, constants::NSE_TABLE, &batch)?;
    log::info!("nse: appended {} rows to {}", appended, constants::NSE_TABLE);
    report.log_summary("nse");
    Ok(())
}

fn list_snapshots(snapshot_dir: &str) -> model::Result<Vec<std::path::PathBuf>> {
    let dir = Path::new(snapshot_dir);
    if !dir.is_dir() {
        return Err(model::IngestError::FileNotFound(snapshot_dir.into()));
    }
    let mut files: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "html"))
        .collect();
    if files.is_empty() {
        return Err(model::IngestError::NoSnapshots(
            snapshot_dir.into(),
            "*.html".into(),
        ));
    }
    files.sort();
    Ok(files)
}

fn now_local() -> String {
    Utc::now()
        .with_timezone(&constants::NSE_TZ)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Extracts and normalizes one snapshot. The error string is the skip
/// reason; a skipped snapshot never aborts the batch.
pub fn parse_snapshot(filename: &str, html: &str) -> Result<Vec<model::OhlcvRecord>, String> {
    let trade_date = date_from_filename(filename)
        .ok_or_else(|| format!("no date found in filename: {filename}"))?;

    let document = Html::parse_document(html);
    let rows = html_table::find_price_table(&document, 5, 4)
        .ok_or_else(|| format!("price table not found in {filename}"))?;

    // First row is the header. Body rows map positionally onto the raw
    // column set, padded with empty cells when short.
    let records = rows[1..]
        .iter()
        .map(|cells| pad_row(cells))
        .filter_map(|cells| normalize_row(&cells, trade_date))
        .collect();
    Ok(records)
}

fn pad_row(cells: &[String]) -> Vec<String> {
    (0..RAW_COLUMNS)
        .map(|i| cells.get(i).cloned().unwrap_or_default())
        .collect()
}

fn date_from_filename(filename: &str) -> Option<NaiveDate> {
    let captured = FILENAME_DATE.captures(filename)?.get(1)?;
    NaiveDate::parse_from_str(captured.as_str(), "%B %d, %Y").ok()
}

// One body row onto the canonical schema. Returns None for sector
// headers, ad fragments and rows failing the required-field check.
fn normalize_row(cells: &[String], trade_date: NaiveDate) -> Option<model::OhlcvRecord> {
    let cell = |index: usize| cells.get(index).map(String::as_str).unwrap_or("");

    let code = clean::non_null(cell(COL_CODE))?;
    if clean::is_garbage_row(code) {
        return None;
    }
    let name = clean::non_null(cell(COL_NAME))?;
    let closing_price = clean::parse_f64(cell(COL_PRICE))?;

    Some(model::OhlcvRecord {
        trade_date,
        ticker: code.to_string(),
        company_name: Some(name.to_string()),
        opening_price: None, // The NSE page does not publish an open.
        high: clean::parse_f64(cell(COL_HIGH_DAY)),
        low: clean::parse_f64(cell(COL_LOW_DAY)),
        closing_price,
        volume: clean::parse_i64(cell(COL_VOLUME)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Five body rows: three securities, one sector header, one ad
    // fragment. Filtering must leave exactly three records.
    const SNAPSHOT: &str = r#"
        <html><body>
        <table><tr><td>menu</td></tr></table>
        <table>
          <tr><th>Code</th><th>Name</th><th>12m Low</th><th>12m High</th>
              <th>Day Low</th><th>Day High</th><th>Price</th><th>Previous</th>
              <th>Change</th><th>Change%</th><th>Dir</th><th>Volume</th><th>Adjusted</th></tr>
          <tr><td>Banking</td><td></td><td></td><td></td><td></td><td></td>
              <td></td><td></td><td></td><td></td><td></td><td></td><td></td></tr>
          <tr><td>KCB</td><td>KCB Group Plc</td><td>18.00</td><td>45.00</td>
              <td>30.25</td><td>31.00</td><td>30.50</td><td>30.00</td>
              <td>0.50</td><td>1.67%</td><td>up</td><td>1,200,400</td><td>30.50</td></tr>
          <tr><td>EQTY</td><td>Equity Group Holdings</td><td>33.00</td><td>52.00</td>
              <td>40.00</td><td>41.50</td><td>41.00</td><td>40.75</td>
              <td>0.25</td><td>0.61%</td><td>up</td><td>890,100</td><td>41.00</td></tr>
          <tr><td>Discover more (adsbygoogle=window.adsbygoogle||[]).push({})</td>
              <td></td><td></td><td></td><td></td><td></td><td></td><td></td>
              <td></td><td></td><td></td><td></td><td></td></tr>
          <tr><td>SCOM</td><td>Safaricom Plc</td><td>11.00</td><td>20.00</td>
              <td>14.00</td><td>14.55</td><td>14.20</td><td>14.10</td>
              <td>0.10</td><td>0.71%</td><td>up</td><td>25,000,000</td><td>14.20</td></tr>
        </table>
        </body></html>"#;

    #[test]
    fn snapshot_yields_only_security_rows() {
        let records = parse_snapshot("NSE Friday, March 14, 2025.html", SNAPSHOT).unwrap();
        assert_eq!(records.len(), 3);

        let kcb = &records[0];
        assert_eq!(kcb.ticker, "KCB");
        assert_eq!(kcb.company_name.as_deref(), Some("KCB Group Plc"));
        assert_eq!(kcb.closing_price, 30.5);
        assert_eq!(kcb.high, Some(31.0));
        assert_eq!(kcb.low, Some(30.25));
        assert_eq!(kcb.volume, Some(1_200_400));
        assert_eq!(
            kcb.trade_date,
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
        );
    }

    #[test]
    fn rows_missing_required_fields_are_dropped() {
        let mut cells: Vec<String> = vec![String::new(); RAW_COLUMNS];
        cells[COL_CODE] = "KCB".into();
        cells[COL_NAME] = "KCB Group Plc".into();
        // No price.
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert!(normalize_row(&cells, date).is_none());

        cells[COL_PRICE] = "30.50".into();
        assert!(normalize_row(&cells, date).is_some());

        cells[COL_NAME] = "-".into();
        assert!(normalize_row(&cells, date).is_none());
    }

    #[test]
    fn bad_filename_is_a_skip_not_a_panic() {
        let err = parse_snapshot("nse_snapshot.html", SNAPSHOT).unwrap_err();
        assert!(err.contains("no date found"));
    }

    #[test]
    fn missing_table_is_a_skip() {
        let err = parse_snapshot(
            "NSE Friday, March 14, 2025.html",
            "<html><body><p>maintenance</p></body></html>",
        )
        .unwrap_err();
        assert!(err.contains("price table not found"));
    }
}
