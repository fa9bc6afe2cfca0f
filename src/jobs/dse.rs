//! DSE (Dar es Salaam) equities job: fetch each endpoint from the
//! manifest with persistent retry, keep the latest record per endpoint,
//! normalize and append. Endpoints that exhaust the retry ceiling land
//! in failed_links.csv.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde_json::Value;

use crate::http::retry::{self, RetryPolicy};
use crate::report::{RunReport, SourceOutcome};
use crate::{clean, constants, manifest, model, store};

pub async fn run(manifest_path: &str, mut conn: Connection) -> model::Result<()> {
    let urls = manifest::read_url_manifest(manifest_path)?;
    log::info!("dse: {} endpoints to process", urls.len());

    store::ohlcv::create_table(&conn, constants::DSE_TABLE)?;

    let policy = RetryPolicy::default();
    let mut report = RunReport::new();
    let mut batch = Vec::new();

    for (i, url) in urls.iter().enumerate() {
        log::info!("dse: endpoint {}/{}: {}", i + 1, urls.len(), url);

        match retry::fetch_json_records(url, &policy).await {
            Ok(success) => {
                let record = latest_record(&success.records);
                match normalize(record) {
                    Some(normalized) => {
                        let meta = model::SourceMeta {
                            source: url.clone(),
                            fetched_at: now_local(),
                            attempts: success.attempts,
                        };
                        batch.push((normalized, meta));
                        report.record(url, now_local(), SourceOutcome::Loaded { rows: 1 });
                    }
                    None => {
                        report.record(url, now_local(), SourceOutcome::Skipped {
                            reason: "latest record is missing ticker, closing price or trade date"
                                .into(),
                        });
                    }
                }
            }
            Err(failure) => {
                log::error!("dse: giving up on {} after {} attempts: {}",
                    url, failure.attempts, failure.error);
                report.record(url, now_local(), SourceOutcome::Failed {
                    reason: failure.error,
                    status_code: failure.status_code,
                    attempts: failure.attempts,
                });
            }
        }

        if i + 1 < urls.len() {
            tokio::time::sleep(Duration::from_millis(constants::INTER_SOURCE_DELAY_MS)).await;
        }
    }

    if !batch.is_empty() {
        let appended = store::ohlcv::append_records(&mut conn, constants::DSE_TABLE, &batch)?;
        log::info!("dse: appended {} rows to {}", appended, constants::DSE_TABLE);
    }

    let failures = report.write_failure_csv(constants::FAILED_LINKS_CSV)?;
    if failures > 0 {
        log::warn!("dse: {} failed endpoints written to {}", failures, constants::FAILED_LINKS_CSV);
    }
    report.log_summary("dse");
    Ok(())
}

fn now_local() -> String {
    Utc::now()
        .with_timezone(&constants::DSE_TZ)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

// The column whose name mentions a date or time, read off the first
// record. Endpoints are uniform within themselves.
fn detect_date_key(record: &Value) -> Option<String> {
    let map = record.as_object()?;
    map.keys()
        .find(|key| {
            let lowered = key.to_lowercase();
            lowered.contains("date") || lowered.contains("time")
        })
        .cloned()
}

/// The record with the latest parsable date, falling back to the last
/// record when no date key or no parsable date exists.
pub fn latest_record(records: &[Value]) -> &Value {
    let fallback = &records[records.len() - 1];
    let date_key = match detect_date_key(&records[0]) {
        Some(key) => key,
        None => return fallback,
    };

    records
        .iter()
        .filter_map(|record| {
            let raw = record.get(&date_key)?.as_str()?;
            clean::parse_date_lenient(raw).map(|date| (date, record))
        })
        .max_by_key(|(date, _)| *date)
        .map(|(_, record)| record)
        .unwrap_or(fallback)
}

// DSE payload fields onto the canonical schema. The endpoint serves
// numbers as either JSON numbers or formatted strings.
fn normalize(record: &Value) -> Option<model::OhlcvRecord> {
    let trade_date = field_date(record, "trade_date")?;
    let ticker = record.get("company")?.as_str().map(str::trim)?;
    if ticker.is_empty() {
        return None;
    }
    let closing_price = field_f64(record, "closing_price")?;

    Some(model::OhlcvRecord {
        trade_date,
        ticker: ticker.to_string(),
        company_name: None,
        opening_price: field_f64(record, "opening_price"),
        high: field_f64(record, "high"),
        low: field_f64(record, "low"),
        closing_price,
        volume: field_i64(record, "volume"),
    })
}

fn field_f64(record: &Value, key: &str) -> Option<f64> {
    match record.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => clean::parse_f64(s),
        _ => None,
    }
}

fn field_i64(record: &Value, key: &str) -> Option<i64> {
    match record.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|v| v as i64)),
        Value::String(s) => clean::parse_i64(s),
        _ => None,
    }
}

fn field_date(record: &Value, key: &str) -> Option<NaiveDate> {
    clean::parse_date_lenient(record.get(key)?.as_str()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn latest_record_wins_by_date() {
        let records = vec![
            json!({"trade_date": "2025-03-12", "company": "CRDB", "closing_price": 500}),
            json!({"trade_date": "2025-03-14", "company": "CRDB", "closing_price": 510}),
            json!({"trade_date": "2025-03-13", "company": "CRDB", "closing_price": 505}),
        ];
        let latest = latest_record(&records);
        assert_eq!(latest["trade_date"], "2025-03-14");
    }

    #[test]
    fn falls_back_to_last_record_without_dates() {
        let records = vec![
            json!({"company": "CRDB", "closing_price": 500}),
            json!({"company": "CRDB", "closing_price": 510}),
        ];
        assert_eq!(latest_record(&records)["closing_price"], 510);

        // Date key present but nothing parses.
        let records = vec![
            json!({"trade_date": "??", "closing_price": 1}),
            json!({"trade_date": "??", "closing_price": 2}),
        ];
        assert_eq!(latest_record(&records)["closing_price"], 2);
    }

    #[test]
    fn normalize_coerces_string_numbers() {
        let record = json!({
            "trade_date": "2025-03-14",
            "company": " CRDB ",
            "opening_price": "1,250.00",
            "high": 1260,
            "low": null,
            "closing_price": "1,255.00",
            "volume": "12,400"
        });
        let normalized = normalize(&record).unwrap();
        assert_eq!(normalized.ticker, "CRDB");
        assert_eq!(normalized.opening_price, Some(1250.0));
        assert_eq!(normalized.high, Some(1260.0));
        assert_eq!(normalized.low, None);
        assert_eq!(normalized.closing_price, 1255.0);
        assert_eq!(normalized.volume, Some(12_400));
    }

    #[test]
    fn required_fields_gate_the_record() {
        // Missing closing price.
        assert!(normalize(&json!({"trade_date": "2025-03-14", "company": "CRDB"})).is_none());
        // Missing ticker.
        assert!(normalize(&json!({"trade_date": "2025-03-14", "closing_price": 5})).is_none());
        // Unparsable trade date.
        assert!(normalize(&json!({"trade_date": "soon", "company": "CRDB", "closing_price": 5}))
            .is_none());
    }
}
