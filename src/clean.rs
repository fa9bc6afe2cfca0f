//! Normalizer primitives shared by the exchange jobs: null-marker
//! handling, numeric and date coercion, and the NSE garbage-row patterns.

use chrono::NaiveDate;
use regex::Regex;

lazy_static::lazy_static! {
    // Section headers the NSE price table interleaves with security rows.
    static ref SECTOR_PATTERN: Regex = Regex::new(
        "(?i)Agricultural|\
         Automobiles and Accessories|\
         Banking|\
         Commercial and Services|\
         Construction and Allied|\
         Energy and Petroleum|\
         Insurance|\
         Investment$|\
         Investment Services|\
         Manufacturing and Allied|\
         Telecommunication|\
         Real Estate Investment Trusts|\
         Exchange Traded Funds|\
         Indices"
    ).unwrap();

    static ref ADS_PATTERN: Regex =
        Regex::new(r"Discover more \(adsbygoogle=.*?\)").unwrap();
}

/// Collapses the null markers the exchange pages use into a real missing
/// value. Returns the trimmed text otherwise.
pub fn non_null(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    match trimmed {
        "" | "-" | "NA" | "N/A" => None,
        _ => Some(trimmed),
    }
}

/// Coerces a cell to f64: thousands separators (commas, spaces) and
/// percent signs are stripped first. Invalid values become None, and
/// already-clean numbers pass through unchanged.
pub fn parse_f64(raw: &str) -> Option<f64> {
    let cleaned = non_null(raw)?.replace([',', ' '], "").replace('%', "");
    cleaned.parse().ok()
}

/// BRVM variant: spaces are thousands separators and the comma is the
/// French decimal mark.
pub fn parse_f64_fr(raw: &str) -> Option<f64> {
    let cleaned = non_null(raw)?.replace(' ', "").replace(',', ".");
    cleaned.parse().ok()
}

/// Coerces a cell to a whole number, tolerating separators and a
/// trailing ".0" from sources that serve volumes as floats.
pub fn parse_i64(raw: &str) -> Option<i64> {
    let cleaned = non_null(raw)?.replace([',', ' '], "");
    cleaned
        .parse()
        .ok()
        .or_else(|| cleaned.parse::<f64>().ok().map(|v| v as i64))
}

/// Lenient date coercion for API payload values: ISO dates, ISO
/// datetimes (with or without offset) and the day-first form some
/// endpoints serve.
pub fn parse_date_lenient(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%d-%m-%Y", "%d/%m/%Y"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    None
}

/// True for NSE rows whose code cell is a sector header or an
/// advertisement fragment rather than a security.
pub fn is_garbage_row(code: &str) -> bool {
    SECTOR_PATTERN.is_match(code) || ADS_PATTERN.is_match(code)
}
