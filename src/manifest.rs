//! Manifest CSV readers: the DSE endpoint list and the JSE ticker lists.

use std::{collections::HashSet, path::Path};

use crate::model::{self, IngestError};

// Header keywords that mark the URL column of an endpoint manifest.
const URL_KEYWORDS: [&str; 4] = ["url", "link", "api", "endpoint"];

/// Reads an endpoint manifest. The URL column is auto-detected by header
/// keyword, falling back to the first column with a warning. Blank
/// entries are dropped, duplicates collapsed, and entries that do not
/// parse as URLs skipped with a log entry.
pub fn read_url_manifest(manifest_path: &str) -> model::Result<Vec<String>> {
    let mut reader = open_manifest(manifest_path)?;

    let headers = reader.headers()?.clone();
    let url_column = headers.iter().position(|header| {
        let lowered = header.to_lowercase();
        URL_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
    });
    let url_column = match url_column {
        Some(index) => index,
        None => {
            log::warn!(
                "no URL column detected in {}, using first column '{}'",
                manifest_path,
                headers.get(0).unwrap_or("")
            );
            0
        }
    };

    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record?;
        let entry = record.get(url_column).unwrap_or("").trim();
        if entry.is_empty() || !seen.insert(entry.to_string()) {
            continue;
        }
        if url::Url::parse(entry).is_err() {
            log::warn!("skipping unparsable URL in {}: {}", manifest_path, entry);
            continue;
        }
        urls.push(entry.to_string());
    }

    if urls.is_empty() {
        return Err(IngestError::EmptyManifest(manifest_path.into()));
    }
    Ok(urls)
}

/// Reads a ticker manifest. The `ticker` column is required; the header
/// match ignores case and surrounding whitespace.
pub fn read_ticker_manifest(manifest_path: &str) -> model::Result<Vec<String>> {
    let mut reader = open_manifest(manifest_path)?;

    let headers = reader.headers()?.clone();
    let ticker_column = headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case("ticker"))
        .ok_or_else(|| {
            IngestError::MissingManifestColumn(manifest_path.into(), "ticker".into())
        })?;

    let mut tickers = Vec::new();
    for record in reader.records() {
        let record = record?;
        let ticker = record.get(ticker_column).unwrap_or("").trim();
        if !ticker.is_empty() {
            tickers.push(ticker.to_string());
        }
    }

    if tickers.is_empty() {
        return Err(IngestError::EmptyManifest(manifest_path.into()));
    }
    Ok(tickers)
}

fn open_manifest(manifest_path: &str) -> model::Result<csv::Reader<std::fs::File>> {
    let path = Path::new(manifest_path);
    if !path.exists() {
        return Err(IngestError::FileNotFound(manifest_path.into()));
    }
    Ok(csv::ReaderBuilder::new().flexible(true).from_path(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_manifest(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("afx_manifest_{name}_{}", std::process::id()));
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn detects_url_column_by_keyword() {
        let path = write_manifest(
            "keyword",
            "company,api_endpoint\nCRDB,https://api.dse.co.tz/a\nNMB,https://api.dse.co.tz/b\n",
        );
        let urls = read_url_manifest(&path).unwrap();
        assert_eq!(urls, vec!["https://api.dse.co.tz/a", "https://api.dse.co.tz/b"]);
        fs::remove_file(path).ok();
    }

    #[test]
    fn dedupes_and_skips_bad_entries() {
        let path = write_manifest(
            "dedupe",
            "url\nhttps://api.dse.co.tz/a\n\nnot a url\nhttps://api.dse.co.tz/a\n",
        );
        let urls = read_url_manifest(&path).unwrap();
        assert_eq!(urls, vec!["https://api.dse.co.tz/a"]);
        fs::remove_file(path).ok();
    }

    #[test]
    fn missing_manifest_is_fatal() {
        let err = read_url_manifest("data/does_not_exist.csv").unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound(_)));
    }

    #[test]
    fn ticker_header_match_is_lenient() {
        let path = write_manifest("ticker", " Ticker ,name\nAGL.JO,Anglo\nSOL.JO,Sasol\n");
        let tickers = read_ticker_manifest(&path).unwrap();
        assert_eq!(tickers, vec!["AGL.JO", "SOL.JO"]);
        fs::remove_file(path).ok();
    }

    #[test]
    fn ticker_column_is_required() {
        let path = write_manifest("noticker", "symbol\nAGL.JO\n");
        let err = read_ticker_manifest(&path).unwrap_err();
        assert!(matches!(err, IngestError::MissingManifestColumn(_, _)));
        fs::remove_file(path).ok();
    }
}
