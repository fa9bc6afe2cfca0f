use rusqlite::{Connection, Result, params};

use crate::model;

/// Initializes an exchange OHLCV table. All five exchange tables share
/// this layout: the canonical columns plus the per-run source metadata.
/// Append-only by design; re-running a job for an already-loaded date
/// duplicates rows, and the cleanup SQL owns whatever follows.
pub fn create_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                trade_date TEXT NOT NULL,
                ticker TEXT NOT NULL,
                company_name TEXT,
                opening_price REAL,
                high REAL,
                low REAL,
                closing_price REAL NOT NULL,
                volume INTEGER,
                source TEXT,
                fetched_at TEXT,
                fetch_attempts INTEGER
            );"
        ),
        [],
    )?;
    conn.execute(
        &format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_date_ticker ON {table} (trade_date, ticker);"
        ),
        [],
    )?;
    Ok(())
}

/// Appends a normalized batch inside one transaction.
pub fn append_records(
    conn: &mut Connection,
    table: &str,
    batch: &[(model::OhlcvRecord, model::SourceMeta)],
) -> Result<usize> {
    let transaction = conn.transaction()?;
    {
        let mut stmt = transaction.prepare(&format!(
            "INSERT INTO {table} (trade_date, ticker, company_name, opening_price, high, low,
                closing_price, volume, source, fetched_at, fetch_attempts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ))?;
        for (record, meta) in batch {
            stmt.execute(params![
                record.trade_date.format("%Y-%m-%d").to_string(),
                record.ticker,
                record.company_name,
                record.opening_price,
                record.high,
                record.low,
                record.closing_price,
                record.volume,
                meta.source,
                meta.fetched_at,
                meta.attempts,
            ])?;
        }
    }
    transaction.commit()?;
    Ok(batch.len())
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(ticker: &str) -> (model::OhlcvRecord, model::SourceMeta) {
        (
            model::OhlcvRecord {
                trade_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
                ticker: ticker.to_string(),
                company_name: Some("Sample Plc".into()),
                opening_price: Some(10.0),
                high: None,
                low: None,
                closing_price: 10.5,
                volume: Some(1_200),
            },
            model::SourceMeta {
                source: "snapshot.html".into(),
                fetched_at: "2025-03-14 17:00:00".into(),
                attempts: 1,
            },
        )
    }

    #[test]
    fn append_is_transactional_and_append_only() {
        let mut conn = Connection::open_in_memory().unwrap();
        create_table(&conn, "test_ohlcv").unwrap();

        let batch = vec![sample("AAA"), sample("BBB")];
        assert_eq!(append_records(&mut conn, "test_ohlcv", &batch).unwrap(), 2);
        // Re-running the same batch duplicates rows; there is no upsert.
        append_records(&mut conn, "test_ohlcv", &batch).unwrap();
        assert_eq!(count_rows(&conn, "test_ohlcv").unwrap(), 4);

        let (date, close): (String, f64) = conn
            .query_row(
                "SELECT trade_date, closing_price FROM test_ohlcv WHERE ticker = 'AAA' LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(date, "2025-03-14");
        assert_eq!(close, 10.5);
    }
}
