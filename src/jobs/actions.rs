//! NSE corporate-actions job: loads the dividend, distribution, bonus
//! and rights CSV files into their tables, reformatting the date columns
//! (`%d-%b-%Y`) to ISO on the way. Rights issues share the bonus table.

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;

use crate::report::{RunReport, SourceOutcome};
use crate::{constants, model, store};

struct ActionFile {
    file: &'static str,
    table: &'static str,
    date_columns: &'static [&'static str],
}

const ACTION_FILES: [ActionFile; 4] = [
    ActionFile {
        file: "nse_dividends.csv",
        table: constants::NSE_DIVIDENDS_TABLE,
        date_columns: &["announcement_date", "record_date", "pay_date"],
    },
    ActionFile {
        file: "nse_distributions.csv",
        table: constants::NSE_DISTRIBUTIONS_TABLE,
        date_columns: &["announcement_date", "record_date", "pay_date"],
    },
    ActionFile {
        file: "nse_bonus_issues.csv",
        table: constants::NSE_BONUS_TABLE,
        date_columns: &["announcement_date", "book_closure_date", "credit_date"],
    },
    ActionFile {
        file: "nse_rights.csv",
        table: constants::NSE_BONUS_TABLE,
        date_columns: &["announcement_date", "book_closure_date", "credit_date"],
    },
];

pub fn run(actions_dir: &str, mut conn: Connection) -> model::Result<()> {
    let mut report = RunReport::new();
    let mut loaded_total = 0usize;

    for action in &ACTION_FILES {
        let path = Path::new(actions_dir).join(action.file);
        if !path.exists() {
            log::warn!("nse-actions: {} not found, skipping", path.display());
            report.record(action.file, now_local(), SourceOutcome::Skipped {
                reason: "file not found".into(),
            });
            continue;
        }

        match load_file(&path, action.date_columns) {
            Ok((columns, rows)) => {
                store::actions::create_table(&conn, action.table, &columns)?;
                let appended = store::actions::append_rows(&mut conn, action.table, &columns, &rows)?;
                loaded_total += appended;
                log::info!("nse-actions: {} -> {} rows into {}", action.file, appended, action.table);
                report.record(action.file, now_local(), SourceOutcome::Loaded { rows: appended });
            }
            Err(reason) => {
                log::error!("nse-actions: {}: {}", action.file, reason);
                report.record(action.file, now_local(), SourceOutcome::Failed {
                    reason,
                    status_code: None,
                    attempts: 1,
                });
            }
        }
    }

    report.log_summary("nse-actions");
    if loaded_total == 0 {
        return Err(model::IngestError::NothingLoaded(
            "no corporate-action file produced any rows".into(),
        ));
    }
    Ok(())
}

fn now_local() -> String {
    Utc::now()
        .with_timezone(&constants::NSE_TZ)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

// Reads one CSV whole: header as the column set, every cell as text,
// with the named date columns rewritten to ISO. An unparsable date fails
// the file, not the job.
fn load_file(
    path: &Path,
    date_columns: &[&str],
) -> Result<(Vec<String>, Vec<Vec<Option<String>>>), String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| e.to_string())?;

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut date_indices = Vec::new();
    for date_column in date_columns {
        let index = columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(date_column))
            .ok_or_else(|| format!("missing date column '{date_column}'"))?;
        date_indices.push(index);
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        let mut row: Vec<Option<String>> = (0..columns.len())
            .map(|i| {
                let cell = record.get(i).unwrap_or("").trim();
                if cell.is_empty() { None } else { Some(cell.to_string()) }
            })
            .collect();

        for &index in &date_indices {
            if let Some(raw) = row[index].clone() {
                let date = NaiveDate::parse_from_str(&raw, "%d-%b-%Y")
                    .map_err(|_| format!("row {}: unparsable date '{}'", line + 1, raw))?;
                row[index] = Some(date.format("%Y-%m-%d").to_string());
            }
        }
        rows.push(row);
    }
    Ok((columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn dates_are_reformatted_to_iso() {
        let path = std::env::temp_dir().join(format!("afx_dividends_{}.csv", std::process::id()));
        fs::write(
            &path,
            "ticker,announcement_date,record_date,pay_date,amount\n\
             SCOM,20-Feb-2025,06-Mar-2025,28-Mar-2025,1.20\n\
             KCB,14-Mar-2025,,30-Apr-2025,\n",
        )
        .unwrap();

        let (columns, rows) =
            load_file(&path, &["announcement_date", "record_date", "pay_date"]).unwrap();
        assert_eq!(columns[1], "announcement_date");
        assert_eq!(rows[0][1].as_deref(), Some("2025-02-20"));
        assert_eq!(rows[0][3].as_deref(), Some("2025-03-28"));
        // Blank date cells stay missing.
        assert_eq!(rows[1][2], None);
        assert_eq!(rows[1][4], None);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn bad_date_fails_the_file() {
        let path = std::env::temp_dir().join(format!("afx_baddate_{}.csv", std::process::id()));
        fs::write(&path, "ticker,announcement_date\nSCOM,Feb 20 2025\n").unwrap();
        let err = load_file(&path, &["announcement_date"]).unwrap_err();
        assert!(err.contains("unparsable date"));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn job_loads_present_files_and_skips_missing_ones() {
        let dir = std::env::temp_dir().join(format!("afx_actions_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("nse_dividends.csv"),
            "ticker,announcement_date,record_date,pay_date\nSCOM,20-Feb-2025,06-Mar-2025,28-Mar-2025\n",
        )
        .unwrap();

        let conn = Connection::open_in_memory().unwrap();
        run(&dir.to_string_lossy(), conn).unwrap();
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_run_is_fatal() {
        let dir = std::env::temp_dir().join(format!("afx_actions_empty_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let conn = Connection::open_in_memory().unwrap();
        let err = run(&dir.to_string_lossy(), conn).unwrap_err();
        assert!(matches!(err, model::IngestError::NothingLoaded(_)));
        fs::remove_dir_all(&dir).ok();
    }
}
