use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::constants;
use crate::model::{self, IngestError};

/// Opens the local database, creating it if needed. The file comes from
/// the `sqlite_file` env var, with the constants default as fallback.
pub fn init_connection() -> model::Result<Connection> {
    let sqlite_file =
        std::env::var("sqlite_file").unwrap_or_else(|_| constants::DEFAULT_SQLITE_FILE.into());

    if let Some(parent) = Path::new(&sqlite_file).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open_with_flags(
        &sqlite_file,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_row| Ok(()))?;
    Ok(conn)
}

/// Runs an external SQL script as a single batch. The pipeline uses this
/// for the post-load autofill scripts.
pub fn run_sql_file(conn: &Connection, sql_file: &str) -> model::Result<()> {
    let path = Path::new(sql_file);
    if !path.exists() {
        return Err(IngestError::FileNotFound(sql_file.into()));
    }
    let sql = std::fs::read_to_string(path)?;
    conn.execute_batch(&sql)?;
    log::info!("finished SQL script {}", sql_file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_sql_file_executes_a_batch() {
        let conn = Connection::open_in_memory().unwrap();
        let path = std::env::temp_dir().join(format!("afx_cleanup_{}.sql", std::process::id()));
        std::fs::write(
            &path,
            "CREATE TABLE t (n INTEGER); INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);",
        )
        .unwrap();

        run_sql_file(&conn, &path.to_string_lossy()).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_script_is_reported() {
        let conn = Connection::open_in_memory().unwrap();
        let err = run_sql_file(&conn, "sql/nope.sql").unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound(_)));
    }
}
