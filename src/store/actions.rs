use rusqlite::{Connection, Result, types::Value};

use crate::model;

// Corporate-action files carry their own column sets, so the tables are
// created from the CSV header, everything TEXT. Date columns arrive
// already reformatted to ISO by the job.

pub fn create_table(conn: &Connection, table: &str, columns: &[String]) -> Result<()> {
    let column_defs: Vec<String> = columns
        .iter()
        .map(|name| format!("{} TEXT", quote_ident(name)))
        .collect();
    conn.execute(
        &format!("CREATE TABLE IF NOT EXISTS {table} ({});", column_defs.join(", ")),
        [],
    )?;
    Ok(())
}

/// Appends raw string rows inside one transaction. Row cells map onto
/// the given columns positionally; missing cells load as NULL.
pub fn append_rows(
    conn: &mut Connection,
    table: &str,
    columns: &[String],
    rows: &[Vec<Option<String>>],
) -> Result<usize> {
    let column_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();

    let transaction = conn.transaction()?;
    {
        let mut stmt = transaction.prepare(&format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            column_list.join(", "),
            placeholders.join(", ")
        ))?;
        for row in rows {
            let values: Vec<Value> = (0..columns.len())
                .map(|i| match row.get(i).and_then(|cell| cell.clone()) {
                    Some(text) => Value::Text(text),
                    None => Value::Null,
                })
                .collect();
            stmt.execute(rusqlite::params_from_iter(values))?;
        }
    }
    transaction.commit()?;
    Ok(rows.len())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// Keeps the module's error type aligned with the rest of the store.
pub fn count_rows(conn: &Connection, table: &str) -> model::Result<i64> {
    Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_load_positionally_with_null_padding() {
        let mut conn = Connection::open_in_memory().unwrap();
        let columns: Vec<String> = ["ticker", "announcement_date", "amount"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        create_table(&conn, "actions_test", &columns).unwrap();

        let rows = vec![
            vec![Some("SCOM".into()), Some("2025-02-20".into()), Some("1.20".into())],
            vec![Some("KCB".into()), None],
        ];
        assert_eq!(append_rows(&mut conn, "actions_test", &columns, &rows).unwrap(), 2);

        let amount: Option<String> = conn
            .query_row(
                "SELECT amount FROM actions_test WHERE ticker = 'KCB'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(amount, None);
        assert_eq!(count_rows(&conn, "actions_test").unwrap(), 2);
    }
}
