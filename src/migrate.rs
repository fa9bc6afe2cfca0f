//! One-off mirror of the local SQLite database into a hosted Postgres
//! server. Only tables absent on the server are migrated: schema via
//! `PRAGMA table_info` with declared types mapped to Postgres, rows
//! copied in LIMIT/OFFSET batches with multi-row inserts kept under the
//! bind-parameter limit.

use rusqlite::{Connection, types::Value};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::{constants, model};

struct ColumnDef {
    name: String,
    pg_type: &'static str,
    not_null: bool,
}

pub async fn run(conn: Connection) -> model::Result<()> {
    let pg_url = std::env::var("postgres_url")?;
    let pool = PgPool::connect(&pg_url).await?;

    let sqlite_tables = list_sqlite_tables(&conn)?;
    log::info!("migrate: {} tables in SQLite", sqlite_tables.len());

    let existing = list_pg_tables(&pool).await?;
    log::info!("migrate: {} tables already on the server", existing.len());

    let to_migrate: Vec<&String> = sqlite_tables
        .iter()
        .filter(|table| !existing.contains(*table))
        .collect();
    log::info!("migrate: {} tables to migrate", to_migrate.len());
    for table in &to_migrate {
        log::info!("migrate:   {}", table);
    }

    for table in to_migrate {
        migrate_table(&conn, &pool, table).await?;
    }

    log::info!("migrate: complete");
    Ok(())
}

fn list_sqlite_tables(conn: &Connection) -> model::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tables)
}

async fn list_pg_tables(pool: &PgPool) -> model::Result<Vec<String>> {
    let rows = sqlx::query("SELECT tablename FROM pg_tables WHERE schemaname = 'public'")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|row| row.get("tablename")).collect())
}

async fn migrate_table(conn: &Connection, pool: &PgPool, table: &str) -> model::Result<()> {
    log::info!("migrate: processing {}", table);

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
        [],
        |row| row.get(0),
    )?;
    log::info!("migrate: {} has {} rows", table, total);
    if total == 0 {
        log::info!("migrate: skipping empty table {}", table);
        return Ok(());
    }

    let schema = table_schema(conn, table)?;
    create_pg_table(pool, table, &schema).await?;

    // Rows per INSERT, bounded by the Postgres bind-parameter cap.
    let rows_per_insert = (constants::PG_BIND_LIMIT / schema.len()).max(1);

    let mut offset: i64 = 0;
    while offset < total {
        let rows = read_batch(conn, table, schema.len(), offset)?;
        if rows.is_empty() {
            break;
        }
        for chunk in rows.chunks(rows_per_insert) {
            insert_chunk(pool, table, &schema, chunk).await?;
        }

        offset += rows.len() as i64;
        log::info!("migrate: {}: {}/{} rows copied", table, offset.min(total), total);
    }

    log::info!("migrate: completed {}", table);
    Ok(())
}

fn table_schema(conn: &Connection, table: &str) -> model::Result<Vec<ColumnDef>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| {
            let name: String = row.get("name")?;
            let declared: Option<String> = row.get("type")?;
            let not_null: bool = row.get("notnull")?;
            Ok(ColumnDef {
                name,
                pg_type: map_type(declared.as_deref().unwrap_or("")),
                not_null,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

// SQLite declared type onto the Postgres type, length suffixes ignored.
fn map_type(declared: &str) -> &'static str {
    let base = declared
        .split('(')
        .next()
        .unwrap_or("")
        .trim()
        .to_uppercase();
    match base.as_str() {
        "INTEGER" => "BIGINT",
        "REAL" => "DOUBLE PRECISION",
        "TEXT" => "TEXT",
        "BLOB" => "BYTEA",
        "NUMERIC" => "NUMERIC",
        "BOOLEAN" => "BOOLEAN",
        "DATE" => "DATE",
        "DATETIME" => "TIMESTAMP",
        _ => "TEXT",
    }
}

async fn create_pg_table(pool: &PgPool, table: &str, schema: &[ColumnDef]) -> model::Result<()> {
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
        .execute(pool)
        .await?;

    let columns: Vec<String> = schema
        .iter()
        .map(|col| {
            let constraint = if col.not_null { " NOT NULL" } else { "" };
            format!("{} {}{}", quote_ident(&col.name), col.pg_type, constraint)
        })
        .collect();
    sqlx::query(&format!(
        "CREATE TABLE {} ({})",
        quote_ident(table),
        columns.join(", ")
    ))
    .execute(pool)
    .await?;
    Ok(())
}

fn read_batch(
    conn: &Connection,
    table: &str,
    column_count: usize,
    offset: i64,
) -> model::Result<Vec<Vec<Value>>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM {} LIMIT ?1 OFFSET ?2",
        quote_ident(table)
    ))?;
    let rows = stmt
        .query_map(
            rusqlite::params![constants::MIGRATION_BATCH_SIZE, offset],
            |row| {
                (0..column_count)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// Multi-row VALUES insert. Every bind carries an explicit cast to the
// mapped column type, since all parameters arrive untyped.
async fn insert_chunk(
    pool: &PgPool,
    table: &str,
    schema: &[ColumnDef],
    rows: &[Vec<Value>],
) -> model::Result<()> {
    let column_list: Vec<String> = schema.iter().map(|col| quote_ident(&col.name)).collect();
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        quote_ident(table),
        column_list.join(", ")
    ));

    builder.push_values(rows, |mut b, row| {
        for (value, col) in row.iter().zip(schema) {
            match value {
                Value::Null => {
                    b.push_bind(Option::<String>::None);
                }
                Value::Integer(n) => {
                    b.push_bind(*n);
                }
                Value::Real(f) => {
                    b.push_bind(*f);
                }
                Value::Text(s) => {
                    b.push_bind(s.clone());
                }
                Value::Blob(bytes) => {
                    b.push_bind(bytes.clone());
                }
            }
            b.push_unseparated(format!("::{}", col.pg_type));
        }
    });

    builder.build().execute(pool).await?;
    Ok(())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_types_map_to_postgres() {
        assert_eq!(map_type("INTEGER"), "BIGINT");
        assert_eq!(map_type("real"), "DOUBLE PRECISION");
        assert_eq!(map_type("VARCHAR(80)"), "TEXT");
        assert_eq!(map_type("BLOB"), "BYTEA");
        assert_eq!(map_type("DATETIME"), "TIMESTAMP");
        assert_eq!(map_type(""), "TEXT");
    }

    #[test]
    fn sqlite_internal_tables_are_not_listed() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE a (n INTEGER); CREATE TABLE b (n INTEGER);
             CREATE INDEX idx_a ON a (n);",
        )
        .unwrap();
        let tables = list_sqlite_tables(&conn).unwrap();
        assert_eq!(tables, vec!["a", "b"]);
    }

    #[test]
    fn schema_reads_names_types_and_nullability() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (trade_date TEXT NOT NULL, closing_price REAL, volume INTEGER);",
        )
        .unwrap();
        let schema = table_schema(&conn, "t").unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema[0].name, "trade_date");
        assert_eq!(schema[0].pg_type, "TEXT");
        assert!(schema[0].not_null);
        assert_eq!(schema[1].pg_type, "DOUBLE PRECISION");
        assert!(!schema[1].not_null);
        assert_eq!(schema[2].pg_type, "BIGINT");
    }

    #[test]
    fn batches_page_through_the_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (n INTEGER);").unwrap();
        for i in 0..5 {
            conn.execute("INSERT INTO t VALUES (?1)", [i]).unwrap();
        }
        let all = read_batch(&conn, "t", 1, 0).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0][0], Value::Integer(0));
        let rest = read_batch(&conn, "t", 1, 3).unwrap();
        assert_eq!(rest.len(), 2);
    }
}
