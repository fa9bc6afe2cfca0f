// module storing defaults
use chrono_tz::Tz;

// Local SQLite database file, overridable via the `sqlite_file` env var.
pub const DEFAULT_SQLITE_FILE: &str = "db/market_data.db";

// Exchange tables. One table per exchange/data-kind, append-only.
pub const BRVM_TABLE: &str = "brvm_daily_ohlcv";
pub const DSE_TABLE: &str = "dse_tz_daily_ohlcv";
pub const JSE_TABLE: &str = "jse_sa_daily_ohlcv";
pub const JSE_INDICES_TABLE: &str = "jse_indices_daily_ohlcv";
pub const NSE_TABLE: &str = "nse_ke_daily_ohlcv";

// Corporate-action tables. Rights issues share the bonus table.
pub const NSE_DIVIDENDS_TABLE: &str = "nse_corporate_actions_dividends";
pub const NSE_DISTRIBUTIONS_TABLE: &str = "nse_corporate_actions_distributions";
pub const NSE_BONUS_TABLE: &str = "nse_corporate_actions_bonus";

// Default input locations.
pub const DSE_MANIFEST: &str = "data/datalinks.csv";
pub const JSE_MANIFEST: &str = "data/jse_list.csv";
pub const JSE_INDICES_MANIFEST: &str = "data/jse_indices.csv";
pub const BRVM_SNAPSHOT_DIR: &str = "data/brvm";
pub const NSE_SNAPSHOT_DIR: &str = "data/nse";
pub const NSE_ACTIONS_DIR: &str = "data/corporate_actions";

// Post-load cleanup scripts run by the pipeline.
pub const DSE_CLEANUP_SQL: &str = "sql/autofill_dse.sql";
pub const NSE_CLEANUP_SQL: &str = "sql/autofill_nse.sql";
pub const JSE_CLEANUP_SQL: &str = "sql/autofill_jse.sql";

// Failure reports.
pub const FAILED_LINKS_CSV: &str = "failed_links.csv";

// DSE retry policy: up to 50 attempts, delay before attempt n+1 is
// RETRY_BASE_DELAY_SECS * n plus jitter in [0, 1) s, capped at the max.
pub const RETRY_MAX_ATTEMPTS: u32 = 50;
pub const RETRY_BASE_DELAY_SECS: f64 = 2.0;
pub const RETRY_MAX_DELAY_SECS: f64 = 30.0;

// Pause between DSE endpoints and between JSE tickers.
pub const INTER_SOURCE_DELAY_MS: u64 = 500;

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
pub const HTTP_TIMEOUT_SECS: u64 = 30;

// brvm.org serves a broken certificate chain, so the fetch goes through
// the lax client.
pub const BRVM_PAGE_URL: &str = "https://www.brvm.org/en/indices";
pub const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

// Exchange-local timezones, used for fetch timestamps and day bounds.
pub const DSE_TZ: Tz = chrono_tz::Africa::Dar_es_Salaam;
pub const NSE_TZ: Tz = chrono_tz::Africa::Nairobi;
pub const JSE_TZ: Tz = chrono_tz::Africa::Johannesburg;
pub const BRVM_TZ: Tz = chrono_tz::Africa::Abidjan;

// Migration copies rows in LIMIT/OFFSET batches of this size.
pub const MIGRATION_BATCH_SIZE: i64 = 10_000;
// Postgres caps bind parameters per statement at 65535.
pub const PG_BIND_LIMIT: usize = 65_535;
