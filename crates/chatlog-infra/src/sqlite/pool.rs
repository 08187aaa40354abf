//! Database pool with split reader/writer connections in WAL mode.
//!
//! SQLite allows only one writer at a time. This module provides a `DatabasePool`
//! with a multi-connection reader pool for concurrent reads and a single-connection
//! writer pool for serialized writes. Both use WAL journal mode and a busy timeout.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chatlog_types::config::SqliteConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::debug;

/// Split read/write pool for SQLite with WAL mode.
///
/// - `reader`: Multi-connection pool for concurrent SELECT queries.
/// - `writer`: Single-connection pool for serialized INSERT/UPDATE/DELETE.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Create a new DatabasePool with split reader/writer connections.
    ///
    /// Creates the message and title collections on the writer if they do not
    /// exist yet, then opens the read-only reader pool.
    pub async fn new(database_url: &str, config: &SqliteConfig) -> Result<Self, sqlx::Error> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs))
            .create_if_missing(true);

        let read_opts = base_opts.clone().read_only(true);
        let write_opts = base_opts;
        let acquire_timeout = Duration::from_secs(config.acquire_timeout_secs);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(acquire_timeout)
            .connect_with(write_opts)
            .await?;

        // Schema must exist before the read-only pool connects.
        for statement in schema_statements(config) {
            sqlx::query(&statement).execute(&writer).await?;
        }
        debug!(
            messages = %config.messages_collection,
            titles = %config.titles_collection,
            "SQLite schema ready"
        );

        let reader = SqlitePoolOptions::new()
            .max_connections(config.max_read_connections)
            .acquire_timeout(acquire_timeout)
            .connect_with(read_opts)
            .await?;

        Ok(Self { reader, writer })
    }

    /// Close both pools, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.writer.close().await;
        self.reader.close().await;
    }
}

/// Build the sqlx connection URL for the configured database.
///
/// `url` wins; otherwise `path`, otherwise `{data_dir}/{database}.db`.
pub fn database_url(config: &SqliteConfig, data_dir: &Path) -> String {
    if let Some(url) = &config.url {
        return url.clone();
    }
    let path = config
        .path
        .clone()
        .unwrap_or_else(|| data_dir.join(format!("{}.db", config.database)));
    format!("sqlite://{}?mode=rwc", path.display())
}

/// DDL for the two collections. Names are validated identifiers.
fn schema_statements(config: &SqliteConfig) -> Vec<String> {
    let messages = &config.messages_collection;
    let titles = &config.titles_collection;
    vec![
        format!(
            r#"CREATE TABLE IF NOT EXISTS {messages} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                sequence INTEGER NOT NULL CHECK (sequence BETWEEN 1 AND 4294967295),
                role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (user_id, session_id, sequence)
            )"#
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS {titles} (
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, session_id)
            )"#
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{titles}_user_updated ON {titles} (user_id, updated_at DESC)"
        ),
    ]
}
