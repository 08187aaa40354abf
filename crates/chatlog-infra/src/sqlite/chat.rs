//! SQLite chat repository implementation.
//!
//! Implements `ChatRepository` from `chatlog-core` using sqlx with split read/write pools.
//! Raw queries, private Row structs, reads on the reader pool and writes on the
//! single-connection writer pool.
//!
//! Table names are configurable, so SQL is rendered once at construction
//! instead of being written as string literals at each call site.

use std::sync::Arc;

use chatlog_core::chat::repository::{ensure_sequence, ensure_user_id, ChatRepository};
use chatlog_types::chat::{
    ChatMessage, DeleteOutcome, MessageRole, NewMessage, SessionKey, SessionTitle,
};
use chatlog_types::config::SqliteConfig;
use chatlog_types::error::RepositoryError;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use tracing::{debug, error, warn};

use super::pool::DatabasePool;

/// Appends retried after a unique-index collision before giving up.
const MAX_APPEND_ATTEMPTS: usize = 5;

/// SQLITE_BUSY and SQLITE_LOCKED primary result codes.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// SQLite-backed implementation of `ChatRepository`.
///
/// Cloning shares the pool and the rendered statements.
#[derive(Clone)]
pub struct SqliteChatRepository {
    pool: DatabasePool,
    sql: Arc<Statements>,
}

impl SqliteChatRepository {
    /// Create a new repository backed by the given pool, using the collection
    /// names from `config`. The pool must have been opened with the same config.
    pub fn new(pool: DatabasePool, config: &SqliteConfig) -> Self {
        Self {
            pool,
            sql: Arc::new(Statements::render(
                &config.messages_collection,
                &config.titles_collection,
            )),
        }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

struct Statements {
    append: String,
    list: String,
    clear: String,
    delete_one: String,
    delete_from: String,
    session_ids: String,
    insert_title: String,
    get_title: String,
    get_titles: String,
    upsert_title: String,
    delete_title: String,
}

impl Statements {
    fn render(messages: &str, titles: &str) -> Self {
        let title_columns = "user_id, session_id, title, created_at, updated_at";
        Self {
            append: format!(
                r#"INSERT INTO {messages} (user_id, session_id, sequence, role, content, created_at)
                   SELECT ?1, ?2, COALESCE(MAX(sequence), 0) + 1, ?3, ?4, ?5
                   FROM {messages} WHERE user_id = ?1 AND session_id = ?2
                   RETURNING sequence"#
            ),
            list: format!(
                "SELECT sequence, role, content FROM {messages} \
                 WHERE user_id = ?1 AND session_id = ?2 ORDER BY sequence ASC"
            ),
            clear: format!("DELETE FROM {messages} WHERE user_id = ?1 AND session_id = ?2"),
            delete_one: format!(
                "DELETE FROM {messages} WHERE user_id = ?1 AND session_id = ?2 AND sequence = ?3"
            ),
            delete_from: format!(
                "DELETE FROM {messages} WHERE user_id = ?1 AND session_id = ?2 AND sequence >= ?3"
            ),
            session_ids: format!(
                "SELECT DISTINCT session_id FROM {messages} WHERE user_id = ?1 ORDER BY session_id"
            ),
            insert_title: format!(
                r#"INSERT INTO {titles} ({title_columns})
                   VALUES (?1, ?2, ?3, ?4, ?4)
                   RETURNING {title_columns}"#
            ),
            get_title: format!(
                "SELECT {title_columns} FROM {titles} WHERE user_id = ?1 AND session_id = ?2"
            ),
            get_titles: format!(
                "SELECT {title_columns} FROM {titles} WHERE user_id = ?1 \
                 ORDER BY updated_at DESC, session_id ASC"
            ),
            upsert_title: format!(
                r#"INSERT INTO {titles} ({title_columns})
                   VALUES (?1, ?2, ?3, ?4, ?4)
                   ON CONFLICT (user_id, session_id)
                   DO UPDATE SET title = excluded.title, updated_at = excluded.updated_at
                   RETURNING {title_columns}"#
            ),
            delete_title: format!("DELETE FROM {titles} WHERE user_id = ?1 AND session_id = ?2"),
        }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct MessageRow {
    sequence: i64,
    role: String,
    content: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            sequence: row.try_get("sequence")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let sequence = u32::try_from(self.sequence)
            .map_err(|e| RepositoryError::Query(format!("invalid sequence: {e}")))?;
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ChatMessage {
            sequence,
            role,
            content: self.content,
        })
    }
}

struct TitleRow {
    user_id: String,
    session_id: String,
    title: String,
    created_at: String,
    updated_at: String,
}

impl TitleRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            session_id: row.try_get("session_id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_title(self) -> Result<SessionTitle, RepositoryError> {
        Ok(SessionTitle {
            user_id: self.user_id,
            session_id: self.session_id,
            title: self.title,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width UTC timestamps so `ORDER BY updated_at` sorts chronologically.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn title_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionTitle, RepositoryError> {
    TitleRow::from_row(row)
        .map_err(|e| RepositoryError::Query(e.to_string()))?
        .into_title()
}

/// Classify a failed statement and log it with the session it ran against.
fn fail<'a>(
    operation: &'static str,
    key: &'a SessionKey,
) -> impl FnOnce(sqlx::Error) -> RepositoryError + 'a {
    move |err| {
        let mapped = map_sqlx_error(err);
        log_failure(operation, &key.user_id, Some(&key.session_id), &mapped);
        mapped
    }
}

fn fail_for_user<'a>(
    operation: &'static str,
    user_id: &'a str,
) -> impl FnOnce(sqlx::Error) -> RepositoryError + 'a {
    move |err| {
        let mapped = map_sqlx_error(err);
        log_failure(operation, user_id, None, &mapped);
        mapped
    }
}

fn log_failure(
    operation: &'static str,
    user_id: &str,
    session_id: Option<&str>,
    err: &RepositoryError,
) {
    let session_id = session_id.unwrap_or("-");
    match err {
        // Conflicts are answered by the caller (append retry, title already set).
        RepositoryError::Conflict(_) => {
            debug!(operation, user_id, session_id, error = %err, "SQLite statement conflicted")
        }
        _ => error!(operation, user_id, session_id, error = %err, "SQLite statement failed"),
    }
}

/// Classify a sqlx error into the repository taxonomy.
fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_) => RepositoryError::Unavailable(err.to_string()),
        sqlx::Error::Database(db) => {
            if db.is_unique_violation() {
                return RepositoryError::Conflict(db.message().to_string());
            }
            let primary_code = db
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| code & 0xff);
            match primary_code {
                Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => {
                    RepositoryError::Unavailable(err.to_string())
                }
                _ => RepositoryError::Query(err.to_string()),
            }
        }
        _ => RepositoryError::Query(err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// ChatRepository implementation
// ---------------------------------------------------------------------------

impl ChatRepository for SqliteChatRepository {
    async fn append_message(
        &self,
        key: &SessionKey,
        message: &NewMessage,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut attempt = 1;
        loop {
            let result = sqlx::query_scalar::<_, i64>(&self.sql.append)
                .bind(&key.user_id)
                .bind(&key.session_id)
                .bind(message.role.to_string())
                .bind(&message.content)
                .bind(format_datetime(&Utc::now()))
                .fetch_one(&self.pool.writer)
                .await
                .map_err(fail("append_message", key));

            match result {
                Ok(sequence) => {
                    let sequence = u32::try_from(sequence)
                        .map_err(|e| RepositoryError::Query(format!("invalid sequence: {e}")))?;
                    debug!(session = %key, sequence, "Saved chat message");
                    return Ok(ChatMessage {
                        sequence,
                        role: message.role,
                        content: message.content.clone(),
                    });
                }
                // Another writer on the same file took the sequence first.
                Err(RepositoryError::Conflict(reason)) if attempt < MAX_APPEND_ATTEMPTS => {
                    warn!(session = %key, attempt, %reason, "Sequence collision, retrying append");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn list_messages(&self, key: &SessionKey) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(&self.sql.list)
            .bind(&key.user_id)
            .bind(&key.session_id)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(fail("list_messages", key))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(message_row.into_message()?);
        }

        Ok(messages)
    }

    async fn clear_messages(&self, key: &SessionKey) -> Result<u64, RepositoryError> {
        let result = sqlx::query(&self.sql.clear)
            .bind(&key.user_id)
            .bind(&key.session_id)
            .execute(&self.pool.writer)
            .await
            .map_err(fail("clear_messages", key))?;

        debug!(session = %key, removed = result.rows_affected(), "Cleared chat messages");
        Ok(result.rows_affected())
    }

    async fn delete_message(
        &self,
        key: &SessionKey,
        sequence: u32,
    ) -> Result<DeleteOutcome, RepositoryError> {
        ensure_sequence(sequence)?;

        let result = sqlx::query(&self.sql.delete_one)
            .bind(&key.user_id)
            .bind(&key.session_id)
            .bind(i64::from(sequence))
            .execute(&self.pool.writer)
            .await
            .map_err(fail("delete_message", key))?;

        if result.rows_affected() == 0 {
            warn!(session = %key, sequence, "Message to delete not found");
            return Ok(DeleteOutcome::NotFound);
        }
        Ok(DeleteOutcome::Deleted)
    }

    async fn delete_from(&self, key: &SessionKey, sequence: u32) -> Result<u64, RepositoryError> {
        ensure_sequence(sequence)?;

        let result = sqlx::query(&self.sql.delete_from)
            .bind(&key.user_id)
            .bind(&key.session_id)
            .bind(i64::from(sequence))
            .execute(&self.pool.writer)
            .await
            .map_err(fail("delete_from", key))?;

        debug!(
            session = %key,
            from = sequence,
            removed = result.rows_affected(),
            "Deleted chat messages from sequence"
        );
        Ok(result.rows_affected())
    }

    async fn list_session_ids(&self, user_id: &str) -> Result<Vec<String>, RepositoryError> {
        ensure_user_id(user_id)?;

        sqlx::query_scalar::<_, String>(&self.sql.session_ids)
            .bind(user_id)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(fail_for_user("list_session_ids", user_id))
    }

    async fn save_title(
        &self,
        key: &SessionKey,
        title: &str,
    ) -> Result<SessionTitle, RepositoryError> {
        let row = sqlx::query(&self.sql.insert_title)
            .bind(&key.user_id)
            .bind(&key.session_id)
            .bind(title)
            .bind(format_datetime(&Utc::now()))
            .fetch_one(&self.pool.writer)
            .await
            .map_err(|e| match fail("save_title", key)(e) {
                RepositoryError::Conflict(_) => {
                    RepositoryError::Conflict(format!("session {key} already has a title"))
                }
                other => other,
            })?;

        debug!(session = %key, "Saved session title");
        title_from_row(&row)
    }

    async fn get_title(&self, key: &SessionKey) -> Result<Option<SessionTitle>, RepositoryError> {
        let row = sqlx::query(&self.sql.get_title)
            .bind(&key.user_id)
            .bind(&key.session_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(fail("get_title", key))?;

        row.as_ref().map(title_from_row).transpose()
    }

    async fn get_titles(&self, user_id: &str) -> Result<Vec<SessionTitle>, RepositoryError> {
        ensure_user_id(user_id)?;

        let rows = sqlx::query(&self.sql.get_titles)
            .bind(user_id)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(fail_for_user("get_titles", user_id))?;

        rows.iter().map(title_from_row).collect()
    }

    async fn update_title(
        &self,
        key: &SessionKey,
        title: &str,
    ) -> Result<SessionTitle, RepositoryError> {
        let row = sqlx::query(&self.sql.upsert_title)
            .bind(&key.user_id)
            .bind(&key.session_id)
            .bind(title)
            .bind(format_datetime(&Utc::now()))
            .fetch_one(&self.pool.writer)
            .await
            .map_err(fail("update_title", key))?;

        debug!(session = %key, "Updated session title");
        title_from_row(&row)
    }

    async fn delete_title(&self, key: &SessionKey) -> Result<DeleteOutcome, RepositoryError> {
        let result = sqlx::query(&self.sql.delete_title)
            .bind(&key.user_id)
            .bind(&key.session_id)
            .execute(&self.pool.writer)
            .await
            .map_err(fail("delete_title", key))?;

        if result.rows_affected() == 0 {
            warn!(session = %key, "Title to delete not found");
            return Ok(DeleteOutcome::NotFound);
        }
        Ok(DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::{Arc, Mutex};

    async fn open(dir: &std::path::Path, config: &SqliteConfig) -> SqliteChatRepository {
        let url = format!("sqlite://{}?mode=rwc", dir.join("chat.db").display());
        let pool = DatabasePool::new(&url, config).await.unwrap();
        SqliteChatRepository::new(pool, config)
    }

    async fn test_repo() -> SqliteChatRepository {
        let dir = tempfile::tempdir().unwrap();
        let repo = open(dir.path(), &SqliteConfig::default()).await;
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        repo
    }

    fn key(user: &str, session: &str) -> SessionKey {
        SessionKey::new(user, session).unwrap()
    }

    #[tokio::test]
    async fn test_sequences_follow_highest_after_delete() {
        let repo = test_repo().await;
        let k = key("u1", "s1");
        for content in ["a", "b", "c"] {
            repo.append_message(&k, &NewMessage::user(content)).await.unwrap();
        }

        assert_eq!(repo.delete_message(&k, 2).await.unwrap(), DeleteOutcome::Deleted);
        let next = repo.append_message(&k, &NewMessage::assistant("d")).await.unwrap();
        assert_eq!(next.sequence, 4);

        let seqs: Vec<u32> = repo
            .list_messages(&k)
            .await
            .unwrap()
            .iter()
            .map(|m| m.sequence)
            .collect();
        assert_eq!(seqs, vec![1, 3, 4]);
    }

    #[tokio::test]
    async fn test_messages_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = SqliteConfig::default();
        let k = key("u1", "s1");

        let repo = open(dir.path(), &config).await;
        repo.append_message(&k, &NewMessage::user("hello")).await.unwrap();
        repo.append_message(&k, &NewMessage::assistant("hi")).await.unwrap();
        repo.save_title(&k, "Greeting").await.unwrap();
        repo.pool().close().await;

        let reopened = open(dir.path(), &config).await;
        let messages = reopened.list_messages(&k).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, "hi");

        let next = reopened.append_message(&k, &NewMessage::user("again")).await.unwrap();
        assert_eq!(next.sequence, 3);
        assert_eq!(
            reopened.get_title(&k).await.unwrap().map(|t| t.title).as_deref(),
            Some("Greeting")
        );
    }

    #[tokio::test]
    async fn test_custom_collection_names() {
        let dir = tempfile::tempdir().unwrap();
        let config = SqliteConfig {
            messages_collection: "support_messages".to_string(),
            titles_collection: "support_titles".to_string(),
            ..SqliteConfig::default()
        };
        let repo = open(dir.path(), &config).await;
        let k = key("u1", "s1");

        repo.append_message(&k, &NewMessage::user("hello")).await.unwrap();
        repo.save_title(&k, "Support").await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM support_messages")
            .fetch_one(&repo.pool().reader)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_get_distinct_sequences() {
        let repo = test_repo().await;
        let k = key("u1", "s1");

        let appends = (0..50).map(|i| {
            let repo = repo.clone();
            let k = k.clone();
            async move {
                repo.append_message(&k, &NewMessage::user(format!("msg {i}")))
                    .await
                    .unwrap()
                    .sequence
            }
        });
        let mut sequences = join_all(appends).await;
        sequences.sort_unstable();
        assert_eq!(sequences, (1..=50).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn test_update_title_keeps_created_at() {
        let repo = test_repo().await;
        let k = key("u1", "s1");

        let saved = repo.save_title(&k, "First").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let updated = repo.update_title(&k, "Second").await.unwrap();

        assert_eq!(updated.title, "Second");
        assert_eq!(updated.created_at, saved.created_at);
        assert!(updated.updated_at > saved.updated_at);
    }

    #[tokio::test]
    async fn test_save_title_twice_conflicts() {
        let repo = test_repo().await;
        let k = key("u1", "s1");

        repo.save_title(&k, "First").await.unwrap();
        let err = repo.save_title(&k, "Second").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(repo.get_title(&k).await.unwrap().unwrap().title, "First");
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() {
        let repo = test_repo().await;
        let k = key("u1", "s1");
        repo.pool().close().await;

        let err = repo.list_messages(&k).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Unavailable(_)));
        assert!(err.is_retryable());

        let err = repo
            .append_message(&k, &NewMessage::user("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Unavailable(_)));
        assert!(err.is_retryable());

        let err = repo.delete_from(&k, 1).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Unavailable(_)));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_statements_are_logged_with_session() {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let repo = test_repo().await;
        let k = key("u1", "s1");
        repo.pool().close().await;

        assert!(repo.append_message(&k, &NewMessage::user("hi")).await.is_err());
        assert!(repo.list_messages(&k).await.is_err());

        let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let failures: Vec<&str> = logs
            .lines()
            .filter(|line| line.contains("SQLite statement failed"))
            .collect();
        assert_eq!(failures.len(), 2, "captured logs:\n{logs}");
        assert!(failures[0].contains("ERROR"));
        assert!(failures[0].contains("operation=\"append_message\""));
        assert!(failures[1].contains("operation=\"list_messages\""));
        for line in failures {
            assert!(line.contains("user_id=\"u1\""), "{line}");
            assert!(line.contains("session_id=\"s1\""), "{line}");
        }
    }

    #[tokio::test]
    async fn test_sequence_overflow_writes_nothing() {
        let repo = test_repo().await;
        let k = key("u1", "s1");
        sqlx::query(
            "INSERT INTO messages (user_id, session_id, sequence, role, content, created_at) \
             VALUES ('u1', 's1', 4294967295, 'user', 'last', '2026-01-01T00:00:00.000000Z')",
        )
        .execute(&repo.pool().writer)
        .await
        .unwrap();

        let err = repo
            .append_message(&k, &NewMessage::user("one too many"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Query(_)), "{err:?}");

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&repo.pool().reader)
            .await
            .unwrap();
        assert_eq!(count, 1);
        let messages = repo.list_messages(&k).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sequence, u32::MAX);
    }

    #[test]
    fn test_format_datetime_is_fixed_width() {
        let dt = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_datetime(&dt), "2026-01-02T03:04:05.000000Z");
        assert_eq!(parse_datetime(&format_datetime(&dt)).unwrap(), dt);
    }
}
