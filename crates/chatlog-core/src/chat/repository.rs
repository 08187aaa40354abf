//! ChatRepository trait definition.
//!
//! Provides the message log and title operations every storage backend
//! implements. Uses native async fn in traits (RPITIT, Rust 2024 edition).

use chatlog_types::chat::{ChatMessage, DeleteOutcome, NewMessage, SessionKey, SessionTitle};
use chatlog_types::error::RepositoryError;

/// Repository trait for per-session message logs and session titles.
///
/// Implementations live in chatlog-infra (`InMemoryChatRepository`,
/// `SqliteChatRepository`). Every read returns owned copies; callers never
/// hold references into the backend's storage.
pub trait ChatRepository: Send + Sync {
    /// Append a message and assign it the next sequence number.
    ///
    /// The next sequence is one past the highest stored sequence (1 for an
    /// empty session). Concurrent appends to the same key never receive the
    /// same number.
    fn append_message(
        &self,
        key: &SessionKey,
        message: &NewMessage,
    ) -> impl std::future::Future<Output = Result<ChatMessage, RepositoryError>> + Send;

    /// All messages of a session in ascending sequence order.
    ///
    /// An unknown session yields an empty list.
    fn list_messages(
        &self,
        key: &SessionKey,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// Remove every message of a session, returning how many were removed.
    ///
    /// Numbering restarts at 1 afterwards.
    fn clear_messages(
        &self,
        key: &SessionKey,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Remove the single message with `sequence`. Remaining messages keep
    /// their numbers.
    fn delete_message(
        &self,
        key: &SessionKey,
        sequence: u32,
    ) -> impl std::future::Future<Output = Result<DeleteOutcome, RepositoryError>> + Send;

    /// Remove every message with a sequence `>= sequence` (rewind).
    fn delete_from(
        &self,
        key: &SessionKey,
        sequence: u32,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Ids of the user's sessions that hold at least one message. Unordered.
    fn list_session_ids(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;

    /// Create the title of a session.
    ///
    /// Returns `RepositoryError::Conflict` if the session already has one.
    fn save_title(
        &self,
        key: &SessionKey,
        title: &str,
    ) -> impl std::future::Future<Output = Result<SessionTitle, RepositoryError>> + Send;

    /// The title of one session, if any.
    fn get_title(
        &self,
        key: &SessionKey,
    ) -> impl std::future::Future<Output = Result<Option<SessionTitle>, RepositoryError>> + Send;

    /// All titles of a user, most recently updated first.
    fn get_titles(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<SessionTitle>, RepositoryError>> + Send;

    /// Replace the title text, creating the record if absent.
    ///
    /// `created_at` of an existing record is preserved; `updated_at` is bumped.
    fn update_title(
        &self,
        key: &SessionKey,
        title: &str,
    ) -> impl std::future::Future<Output = Result<SessionTitle, RepositoryError>> + Send;

    /// Remove the title of a session.
    fn delete_title(
        &self,
        key: &SessionKey,
    ) -> impl std::future::Future<Output = Result<DeleteOutcome, RepositoryError>> + Send;
}

/// Reject sequence 0; sequences start at 1.
pub fn ensure_sequence(sequence: u32) -> Result<(), RepositoryError> {
    if sequence == 0 {
        return Err(RepositoryError::Validation(
            "sequence must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Reject an empty or whitespace-only user id.
pub fn ensure_user_id(user_id: &str) -> Result<(), RepositoryError> {
    if user_id.trim().is_empty() {
        return Err(RepositoryError::Validation("user_id is empty".to_string()));
    }
    Ok(())
}

/// Sort titles most recently updated first, breaking ties by session id.
pub fn sort_titles(titles: &mut [SessionTitle]) {
    titles.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_ensure_sequence() {
        assert!(ensure_sequence(1).is_ok());
        assert!(matches!(
            ensure_sequence(0),
            Err(RepositoryError::Validation(_))
        ));
    }

    #[test]
    fn test_ensure_user_id() {
        assert!(ensure_user_id("u1").is_ok());
        assert!(ensure_user_id(" ").is_err());
    }

    #[test]
    fn test_sort_titles_newest_first() {
        let key_a = SessionKey::new("u1", "a").unwrap();
        let key_b = SessionKey::new("u1", "b").unwrap();
        let mut older = SessionTitle::new(&key_a, "Older");
        older.updated_at = Utc::now() - Duration::minutes(5);
        let newer = SessionTitle::new(&key_b, "Newer");

        let mut titles = vec![older, newer];
        sort_titles(&mut titles);
        assert_eq!(titles[0].title, "Newer");
        assert_eq!(titles[1].title, "Older");
    }
}
