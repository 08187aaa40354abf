//! In-memory chat repository implementation.
//!
//! Implements `ChatRepository` from `chatlog-core` on two `DashMap`s keyed by
//! `SessionKey`. Sequence assignment happens while the entry guard for the
//! key is held, so concurrent appends to one session are serialized while
//! appends to other sessions only contend on the shard lock.
//!
//! Guards are never held across an `.await`; every method body is
//! synchronous. Everything is lost when the process exits.

use std::sync::Arc;

use chatlog_core::chat::repository::{
    ensure_sequence, ensure_user_id, sort_titles, ChatRepository,
};
use chatlog_types::chat::{ChatMessage, DeleteOutcome, NewMessage, SessionKey, SessionTitle};
use chatlog_types::error::RepositoryError;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

/// Process-lifetime implementation of `ChatRepository`.
///
/// Cloning produces a shared view of the same maps (backed by `Arc`).
#[derive(Debug, Clone, Default)]
pub struct InMemoryChatRepository {
    logs: Arc<DashMap<SessionKey, Vec<ChatMessage>>>,
    titles: Arc<DashMap<SessionKey, SessionTitle>>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatRepository for InMemoryChatRepository {
    async fn append_message(
        &self,
        key: &SessionKey,
        message: &NewMessage,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut log = self.logs.entry(key.clone()).or_default();

        let sequence = match log.last() {
            Some(last) => last.sequence.checked_add(1).ok_or_else(|| {
                RepositoryError::Query(format!("sequence overflow in session {key}"))
            })?,
            None => 1,
        };

        let stored = ChatMessage {
            sequence,
            role: message.role,
            content: message.content.clone(),
        };
        log.push(stored.clone());

        debug!(
            user_id = %key.user_id,
            session_id = %key.session_id,
            sequence,
            count = log.len(),
            "Saved chat message"
        );
        Ok(stored)
    }

    async fn list_messages(&self, key: &SessionKey) -> Result<Vec<ChatMessage>, RepositoryError> {
        Ok(self
            .logs
            .get(key)
            .map(|log| log.value().clone())
            .unwrap_or_default())
    }

    async fn clear_messages(&self, key: &SessionKey) -> Result<u64, RepositoryError> {
        // The key stays in the map; numbering restarts because the log is empty.
        let removed = match self.logs.get_mut(key) {
            Some(mut log) => {
                let removed = log.len();
                log.clear();
                removed
            }
            None => 0,
        };
        debug!(session = %key, removed, "Cleared chat messages");
        Ok(removed as u64)
    }

    async fn delete_message(
        &self,
        key: &SessionKey,
        sequence: u32,
    ) -> Result<DeleteOutcome, RepositoryError> {
        ensure_sequence(sequence)?;

        let removed = self.logs.get_mut(key).and_then(|mut log| {
            log.binary_search_by_key(&sequence, |m| m.sequence)
                .ok()
                .map(|idx| log.remove(idx))
        });

        match removed {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => {
                warn!(session = %key, sequence, "Message to delete not found");
                Ok(DeleteOutcome::NotFound)
            }
        }
    }

    async fn delete_from(&self, key: &SessionKey, sequence: u32) -> Result<u64, RepositoryError> {
        ensure_sequence(sequence)?;

        let removed = match self.logs.get_mut(key) {
            Some(mut log) => {
                let keep = log.partition_point(|m| m.sequence < sequence);
                let removed = log.len() - keep;
                log.truncate(keep);
                removed
            }
            None => 0,
        };
        debug!(session = %key, from = sequence, removed, "Deleted chat messages from sequence");
        Ok(removed as u64)
    }

    async fn list_session_ids(&self, user_id: &str) -> Result<Vec<String>, RepositoryError> {
        ensure_user_id(user_id)?;
        let mut ids: Vec<String> = self
            .logs
            .iter()
            .filter(|entry| entry.key().user_id == user_id && !entry.value().is_empty())
            .map(|entry| entry.key().session_id.clone())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn save_title(
        &self,
        key: &SessionKey,
        title: &str,
    ) -> Result<SessionTitle, RepositoryError> {
        match self.titles.entry(key.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(format!(
                "session {key} already has a title"
            ))),
            Entry::Vacant(slot) => {
                let record = SessionTitle::new(key, title);
                slot.insert(record.clone());
                debug!(session = %key, "Saved session title");
                Ok(record)
            }
        }
    }

    async fn get_title(&self, key: &SessionKey) -> Result<Option<SessionTitle>, RepositoryError> {
        Ok(self.titles.get(key).map(|t| t.value().clone()))
    }

    async fn get_titles(&self, user_id: &str) -> Result<Vec<SessionTitle>, RepositoryError> {
        ensure_user_id(user_id)?;
        let mut titles: Vec<SessionTitle> = self
            .titles
            .iter()
            .filter(|entry| entry.key().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        sort_titles(&mut titles);
        Ok(titles)
    }

    async fn update_title(
        &self,
        key: &SessionKey,
        title: &str,
    ) -> Result<SessionTitle, RepositoryError> {
        let record = self
            .titles
            .entry(key.clone())
            .and_modify(|existing| {
                existing.title = title.to_string();
                existing.updated_at = Utc::now();
            })
            .or_insert_with(|| SessionTitle::new(key, title));
        Ok(record.value().clone())
    }

    async fn delete_title(&self, key: &SessionKey) -> Result<DeleteOutcome, RepositoryError> {
        match self.titles.remove(key) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => {
                warn!(session = %key, "Title to delete not found");
                Ok(DeleteOutcome::NotFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;

    fn key(user: &str, session: &str) -> SessionKey {
        SessionKey::new(user, session).unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_appends_get_distinct_sequences() {
        let repo = InMemoryChatRepository::new();
        let k = key("u1", "s1");

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let repo = repo.clone();
                let k = k.clone();
                tokio::spawn(async move {
                    repo.append_message(&k, &NewMessage::user(format!("msg {i}")))
                        .await
                        .unwrap()
                        .sequence
                })
            })
            .collect();

        let mut sequences: Vec<u32> = join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        sequences.sort_unstable();
        assert_eq!(sequences, (1..=50).collect::<Vec<u32>>());

        let stored: Vec<u32> = repo
            .list_messages(&k)
            .await
            .unwrap()
            .iter()
            .map(|m| m.sequence)
            .collect();
        assert_eq!(stored, (1..=50).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let repo = InMemoryChatRepository::new();
        let other = repo.clone();
        let k = key("u1", "s1");

        repo.append_message(&k, &NewMessage::user("hello")).await.unwrap();
        assert_eq!(other.list_messages(&k).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cleared_session_not_listed() {
        let repo = InMemoryChatRepository::new();
        let k = key("u1", "s1");
        repo.append_message(&k, &NewMessage::user("hello")).await.unwrap();
        repo.clear_messages(&k).await.unwrap();
        assert!(repo.list_session_ids("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_returned_messages_are_copies() {
        let repo = InMemoryChatRepository::new();
        let k = key("u1", "s1");
        repo.append_message(&k, &NewMessage::user("hello")).await.unwrap();

        let mut listed = repo.list_messages(&k).await.unwrap();
        listed[0].content = "tampered".to_string();
        assert_eq!(repo.list_messages(&k).await.unwrap()[0].content, "hello");
    }
}
