//! Chat message, session key, and title types for chatlog.
//!
//! These types model a per-user, per-session conversation log: the
//! messages themselves (numbered by the store), the key that scopes them,
//! and the title record derived from the first turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::error::RepositoryError;

/// Author of a stored chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// Identifies one conversation: the pair `(user_id, session_id)`.
///
/// Both parts are non-empty; use [`SessionKey::new`] to construct one from
/// untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSessionKey")]
pub struct SessionKey {
    pub user_id: String,
    pub session_id: String,
}

/// Wire shape of a [`SessionKey`] before validation.
#[derive(Deserialize)]
struct RawSessionKey {
    user_id: String,
    session_id: String,
}

impl TryFrom<RawSessionKey> for SessionKey {
    type Error = RepositoryError;

    fn try_from(raw: RawSessionKey) -> Result<Self, Self::Error> {
        SessionKey::new(raw.user_id, raw.session_id)
    }
}

impl SessionKey {
    /// Build a key, rejecting empty or whitespace-only identifiers.
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Result<Self, RepositoryError> {
        let user_id = user_id.into();
        let session_id = session_id.into();

        if user_id.trim().is_empty() {
            return Err(RepositoryError::Validation("user_id is empty".to_string()));
        }
        if session_id.trim().is_empty() {
            return Err(RepositoryError::Validation(
                "session_id is empty".to_string(),
            ));
        }

        Ok(Self {
            user_id,
            session_id,
        })
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.session_id)
    }
}

/// The caller-supplied part of an append. The store assigns the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A stored chat turn.
///
/// `sequence` starts at 1 within a session and strictly increases in append
/// order. Single-message deletes leave gaps; clearing the session restarts
/// numbering at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sequence: u32,
    pub role: MessageRole,
    pub content: String,
}

/// Display title of a session, one per [`SessionKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTitle {
    pub user_id: String,
    pub session_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionTitle {
    /// A fresh title record stamped with the current time.
    pub fn new(key: &SessionKey, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: key.user_id.clone(),
            session_id: key.session_id.clone(),
            title: title.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The key this title belongs to.
    pub fn key(&self) -> SessionKey {
        SessionKey {
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

/// Result of deleting a single record.
///
/// A missing record is a successful no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

impl DeleteOutcome {
    pub fn is_deleted(self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_deserialize_validates() {
        let key: SessionKey =
            serde_json::from_str(r#"{"user_id":"u1","session_id":"s1"}"#).unwrap();
        assert_eq!(key, SessionKey::new("u1", "s1").unwrap());

        let err = serde_json::from_str::<SessionKey>(r#"{"user_id":"","session_id":"s1"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("user_id is empty"), "{err}");
        assert!(
            serde_json::from_str::<SessionKey>(r#"{"user_id":"u1","session_id":"  "}"#).is_err()
        );
    }

    #[test]
    fn test_message_role_roundtrip() {
        for role in [MessageRole::User, MessageRole::Assistant] {
            let parsed: MessageRole = role.to_string().parse().unwrap();
            assert_eq!(role, parsed);
        }
        assert!("system".parse::<MessageRole>().is_err());
    }

    #[test]
    fn test_message_role_serde() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_session_key_rejects_empty_parts() {
        assert!(SessionKey::new("u1", "s1").is_ok());
        assert!(matches!(
            SessionKey::new("", "s1"),
            Err(RepositoryError::Validation(_))
        ));
        assert!(matches!(
            SessionKey::new("u1", "   "),
            Err(RepositoryError::Validation(_))
        ));
    }

    #[test]
    fn test_chat_message_serialize() {
        let msg = ChatMessage {
            sequence: 1,
            role: MessageRole::User,
            content: "hello".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["sequence"], 1);
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn test_new_title_timestamps_match() {
        let key = SessionKey::new("u1", "s1").unwrap();
        let title = SessionTitle::new(&key, "Greetings");
        assert_eq!(title.created_at, title.updated_at);
        assert_eq!(title.key(), key);
    }

    #[test]
    fn test_delete_outcome_serde() {
        let json = serde_json::to_string(&DeleteOutcome::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
        assert!(DeleteOutcome::Deleted.is_deleted());
    }
}
