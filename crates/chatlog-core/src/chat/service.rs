//! Chat service orchestrating conversation turns on top of a `ChatRepository`.
//!
//! ChatService coordinates the repository with the external reply and title
//! generators: it loads history, decides whether a session is new, appends
//! each exchange, names new sessions, and implements edit/rewind by
//! truncating the log and replaying the edited turn.

use chatlog_types::chat::{ChatMessage, DeleteOutcome, NewMessage, SessionKey, SessionTitle};
use chatlog_types::error::{ChatError, RepositoryError};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::generator::{ReplyGenerator, TitleGenerator};
use super::repository::ChatRepository;
use super::title::{fallback_title, normalize_title, TITLE_MAX_CHARS};

/// One stored user turn and the assistant reply that followed it.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub request: ChatMessage,
    pub reply: ChatMessage,
    /// Set when this exchange created or regenerated the session title.
    pub title: Option<SessionTitle>,
}

/// What `delete_session` removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionRemoval {
    pub messages: u64,
    pub title: DeleteOutcome,
}

/// Orchestrates conversation turns and session bookkeeping.
///
/// Generic over the repository and both generators so chatlog-core never
/// depends on chatlog-infra or on any model client.
pub struct ChatService<R: ChatRepository, G: ReplyGenerator, T: TitleGenerator> {
    repo: R,
    replies: G,
    titles: T,
}

impl<R: ChatRepository, G: ReplyGenerator, T: TitleGenerator> ChatService<R, G, T> {
    pub fn new(repo: R, replies: G, titles: T) -> Self {
        Self {
            repo,
            replies,
            titles,
        }
    }

    /// Access the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    // --- Conversation turns ---

    /// Record a user turn and the generated reply.
    ///
    /// A session with no messages and no title is new: its title is
    /// generated from `content` and saved once.
    #[tracing::instrument(
        name = "chat_send",
        skip(self, content),
        fields(user_id = %key.user_id, session_id = %key.session_id)
    )]
    pub async fn send(&self, key: &SessionKey, content: &str) -> Result<Exchange, ChatError> {
        ensure_content(content)?;

        let history = self.repo.list_messages(key).await?;
        let is_new = history.is_empty() && self.repo.get_title(key).await?.is_none();
        debug!(history = history.len(), is_new, "Loaded history");

        let (request, reply) = self.respond(key, &history, content).await?;

        let title = if is_new {
            Some(self.create_title(key, content).await?)
        } else {
            None
        };

        Ok(Exchange {
            request,
            reply,
            title,
        })
    }

    /// Replace the turn at `sequence` and everything after it with a new
    /// user turn and a fresh reply.
    ///
    /// `sequence` is the first message to discard, normally the user message
    /// being edited. Messages before it are untouched. The reply is generated
    /// before anything is deleted, so a generator failure leaves the log as
    /// it was. Editing the first message regenerates the session title.
    #[tracing::instrument(
        name = "chat_edit",
        skip(self, content),
        fields(user_id = %key.user_id, session_id = %key.session_id)
    )]
    pub async fn edit(
        &self,
        key: &SessionKey,
        sequence: u32,
        content: &str,
    ) -> Result<Exchange, ChatError> {
        if sequence == 0 {
            return Err(ChatError::Validation("sequence must be >= 1".to_string()));
        }
        ensure_content(content)?;

        let kept: Vec<ChatMessage> = self
            .repo
            .list_messages(key)
            .await?
            .into_iter()
            .filter(|m| m.sequence < sequence)
            .collect();

        let reply_text = self.generate_reply(&kept, content).await?;

        let removed = self.repo.delete_from(key, sequence).await?;
        info!(from = sequence, removed, "Rewound session");

        let (request, reply) = self.append_exchange(key, content, &reply_text).await?;

        let title = if sequence == 1 {
            let text = self.title_for(content).await;
            Some(self.repo.update_title(key, &text).await?)
        } else {
            None
        };

        Ok(Exchange {
            request,
            reply,
            title,
        })
    }

    // --- Session bookkeeping ---

    /// Full message history of a session.
    pub async fn history(&self, key: &SessionKey) -> Result<Vec<ChatMessage>, ChatError> {
        Ok(self.repo.list_messages(key).await?)
    }

    /// Remove all messages but keep the session title.
    pub async fn clear(&self, key: &SessionKey) -> Result<u64, ChatError> {
        let removed = self.repo.clear_messages(key).await?;
        info!(session = %key, removed, "Session cleared");
        Ok(removed)
    }

    /// Remove one message without renumbering the rest.
    pub async fn delete_message(
        &self,
        key: &SessionKey,
        sequence: u32,
    ) -> Result<DeleteOutcome, ChatError> {
        if sequence == 0 {
            return Err(ChatError::Validation("sequence must be >= 1".to_string()));
        }
        Ok(self.repo.delete_message(key, sequence).await?)
    }

    /// Remove a session entirely: its messages and its title.
    ///
    /// The repository does not cascade between the two; this does.
    pub async fn delete_session(&self, key: &SessionKey) -> Result<SessionRemoval, ChatError> {
        let messages = self.repo.clear_messages(key).await?;
        let title = self.repo.delete_title(key).await?;
        info!(session = %key, messages, ?title, "Session deleted");
        Ok(SessionRemoval { messages, title })
    }

    /// Ids of the user's non-empty sessions.
    pub async fn sessions(&self, user_id: &str) -> Result<Vec<String>, ChatError> {
        Ok(self.repo.list_session_ids(user_id).await?)
    }

    /// The user's session titles, most recently updated first.
    pub async fn titles(&self, user_id: &str) -> Result<Vec<SessionTitle>, ChatError> {
        Ok(self.repo.get_titles(user_id).await?)
    }

    /// Set a title chosen by the user, applying the display cap.
    pub async fn rename(&self, key: &SessionKey, title: &str) -> Result<SessionTitle, ChatError> {
        let title = normalize_title(title)
            .ok_or_else(|| ChatError::Validation("title is empty".to_string()))?;
        Ok(self.repo.update_title(key, &title).await?)
    }

    // --- Internals ---

    async fn respond(
        &self,
        key: &SessionKey,
        history: &[ChatMessage],
        content: &str,
    ) -> Result<(ChatMessage, ChatMessage), ChatError> {
        let reply_text = self.generate_reply(history, content).await?;
        self.append_exchange(key, content, &reply_text).await
    }

    async fn generate_reply(
        &self,
        history: &[ChatMessage],
        content: &str,
    ) -> Result<String, ChatError> {
        self.replies
            .generate_reply(history, content)
            .await
            .map_err(|e| {
                warn!(error = %e, "Reply generation failed");
                ChatError::Generation(e.to_string())
            })
    }

    async fn append_exchange(
        &self,
        key: &SessionKey,
        content: &str,
        reply_text: &str,
    ) -> Result<(ChatMessage, ChatMessage), ChatError> {
        let request = self
            .repo
            .append_message(key, &NewMessage::user(content))
            .await?;
        let reply = self
            .repo
            .append_message(key, &NewMessage::assistant(reply_text))
            .await?;
        debug!(
            request = request.sequence,
            reply = reply.sequence,
            "Exchange stored"
        );
        Ok((request, reply))
    }

    async fn create_title(
        &self,
        key: &SessionKey,
        content: &str,
    ) -> Result<SessionTitle, ChatError> {
        let text = self.title_for(content).await;
        match self.repo.save_title(key, &text).await {
            Ok(title) => {
                info!(session = %key, title = %title.title, "Session title created");
                Ok(title)
            }
            // A concurrent first turn named the session first; keep its title.
            Err(RepositoryError::Conflict(_)) => match self.repo.get_title(key).await? {
                Some(existing) => Ok(existing),
                None => Ok(self.repo.update_title(key, &text).await?),
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn title_for(&self, content: &str) -> String {
        match self.titles.generate_title(content).await {
            Ok(raw) => {
                normalize_title(&raw).unwrap_or_else(|| fallback_title(content, TITLE_MAX_CHARS))
            }
            Err(e) => {
                warn!(error = %e, "Title generation failed, deriving title from message");
                fallback_title(content, TITLE_MAX_CHARS)
            }
        }
    }
}

fn ensure_content(content: &str) -> Result<(), ChatError> {
    if content.trim().is_empty() {
        return Err(ChatError::Validation("message is empty".to_string()));
    }
    Ok(())
}
