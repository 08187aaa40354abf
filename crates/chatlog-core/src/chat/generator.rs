//! Collaborator traits for the parts of a chat turn chatlog does not own.
//!
//! Producing an assistant reply and naming a session both involve a
//! language model that lives outside this workspace. The orchestrator only
//! sees these two traits.

use chatlog_types::chat::ChatMessage;
use chatlog_types::error::GeneratorError;

use super::title::{fallback_title, TITLE_MAX_CHARS};

/// Produces the assistant reply for a user turn, given the prior history.
pub trait ReplyGenerator: Send + Sync {
    fn generate_reply(
        &self,
        history: &[ChatMessage],
        input: &str,
    ) -> impl std::future::Future<Output = Result<String, GeneratorError>> + Send;
}

/// Produces a session title from the first user message.
pub trait TitleGenerator: Send + Sync {
    fn generate_title(
        &self,
        first_message: &str,
    ) -> impl std::future::Future<Output = Result<String, GeneratorError>> + Send;
}

/// Reply generator that returns text produced elsewhere.
///
/// Used when the assistant reply already exists (e.g. it was generated by
/// another process) and only needs to be recorded.
#[derive(Debug, Clone)]
pub struct StaticReply {
    text: String,
}

impl StaticReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl ReplyGenerator for StaticReply {
    async fn generate_reply(
        &self,
        _history: &[ChatMessage],
        _input: &str,
    ) -> Result<String, GeneratorError> {
        Ok(self.text.clone())
    }
}

/// Title generator that derives the title from the message text itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackTitleGenerator;

impl TitleGenerator for FallbackTitleGenerator {
    async fn generate_title(&self, first_message: &str) -> Result<String, GeneratorError> {
        Ok(fallback_title(first_message, TITLE_MAX_CHARS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_reply_ignores_history() {
        let reply = StaticReply::new("hi there");
        let text = reply.generate_reply(&[], "hello").await.unwrap();
        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn test_fallback_title_generator() {
        let title = FallbackTitleGenerator
            .generate_title("hello")
            .await
            .unwrap();
        assert_eq!(title, "hello");
    }
}
