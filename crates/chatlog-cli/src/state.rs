//! Application state wiring the store and services together.
//!
//! The store is opened exactly once per process and every command receives a
//! handle to it through `AppState`.

use std::path::PathBuf;

use anyhow::Context;
use chatlog_core::chat::generator::{FallbackTitleGenerator, StaticReply};
use chatlog_core::chat::service::ChatService;
use chatlog_infra::config::{load_store_config, resolve_data_dir};
use chatlog_infra::store::ChatStore;
use chatlog_types::config::{BackendKind, StoreConfig};

/// Chat service pinned to the concrete store, with the reply supplied by the caller.
pub type ConcreteChatService = ChatService<ChatStore, StaticReply, FallbackTitleGenerator>;

/// Shared application state used by every CLI command.
#[derive(Clone)]
pub struct AppState {
    pub store: ChatStore,
    pub config: StoreConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load config and open the configured backend.
    ///
    /// `backend` (from `--backend`) takes precedence over config.toml and the
    /// environment.
    pub async fn init(
        data_dir: Option<PathBuf>,
        backend: Option<BackendKind>,
    ) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(resolve_data_dir);

        let mut config = load_store_config(&data_dir)
            .await
            .context("Failed to load store configuration")?;
        if let Some(backend) = backend {
            config.backend = backend;
        }

        let store = ChatStore::open(&config, &data_dir)
            .await
            .with_context(|| format!("Failed to open {} store", config.backend))?;

        Ok(Self {
            store,
            config,
            data_dir,
        })
    }

    /// Chat service that records `reply` as the assistant's answer.
    pub fn chat_service(&self, reply: impl Into<String>) -> ConcreteChatService {
        ChatService::new(
            self.store.clone(),
            StaticReply::new(reply),
            FallbackTitleGenerator,
        )
    }

    /// Chat service for commands that never generate a reply.
    pub fn session_service(&self) -> ConcreteChatService {
        self.chat_service(String::new())
    }
}
