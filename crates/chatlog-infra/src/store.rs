//! Backend selection.
//!
//! `ChatStore` is the one repository handle the process works with. It is
//! built once at startup from [`StoreConfig`] and cloned into every consumer;
//! clones share the same underlying storage.

use std::path::Path;

use chatlog_core::chat::repository::ChatRepository;
use chatlog_types::chat::{ChatMessage, DeleteOutcome, NewMessage, SessionKey, SessionTitle};
use chatlog_types::config::{BackendKind, StoreConfig};
use chatlog_types::error::{ConfigError, RepositoryError};
use thiserror::Error;
use tracing::info;

use crate::memory::chat::InMemoryChatRepository;
use crate::sqlite::chat::SqliteChatRepository;
use crate::sqlite::pool::{database_url, DatabasePool};

/// Errors raised while opening the configured backend.
#[derive(Debug, Error)]
pub enum StoreInitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to open database: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("failed to prepare data directory: {0}")]
    Io(#[from] std::io::Error),
}

/// The configured `ChatRepository` backend.
#[derive(Clone)]
pub enum ChatStore {
    InMemory(InMemoryChatRepository),
    Sqlite(SqliteChatRepository),
}

impl ChatStore {
    /// Open the backend named by `config.backend`.
    ///
    /// `data_dir` is where the SQLite file goes when the config names neither
    /// a URL nor a path.
    pub async fn open(config: &StoreConfig, data_dir: &Path) -> Result<Self, StoreInitError> {
        config.validate()?;

        match config.backend {
            BackendKind::InMemory => {
                info!(backend = %config.backend, "Opened chat store");
                Ok(ChatStore::InMemory(InMemoryChatRepository::new()))
            }
            BackendKind::Sqlite => {
                if config.sqlite.url.is_none() {
                    let file_dir = match &config.sqlite.path {
                        Some(path) => path.parent().map(Path::to_path_buf),
                        None => Some(data_dir.to_path_buf()),
                    };
                    if let Some(dir) = file_dir.filter(|d| !d.as_os_str().is_empty()) {
                        tokio::fs::create_dir_all(&dir).await?;
                    }
                }

                let url = database_url(&config.sqlite, data_dir);
                let pool = DatabasePool::new(&url, &config.sqlite).await?;
                info!(backend = %config.backend, database = %config.sqlite.database, "Opened chat store");
                Ok(ChatStore::Sqlite(SqliteChatRepository::new(pool, &config.sqlite)))
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            ChatStore::InMemory(_) => BackendKind::InMemory,
            ChatStore::Sqlite(_) => BackendKind::Sqlite,
        }
    }

    /// Release backend resources. No-op for the in-memory store.
    pub async fn close(&self) {
        if let ChatStore::Sqlite(repo) = self {
            repo.pool().close().await;
        }
    }
}

impl ChatRepository for ChatStore {
    async fn append_message(
        &self,
        key: &SessionKey,
        message: &NewMessage,
    ) -> Result<ChatMessage, RepositoryError> {
        match self {
            ChatStore::InMemory(repo) => repo.append_message(key, message).await,
            ChatStore::Sqlite(repo) => repo.append_message(key, message).await,
        }
    }

    async fn list_messages(&self, key: &SessionKey) -> Result<Vec<ChatMessage>, RepositoryError> {
        match self {
            ChatStore::InMemory(repo) => repo.list_messages(key).await,
            ChatStore::Sqlite(repo) => repo.list_messages(key).await,
        }
    }

    async fn clear_messages(&self, key: &SessionKey) -> Result<u64, RepositoryError> {
        match self {
            ChatStore::InMemory(repo) => repo.clear_messages(key).await,
            ChatStore::Sqlite(repo) => repo.clear_messages(key).await,
        }
    }

    async fn delete_message(
        &self,
        key: &SessionKey,
        sequence: u32,
    ) -> Result<DeleteOutcome, RepositoryError> {
        match self {
            ChatStore::InMemory(repo) => repo.delete_message(key, sequence).await,
            ChatStore::Sqlite(repo) => repo.delete_message(key, sequence).await,
        }
    }

    async fn delete_from(&self, key: &SessionKey, sequence: u32) -> Result<u64, RepositoryError> {
        match self {
            ChatStore::InMemory(repo) => repo.delete_from(key, sequence).await,
            ChatStore::Sqlite(repo) => repo.delete_from(key, sequence).await,
        }
    }

    async fn list_session_ids(&self, user_id: &str) -> Result<Vec<String>, RepositoryError> {
        match self {
            ChatStore::InMemory(repo) => repo.list_session_ids(user_id).await,
            ChatStore::Sqlite(repo) => repo.list_session_ids(user_id).await,
        }
    }

    async fn save_title(
        &self,
        key: &SessionKey,
        title: &str,
    ) -> Result<SessionTitle, RepositoryError> {
        match self {
            ChatStore::InMemory(repo) => repo.save_title(key, title).await,
            ChatStore::Sqlite(repo) => repo.save_title(key, title).await,
        }
    }

    async fn get_title(&self, key: &SessionKey) -> Result<Option<SessionTitle>, RepositoryError> {
        match self {
            ChatStore::InMemory(repo) => repo.get_title(key).await,
            ChatStore::Sqlite(repo) => repo.get_title(key).await,
        }
    }

    async fn get_titles(&self, user_id: &str) -> Result<Vec<SessionTitle>, RepositoryError> {
        match self {
            ChatStore::InMemory(repo) => repo.get_titles(user_id).await,
            ChatStore::Sqlite(repo) => repo.get_titles(user_id).await,
        }
    }

    async fn update_title(
        &self,
        key: &SessionKey,
        title: &str,
    ) -> Result<SessionTitle, RepositoryError> {
        match self {
            ChatStore::InMemory(repo) => repo.update_title(key, title).await,
            ChatStore::Sqlite(repo) => repo.update_title(key, title).await,
        }
    }

    async fn delete_title(&self, key: &SessionKey) -> Result<DeleteOutcome, RepositoryError> {
        match self {
            ChatStore::InMemory(repo) => repo.delete_title(key).await,
            ChatStore::Sqlite(repo) => repo.delete_title(key).await,
        }
    }
}
