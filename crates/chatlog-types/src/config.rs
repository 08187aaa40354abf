//! Store configuration types for chatlog.
//!
//! `StoreConfig` represents the `config.toml` that selects the storage
//! backend and carries the durable backend's connection parameters. All
//! fields have defaults, so an empty file selects the volatile backend.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Which backend adapter the process runs with. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendKind {
    /// Process-lifetime storage; everything is lost on restart.
    #[default]
    InMemory,
    /// SQLite-backed storage that survives restarts.
    Sqlite,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::InMemory => write!(f, "inmemory"),
            BackendKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inmemory" | "memory" | "volatile" => Ok(BackendKind::InMemory),
            "sqlite" | "durable" => Ok(BackendKind::Sqlite),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl TryFrom<String> for BackendKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackendKind> for String {
    fn from(kind: BackendKind) -> Self {
        kind.to_string()
    }
}

/// Top-level store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub sqlite: SqliteConfig,
}

impl StoreConfig {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sqlite.validate()
    }
}

/// Connection parameters for the durable backend.
///
/// `url` wins over `path`; when both are absent the database file is
/// `{data_dir}/{database}.db`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Full sqlx connection URL, e.g. `sqlite:///var/lib/chatlog/chat.db?mode=rwc`.
    #[serde(default)]
    pub url: Option<String>,

    /// Database file path.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Database name, used as the file stem when neither `url` nor `path` is set.
    #[serde(default = "default_database")]
    pub database: String,

    /// Table holding one row per message.
    #[serde(default = "default_messages_collection")]
    pub messages_collection: String,

    /// Table holding one row per session title.
    #[serde(default = "default_titles_collection")]
    pub titles_collection: String,

    #[serde(default = "default_max_read_connections")]
    pub max_read_connections: u32,

    /// How long a writer waits on a locked database before giving up.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,

    /// How long a caller waits for a pooled connection.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_database() -> String {
    "chatdb".to_string()
}

fn default_messages_collection() -> String {
    "messages".to_string()
}

fn default_titles_collection() -> String {
    "session_titles".to_string()
}

fn default_max_read_connections() -> u32 {
    8
}

fn default_busy_timeout_secs() -> u64 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    10
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: None,
            database: default_database(),
            messages_collection: default_messages_collection(),
            titles_collection: default_titles_collection(),
            max_read_connections: default_max_read_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl SqliteConfig {
    /// Collection names are interpolated into SQL, so they must be plain identifiers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, name) in [
            ("messages_collection", &self.messages_collection),
            ("titles_collection", &self.titles_collection),
        ] {
            if !is_identifier(name) {
                return Err(ConfigError::Invalid(format!(
                    "{field} '{name}' is not a valid table name"
                )));
            }
        }
        if self.messages_collection == self.titles_collection {
            return Err(ConfigError::Invalid(
                "messages_collection and titles_collection must differ".to_string(),
            ));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::Invalid("database name is empty".to_string()));
        }
        if self.max_read_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_read_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_default_values() {
        let config = StoreConfig::default();
        assert_eq!(config.backend, BackendKind::InMemory);
        assert_eq!(config.sqlite.database, "chatdb");
        assert_eq!(config.sqlite.messages_collection, "messages");
        assert_eq!(config.sqlite.busy_timeout_secs, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_store_config_deserialize_with_defaults() {
        let config: StoreConfig = toml::from_str("").unwrap();
        assert_eq!(config.backend, BackendKind::InMemory);
        assert!(config.sqlite.url.is_none());
    }

    #[test]
    fn test_store_config_deserialize_with_values() {
        let toml_str = r#"
backend = "durable"

[sqlite]
path = "/tmp/chat.db"
messages_collection = "chat_messages"
max_read_connections = 2
"#;
        let config: StoreConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.sqlite.path, Some(PathBuf::from("/tmp/chat.db")));
        assert_eq!(config.sqlite.messages_collection, "chat_messages");
        assert_eq!(config.sqlite.titles_collection, "session_titles");
        assert_eq!(config.sqlite.max_read_connections, 2);
    }

    #[test]
    fn test_unknown_backend_rejected_at_parse() {
        let result = toml::from_str::<StoreConfig>(r#"backend = "cosmos""#);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown backend kind"), "{err}");
    }

    #[test]
    fn test_backend_kind_aliases() {
        assert_eq!("volatile".parse::<BackendKind>().unwrap(), BackendKind::InMemory);
        assert_eq!("MEMORY".parse::<BackendKind>().unwrap(), BackendKind::InMemory);
        assert_eq!("sqlite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert!(matches!(
            "mongo".parse::<BackendKind>(),
            Err(ConfigError::UnknownBackend(name)) if name == "mongo"
        ));
    }

    #[test]
    fn test_collection_names_must_be_identifiers() {
        let mut config = SqliteConfig::default();
        config.messages_collection = "messages; DROP TABLE x".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = SqliteConfig::default();
        config.titles_collection = config.messages_collection.clone();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_store_config_serde_roundtrip() {
        let config = StoreConfig {
            backend: BackendKind::Sqlite,
            sqlite: SqliteConfig::default(),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"backend\":\"sqlite\""));
        let parsed: StoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.backend, BackendKind::Sqlite);
    }
}
