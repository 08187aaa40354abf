//! Store configuration loader for chatlog.
//!
//! Reads `config.toml` from the data directory (`~/.chatlog/` by default)
//! and deserializes it into [`StoreConfig`], then layers environment
//! overrides on top. A missing file means defaults; a file that exists but
//! cannot be read or parsed is an error, since silently falling back to the
//! volatile backend would lose data.

use std::path::{Path, PathBuf};

use chatlog_types::config::StoreConfig;
use chatlog_types::error::ConfigError;

/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "CHATLOG_DATA_DIR";
/// Overrides `backend`.
pub const BACKEND_ENV: &str = "CHATLOG_BACKEND";
/// Overrides `sqlite.url`.
pub const DATABASE_URL_ENV: &str = "CHATLOG_DATABASE_URL";

const CONFIG_FILE: &str = "config.toml";

/// Resolve the data directory.
///
/// `CHATLOG_DATA_DIR` if set, otherwise `~/.chatlog`, otherwise `.chatlog`
/// in the current directory.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".chatlog");
    }

    PathBuf::from(".chatlog")
}

/// Load `{data_dir}/config.toml`, apply environment overrides, and validate.
pub async fn load_store_config(data_dir: &Path) -> Result<StoreConfig, ConfigError> {
    let mut config = read_config_file(data_dir).await?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

async fn read_config_file(data_dir: &Path) -> Result<StoreConfig, ConfigError> {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return Ok(StoreConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: config_path,
                source,
            });
        }
    };

    toml::from_str::<StoreConfig>(&content).map_err(|err| ConfigError::Parse {
        path: config_path,
        message: err.to_string(),
    })
}

/// Apply `CHATLOG_BACKEND` and `CHATLOG_DATABASE_URL` through `lookup`.
///
/// Empty values are ignored.
pub fn apply_env_overrides(
    config: &mut StoreConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some(backend) = non_empty(BACKEND_ENV) {
        config.backend = backend.parse()?;
        tracing::debug!(backend = %config.backend, "Backend overridden from environment");
    }
    if let Some(url) = non_empty(DATABASE_URL_ENV) {
        config.sqlite.url = Some(url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlog_types::config::BackendKind;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = read_config_file(tmp.path()).await.unwrap();
        assert_eq!(config.backend, BackendKind::InMemory);
        assert_eq!(config.sqlite.database, "chatdb");
    }

    #[tokio::test]
    async fn valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
backend = "sqlite"

[sqlite]
database = "support"
titles_collection = "titles"
"#,
        )
        .await
        .unwrap();

        let config = read_config_file(tmp.path()).await.unwrap();
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.sqlite.database, "support");
        assert_eq!(config.sqlite.titles_collection, "titles");
        assert_eq!(config.sqlite.messages_collection, "messages");
    }

    #[tokio::test]
    async fn malformed_toml_is_an_error() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "backend = [not toml")
            .await
            .unwrap();

        let err = read_config_file(tmp.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[tokio::test]
    async fn unknown_backend_in_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), r#"backend = "cassandra""#)
            .await
            .unwrap();

        let err = read_config_file(tmp.path()).await.unwrap_err();
        assert!(err.to_string().contains("cassandra"), "{err}");
    }

    #[test]
    fn env_overrides_backend_and_url() {
        let mut config = StoreConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                (BACKEND_ENV, "durable"),
                (DATABASE_URL_ENV, "sqlite:///srv/chat.db?mode=rwc"),
            ]),
        )
        .unwrap();

        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(
            config.sqlite.url.as_deref(),
            Some("sqlite:///srv/chat.db?mode=rwc")
        );
    }

    #[test]
    fn env_empty_values_are_ignored() {
        let mut config = StoreConfig::default();
        apply_env_overrides(&mut config, env(&[(BACKEND_ENV, "  ")])).unwrap();
        assert_eq!(config.backend, BackendKind::InMemory);
        assert!(config.sqlite.url.is_none());
    }

    #[test]
    fn env_unknown_backend_rejected() {
        let mut config = StoreConfig::default();
        let err = apply_env_overrides(&mut config, env(&[(BACKEND_ENV, "etcd")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(name) if name == "etcd"));
    }
}
