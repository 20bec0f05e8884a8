use std::path::{Path, PathBuf};

use color_eyre::Result;
use dirs::data_dir;
use serde_json::Value;
use tracing::debug;
use tradelog_storage::{FileBackend, SecureStorage};

use crate::{cli::StorageCommand, config::Config};

/// Resolve the default data directory for tradelog.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("tradelog"))
}

/// Durable, obfuscated storage rooted at the configured data directory.
pub fn secure_storage(config: &Config) -> Result<SecureStorage<FileBackend>> {
    let root = match &config.data_dir {
        Some(root) => {
            debug!(?root, "initializing durable storage (config override)");
            root.clone()
        }
        None => {
            let root = default_data_dir()?;
            debug!(?root, "initializing durable storage");
            root
        }
    };
    Ok(storage_at(&root, config.namespace()))
}

pub fn storage_at(root: &Path, namespace: &str) -> SecureStorage<FileBackend> {
    SecureStorage::new(FileBackend::new(root, namespace))
}

/// Execute a storage subcommand against the durable store.
pub fn handle(cmd: StorageCommand, config: &Config) -> Result<()> {
    let storage = secure_storage(config)?;
    match cmd {
        StorageCommand::Get { key } => match storage.get_value(&key) {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => println!("(no value for {key})"),
        },
        StorageCommand::Set { key, value } => {
            storage.set_item(&key, &parse_value(&value));
            if storage.has_item(&key) {
                println!("Stored {key}.");
            } else {
                color_eyre::eyre::bail!("value for {key} could not be stored; see log output");
            }
        }
        StorageCommand::Has { key } => {
            if !storage.has_item(&key) {
                color_eyre::eyre::bail!("{key} is not stored");
            }
            println!("{key} is stored.");
        }
        StorageCommand::Remove { key } => {
            storage.remove_item(&key);
            println!("Removed {key}.");
        }
        StorageCommand::Keys => {
            let keys = storage.keys();
            if keys.is_empty() {
                println!("No keys stored.");
            }
            for key in keys {
                println!("{key}");
            }
        }
        StorageCommand::Clear => {
            storage.clear();
            println!("Cleared namespace {}.", config.namespace());
        }
    }
    Ok(())
}

/// JSON when the input parses as JSON, otherwise a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Helper for tests to construct storage rooted at a temp dir.
#[cfg(test)]
pub fn test_storage(root: &Path) -> SecureStorage<FileBackend> {
    storage_at(root, "test")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_json_or_falls_back_to_string() {
        assert_eq!(parse_value("{\"a\":1}"), json!({ "a": 1 }));
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("hello world"), json!("hello world"));
    }

    #[test]
    fn config_override_roots_storage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            data_dir: Some(dir.path().to_path_buf()),
            namespace: Some("alice".into()),
            ..Config::default()
        };
        let storage = secure_storage(&config).expect("storage");
        storage.set_item("k", "v");

        assert!(storage.backend().dir().starts_with(dir.path()));
        assert_eq!(
            storage_at(dir.path(), "alice").get_item::<String>("k"),
            Some("v".to_string())
        );
        assert_eq!(storage_at(dir.path(), "bob").get_item::<String>("k"), None);
    }

    #[test]
    fn handle_set_then_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            data_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        handle(
            StorageCommand::Set {
                key: "watchlist".into(),
                value: "[\"ES\",\"NQ\"]".into(),
            },
            &config,
        )
        .expect("set");

        let storage = secure_storage(&config).expect("storage");
        assert_eq!(
            storage.get_item::<Vec<String>>("watchlist"),
            Some(vec!["ES".to_string(), "NQ".to_string()])
        );

        handle(
            StorageCommand::Remove {
                key: "watchlist".into(),
            },
            &config,
        )
        .expect("remove");
        let err = handle(
            StorageCommand::Has {
                key: "watchlist".into(),
            },
            &config,
        )
        .expect_err("key should be gone");
        assert!(err.to_string().contains("watchlist is not stored"));
    }
}
