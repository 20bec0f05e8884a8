use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use tradelog_sync::{AuthState, FirestoreConfig, Identity};

/// Environment variable consulted when the config carries no id token.
pub const ID_TOKEN_ENV: &str = "TRADELOG_ID_TOKEN";

/// User-level configuration loaded from `~/.config/tradelog/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for the data directory (durable storage).
    pub data_dir: Option<PathBuf>,
    /// Storage namespace; defaults to `default`.
    pub namespace: Option<String>,
    /// Signed-in account used for sync (optional).
    pub account: Option<AccountConfig>,
    /// Firestore project (optional; sync is a no-op without it).
    pub firestore: Option<FirestoreConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct AccountConfig {
    pub uid: Option<String>,
    pub id_token: Option<String>,
}

impl Config {
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or("default")
    }

    /// Sign-in state derived from `[account]`, with the token optionally
    /// supplied through the environment.
    pub fn auth_state(&self) -> AuthState {
        let env_token = std::env::var(ID_TOKEN_ENV).ok();
        self.auth_state_with(env_token)
    }

    fn auth_state_with(&self, env_token: Option<String>) -> AuthState {
        let account = self.account.clone().unwrap_or_default();
        match (account.uid, account.id_token.or(env_token)) {
            (Some(uid), Some(id_token)) if !uid.is_empty() && !id_token.is_empty() => {
                AuthState::signed_in(Identity { uid, id_token })
            }
            _ => AuthState::signed_out(),
        }
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("tradelog").join("config.toml"))
}

/// Write the given config to the default path unless a file already exists.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    write_if_missing(config, &default_path()?)
}

fn write_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_default_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_from_path(dir.path().join("config.toml")).expect("load");
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.namespace(), "default");
    }

    #[test]
    fn parses_custom_config() {
        let contents = r#"
            data_dir = "/tmp/tradelog-data"
            namespace = "alice"
            [account]
            uid = "u-123"
            id_token = "secret"
            [firestore]
            project_id = "journal-prod"
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write temp config");

        let cfg = load_from_path(&path).expect("load");
        assert_eq!(
            cfg,
            Config {
                data_dir: Some(PathBuf::from("/tmp/tradelog-data")),
                namespace: Some("alice".into()),
                account: Some(AccountConfig {
                    uid: Some("u-123".into()),
                    id_token: Some("secret".into()),
                }),
                firestore: Some(FirestoreConfig {
                    project_id: "journal-prod".into(),
                    api_base: None,
                }),
            }
        );
    }

    #[test]
    fn write_creates_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            data_dir: Some(PathBuf::from("/tmp/tradelog-data")),
            ..Config::default()
        };

        write_if_missing(&cfg, &path).expect("write should succeed");
        let other = Config {
            namespace: Some("ignored".into()),
            ..Config::default()
        };
        let second = write_if_missing(&other, &path).expect("second write ok");
        assert_eq!(second, path);

        let loaded = load_from_path(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn auth_requires_uid_and_token() {
        let mut cfg = Config::default();
        assert!(cfg.auth_state_with(None).identity().is_none());

        cfg.account = Some(AccountConfig {
            uid: Some("u-1".into()),
            id_token: None,
        });
        assert!(cfg.auth_state_with(None).identity().is_none());

        let auth = cfg.auth_state_with(Some("from-env".into()));
        let identity = auth.identity().expect("signed in");
        assert_eq!(identity.uid, "u-1");
        assert_eq!(identity.id_token, "from-env");
    }
}
