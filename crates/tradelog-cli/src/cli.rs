use clap::{Args, Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "tradelog",
    about = "Local storage, settings and cloud sync for the trading journal",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; defaults to showing the current settings.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print version and exit.
    Version,
    /// Round-trip a sample value through durable and session storage.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Show or change the persisted display settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Inspect the obfuscated key-value store directly.
    #[command(subcommand)]
    Storage(StorageCommand),
    /// Pull account data into the local cache, or push the cache upstream.
    Sync {
        /// Limit to one collection (trades, tags, strategies, friends).
        #[arg(long)]
        collection: Option<String>,
        /// Push cached documents instead of pulling.
        #[arg(long)]
        push: bool,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SettingsCommand {
    /// Print the merged settings.
    Show,
    /// Update one or more fields; unspecified fields keep their value.
    Set(SettingsArgs),
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsArgs {
    #[arg(long)]
    pub primary_text: Option<String>,
    #[arg(long)]
    pub primary_color: Option<String>,
    #[arg(long)]
    pub secondary_text: Option<String>,
    #[arg(long)]
    pub secondary_color: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum StorageCommand {
    /// Print the decoded value stored under a key.
    Get { key: String },
    /// Store a value; parsed as JSON when possible, otherwise as a string.
    Set { key: String, value: String },
    /// Exit successfully if the key exists.
    Has { key: String },
    /// Remove a key (no error if absent).
    Remove { key: String },
    /// List stored keys.
    Keys,
    /// Remove every key in the configured namespace.
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_none_when_missing_subcommand() {
        let cli = Cli::try_parse_from(["tradelog"]).expect("parse should succeed");
        assert_eq!(cli.command, None);
    }

    #[test]
    fn parses_health_subcommand() {
        let cli = Cli::try_parse_from(["tradelog", "health"]).expect("parse should succeed");
        assert_eq!(cli.command, Some(Command::Health));
    }

    #[test]
    fn parses_config_init_subcommand() {
        let cli =
            Cli::try_parse_from(["tradelog", "config", "init"]).expect("parse should succeed");
        assert_eq!(cli.command, Some(Command::Config(ConfigCommand::Init)));
    }

    #[test]
    fn parses_partial_settings_update() {
        let cli = Cli::try_parse_from([
            "tradelog",
            "settings",
            "set",
            "--primary-color",
            "text-blue-500",
        ])
        .expect("parse should succeed");
        assert_eq!(
            cli.command,
            Some(Command::Settings(SettingsCommand::Set(SettingsArgs {
                primary_color: Some("text-blue-500".into()),
                ..SettingsArgs::default()
            })))
        );
    }

    #[test]
    fn parses_storage_set() {
        let cli = Cli::try_parse_from(["tradelog", "storage", "set", "k", "{\"a\":1}"])
            .expect("parse should succeed");
        assert_eq!(
            cli.command,
            Some(Command::Storage(StorageCommand::Set {
                key: "k".into(),
                value: "{\"a\":1}".into(),
            }))
        );
    }

    #[test]
    fn parses_sync_flags() {
        let cli = Cli::try_parse_from(["tradelog", "sync", "--collection", "trades", "--push"])
            .expect("parse should succeed");
        assert_eq!(
            cli.command,
            Some(Command::Sync {
                collection: Some("trades".into()),
                push: true,
            })
        );
    }
}
