mod cli;
mod config;
mod settings;
mod storage;
mod sync;

use clap::Parser;
use color_eyre::Result;
use serde_json::json;
use tradelog_core::storage::StorageBackend;
use tradelog_storage::{SecureStorage, SessionStorage};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{ConfigCommand, SettingsCommand};

/// Entry point wiring the CLI to storage, settings and sync.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli
        .command
        .unwrap_or(cli::Command::Settings(SettingsCommand::Show))
    {
        cli::Command::Version => print_version(),
        cli::Command::Health => run_health_check(&config)?,
        cli::Command::Config(ConfigCommand::Init) => init_config(&config)?,
        cli::Command::Settings(cmd) => settings::handle(cmd, &config)?,
        cli::Command::Storage(cmd) => storage::handle(cmd, &config)?,
        cli::Command::Sync { collection, push } => sync::run(&config, collection, push).await?,
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("tradelog {}", env!("CARGO_PKG_VERSION"));
}

/// Runs a quick health check of the durable and session storage paths.
fn run_health_check(config: &config::Config) -> Result<()> {
    let durable = storage::secure_storage(config)?;
    run_store_health(&durable)?;
    println!("Durable storage: ok");

    run_session_health(&SessionStorage::start())?;
    println!("Session storage: ok");
    Ok(())
}

const HEALTH_KEY: &str = "health/check";

fn run_store_health<B: StorageBackend>(store: &SecureStorage<B>) -> Result<()> {
    let payload = json!({ "ok": true, "tags": ["health"] });
    store.set_item(HEALTH_KEY, &payload);
    let round_trip = store.get_value(HEALTH_KEY);
    let present = store.has_item(HEALTH_KEY);
    store.remove_item(HEALTH_KEY);

    if round_trip.as_ref() != Some(&payload) || !present {
        color_eyre::eyre::bail!("durable storage round-trip failed");
    }
    if store.has_item(HEALTH_KEY) {
        color_eyre::eyre::bail!("durable storage remove failed");
    }
    Ok(())
}

fn run_session_health<B: StorageBackend>(store: &SessionStorage<B>) -> Result<()> {
    store.set_item(HEALTH_KEY, "ok");
    let round_trip: Option<String> = store.get_item(HEALTH_KEY);
    store.remove_item(HEALTH_KEY);

    if round_trip.as_deref() != Some("ok") {
        color_eyre::eyre::bail!("session storage round-trip failed");
    }
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use tradelog_core::storage::MemoryBackend;

    use super::*;
    use crate::storage;

    #[test]
    fn health_check_with_test_store_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_storage(dir.path());
        run_store_health(&store).expect("health check should succeed");
        assert!(store.keys().is_empty(), "health record must be cleaned up");
    }

    #[test]
    fn session_health_succeeds() {
        run_session_health(&SessionStorage::start()).expect("session health");
    }

    #[test]
    fn health_check_reports_full_store() {
        let store = SecureStorage::new(MemoryBackend::with_quota(4));
        let err = run_store_health(&store).expect_err("nothing fits in the quota");
        assert!(err.to_string().contains("round-trip failed"));
    }
}
