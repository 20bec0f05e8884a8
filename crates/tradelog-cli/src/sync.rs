use color_eyre::{Result, Section};
use tracing::{info, warn};
use tradelog_core::storage::StorageBackend;
use tradelog_storage::SecureStorage;
use tradelog_sync::{
    collections, AccountDocument, AccountSync, AuthState, FirestoreSync, NoopSync, SyncError,
};

use crate::{config, storage};

/// Pull (default) or push account documents for the selected collections.
/// Pulled documents are cached in durable storage under `sync/<collection>`.
pub async fn run(cfg: &config::Config, collection: Option<String>, push: bool) -> Result<()> {
    let provider = select_provider(cfg);
    let auth = cfg.auth_state();
    let storage = storage::secure_storage(cfg)?;
    let targets = match collection {
        Some(name) => vec![name],
        None => collections::SYNCED.iter().map(|c| c.to_string()).collect(),
    };
    info!(provider = provider.name(), push, "sync invoked");

    let result = if push {
        push_cached(provider.as_ref(), &auth, &storage, &targets).await
    } else {
        pull_into_cache(provider.as_ref(), &auth, &storage, &targets).await
    };

    match result {
        Ok(counts) => {
            for (name, count) in counts {
                let verb = if push { "Pushed" } else { "Pulled" };
                println!("{verb} {count} {name} document(s).");
            }
            Ok(())
        }
        Err(err) => {
            warn!(error = %err, "sync failed");
            Err(notify(err))
        }
    }
}

fn notify(err: SyncError) -> color_eyre::Report {
    let hint = match &err {
        SyncError::AuthenticationRequired => {
            "set [account] uid and id_token in the config file, or export TRADELOG_ID_TOKEN"
        }
        SyncError::UnknownCollection(_) => "use one of: trades, tags, strategies, friends",
        SyncError::Transport { .. } => "check the network and the [firestore] settings",
    };
    color_eyre::eyre::eyre!("Sync failed: {err}").suggestion(hint)
}

fn select_provider(cfg: &config::Config) -> Box<dyn AccountSync> {
    if let Some(firestore) = &cfg.firestore {
        return Box::new(FirestoreSync::new(firestore.clone()));
    }
    Box::new(NoopSync)
}

fn cache_key(collection: &str) -> String {
    format!("sync/{collection}")
}

async fn pull_into_cache<B: StorageBackend>(
    provider: &dyn AccountSync,
    auth: &AuthState,
    storage: &SecureStorage<B>,
    targets: &[String],
) -> Result<Vec<(String, usize)>, SyncError> {
    let mut counts = Vec::new();
    for name in targets {
        let documents = provider.pull(auth, name).await?;
        let key = cache_key(name);
        storage.set_item(&key, &documents);
        if !storage.has_item(&key) {
            warn!(collection = %name, "pulled documents were not cached");
            println!("Warning: {name} documents were pulled but could not be cached locally.");
            continue;
        }
        counts.push((name.clone(), documents.len()));
    }
    Ok(counts)
}

async fn push_cached<B: StorageBackend>(
    provider: &dyn AccountSync,
    auth: &AuthState,
    storage: &SecureStorage<B>,
    targets: &[String],
) -> Result<Vec<(String, usize)>, SyncError> {
    let mut counts = Vec::new();
    for name in targets {
        let documents: Vec<AccountDocument> = storage
            .get_item(&cache_key(name))
            .unwrap_or_default();
        provider.push(auth, &documents).await?;
        counts.push((name.clone(), documents.len()));
    }
    Ok(counts)
}
