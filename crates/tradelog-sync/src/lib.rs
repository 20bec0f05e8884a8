//! Cloud sync boundary for account data (trades, tags, strategies, friends).
//!
//! Every provider refuses to run without a signed-in [`Identity`]; that is
//! the one storage-adjacent failure reported to callers instead of recovered.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

mod firestore;

pub use firestore::{FirestoreConfig, FirestoreSync};

/// Collection names under each user's document.
pub mod collections {
    pub const USERS: &str = "users";
    pub const TRADES: &str = "trades";
    pub const TAGS: &str = "tags";
    pub const STRATEGIES: &str = "strategies";
    pub const FRIENDS: &str = "friends";

    /// Collections that can be pulled or pushed.
    pub const SYNCED: [&str; 4] = [TRADES, TAGS, STRATEGIES, FRIENDS];

    pub fn is_synced(name: &str) -> bool {
        SYNCED.contains(&name)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// No identity is signed in; sync calls fail fast.
    #[error("authentication required: sign in before syncing")]
    AuthenticationRequired,
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        source: anyhow::Error,
    },
}

/// Authenticated user as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    /// Bearer token sent with every request. Never logged.
    pub id_token: String,
}

/// Current sign-in state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    identity: Option<Identity>,
}

impl AuthState {
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn sign_in(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    pub fn sign_out(&mut self) {
        self.identity = None;
    }
}

/// Guard run before any sync call.
pub fn require_identity(auth: &AuthState) -> Result<&Identity, SyncError> {
    auth.identity().ok_or(SyncError::AuthenticationRequired)
}

fn require_collection(name: &str) -> Result<(), SyncError> {
    if collections::is_synced(name) {
        Ok(())
    } else {
        Err(SyncError::UnknownCollection(name.to_string()))
    }
}

/// One account document as exchanged with the cloud store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDocument {
    pub id: String,
    pub collection: String,
    pub payload: Value,
    pub updated_at: DateTime<Utc>,
}

impl AccountDocument {
    pub fn new(collection: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            collection: collection.into(),
            payload,
            updated_at: Utc::now(),
        }
    }
}

/// Pull/push contract for syncing account data with a remote document store.
#[async_trait]
pub trait AccountSync: Send + Sync {
    /// Human-readable provider name (e.g., "firestore").
    fn name(&self) -> &'static str;

    /// Fetch every document of `collection` owned by the signed-in user.
    async fn pull(
        &self,
        auth: &AuthState,
        collection: &str,
    ) -> Result<Vec<AccountDocument>, SyncError>;

    /// Upsert documents for the signed-in user.
    async fn push(&self, auth: &AuthState, documents: &[AccountDocument])
        -> Result<(), SyncError>;
}

/// Provider used when no remote is configured. Still enforces sign-in.
pub struct NoopSync;

#[async_trait]
impl AccountSync for NoopSync {
    fn name(&self) -> &'static str {
        "noop"
    }

    #[instrument(skip_all)]
    async fn pull(
        &self,
        auth: &AuthState,
        collection: &str,
    ) -> Result<Vec<AccountDocument>, SyncError> {
        require_identity(auth)?;
        require_collection(collection)?;
        Ok(Vec::new())
    }

    #[instrument(skip_all)]
    async fn push(
        &self,
        auth: &AuthState,
        documents: &[AccountDocument],
    ) -> Result<(), SyncError> {
        require_identity(auth)?;
        for doc in documents {
            require_collection(&doc.collection)?;
        }
        Ok(())
    }
}

type DocumentKey = (String, String, String);

/// In-process document store keyed by user, collection and id.
/// Pushes keep whichever copy has the newer `updated_at`.
#[derive(Debug, Default, Clone)]
pub struct MemorySync {
    documents: Arc<Mutex<BTreeMap<DocumentKey, AccountDocument>>>,
}

impl MemorySync {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<DocumentKey, AccountDocument>>, SyncError> {
        self.documents.lock().map_err(|err| SyncError::Transport {
            provider: "memory",
            source: anyhow::anyhow!("lock poisoned: {err}"),
        })
    }
}

#[async_trait]
impl AccountSync for MemorySync {
    fn name(&self) -> &'static str {
        "memory"
    }

    #[instrument(skip_all, fields(collection))]
    async fn pull(
        &self,
        auth: &AuthState,
        collection: &str,
    ) -> Result<Vec<AccountDocument>, SyncError> {
        let identity = require_identity(auth)?;
        require_collection(collection)?;
        let documents = self.lock()?;
        Ok(documents
            .iter()
            .filter(|((uid, coll, _), _)| uid == &identity.uid && coll == collection)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    #[instrument(skip_all)]
    async fn push(
        &self,
        auth: &AuthState,
        documents: &[AccountDocument],
    ) -> Result<(), SyncError> {
        let identity = require_identity(auth)?;
        for doc in documents {
            require_collection(&doc.collection)?;
        }

        let mut stored = self.lock()?;
        for doc in documents {
            let key = (identity.uid.clone(), doc.collection.clone(), doc.id.clone());
            match stored.get(&key) {
                Some(existing) if existing.updated_at > doc.updated_at => {
                    debug!(id = %doc.id, "kept newer remote document");
                }
                _ => {
                    stored.insert(key, doc.clone());
                }
            }
        }
        Ok(())
    }
}
