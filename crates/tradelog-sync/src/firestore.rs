use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    collections, require_collection, require_identity, AccountDocument, AccountSync, AuthState,
    Identity, SyncError,
};

const DEFAULT_API_BASE: &str = "https://firestore.googleapis.com/v1";

/// Firestore project settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FirestoreConfig {
    pub project_id: String,
    #[serde(default)]
    pub api_base: Option<String>,
}

/// Firestore REST provider. Documents live at
/// `users/{uid}/{collection}/{id}` with the payload kept as a JSON string field.
pub struct FirestoreSync {
    cfg: FirestoreConfig,
    client: reqwest::Client,
}

impl FirestoreSync {
    pub fn new(cfg: FirestoreConfig) -> Self {
        Self {
            cfg,
            client: reqwest::Client::new(),
        }
    }

    fn user_root(&self, uid: &str) -> String {
        let base = self
            .cfg
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/');
        format!(
            "{base}/projects/{}/databases/(default)/documents/{}/{uid}",
            self.cfg.project_id,
            collections::USERS
        )
    }

    async fn list(&self, identity: &Identity, collection: &str) -> Result<Vec<AccountDocument>> {
        let url = format!("{}/{collection}", self.user_root(&identity.uid));
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).bearer_auth(&identity.id_token);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: ListDocumentsResponse = request
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            for doc in page.documents {
                out.push(from_firestore(collection, doc)?);
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        debug!(count = out.len(), "pulled documents");
        Ok(out)
    }

    async fn upsert(&self, identity: &Identity, doc: &AccountDocument) -> Result<()> {
        let url = format!(
            "{}/{}/{}",
            self.user_root(&identity.uid),
            doc.collection,
            doc.id
        );
        self.client
            .patch(&url)
            .bearer_auth(&identity.id_token)
            .json(&to_firestore(doc)?)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl AccountSync for FirestoreSync {
    fn name(&self) -> &'static str {
        "firestore"
    }

    #[instrument(skip_all, fields(project = %self.cfg.project_id, collection))]
    async fn pull(
        &self,
        auth: &AuthState,
        collection: &str,
    ) -> Result<Vec<AccountDocument>, SyncError> {
        let identity = require_identity(auth)?;
        require_collection(collection)?;
        self.list(identity, collection).await.map_err(transport)
    }

    #[instrument(skip_all, fields(project = %self.cfg.project_id))]
    async fn push(
        &self,
        auth: &AuthState,
        documents: &[AccountDocument],
    ) -> Result<(), SyncError> {
        let identity = require_identity(auth)?;
        for doc in documents {
            require_collection(&doc.collection)?;
        }
        for doc in documents {
            self.upsert(identity, doc).await.map_err(transport)?;
        }
        Ok(())
    }
}

fn transport(source: anyhow::Error) -> SyncError {
    SyncError::Transport {
        provider: "firestore",
        source,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FirestoreDocument {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
    fields: DocumentFields,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentFields {
    payload: StringValue,
    updated_at: TimestampValue,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StringValue {
    string_value: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimestampValue {
    timestamp_value: DateTime<Utc>,
}

fn to_firestore(doc: &AccountDocument) -> Result<FirestoreDocument> {
    Ok(FirestoreDocument {
        name: String::new(),
        fields: DocumentFields {
            payload: StringValue {
                string_value: serde_json::to_string(&doc.payload)?,
            },
            updated_at: TimestampValue {
                timestamp_value: doc.updated_at,
            },
        },
    })
}

fn from_firestore(collection: &str, doc: FirestoreDocument) -> Result<AccountDocument> {
    let id = doc
        .name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow!("document without a name"))?
        .to_string();
    let payload = serde_json::from_str(&doc.fields.payload.string_value)
        .with_context(|| format!("payload of {collection}/{id} is not json"))?;
    Ok(AccountDocument {
        id,
        collection: collection.to_string(),
        payload,
        updated_at: doc.fields.updated_at.timestamp_value,
    })
}
