//! In-process credential store with optional JSON persistence.

use std::{any::Any, collections::HashMap, path::Path};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{CredentialStore, Identity, StoreError};
use crate::Result;

/// The current persistence file format version.
const PERSISTENCE_VERSION: u8 = 0;

/// On-disk layout of a persisted store.
#[derive(Serialize, Deserialize)]
struct SerializableStore {
    #[serde(rename = "_v", default)]
    version: u8,
    identities: Vec<Identity>,
}

/// Identities kept in a map keyed by email.
///
/// Lost on restart unless saved with [`save_to_file`](Self::save_to_file).
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    identities: RwLock<HashMap<String, Identity>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a JSON file written by `save_to_file`.
    ///
    /// A missing file yields an empty store.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => {
                let stored: SerializableStore = serde_json::from_str(&json)
                    .map_err(|e| StoreError::DeserializationFailed { source: e })?;
                if stored.version != PERSISTENCE_VERSION {
                    return Err(StoreError::DeserializationFailed {
                        source: serde::de::Error::custom(format!(
                            "unsupported persistence version {}; only version {PERSISTENCE_VERSION} is supported",
                            stored.version
                        )),
                    }
                    .into());
                }
                let identities = stored
                    .identities
                    .into_iter()
                    .map(|identity| (identity.email.clone(), identity))
                    .collect();
                Ok(Self {
                    identities: RwLock::new(identities),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(StoreError::FileIo { source: e }.into()),
        }
    }

    /// Write every identity to `path` as JSON.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut identities: Vec<Identity> = self.identities.read().await.values().cloned().collect();
        identities.sort_by(|a, b| a.email.cmp(&b.email));

        let json = serde_json::to_string_pretty(&SerializableStore {
            version: PERSISTENCE_VERSION,
            identities,
        })
        .map_err(|e| StoreError::SerializationFailed { source: e })?;

        tokio::fs::write(path, json)
            .await
            .map_err(|e| StoreError::FileIo { source: e }.into())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        Ok(self.identities.read().await.get(email).cloned())
    }

    async fn insert(&self, identity: Identity) -> Result<()> {
        // Check and insert under one write lock.
        let mut identities = self.identities.write().await;
        if identities.contains_key(&identity.email) {
            return Err(StoreError::DuplicateEmail {
                email: identity.email,
            }
            .into());
        }
        identities.insert(identity.email.clone(), identity);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.identities.read().await.len())
    }

    fn kind(&self) -> &'static str {
        "inmemory"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
