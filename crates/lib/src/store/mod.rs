//! Credential storage.
//!
//! A [`CredentialStore`] holds one [`Identity`] per registered email. The auth
//! service only ever looks identities up by email and inserts new ones, so that
//! is the whole interface. Implementations must make `insert` atomic with
//! respect to the uniqueness of `email`: a second insert for the same email
//! fails with [`StoreError::DuplicateEmail`] even when two registrations race
//! past the service's own existence check.

use std::any::Any;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

mod errors;
mod in_memory;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod sql;

pub use errors::StoreError;
pub use in_memory::InMemoryCredentialStore;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub use sql::{DbKind, SqlxCredentialStore};

/// A registered email and the hash of its password.
///
/// Emails are compared exactly as stored; no case folding is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    /// Argon2id hash in PHC string format.
    pub password_hash: String,
}

impl Identity {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password_hash: password_hash.into(),
        }
    }
}

/// Storage for registered identities.
///
/// All implementations must be `Send + Sync` so a single store can be shared
/// across request handlers, and implement `Any` so callers can downcast to a
/// concrete store (for example to persist a JSON-backed store at shutdown).
#[async_trait]
pub trait CredentialStore: Send + Sync + Any {
    /// Look up the identity registered under `email`, if any.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>>;

    /// Insert a new identity.
    ///
    /// # Errors
    /// [`StoreError::DuplicateEmail`] if the email is already stored.
    async fn insert(&self, identity: Identity) -> Result<()>;

    /// Number of stored identities.
    async fn count(&self) -> Result<usize>;

    /// Short name of the storage kind, reported by the health endpoint.
    fn kind(&self) -> &'static str;

    /// Returns a reference to the store as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}
