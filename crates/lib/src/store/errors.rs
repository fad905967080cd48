//! Error types for credential storage.

use thiserror::Error;

use crate::Error;

/// Errors that can occur while reading or writing identities.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// An identity with this email is already stored.
    #[error("Identity already exists: {email}")]
    DuplicateEmail {
        /// The email that collided
        email: String,
    },

    /// JSON persistence file could not be read or written.
    #[error("Store file I/O failed: {source}")]
    FileIo {
        #[source]
        source: std::io::Error,
    },

    /// Serializing identities for persistence failed.
    #[error("Failed to serialize identities: {source}")]
    SerializationFailed {
        #[source]
        source: serde_json::Error,
    },

    /// Persisted identities could not be parsed.
    #[error("Failed to deserialize identities: {source}")]
    DeserializationFailed {
        #[source]
        source: serde_json::Error,
    },

    /// SQL driver error, with context.
    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("SQL error: {reason}")]
    SqlxError {
        /// What was being attempted
        reason: String,
        #[source]
        source: Option<sqlx::Error>,
    },
}

impl StoreError {
    /// Check if this error is a uniqueness violation on email.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateEmail { .. })
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::Store(err)
    }
}
