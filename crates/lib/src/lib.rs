//!
//! glimpse: account sign-in and single-object image detection.
//!
//! The library holds every component of the service so the HTTP surface can be
//! driven end to end from tests; the `glimpse` binary only parses configuration
//! and wires the pieces together.
//!
//! ## Core Concepts
//!
//! * **Identities (`store::Identity`)**: one record per registered email, holding the
//!   Argon2id hash of the password. Persisted through a `store::CredentialStore`.
//! * **Session tokens (`auth::SessionToken`)**: stateless signed bearer tokens issued
//!   by a `auth::TokenCodec`. Validity is the signature plus the expiry, nothing is stored.
//! * **Auth service (`auth::AuthService`)**: register, login and "who am I" on top of
//!   the store and the codec.
//! * **Asset host (`assets::AssetHost`)**: remote, URL-addressable storage for uploads.
//! * **Detector (`detect::Detector`)**: fetches an image by URL, runs the shared
//!   `detect::ObjectModel` once and keeps the first candidate it reports.
//! * **Pipeline (`pipeline::ImagePipeline`)**: upload, then detect, then respond.

pub mod api;
pub mod assets;
pub mod auth;
pub mod clock;
pub mod config;
pub mod detect;
pub mod pipeline;
pub mod store;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;

/// Result type used throughout the glimpse library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the glimpse library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structured credential store errors from the store module
    #[error(transparent)]
    Store(store::StoreError),

    /// Structured authentication errors from the auth module
    #[error(transparent)]
    Auth(auth::AuthError),

    /// Structured upload errors from the assets module
    #[error(transparent)]
    Asset(assets::AssetError),

    /// Structured detection errors from the detect module
    #[error(transparent)]
    Detect(detect::DetectError),

    /// Invalid startup configuration
    #[error(transparent)]
    Config(config::ConfigError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Store(_) => "store",
            Error::Auth(_) => "auth",
            Error::Asset(_) => "assets",
            Error::Detect(_) => "detect",
            Error::Config(_) => "config",
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Auth(auth_err) => auth_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates a conflict (already exists).
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Auth(auth_err) => auth_err.is_conflict(),
            Error::Store(store_err) => store_err.is_duplicate(),
            _ => false,
        }
    }

    /// Check if this error means the caller is not authenticated.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Error::Auth(auth_err) => auth_err.is_unauthorized(),
            _ => false,
        }
    }

    /// Check if this error came from the credential store.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Store(_))
    }
}
