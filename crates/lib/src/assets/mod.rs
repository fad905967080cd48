//! Remote asset hosting for uploaded images.
//!
//! An [`AssetHost`] takes raw bytes and hands back a durable URL. What happens
//! to the asset afterwards is outside this service's control.

use async_trait::async_trait;
use thiserror::Error;

use crate::{Error, Result};

mod cloudinary;

pub use cloudinary::CloudinaryHost;

/// Errors returned by an asset host.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AssetError {
    /// The request never got a response.
    #[error("Upload request failed: {reason}")]
    RequestFailed { reason: String },

    /// The host answered with a non-success status.
    #[error("Asset host rejected upload with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The host answered 2xx but the body is not what we expect.
    #[error("Unexpected asset host response: {reason}")]
    InvalidResponse { reason: String },

    /// Nothing to upload.
    #[error("Upload body is empty")]
    EmptyUpload,
}

impl From<AssetError> for Error {
    fn from(err: AssetError) -> Self {
        Error::Asset(err)
    }
}

/// A stored asset as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    /// HTTPS retrieval URL.
    pub secure_url: String,
    /// Host-side identifier, if the host reports one.
    pub public_id: Option<String>,
}

/// Durable, URL-addressable storage for uploaded images.
#[async_trait]
pub trait AssetHost: Send + Sync {
    /// Upload `bytes` and return where they can be fetched from.
    ///
    /// `filename` is advisory; hosts may ignore it.
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<UploadedAsset>;
}
