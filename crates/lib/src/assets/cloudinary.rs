//! Cloudinary image upload.
//!
//! Uses the signed upload endpoint: the request carries the API key, a
//! timestamp, and a signature over the sorted signed parameters with the API
//! secret appended. The digest is SHA-1 unless the credentials select SHA-256.

use async_trait::async_trait;
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::{AssetError, AssetHost, UploadedAsset};
use crate::{
    Clock, Result,
    config::{CloudinaryCredentials, SignatureAlgorithm},
};
use std::sync::Arc;

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Sign `params` the way Cloudinary expects: `k=v` pairs sorted by key and
/// joined with `&`, secret appended, hashed and hex encoded.
pub(crate) fn sign(
    params: &[(&str, String)],
    api_secret: &str,
    algorithm: SignatureAlgorithm,
) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    match algorithm {
        SignatureAlgorithm::Sha1 => digest::<Sha1>(&to_sign, api_secret),
        SignatureAlgorithm::Sha256 => digest::<Sha256>(&to_sign, api_secret),
    }
}

fn digest<D: Digest>(to_sign: &str, api_secret: &str) -> String {
    let mut hasher = D::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Uploads images to a Cloudinary product environment.
pub struct CloudinaryHost {
    credentials: CloudinaryCredentials,
    api_base: String,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl CloudinaryHost {
    pub fn new(credentials: CloudinaryCredentials, clock: Arc<dyn Clock>) -> Self {
        Self {
            credentials,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
            clock,
        }
    }

    /// Point the uploader at another API root (a proxy or a test server).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/{}/image/upload",
            self.api_base, self.credentials.cloud_name
        )
    }
}

#[async_trait]
impl AssetHost for CloudinaryHost {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<UploadedAsset> {
        if bytes.is_empty() {
            return Err(AssetError::EmptyUpload.into());
        }

        let timestamp = self.clock.now_secs().to_string();
        let signature = sign(
            &[("timestamp", timestamp.clone())],
            &self.credentials.api_secret,
            self.credentials.signature_algorithm,
        );

        let size = bytes.len();
        let file = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("api_key", self.credentials.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| AssetError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error.message,
                Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
            };
            tracing::warn!(status = status.as_u16(), %message, "Asset upload rejected");
            return Err(AssetError::Rejected {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let body: UploadResponse =
            response
                .json()
                .await
                .map_err(|e| AssetError::InvalidResponse {
                    reason: e.to_string(),
                })?;

        tracing::info!(bytes = size, url = %body.secure_url, "Uploaded asset");
        Ok(UploadedAsset {
            secure_url: body.secure_url,
            public_id: body.public_id,
        })
    }
}
