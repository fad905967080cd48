//! Retrieval of image bytes by URL.

use async_trait::async_trait;

use super::DetectError;
use crate::Result;

/// Downloads the bytes behind an image URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch `url`.
    ///
    /// # Errors
    /// [`DetectError::FetchFailed`] if no response arrives,
    /// [`DetectError::FetchStatus`] for any status other than 200.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`ImageFetcher`] over plain HTTP(S).
#[derive(Debug, Clone, Default)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let failed = |e: reqwest::Error| DetectError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(failed)?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(DetectError::FetchStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let bytes = response.bytes().await.map_err(failed)?;
        tracing::debug!(url = %url, bytes = bytes.len(), "Fetched image");
        Ok(bytes.to_vec())
    }
}
