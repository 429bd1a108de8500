//! Avatar download.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use super::error::{ImageCacheError, Result};
use crate::config::ImageCacheConfig;

/// User agent sent with avatar requests.
pub const USER_AGENT: &str = concat!("nostrmail-core/", env!("CARGO_PKG_VERSION"));

/// A downloaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    /// Raw bytes.
    pub payload: Vec<u8>,
    /// `Content-Type` reported by the server.
    pub content_type: Option<String>,
}

/// Downloads avatar images.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetches `url`. Any failure yields `None`; callers never retry.
    async fn fetch_image(&self, url: &str) -> Option<FetchedImage>;
}

/// [`ImageFetcher`] over HTTP(S).
pub struct HttpImageFetcher {
    client: Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    /// Creates a fetcher with the configured timeout and size limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ImageCacheConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ImageCacheError::Http(e.to_string()))?;

        Ok(Self {
            client,
            max_bytes: config.max_image_bytes,
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_image(&self, url: &str) -> Option<FetchedImage> {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    tracing::debug!("FETCH {url}: Failed: timed out");
                } else {
                    tracing::debug!("FETCH {url}: Failed: {e}");
                }
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("FETCH {url}: Failed: {status}");
            return None;
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            tracing::debug!("FETCH {url}: Failed: larger than {} bytes", self.max_bytes);
            return None;
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!("FETCH {url}: Failed: body error: {e}");
                return None;
            }
        };

        if bytes.is_empty() || bytes.len() > self.max_bytes {
            tracing::debug!("FETCH {url}: Failed: unusable size {}", bytes.len());
            return None;
        }

        tracing::debug!("FETCH {url}: Succeeded ({} bytes)", bytes.len());
        Some(FetchedImage {
            payload: bytes.to_vec(),
            content_type,
        })
    }
}
