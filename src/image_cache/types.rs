//! Types for the avatar cache.

use base64::Engine;
use sha2::{Digest, Sha256};

/// Content type used when the payload format is not recognized.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A cached avatar payload.
///
/// An entry is only valid while `source_url` matches the contact's
/// current picture URL; a profile picture change turns it into a miss.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageCacheEntry {
    /// Contact pubkey (hex).
    pub pubkey: String,
    /// URL the payload was downloaded from.
    pub source_url: String,
    /// Raw image bytes.
    pub payload: Vec<u8>,
    /// MIME type of the payload.
    pub content_type: String,
    /// Hex SHA-256 of the payload.
    pub digest: String,
    /// When the payload was fetched (Unix timestamp).
    pub fetched_at: i64,
}

impl ImageCacheEntry {
    /// Creates an entry, sniffing the content type and hashing the payload.
    #[must_use]
    pub fn new(
        pubkey: impl Into<String>,
        source_url: impl Into<String>,
        payload: Vec<u8>,
        fetched_at: i64,
    ) -> Self {
        let content_type = sniff_content_type(&payload).to_string();
        let digest = hex::encode(Sha256::digest(&payload));
        Self {
            pubkey: pubkey.into(),
            source_url: source_url.into(),
            payload,
            content_type,
            digest,
            fetched_at,
        }
    }

    /// Whether this entry may be served for a contact whose picture is `current_url`.
    #[must_use]
    pub fn is_valid_for(&self, current_url: Option<&str>) -> bool {
        current_url.is_some_and(|url| url == self.source_url)
    }

    /// Renders the payload as a `data:` URL for the rendering layer.
    #[must_use]
    pub fn data_url(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.payload);
        format!("data:{};base64,{encoded}", self.content_type)
    }
}

impl std::fmt::Debug for ImageCacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCacheEntry")
            .field("pubkey", &self.pubkey)
            .field("source_url", &self.source_url)
            .field("payload", &format_args!("<{} bytes>", self.payload.len()))
            .field("content_type", &self.content_type)
            .field("digest", &self.digest)
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

/// One avatar download request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AvatarRequest {
    /// Contact pubkey (hex).
    pub pubkey: String,
    /// Picture URL to download.
    pub url: String,
}

impl AvatarRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(pubkey: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            pubkey: pubkey.into(),
            url: url.into(),
        }
    }
}

/// Outcome of one batched population run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries downloaded and stored.
    pub fetched: usize,
    /// Requests already served by a valid entry.
    pub cached: usize,
    /// Requests skipped because a fetch was already in flight.
    pub in_flight: usize,
    /// Downloads that failed or returned nothing.
    pub failed: usize,
    /// Requests left for scroll-into-view loading.
    pub deferred: Vec<AvatarRequest>,
}

fn sniff_content_type(payload: &[u8]) -> &'static str {
    match payload {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ if payload.starts_with(b"<svg") || payload.starts_with(b"<?xml") => "image/svg+xml",
        _ => FALLBACK_CONTENT_TYPE,
    }
}
