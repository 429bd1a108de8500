//! Error types for the avatar cache.

use thiserror::Error;

use crate::contacts::ContactsError;

/// Error type for avatar cache operations.
#[derive(Error, Debug)]
pub enum ImageCacheError {
    /// Reading or writing the persisted cache failed.
    #[error("Image cache storage error: {0}")]
    Storage(#[from] ContactsError),

    /// The persistence queue has stopped.
    #[error("Image cache writer is closed")]
    WriterClosed,

    /// Building the HTTP client failed.
    #[error("HTTP client error: {0}")]
    Http(String),
}

/// Result type alias for avatar cache operations.
pub type Result<T> = std::result::Result<T, ImageCacheError>;
