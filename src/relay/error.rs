//! Error types for relay operations.
//!
//! This module defines error types that can occur while fetching follow
//! lists and profiles or publishing a follow list.

use thiserror::Error;

/// Errors that can occur during relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Connection to relay failed.
    #[error("Failed to connect to relay {url}: {reason}")]
    Connection {
        /// The relay URL that failed.
        url: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Event publishing failed.
    #[error("Failed to publish event: {0}")]
    Publish(String),

    /// Invalid relay URL.
    #[error("Invalid relay URL: {0}")]
    InvalidUrl(String),

    /// Timeout waiting for operation.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// All relays failed.
    #[error("All relays failed to accept the event")]
    AllRelaysFailed,

    /// Event fetch failed.
    #[error("Failed to fetch events: {0}")]
    Fetch(String),

    /// Building or signing the event failed.
    #[error("Failed to sign event: {0}")]
    Signing(String),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
