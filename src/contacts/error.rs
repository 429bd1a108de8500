//! Error types for contact store and reconciliation operations.
//!
//! The variants double as the failure taxonomy reported inside a
//! [`RefreshSummary`](crate::reconcile::RefreshSummary): a pass never
//! raises a per-row failure, it records it.

use thiserror::Error;

use crate::nostr::NostrError;

/// Error type for contact operations.
#[derive(Error, Debug)]
pub enum ContactsError {
    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database error from `SQLite`.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Contact not found.
    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    /// Invalid data provided or read back from storage.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Pubkey did not parse as hex or npub.
    #[error("Invalid pubkey: {0}")]
    InvalidPubkey(String),

    /// Public contacts must be made private before they can be deleted.
    #[error("Contact is public and cannot be deleted: {0}")]
    ContactIsPublic(String),

    /// The follow list fetch failed; the pass made no changes.
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// One relationship write failed; the pass carried on.
    #[error("Failed to persist {pubkey}: {reason}")]
    PartialPersistenceFailure {
        /// Contact whose write failed.
        pubkey: String,
        /// Underlying storage failure.
        reason: String,
    },

    /// Local state was saved but the follow list broadcast failed.
    #[error("Saved locally, not yet published: {0}")]
    PublishFailure(String),
}

/// Result type alias for contact operations.
pub type Result<T> = std::result::Result<T, ContactsError>;

impl From<NostrError> for ContactsError {
    fn from(err: NostrError) -> Self {
        match err {
            NostrError::InvalidPubkey(msg) => Self::InvalidPubkey(msg),
            other => Self::InvalidData(other.to_string()),
        }
    }
}
