//! Error types for Nostr key handling and encryption.

use thiserror::Error;

/// Errors that can occur while parsing keys or running NIP-44.
#[derive(Error, Debug)]
pub enum NostrError {
    /// Public key is neither valid hex nor a valid npub.
    #[error("Invalid public key: {0}")]
    InvalidPubkey(String),

    /// Secret key is neither valid hex nor a valid nsec.
    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    /// Encryption operation failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Decryption operation failed.
    #[error("Decryption failed: {0}")]
    Decryption(String),
}

/// Result type for Nostr operations.
pub type Result<T> = std::result::Result<T, NostrError>;
