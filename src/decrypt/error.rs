//! Error types for sender resolution.

use thiserror::Error;

use crate::contacts::ContactsError;

/// Why a message could not be decrypted.
#[derive(Error, Debug)]
pub enum DecryptionError {
    /// No hint worked and no contact shares the sender address.
    #[error("No candidate sender keys for {address}")]
    NoCandidates {
        /// Normalized sender address.
        address: String,
    },

    /// Every candidate was tried and none decrypted the message.
    #[error("Decryption failed after {attempts} attempts")]
    Exhausted {
        /// Decrypt calls made, hint included.
        attempts: usize,
    },

    /// The message itself is unusable.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// No account keys are installed to decrypt with.
    #[error("No account keys configured")]
    KeysUnavailable,

    /// Reading candidates or hints failed.
    #[error("Contact store error: {0}")]
    Store(#[from] ContactsError),
}

/// Result type alias for sender resolution.
pub type Result<T> = std::result::Result<T, DecryptionError>;
