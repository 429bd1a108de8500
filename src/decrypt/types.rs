//! Inbound message and resolution types.

use serde::{Deserialize, Serialize};

/// An encrypted mail item whose sender key may be unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Stable message identifier (e.g. the Message-ID header).
    pub message_id: String,
    /// `From` address.
    pub sender_address: String,
    /// Sender pubkey announced in the mail headers, if any.
    pub claimed_pubkey: Option<String>,
    /// NIP-44 payload.
    pub ciphertext: String,
}

impl InboundMessage {
    /// Creates a message without a claimed pubkey.
    #[must_use]
    pub fn new(
        message_id: impl Into<String>,
        sender_address: impl Into<String>,
        ciphertext: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            sender_address: sender_address.into(),
            claimed_pubkey: None,
            ciphertext: ciphertext.into(),
        }
    }

    /// Sets the pubkey claimed by the mail headers.
    #[must_use]
    pub fn with_claimed_pubkey(mut self, pubkey: impl Into<String>) -> Self {
        self.claimed_pubkey = Some(pubkey.into());
        self
    }

    /// Sender address, trimmed and lowercased.
    #[must_use]
    pub fn normalized_address(&self) -> String {
        self.sender_address.trim().to_lowercase()
    }
}

/// Where the winning pubkey came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionPath {
    /// Hint stored for this exact message.
    MessageHint,
    /// Hint stored for the sender address.
    AddressHint,
    /// Pubkey announced in the mail headers.
    ClaimedPubkey,
    /// Reverse lookup over contacts sharing the address.
    Candidate,
}

/// A successful decryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Decrypted body.
    pub plaintext: String,
    /// Pubkey that decrypted it (hex).
    pub pubkey: String,
    /// Decrypt calls made, the successful one included.
    pub attempts: usize,
    /// How the pubkey was found.
    pub path: ResolutionPath,
}
