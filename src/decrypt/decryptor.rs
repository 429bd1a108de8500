//! The decrypt primitive.

use nostr::Keys;

use crate::nostr::encryption::decrypt_nip44;
use crate::nostr::NostrError;

/// Decrypts a payload sent by `counterparty`.
///
/// The resolver treats every error as "wrong key" and moves on.
pub trait Decryptor: Send + Sync {
    /// Attempts decryption of `ciphertext` from `counterparty` (hex pubkey).
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not decrypt the payload.
    fn decrypt(&self, counterparty: &str, ciphertext: &str) -> Result<String, NostrError>;
}

/// [`Decryptor`] using NIP-44 v2 with the user's keys.
pub struct Nip44Decryptor {
    keys: Keys,
}

impl Nip44Decryptor {
    /// Creates a decryptor for the given account keys.
    #[must_use]
    pub const fn new(keys: Keys) -> Self {
        Self { keys }
    }
}

impl Decryptor for Nip44Decryptor {
    fn decrypt(&self, counterparty: &str, ciphertext: &str) -> Result<String, NostrError> {
        decrypt_nip44(&self.keys, counterparty, ciphertext)
    }
}

impl std::fmt::Debug for Nip44Decryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nip44Decryptor")
            .field("pubkey", &self.keys.public_key().to_hex())
            .finish_non_exhaustive()
    }
}
