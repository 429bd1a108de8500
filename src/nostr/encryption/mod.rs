//! NIP-44 encryption between the user's keys and a counterparty pubkey.
//!
//! Encrypted mail bodies carry a NIP-44 v2 payload computed from the
//! sender's secret key and the recipient's pubkey. Decrypting therefore
//! needs the counterparty pubkey, which is exactly what the sender
//! resolution in [`crate::decrypt`] has to discover.

use nostr::nips::nip44::{self, Version};
use nostr::Keys;

use crate::nostr::error::{NostrError, Result};
use crate::nostr::keys::parse_pubkey;

/// Encrypts `plaintext` for `counterparty` using NIP-44 v2.
///
/// # Errors
///
/// Returns an error if the pubkey is invalid or encryption fails
/// (NIP-44 rejects empty plaintext).
pub fn encrypt_nip44(keys: &Keys, counterparty: &str, plaintext: &str) -> Result<String> {
    let public_key = parse_pubkey(counterparty)?;
    nip44::encrypt(keys.secret_key(), &public_key, plaintext, Version::V2)
        .map_err(|e| NostrError::Encryption(e.to_string()))
}

/// Decrypts a NIP-44 payload that was exchanged with `counterparty`.
///
/// # Errors
///
/// Returns [`NostrError::Decryption`] if the payload is malformed or the
/// MAC does not verify, which is what happens when `counterparty` is the
/// wrong key.
pub fn decrypt_nip44(keys: &Keys, counterparty: &str, ciphertext: &str) -> Result<String> {
    let public_key = parse_pubkey(counterparty)?;
    nip44::decrypt(keys.secret_key(), &public_key, ciphertext.trim())
        .map_err(|e| NostrError::Decryption(e.to_string()))
}
