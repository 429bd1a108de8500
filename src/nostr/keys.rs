//! Key parsing and pubkey normalization.
//!
//! Pubkeys arrive as hex (relay tags, mail headers) or as NIP-19 `npub`
//! strings (user input, older clients). Storage always uses
//! lowercase hex so that primary keys compare byte-for-byte.

use nostr::{Keys, PublicKey};
use zeroize::Zeroizing;

use crate::nostr::error::{NostrError, Result};

/// Number of hex characters kept in a placeholder display name.
const SHORT_PUBKEY_LEN: usize = 8;

/// Normalizes a hex or `npub` pubkey to lowercase hex.
///
/// # Errors
///
/// Returns [`NostrError::InvalidPubkey`] if the input is not a valid key.
///
/// # Example
///
/// ```
/// use nostr::Keys;
/// use nostrmail_core::nostr::normalize_pubkey;
///
/// let keys = Keys::generate();
/// let hex = normalize_pubkey(&keys.public_key().to_hex().to_uppercase()).unwrap();
/// assert_eq!(hex, keys.public_key().to_hex());
/// ```
pub fn normalize_pubkey(input: &str) -> Result<String> {
    parse_pubkey(input).map(|pk| pk.to_hex())
}

/// Parses a pubkey into the `nostr` type.
///
/// # Errors
///
/// Returns [`NostrError::InvalidPubkey`] if the input is not a valid key.
pub fn parse_pubkey(input: &str) -> Result<PublicKey> {
    // Both hex and bech32 are case-insensitive; the parser is not.
    let candidate = input.trim().to_ascii_lowercase();
    PublicKey::parse(&candidate).map_err(|e| NostrError::InvalidPubkey(format!("{candidate}: {e}")))
}

/// Builds signing keys from a hex or `nsec` secret.
///
/// The caller's copy is wrapped in [`Zeroizing`] and wiped when dropped.
///
/// # Errors
///
/// Returns [`NostrError::InvalidSecretKey`] if the secret does not parse.
pub fn keys_from_secret(secret: Zeroizing<String>) -> Result<Keys> {
    // Never echo the secret itself into the error.
    Keys::parse(secret.trim()).map_err(|e| NostrError::InvalidSecretKey(e.to_string()))
}

/// Fallback display name for a contact with no profile yet.
///
/// ```
/// use nostrmail_core::nostr::short_pubkey;
///
/// assert_eq!(short_pubkey("0123456789abcdef"), "01234567…");
/// ```
#[must_use]
pub fn short_pubkey(pubkey_hex: &str) -> String {
    let prefix: String = pubkey_hex.chars().take(SHORT_PUBKEY_LEN).collect();
    format!("{prefix}…")
}
