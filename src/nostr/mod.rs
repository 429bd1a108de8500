//! Nostr key handling and NIP-44 primitives.
//!
//! Everything that touches `nostr` key types directly lives here so the
//! rest of the crate can work with normalized hex pubkeys.

mod error;
mod keys;

pub mod encryption;

pub use error::{NostrError, Result};
pub use keys::{keys_from_secret, normalize_pubkey, parse_pubkey, short_pubkey};
