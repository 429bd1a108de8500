//! Trial decryption over candidate sender keys.

use std::sync::Arc;

use super::decryptor::Decryptor;
use super::error::{DecryptionError, Result};
use super::types::{InboundMessage, Resolution, ResolutionPath};
use crate::contacts::ContactStorage;
use crate::nostr::{normalize_pubkey, short_pubkey};

/// Finds the sender key of an inbound message by trying candidates.
///
/// Order: the fast path (message hint, address hint, then the claimed
/// pubkey, each tried once), then every other contact sharing the sender
/// address, most recently updated first. The winner is remembered for
/// both the message and the address.
pub struct DecryptionResolver {
    storage: Arc<ContactStorage>,
    decryptor: Arc<dyn Decryptor>,
}

impl DecryptionResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(storage: Arc<ContactStorage>, decryptor: Arc<dyn Decryptor>) -> Self {
        Self { storage, decryptor }
    }

    /// Decrypts `message`, resolving its sender key.
    ///
    /// # Errors
    ///
    /// - [`DecryptionError::InvalidMessage`] for an empty payload
    /// - [`DecryptionError::NoCandidates`] if there was no hint and no
    ///   contact shares the address, so no key was tried at all
    /// - [`DecryptionError::Exhausted`] if every key tried failed
    /// - [`DecryptionError::Store`] if hints or candidates cannot be read
    pub fn resolve(&self, message: &InboundMessage) -> Result<Resolution> {
        if message.ciphertext.trim().is_empty() {
            return Err(DecryptionError::InvalidMessage("empty ciphertext".to_string()));
        }

        let address = message.normalized_address();
        let mut tried: Vec<String> = Vec::new();

        for (pubkey, path) in self.fast_path(message, &address)? {
            match self.decryptor.decrypt(&pubkey, &message.ciphertext) {
                Ok(plaintext) => {
                    let attempts = tried.len() + 1;
                    return Ok(self.succeed(message, &address, plaintext, pubkey, attempts, path));
                }
                Err(e) => {
                    tracing::debug!(
                        "{path:?} {} failed for {}: {e}",
                        short_pubkey(&pubkey),
                        message.message_id
                    );
                    tried.push(pubkey);
                }
            }
        }

        let found = if address.is_empty() {
            Vec::new()
        } else {
            self.storage.find_pubkeys_by_address(&address)?
        };

        if found.is_empty() && tried.is_empty() {
            return Err(DecryptionError::NoCandidates { address });
        }

        for pubkey in found {
            if tried.contains(&pubkey) {
                continue;
            }
            if let Ok(plaintext) = self.decryptor.decrypt(&pubkey, &message.ciphertext) {
                let attempts = tried.len() + 1;
                return Ok(self.succeed(
                    message,
                    &address,
                    plaintext,
                    pubkey,
                    attempts,
                    ResolutionPath::Candidate,
                ));
            }
            tried.push(pubkey);
        }

        let attempts = tried.len();
        tracing::info!(
            "No key decrypted {} from {address} after {attempts} attempts",
            message.message_id
        );
        Err(DecryptionError::Exhausted { attempts })
    }

    /// Stored and announced keys to try before the address lookup,
    /// without repeats.
    fn fast_path(
        &self,
        message: &InboundMessage,
        address: &str,
    ) -> Result<Vec<(String, ResolutionPath)>> {
        let mut keys: Vec<(String, ResolutionPath)> = Vec::with_capacity(3);
        let mut push = |pubkey: String, path: ResolutionPath| {
            if !keys.iter().any(|(pk, _)| *pk == pubkey) {
                keys.push((pubkey, path));
            }
        };

        if let Some(pubkey) = self.storage.get_message_hint(&message.message_id)? {
            push(pubkey, ResolutionPath::MessageHint);
        }

        if !address.is_empty() {
            if let Some(pubkey) = self.storage.get_address_hint(address)? {
                push(pubkey, ResolutionPath::AddressHint);
            }
        }

        if let Some(claimed) = message.claimed_pubkey.as_deref() {
            match normalize_pubkey(claimed) {
                Ok(pubkey) => push(pubkey, ResolutionPath::ClaimedPubkey),
                Err(e) => {
                    tracing::debug!("Ignoring claimed pubkey on {}: {e}", message.message_id);
                }
            }
        }

        Ok(keys)
    }

    fn succeed(
        &self,
        message: &InboundMessage,
        address: &str,
        plaintext: String,
        pubkey: String,
        attempts: usize,
        path: ResolutionPath,
    ) -> Resolution {
        let now = chrono::Utc::now().timestamp();
        if let Err(e) = self
            .storage
            .save_sender_hint(&message.message_id, address, &pubkey, now)
        {
            tracing::warn!("Decrypted {} but could not save hint: {e}", message.message_id);
        }

        tracing::debug!(
            "Decrypted {} with {} via {path:?} in {attempts} attempts",
            message.message_id,
            short_pubkey(&pubkey)
        );

        Resolution {
            plaintext,
            pubkey,
            attempts,
            path,
        }
    }
}
