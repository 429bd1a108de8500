//! Publishes an owner's complete follow list.

use std::sync::{Arc, PoisonError, RwLock};

use nostr::Keys;
use serde::{Deserialize, Serialize};

use crate::contacts::{ContactStorage, ContactsError};
use crate::services::FollowListPublisher;

/// What happened to the network copy after a local visibility change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishOutcome {
    /// At least one relay accepted the new follow list.
    Published {
        /// Hex id of the published event.
        event_id: String,
        /// Number of relays that accepted it.
        accepted_by: usize,
    },
    /// No visibility changed, nothing was sent.
    NotNeeded,
    /// The local change is saved but the network copy is stale.
    Pending {
        /// Why the publish did not happen.
        reason: String,
    },
}

impl PublishOutcome {
    /// Whether the follow list reached at least one relay.
    #[must_use]
    pub const fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }

    /// Whether the network copy is known to be stale.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// The user-facing error for a pending publish.
    #[must_use]
    pub fn as_error(&self) -> Option<ContactsError> {
        match self {
            Self::Pending { reason } => Some(ContactsError::PublishFailure(reason.clone())),
            _ => None,
        }
    }

    fn pending(reason: impl Into<String>) -> Self {
        Self::Pending {
            reason: reason.into(),
        }
    }
}

/// Re-broadcasts the owner's public contacts after a visibility change.
pub struct PrivacyPublisher {
    storage: Arc<ContactStorage>,
    publisher: Arc<dyn FollowListPublisher>,
    signer: RwLock<Option<Keys>>,
    relays: Vec<String>,
}

impl PrivacyPublisher {
    /// Creates a publisher without a signer.
    #[must_use]
    pub fn new(
        storage: Arc<ContactStorage>,
        publisher: Arc<dyn FollowListPublisher>,
        relays: Vec<String>,
    ) -> Self {
        Self {
            storage,
            publisher,
            signer: RwLock::new(None),
            relays,
        }
    }

    /// Installs (or clears) the signing keys.
    pub fn set_signer(&self, keys: Option<Keys>) {
        *self.signer.write().unwrap_or_else(PoisonError::into_inner) = keys;
    }

    /// Whether signing keys are installed.
    #[must_use]
    pub fn has_signer(&self) -> bool {
        self.signer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Publishes the complete, sorted public set of `owner_pubkey`.
    ///
    /// Never rolls anything back: failures come back as
    /// [`PublishOutcome::Pending`].
    pub async fn publish(&self, owner_pubkey: &str) -> PublishOutcome {
        let keys = {
            let guard = self.signer.read().unwrap_or_else(PoisonError::into_inner);
            match guard.as_ref() {
                Some(keys) => keys.clone(),
                None => return PublishOutcome::pending("no signing key configured"),
            }
        };

        if keys.public_key().to_hex() != owner_pubkey {
            tracing::warn!("Signing key does not belong to {owner_pubkey}; follow list not sent");
            return PublishOutcome::pending("signing key does not match the account");
        }

        let pubkeys = match self.storage.public_pubkeys(owner_pubkey) {
            Ok(pubkeys) => pubkeys,
            Err(e) => {
                tracing::warn!("Could not read public contacts for {owner_pubkey}: {e}");
                return PublishOutcome::pending(e.to_string());
            }
        };

        match self
            .publisher
            .publish_follow_list(&keys, &pubkeys, &self.relays)
            .await
        {
            Ok(result) => {
                tracing::info!(
                    "Follow list of {} contacts published to {} relays",
                    pubkeys.len(),
                    result.success_count()
                );
                PublishOutcome::Published {
                    event_id: result.event_id.to_hex(),
                    accepted_by: result.success_count(),
                }
            }
            Err(e) => {
                tracing::warn!("Follow list publish failed: {e}");
                PublishOutcome::pending(e.to_string())
            }
        }
    }
}
