//! Relay-facing collaborator traits.
//!
//! The reconciliation engine, the profile enricher and the privacy
//! publisher only see these traits. [`RelayClient`](crate::relay::RelayClient)
//! implements all three on top of `nostr-sdk`; tests substitute in-memory
//! fakes.

use async_trait::async_trait;
use nostr::Keys;

use crate::relay::{FollowListSnapshot, ProfileDocument, PublishResult, RelayResult};

/// Reads an owner's follow list (kind 3) from the network.
#[async_trait]
pub trait FollowListSource: Send + Sync {
    /// Fetches the newest follow list published by `owner_pubkey` (hex).
    ///
    /// An owner without any follow list yields
    /// [`FollowListSnapshot::missing`], not an error.
    async fn fetch_follow_list(&self, owner_pubkey: &str) -> RelayResult<FollowListSnapshot>;
}

/// Reads profile metadata (kind 0) documents.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Fetches profile documents for `pubkeys` in a single request.
    ///
    /// May return several documents per pubkey and none for some.
    async fn fetch_profiles(&self, pubkeys: &[String]) -> RelayResult<Vec<ProfileDocument>>;
}

/// Publishes a complete follow list as a full-state replace.
#[async_trait]
pub trait FollowListPublisher: Send + Sync {
    /// Signs a follow list of `pubkeys` with `keys` and sends it to `relays`.
    async fn publish_follow_list(
        &self,
        keys: &Keys,
        pubkeys: &[String],
        relays: &[String],
    ) -> RelayResult<PublishResult>;
}
