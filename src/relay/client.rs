//! Relay client for follow lists and profile metadata.
//!
//! This module provides the `nostr-sdk` backed implementation of the
//! relay-facing traits in [`crate::services`].
//!
//! # Security Model
//!
//! - **WSS Only**: Plaintext ws:// connections are rejected
//! - **External signing**: The client holds no signer; follow lists are
//!   signed with the keys passed to each publish call

use std::time::Duration;

use async_trait::async_trait;
use nostr::{Event, EventBuilder, Filter, Keys, Kind, PublicKey, RelayUrl, Tag};
use nostr_sdk::Client;

use super::error::{RelayError, RelayResult};
use super::types::{FollowListSnapshot, ProfileDocument, PublishResult};
use crate::config::CoreConfig;
use crate::services::{FollowListPublisher, FollowListSource, ProfileSource};

/// Client for the configured relay set.
///
/// # Example
///
/// ```rust,ignore
/// use nostrmail_core::config::CoreConfig;
/// use nostrmail_core::relay::RelayClient;
///
/// let relays = RelayClient::connect(&CoreConfig::default()).await?;
/// let snapshot = relays.fetch_follow_list(&owner_hex).await?;
/// ```
pub struct RelayClient {
    client: Client,
    relays: Vec<String>,
    connect_timeout: Duration,
    fetch_timeout: Duration,
    publish_timeout: Duration,
}

impl RelayClient {
    /// Creates a client for the configured relays and starts connecting.
    ///
    /// # Errors
    ///
    /// Returns an error if any relay URL is invalid or uses ws://.
    pub async fn connect(config: &CoreConfig) -> RelayResult<Self> {
        let relay_urls = Self::validate_relay_urls(&config.relays)?;

        // Create client without a signer (we'll sign events externally)
        let client = Client::default();
        for url in &relay_urls {
            // Ignore errors when adding relays - they may already be added
            let _: Result<bool, _> = client.add_relay(url.as_str()).await;
        }
        client.connect().await;

        tracing::info!("Relay client started with {} relays", relay_urls.len());

        Ok(Self {
            client,
            relays: config.relays.clone(),
            connect_timeout: config.connect_timeout(),
            fetch_timeout: config.fetch_timeout(),
            publish_timeout: config.publish_timeout(),
        })
    }

    /// Relay URLs this client was configured with.
    #[must_use]
    pub fn relays(&self) -> &[String] {
        &self.relays
    }

    /// Waits for at least one relay connection.
    async fn ensure_connected(&self) -> RelayResult<()> {
        self.client.connect().await;
        self.client.wait_for_connection(self.connect_timeout).await;

        let relays = self.client.relays().await;
        if relays.values().any(nostr_sdk::Relay::is_connected) {
            Ok(())
        } else {
            Err(RelayError::Connection {
                url: self.relays.join(", "),
                reason: "no relay reachable".to_string(),
            })
        }
    }

    /// Fetches events for `filter` within the fetch timeout.
    async fn fetch(&self, filter: Filter) -> RelayResult<Vec<Event>> {
        self.ensure_connected().await?;

        let events = self
            .client
            .fetch_events(filter, self.fetch_timeout)
            .await
            .map_err(|e| RelayError::Fetch(e.to_string()))?;

        Ok(events.into_iter().collect())
    }

    /// Builds and signs a follow list event listing `pubkeys`.
    fn build_follow_list(keys: &Keys, pubkeys: &[String]) -> RelayResult<Event> {
        let tags = pubkeys
            .iter()
            .map(|pk| {
                PublicKey::from_hex(pk)
                    .map(Tag::public_key)
                    .map_err(|e| RelayError::Signing(format!("invalid pubkey {pk}: {e}")))
            })
            .collect::<RelayResult<Vec<Tag>>>()?;

        EventBuilder::new(Kind::ContactList, "")
            .tags(tags)
            .sign_with_keys(keys)
            .map_err(|e| RelayError::Signing(e.to_string()))
    }

    /// Validates relay URLs and ensures they use wss://.
    fn validate_relay_urls(relays: &[String]) -> RelayResult<Vec<RelayUrl>> {
        let mut urls = Vec::with_capacity(relays.len());

        for relay in relays {
            // Reject plaintext ws:// URLs
            if relay.starts_with("ws://") {
                return Err(RelayError::InvalidUrl(format!(
                    "Plaintext ws:// not allowed for security: {relay}"
                )));
            }

            let url = RelayUrl::parse(relay)
                .map_err(|e| RelayError::InvalidUrl(format!("{relay}: {e}")))?;

            urls.push(url);
        }

        Ok(urls)
    }

    /// Disconnects from all relays.
    pub async fn shutdown(&self) {
        self.client.disconnect().await;
    }
}

fn timestamp(event: &Event) -> i64 {
    i64::try_from(event.created_at.as_u64()).unwrap_or(i64::MAX)
}

#[async_trait]
impl FollowListSource for RelayClient {
    async fn fetch_follow_list(&self, owner_pubkey: &str) -> RelayResult<FollowListSnapshot> {
        let owner = PublicKey::from_hex(owner_pubkey)
            .map_err(|e| RelayError::Fetch(format!("invalid owner pubkey: {e}")))?;

        let filter = Filter::new().author(owner).kind(Kind::ContactList);
        let events = self.fetch(filter).await?;

        // Relays may hold stale replacements; the newest one wins
        let Some(latest) = events.into_iter().max_by_key(|e| e.created_at) else {
            tracing::debug!("No follow list found for {owner_pubkey}");
            return Ok(FollowListSnapshot::missing());
        };

        let pubkeys = latest.tags.public_keys().map(PublicKey::to_hex);
        Ok(FollowListSnapshot::found(pubkeys, timestamp(&latest)))
    }
}

#[async_trait]
impl ProfileSource for RelayClient {
    async fn fetch_profiles(&self, pubkeys: &[String]) -> RelayResult<Vec<ProfileDocument>> {
        let authors: Vec<PublicKey> = pubkeys
            .iter()
            .filter_map(|pk| match PublicKey::from_hex(pk) {
                Ok(pk) => Some(pk),
                Err(e) => {
                    tracing::warn!("Skipping invalid profile pubkey {pk}: {e}");
                    None
                }
            })
            .collect();

        if authors.is_empty() {
            return Ok(Vec::new());
        }

        let filter = Filter::new().authors(authors).kind(Kind::Metadata);
        let events = self.fetch(filter).await?;

        let documents = events
            .iter()
            .filter_map(|event| {
                let pubkey = event.pubkey.to_hex();
                match ProfileDocument::from_json(&pubkey, timestamp(event), &event.content) {
                    Ok(doc) => Some(doc),
                    Err(e) => {
                        tracing::debug!("Ignoring malformed profile for {pubkey}: {e}");
                        None
                    }
                }
            })
            .collect();

        Ok(documents)
    }
}

#[async_trait]
impl FollowListPublisher for RelayClient {
    async fn publish_follow_list(
        &self,
        keys: &Keys,
        pubkeys: &[String],
        relays: &[String],
    ) -> RelayResult<PublishResult> {
        let targets = if relays.is_empty() {
            &self.relays
        } else {
            relays
        };
        let relay_urls = Self::validate_relay_urls(targets)?;
        let event = Self::build_follow_list(keys, pubkeys)?;

        for url in &relay_urls {
            let _: Result<bool, _> = self.client.add_relay(url.as_str()).await;
        }
        self.ensure_connected().await?;

        let event_id = event.id;
        let send_result = tokio::time::timeout(
            self.publish_timeout,
            self.client.send_event_to(relay_urls, &event),
        )
        .await
        .map_err(|_| RelayError::Timeout("Follow list publish timed out".to_string()))?
        .map_err(|e| RelayError::Publish(e.to_string()))?;

        let accepted_by = send_result.success.iter().map(ToString::to_string).collect();
        let rejected_by = send_result
            .failed
            .iter()
            .map(|(url, error)| (url.to_string(), error.clone()))
            .collect();

        let result = PublishResult {
            event_id,
            accepted_by,
            rejected_by,
            failed: Vec::new(),
        };

        tracing::info!(
            "Published follow list with {} entries to {}/{} relays",
            pubkeys.len(),
            result.success_count(),
            result.total_attempted()
        );

        if result.is_success() {
            Ok(result)
        } else {
            Err(RelayError::AllRelaysFailed)
        }
    }
}
