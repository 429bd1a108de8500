//! Types exchanged with relays.
//!
//! This module defines the follow list snapshot, profile documents and
//! publish results.

use std::collections::BTreeSet;

use nostr::EventId;

use crate::profile::ProfileMetadata;

/// The pubkey set from one follow list (kind 3) fetch.
///
/// `list_found` separates "the owner publishes an empty list" from "no
/// relay returned a list at all"; only the former is authoritative for
/// demotions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowListSnapshot {
    /// Followed pubkeys (lowercase hex).
    pub pubkeys: BTreeSet<String>,
    /// Whether a follow list event was found.
    pub list_found: bool,
    /// `created_at` of the event the set was read from.
    pub created_at: Option<i64>,
}

impl FollowListSnapshot {
    /// A snapshot read from an existing follow list event.
    #[must_use]
    pub fn found<I, S>(pubkeys: I, created_at: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pubkeys: pubkeys.into_iter().map(Into::into).collect(),
            list_found: true,
            created_at: Some(created_at),
        }
    }

    /// A snapshot for an owner without any follow list event.
    #[must_use]
    pub fn missing() -> Self {
        Self::default()
    }

    /// Whether the snapshot holds no pubkeys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pubkeys.is_empty()
    }
}

/// One profile metadata (kind 0) document.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileDocument {
    /// Author pubkey (lowercase hex).
    pub pubkey: String,
    /// Event `created_at` (Unix timestamp).
    pub created_at: i64,
    /// Parsed content.
    pub metadata: ProfileMetadata,
}

impl ProfileDocument {
    /// Parses the JSON content of a profile event.
    ///
    /// # Errors
    ///
    /// Returns an error if `content` is not a JSON object.
    pub fn from_json(
        pubkey: impl Into<String>,
        created_at: i64,
        content: &str,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            pubkey: pubkey.into(),
            created_at,
            metadata: serde_json::from_str(content)?,
        })
    }
}

/// Result of publishing an event to relays.
#[derive(Debug, Clone)]
pub struct PublishResult {
    /// The event ID that was published.
    pub event_id: EventId,
    /// Relays that accepted the event.
    pub accepted_by: Vec<String>,
    /// Relays that rejected the event (with reasons).
    pub rejected_by: Vec<(String, String)>,
    /// Relays that failed to respond.
    pub failed: Vec<String>,
}

impl PublishResult {
    /// Returns true if at least one relay accepted the event.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !self.accepted_by.is_empty()
    }

    /// Returns the number of successful relays.
    #[must_use]
    pub const fn success_count(&self) -> usize {
        self.accepted_by.len()
    }

    /// Returns the total number of relays attempted.
    #[must_use]
    pub const fn total_attempted(&self) -> usize {
        self.accepted_by.len() + self.rejected_by.len() + self.failed.len()
    }
}
