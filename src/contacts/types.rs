//! Core types for the local contact store.
//!
//! A [`Contact`] describes an identity; a [`UserContactRelationship`]
//! records whether a given owner includes that identity in their
//! broadcast follow list. The two are kept apart because several local
//! accounts can share one contact table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::nostr::short_pubkey;

/// A locally stored contact.
///
/// Well-known profile fields are typed; anything else a profile carries
/// lands in [`Contact::metadata`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Nostr public key (lowercase hex).
    pub pubkey: String,
    /// Name shown in the address book. Never empty.
    pub display_name: String,
    /// Mail address claimed by the contact's profile or set by the user.
    pub email: Option<String>,
    /// Current avatar URL.
    pub picture_url: Option<String>,
    /// Cached avatar as a `data:` URL, filled by the image cache.
    pub picture_cache: Option<String>,
    /// Free-form bio.
    pub about: Option<String>,
    /// Profile keys without a dedicated field.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// When the last profile fetch for this contact completed.
    pub profile_synced_at: Option<i64>,
    /// When this contact was created (Unix timestamp).
    pub created_at: i64,
    /// When this contact was last updated (Unix timestamp).
    pub updated_at: i64,
}

impl Contact {
    /// Creates a contact with only a pubkey and a display name.
    #[must_use]
    pub fn new(pubkey: impl Into<String>, display_name: impl Into<String>, now: i64) -> Self {
        Self {
            pubkey: pubkey.into(),
            display_name: display_name.into(),
            email: None,
            picture_url: None,
            picture_cache: None,
            about: None,
            metadata: BTreeMap::new(),
            profile_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates the durable stub written before any profile is known.
    #[must_use]
    pub fn placeholder(pubkey: &str, now: i64) -> Self {
        Self::new(pubkey, short_pubkey(pubkey), now)
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the avatar URL.
    #[must_use]
    pub fn with_picture_url(mut self, url: impl Into<String>) -> Self {
        self.picture_url = Some(url.into());
        self
    }

    /// Whether the display name is still the generated fallback.
    #[must_use]
    pub fn has_placeholder_name(&self) -> bool {
        self.display_name == short_pubkey(&self.pubkey)
    }
}

/// Visibility of a contact in one owner's follow list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContactRelationship {
    /// Owner (local account) pubkey, hex.
    pub owner_pubkey: String,
    /// Contact pubkey, hex.
    pub contact_pubkey: String,
    /// Whether the contact is part of the broadcast follow list.
    pub is_public: bool,
    /// When the relationship was created (Unix timestamp).
    pub created_at: i64,
    /// When the visibility last changed (Unix timestamp).
    pub updated_at: i64,
}

/// A contact as seen by one owner.
///
/// Contacts with no relationship row (for example a sender observed in
/// mail) are reported as private.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactEntry {
    /// The contact.
    pub contact: Contact,
    /// Whether the owner follows this contact publicly.
    pub is_public: bool,
}
