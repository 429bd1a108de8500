//! High-level contact management API.
//!
//! This module provides the [`ContactManager`] which wires the contact
//! store to reconciliation, profile enrichment, follow list publishing,
//! sender resolution and the avatar cache behind one API.
//!
//! # Visibility Model
//!
//! - A contact is *public* for an owner when it is part of the owner's
//!   published follow list, *private* otherwise
//! - Every visibility change re-publishes the complete follow list
//! - A failed publish never rolls back the local change

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use nostr::Keys;

use super::error::{ContactsError, Result};
use super::storage::ContactStorage;
use super::types::{Contact, ContactEntry};
use crate::config::CoreConfig;
use crate::decrypt::{
    DecryptionError, DecryptionResolver, Decryptor, InboundMessage, Nip44Decryptor, Resolution,
};
use crate::image_cache::{AvatarRequest, ImageCache, ImageFetcher, LoadReport};
use crate::nostr::normalize_pubkey;
use crate::privacy::{PrivacyPublisher, PublishOutcome};
use crate::profile::ProfileEnricher;
use crate::reconcile::{ReconciliationEngine, RefreshSummary};
use crate::relay::RelayClient;
use crate::services::{FollowListPublisher, FollowListSource, ProfileSource};

/// External collaborators of a [`ContactManager`].
#[derive(Clone)]
pub struct ContactServices {
    /// Follow list reads.
    pub follows: Arc<dyn FollowListSource>,
    /// Profile metadata reads.
    pub profiles: Arc<dyn ProfileSource>,
    /// Follow list publishing.
    pub publisher: Arc<dyn FollowListPublisher>,
    /// Avatar downloads.
    pub images: Arc<dyn ImageFetcher>,
}

impl ContactServices {
    /// Uses one relay client for every relay-facing role.
    #[must_use]
    pub fn from_relay(relay: Arc<RelayClient>, images: Arc<dyn ImageFetcher>) -> Self {
        Self {
            follows: relay.clone(),
            profiles: relay.clone(),
            publisher: relay,
            images,
        }
    }
}

/// High-level API for the contact list.
///
/// Must be created inside a Tokio runtime: the avatar cache spawns its
/// persistence task on construction.
///
/// # Example
///
/// ```ignore
/// use std::path::Path;
/// use nostrmail_core::contacts::ContactManager;
///
/// let manager = ContactManager::new(Path::new("/data/nostrmail"), config, services)?;
/// manager.set_keys(Some(keys));
/// let summary = manager.refresh_contacts(&owner).await;
/// println!("{}", summary.message());
/// ```
pub struct ContactManager {
    storage: Arc<ContactStorage>,
    images: Arc<ImageCache>,
    publisher: Arc<PrivacyPublisher>,
    engine: ReconciliationEngine,
    resolver: RwLock<Option<Arc<DecryptionResolver>>>,
}

impl ContactManager {
    /// Creates a contact manager storing its database under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn new(data_dir: &Path, config: CoreConfig, services: ContactServices) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| ContactsError::Storage(format!("Failed to create data directory: {e}")))?;

        let storage = ContactStorage::new(&data_dir.join("contacts.db"))?;
        Self::with_storage(Arc::new(storage), config, services)
    }

    /// Creates a contact manager backed by an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory(config: CoreConfig, services: ContactServices) -> Result<Self> {
        Self::with_storage(Arc::new(ContactStorage::in_memory()?), config, services)
    }

    fn with_storage(
        storage: Arc<ContactStorage>,
        config: CoreConfig,
        services: ContactServices,
    ) -> Result<Self> {
        let images = ImageCache::new(storage.clone(), services.images, config.image_cache)
            .map_err(|e| ContactsError::Storage(e.to_string()))?;

        let enricher = Arc::new(ProfileEnricher::new(
            storage.clone(),
            services.profiles,
            Some(images.clone()),
            config.profile,
        ));

        let publisher = Arc::new(PrivacyPublisher::new(
            storage.clone(),
            services.publisher,
            config.relays,
        ));

        let engine = ReconciliationEngine::new(
            storage.clone(),
            services.follows,
            enricher,
            publisher.clone(),
            config.reconcile,
        );

        Ok(Self {
            storage,
            images,
            publisher,
            engine,
            resolver: RwLock::new(None),
        })
    }

    /// Installs the account keys used for signing and decryption.
    ///
    /// Passing `None` removes them.
    pub fn set_keys(&self, keys: Option<Keys>) {
        let decryptor = keys
            .clone()
            .map(|k| Arc::new(Nip44Decryptor::new(k)) as Arc<dyn Decryptor>);
        self.publisher.set_signer(keys);
        self.install_decryptor(decryptor);
    }

    /// Replaces the decrypt primitive, keeping the signer as is.
    pub fn set_decryptor(&self, decryptor: Arc<dyn Decryptor>) {
        self.install_decryptor(Some(decryptor));
    }

    fn install_decryptor(&self, decryptor: Option<Arc<dyn Decryptor>>) {
        let resolver = decryptor.map(|d| Arc::new(DecryptionResolver::new(self.storage.clone(), d)));
        *self.resolver.write().unwrap_or_else(PoisonError::into_inner) = resolver;
    }

    /// The underlying contact store.
    #[must_use]
    pub fn storage(&self) -> &ContactStorage {
        &self.storage
    }

    // ==================== Contact Operations ====================

    /// Returns every contact with its visibility for `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the owner pubkey is invalid or storage fails.
    pub fn get_all_contacts(&self, owner: &str) -> Result<Vec<ContactEntry>> {
        let owner = normalize_pubkey(owner)?;
        self.storage.get_contacts_for_owner(&owner)
    }

    /// Returns one contact with its visibility for `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if a pubkey is invalid or storage fails.
    pub fn get_contact(&self, owner: &str, pubkey: &str) -> Result<Option<ContactEntry>> {
        let owner = normalize_pubkey(owner)?;
        let pubkey = normalize_pubkey(pubkey)?;

        let Some(contact) = self.storage.get_contact(&pubkey)? else {
            return Ok(None);
        };
        let is_public = self
            .storage
            .get_relationship(&owner, &pubkey)?
            .is_some_and(|rel| rel.is_public);

        Ok(Some(ContactEntry { contact, is_public }))
    }

    /// Saves an explicit edit and sets its visibility for `owner`.
    ///
    /// An empty display name falls back to the short pubkey. The cached
    /// avatar survives only if the picture URL is unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if a pubkey is invalid or storage fails. A failed
    /// publish is reported in the returned outcome, not as an error.
    pub async fn save_contact(
        &self,
        owner: &str,
        mut contact: Contact,
        is_public: bool,
    ) -> Result<PublishOutcome> {
        let owner = normalize_pubkey(owner)?;
        contact.pubkey = normalize_pubkey(&contact.pubkey)?;
        let now = chrono::Utc::now().timestamp();

        if contact.display_name.trim().is_empty() {
            contact.display_name = Contact::placeholder(&contact.pubkey, now).display_name;
        }

        match self.storage.get_contact(&contact.pubkey)? {
            Some(existing) => {
                contact.created_at = existing.created_at;
                contact.picture_cache = if existing.picture_url == contact.picture_url {
                    existing.picture_cache
                } else {
                    None
                };
            }
            None => {
                contact.created_at = now;
                contact.picture_cache = None;
            }
        }
        contact.updated_at = now;

        self.storage.save_contact(&contact)?;
        let changed = self
            .storage
            .set_visibility(&owner, &contact.pubkey, is_public, now)?;

        if let (Some(url), None) = (&contact.picture_url, &contact.picture_cache) {
            self.images.enqueue(contact.pubkey.clone(), url.clone());
        }

        Ok(self.after_visibility_change(&owner, changed).await)
    }

    /// Moves a contact in or out of `owner`'s public follow list.
    ///
    /// # Errors
    ///
    /// Returns [`ContactsError::ContactNotFound`] for an unknown contact,
    /// or an error if a pubkey is invalid or storage fails.
    pub async fn toggle_contact_privacy(
        &self,
        owner: &str,
        pubkey: &str,
        is_public: bool,
    ) -> Result<PublishOutcome> {
        let owner = normalize_pubkey(owner)?;
        let pubkey = normalize_pubkey(pubkey)?;

        if self.storage.get_contact(&pubkey)?.is_none() {
            return Err(ContactsError::ContactNotFound(pubkey));
        }

        let now = chrono::Utc::now().timestamp();
        let changed = self
            .storage
            .set_visibility(&owner, &pubkey, is_public, now)?;

        tracing::info!(
            "Contact {pubkey} set {} for {owner}",
            if is_public { "public" } else { "private" }
        );

        Ok(self.after_visibility_change(&owner, changed).await)
    }

    /// Deletes a private contact.
    ///
    /// The contact row is shared by every owner on this device, so the
    /// deletion is refused while any of them follows it publicly.
    ///
    /// # Errors
    ///
    /// Returns [`ContactsError::ContactIsPublic`] if `owner` or another
    /// owner follows the contact publicly, [`ContactsError::ContactNotFound`]
    /// if it does not exist.
    pub async fn delete_contact(&self, owner: &str, pubkey: &str) -> Result<()> {
        let owner = normalize_pubkey(owner)?;
        let pubkey = normalize_pubkey(pubkey)?;

        if !self.storage.delete_contact(&pubkey)? {
            return Err(ContactsError::ContactNotFound(pubkey));
        }
        tracing::info!("Contact {pubkey} deleted by {owner}");

        if let Err(e) = self.images.evict(&pubkey).await {
            tracing::warn!("Avatar for deleted contact {pubkey} not evicted: {e}");
        }
        Ok(())
    }

    /// Records a sender seen in mail.
    ///
    /// Creates a private placeholder carrying `address` for an unknown
    /// pubkey, or fills the address of a known contact that has none.
    /// Returns `true` if a contact was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the pubkey is invalid or storage fails.
    pub fn observe_sender(&self, pubkey: &str, address: &str) -> Result<bool> {
        let pubkey = normalize_pubkey(pubkey)?;
        let address = address.trim();
        let now = chrono::Utc::now().timestamp();

        let mut placeholder = Contact::placeholder(&pubkey, now);
        if !address.is_empty() {
            placeholder.email = Some(address.to_string());
        }
        if self.storage.insert_contact_if_absent(&placeholder)? {
            tracing::debug!("New contact {pubkey} observed from mail");
            return Ok(true);
        }

        if !address.is_empty() {
            if let Some(mut existing) = self.storage.get_contact(&pubkey)? {
                if existing.email.is_none() {
                    existing.email = Some(address.to_string());
                    existing.updated_at = now;
                    self.storage.save_contact(&existing)?;
                }
            }
        }
        Ok(false)
    }

    // ==================== Follow List Operations ====================

    /// Reconciles `owner`'s contacts with their published follow list.
    ///
    /// Never fails: problems are reported inside the summary.
    pub async fn refresh_contacts(&self, owner: &str) -> RefreshSummary {
        match normalize_pubkey(owner) {
            Ok(owner) => self.engine.refresh(&owner).await,
            Err(e) => RefreshSummary::aborted(e.into()),
        }
    }

    /// Re-publishes `owner`'s follow list from local state.
    ///
    /// # Errors
    ///
    /// Returns an error if the owner pubkey is invalid.
    pub async fn resync_follow_list(&self, owner: &str) -> Result<PublishOutcome> {
        let owner = normalize_pubkey(owner)?;
        Ok(self.publisher.publish(&owner).await)
    }

    async fn after_visibility_change(&self, owner: &str, changed: bool) -> PublishOutcome {
        if changed {
            self.publisher.publish(owner).await
        } else {
            PublishOutcome::NotNeeded
        }
    }

    // ==================== Decryption ====================

    /// Decrypts an inbound message, resolving its sender key.
    ///
    /// # Errors
    ///
    /// Returns [`DecryptionError::KeysUnavailable`] before keys are set,
    /// otherwise see [`DecryptionResolver::resolve`].
    pub fn resolve_and_decrypt(
        &self,
        message: &InboundMessage,
    ) -> std::result::Result<Resolution, DecryptionError> {
        let resolver = self
            .resolver
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DecryptionError::KeysUnavailable)?;
        resolver.resolve(message)
    }

    // ==================== Avatars ====================

    /// Initial avatar load for `owner`'s contact list.
    ///
    /// # Errors
    ///
    /// Returns an error if the owner pubkey is invalid or storage fails.
    pub async fn load_avatars(&self, owner: &str) -> Result<LoadReport> {
        let requests = self
            .get_all_contacts(owner)?
            .into_iter()
            .filter_map(|entry| {
                let url = entry.contact.picture_url?;
                Some(AvatarRequest::new(entry.contact.pubkey, url))
            })
            .collect();

        Ok(self.images.load_initial(requests).await)
    }

    /// Loads avatars for rows scrolled into view.
    pub async fn avatars_visible(&self, requests: Vec<AvatarRequest>) -> LoadReport {
        self.images.on_visible(requests).await
    }

    /// Cached avatar of a contact as a `data:` URL, if valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the pubkey is invalid or storage fails.
    pub async fn avatar(&self, pubkey: &str) -> Result<Option<String>> {
        let pubkey = normalize_pubkey(pubkey)?;
        let Some(contact) = self.storage.get_contact(&pubkey)? else {
            return Ok(None);
        };

        Ok(self
            .images
            .get(&pubkey, contact.picture_url.as_deref())
            .await
            .map(|entry| entry.data_url()))
    }

    /// Waits until queued avatar writes have reached the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the avatar writer has stopped.
    pub async fn flush(&self) -> Result<()> {
        self.images
            .flush()
            .await
            .map_err(|e| ContactsError::Storage(e.to_string()))
    }
}
