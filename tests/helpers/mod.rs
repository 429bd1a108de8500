//! Reusable fakes for contact integration tests.
//!
//! Real NIP-44 crypto and real `SQLite` (in-memory) are used throughout;
//! only the network collaborators are replaced. Each fake records what it
//! was asked so tests can assert on calls made.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nostr::{EventId, Keys};
use nostrmail_core::config::CoreConfig;
use nostrmail_core::contacts::{ContactManager, ContactServices};
use nostrmail_core::image_cache::{FetchedImage, ImageFetcher};
use nostrmail_core::relay::{
    FollowListSnapshot, ProfileDocument, PublishResult, RelayError, RelayResult,
};
use nostrmail_core::services::{FollowListPublisher, FollowListSource, ProfileSource};
use tokio::sync::Notify;

/// Fresh valid hex pubkey.
pub fn new_pubkey() -> String {
    Keys::generate().public_key().to_hex()
}

/// Config without write pacing so tests run fast.
pub fn fast_config() -> CoreConfig {
    let mut config = CoreConfig::default().with_write_batches(2, 0);
    config.image_cache.batch_delay_ms = 0;
    config
}

// ==================== Follow Lists ====================

/// Serves a scripted follow list; can be switched offline or gated.
#[derive(Default)]
pub struct FakeFollows {
    snapshot: Mutex<Option<FollowListSnapshot>>,
    offline: Mutex<bool>,
    gate: Mutex<Option<Arc<Notify>>>,
    calls: AtomicUsize,
}

impl FakeFollows {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publishes `pubkeys` as the owner's follow list.
    pub fn set_list(&self, pubkeys: &[String]) {
        *self.snapshot.lock().unwrap() =
            Some(FollowListSnapshot::found(pubkeys.iter().cloned(), 1_700_000_000));
    }

    /// Makes the owner appear to have no follow list at all.
    pub fn set_missing(&self) {
        *self.snapshot.lock().unwrap() = None;
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    /// The next fetch waits until the returned handle is notified.
    pub fn hold_next(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FollowListSource for FakeFollows {
    async fn fetch_follow_list(&self, _owner_pubkey: &str) -> RelayResult<FollowListSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let snapshot = self.snapshot.lock().unwrap().clone();
        let offline = *self.offline.lock().unwrap();
        let gate = self.gate.lock().unwrap().take();

        if let Some(gate) = gate {
            gate.notified().await;
        }
        if offline {
            return Err(RelayError::Timeout("relays unreachable".to_string()));
        }
        Ok(snapshot.unwrap_or_else(FollowListSnapshot::missing))
    }
}

// ==================== Profiles ====================

/// Serves profile JSON per pubkey and records each request.
#[derive(Default)]
pub struct FakeProfiles {
    profiles: Mutex<HashMap<String, String>>,
    offline: Mutex<bool>,
    requests: Mutex<Vec<Vec<String>>>,
}

impl FakeProfiles {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_profile(&self, pubkey: &str, json: &str) {
        self.profiles
            .lock()
            .unwrap()
            .insert(pubkey.to_string(), json.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    /// Pubkeys of every request, in order.
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileSource for FakeProfiles {
    async fn fetch_profiles(&self, pubkeys: &[String]) -> RelayResult<Vec<ProfileDocument>> {
        self.requests.lock().unwrap().push(pubkeys.to_vec());
        if *self.offline.lock().unwrap() {
            return Err(RelayError::Fetch("profile relay down".to_string()));
        }

        let profiles = self.profiles.lock().unwrap();
        Ok(pubkeys
            .iter()
            .filter_map(|pk| {
                let json = profiles.get(pk)?;
                ProfileDocument::from_json(pk.clone(), 1_700_000_000, json).ok()
            })
            .collect())
    }
}

// ==================== Publishing ====================

/// Records every published follow list.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Vec<String>>>,
    failing: Mutex<bool>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn published(&self) -> Vec<Vec<String>> {
        self.published.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Vec<String>> {
        self.published.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl FollowListPublisher for RecordingPublisher {
    async fn publish_follow_list(
        &self,
        _keys: &Keys,
        pubkeys: &[String],
        relays: &[String],
    ) -> RelayResult<PublishResult> {
        if *self.failing.lock().unwrap() {
            return Err(RelayError::AllRelaysFailed);
        }
        self.published.lock().unwrap().push(pubkeys.to_vec());
        Ok(PublishResult {
            event_id: EventId::all_zeros(),
            accepted_by: relays.to_vec(),
            rejected_by: Vec::new(),
            failed: Vec::new(),
        })
    }
}

// ==================== Images ====================

/// Returns a small payload derived from the URL, counting fetches.
#[derive(Default)]
pub struct FakeImages {
    fetches: Mutex<Vec<String>>,
    broken: Mutex<BTreeSet<String>>,
}

impl FakeImages {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes `url` fail to download.
    pub fn break_url(&self, url: &str) {
        self.broken.lock().unwrap().insert(url.to_string());
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

#[async_trait]
impl ImageFetcher for FakeImages {
    async fn fetch_image(&self, url: &str) -> Option<FetchedImage> {
        self.fetches.lock().unwrap().push(url.to_string());
        if self.broken.lock().unwrap().contains(url) {
            return None;
        }
        Some(FetchedImage {
            payload: url.as_bytes().to_vec(),
            content_type: Some("image/png".to_string()),
        })
    }
}

// ==================== Wiring ====================

/// A manager plus handles on all of its fakes.
pub struct Harness {
    pub manager: ContactManager,
    pub follows: Arc<FakeFollows>,
    pub profiles: Arc<FakeProfiles>,
    pub publisher: Arc<RecordingPublisher>,
    pub images: Arc<FakeImages>,
    pub owner_keys: Keys,
    pub owner: String,
}

impl Harness {
    /// In-memory manager with the owner's keys installed.
    pub fn new(config: CoreConfig) -> Self {
        Self::build(|services| ContactManager::in_memory(config, services).unwrap())
    }

    /// Manager over `data_dir/contacts.db`, for tests that touch the file.
    pub fn on_disk(data_dir: &Path, config: CoreConfig) -> Self {
        Self::build(|services| ContactManager::new(data_dir, config, services).unwrap())
    }

    fn build(open: impl FnOnce(ContactServices) -> ContactManager) -> Self {
        let follows = FakeFollows::new();
        let profiles = FakeProfiles::new();
        let publisher = RecordingPublisher::new();
        let images = FakeImages::new();

        let manager = open(ContactServices {
            follows: follows.clone(),
            profiles: profiles.clone(),
            publisher: publisher.clone(),
            images: images.clone(),
        });

        let owner_keys = Keys::generate();
        manager.set_keys(Some(owner_keys.clone()));

        Self {
            manager,
            follows,
            profiles,
            publisher,
            images,
            owner: owner_keys.public_key().to_hex(),
            owner_keys,
        }
    }

    /// Pubkeys `owner` currently follows publicly.
    pub fn public_set(&self) -> BTreeSet<String> {
        self.manager
            .get_all_contacts(&self.owner)
            .unwrap()
            .into_iter()
            .filter(|entry| entry.is_public)
            .map(|entry| entry.contact.pubkey)
            .collect()
    }
}
