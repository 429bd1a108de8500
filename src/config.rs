//! Runtime configuration.
//!
//! Every section deserializes from partial JSON: missing keys take their
//! defaults, so a host application only spells out what it changes.
//!
//! ```
//! use nostrmail_core::config::CoreConfig;
//!
//! let config = CoreConfig::default()
//!     .with_relays(["wss://relay.example.com"])
//!     .with_demote_on_missing_list(true);
//! assert_eq!(config.relays.len(), 1);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Relays used when the host supplies none.
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.primal.net",
];

/// Settings for a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Relationship writes per batch.
    pub batch_size: usize,
    /// Pause between write batches, in milliseconds.
    pub batch_delay_ms: u64,
    /// Demote every public contact when no follow list exists at all.
    pub demote_on_missing_list: bool,
    /// Upper bound on previously unsynced profiles picked up per pass.
    pub max_pending_profiles: usize,
}

impl ReconcileConfig {
    /// Pause between write batches.
    #[must_use]
    pub const fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay_ms: 250,
            demote_on_missing_list: false,
            max_pending_profiles: 500,
        }
    }
}

/// Settings for profile enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Authors per profile request.
    pub max_profiles_per_request: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            max_profiles_per_request: 250,
        }
    }
}

/// Settings for the avatar cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageCacheConfig {
    /// Avatars fetched eagerly by the initial load.
    pub eager_count: usize,
    /// Concurrent downloads per batch.
    pub batch_size: usize,
    /// Pause between download batches, in milliseconds.
    pub batch_delay_ms: u64,
    /// Per-download timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Payloads larger than this are discarded.
    pub max_image_bytes: usize,
}

impl ImageCacheConfig {
    /// Pause between download batches.
    #[must_use]
    pub const fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// Per-download timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            eager_count: 20,
            batch_size: 5,
            batch_delay_ms: 250,
            request_timeout_secs: 10,
            max_image_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Relay URLs (wss:// only).
    pub relays: Vec<String>,
    /// Relay connect timeout, in seconds.
    pub connect_timeout_secs: u64,
    /// Follow list and profile fetch timeout, in seconds.
    pub fetch_timeout_secs: u64,
    /// Follow list publish timeout, in seconds.
    pub publish_timeout_secs: u64,
    /// Reconciliation settings.
    pub reconcile: ReconcileConfig,
    /// Profile enrichment settings.
    pub profile: ProfileConfig,
    /// Avatar cache settings.
    pub image_cache: ImageCacheConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(ToString::to_string).collect(),
            connect_timeout_secs: 5,
            fetch_timeout_secs: 10,
            publish_timeout_secs: 30,
            reconcile: ReconcileConfig::default(),
            profile: ProfileConfig::default(),
            image_cache: ImageCacheConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Parses a JSON configuration, filling gaps with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Replaces the relay list.
    #[must_use]
    pub fn with_relays(mut self, relays: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.relays = relays.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the reconciliation write batch size and delay.
    #[must_use]
    pub const fn with_write_batches(mut self, batch_size: usize, delay_ms: u64) -> Self {
        self.reconcile.batch_size = batch_size;
        self.reconcile.batch_delay_ms = delay_ms;
        self
    }

    /// Sets whether a missing follow list demotes public contacts.
    #[must_use]
    pub const fn with_demote_on_missing_list(mut self, demote: bool) -> Self {
        self.reconcile.demote_on_missing_list = demote;
        self
    }

    /// Sets the number of authors per profile request.
    #[must_use]
    pub const fn with_max_profiles_per_request(mut self, max: usize) -> Self {
        self.profile.max_profiles_per_request = max;
        self
    }

    /// Sets the avatar cache settings.
    #[must_use]
    pub fn with_image_cache(mut self, image_cache: ImageCacheConfig) -> Self {
        self.image_cache = image_cache;
        self
    }

    /// Relay connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Fetch timeout.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Publish timeout.
    #[must_use]
    pub const fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}
