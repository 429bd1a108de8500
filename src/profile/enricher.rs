//! Batched profile fetch and merge.

use std::collections::HashMap;
use std::sync::Arc;

use super::types::ProfileMetadata;
use crate::config::ProfileConfig;
use crate::contacts::ContactStorage;
use crate::image_cache::ImageCache;
use crate::relay::ProfileDocument;
use crate::services::ProfileSource;

/// Outcome of one enrichment run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    /// Pubkeys asked for.
    pub requested: usize,
    /// Profile requests sent.
    pub requests: usize,
    /// Contacts whose stored row changed.
    pub updated: usize,
    /// Pubkeys left pending because their request failed.
    pub pending: usize,
    /// Contacts that could not be read or written.
    pub storage_failures: usize,
}

/// Fetches profile metadata and merges it into stored contacts.
pub struct ProfileEnricher {
    storage: Arc<ContactStorage>,
    source: Arc<dyn ProfileSource>,
    images: Option<Arc<ImageCache>>,
    config: ProfileConfig,
}

impl ProfileEnricher {
    /// Creates an enricher. Without an image cache, avatars are not queued.
    #[must_use]
    pub fn new(
        storage: Arc<ContactStorage>,
        source: Arc<dyn ProfileSource>,
        images: Option<Arc<ImageCache>>,
        config: ProfileConfig,
    ) -> Self {
        Self {
            storage,
            source,
            images,
            config,
        }
    }

    /// Enriches the given contacts.
    ///
    /// Sends `ceil(n / max_profiles_per_request)` requests. A failed
    /// request leaves its pubkeys pending for the next run; a successful
    /// one marks every pubkey it covered as synced, documents or not.
    pub async fn enrich(&self, pubkeys: &[String]) -> EnrichmentReport {
        let mut report = EnrichmentReport {
            requested: pubkeys.len(),
            ..EnrichmentReport::default()
        };

        let chunk_size = self.config.max_profiles_per_request.max(1);
        for chunk in pubkeys.chunks(chunk_size) {
            report.requests += 1;

            let documents = match self.source.fetch_profiles(chunk).await {
                Ok(docs) => docs,
                Err(e) => {
                    tracing::warn!("Profile fetch for {} pubkeys failed: {e}", chunk.len());
                    report.pending += chunk.len();
                    continue;
                }
            };

            let latest = latest_per_pubkey(documents);
            let now = chrono::Utc::now().timestamp();

            for pubkey in chunk {
                let Some(profile) = latest.get(pubkey) else {
                    continue;
                };
                match self.apply(pubkey, profile, now) {
                    Ok(true) => report.updated += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!("Failed to merge profile for {pubkey}: {e}");
                        report.storage_failures += 1;
                    }
                }
            }

            if let Err(e) = self.storage.mark_profiles_synced(chunk, now) {
                tracing::warn!("Failed to mark {} profiles synced: {e}", chunk.len());
                report.storage_failures += chunk.len();
            }
        }

        tracing::debug!(
            "Enriched {}/{} contacts in {} requests",
            report.updated,
            report.requested,
            report.requests
        );

        report
    }

    fn apply(
        &self,
        pubkey: &str,
        profile: &ProfileMetadata,
        now: i64,
    ) -> crate::contacts::Result<bool> {
        let Some(mut contact) = self.storage.get_contact(pubkey)? else {
            tracing::debug!("Profile for unknown contact {pubkey} ignored");
            return Ok(false);
        };

        let changed = profile.merge_into(&mut contact, now);
        if changed {
            self.storage.save_contact(&contact)?;
        }

        if let (Some(images), Some(url)) = (&self.images, &contact.picture_url) {
            if contact.picture_cache.is_none() {
                images.enqueue(pubkey, url.clone());
            }
        }

        Ok(changed)
    }
}

/// Keeps the newest document per author.
fn latest_per_pubkey(documents: Vec<ProfileDocument>) -> HashMap<String, ProfileMetadata> {
    let mut newest: HashMap<String, (i64, ProfileMetadata)> = HashMap::new();
    for doc in documents {
        match newest.get(&doc.pubkey) {
            Some((created_at, _)) if *created_at >= doc.created_at => {}
            _ => {
                newest.insert(doc.pubkey, (doc.created_at, doc.metadata));
            }
        }
    }
    newest
        .into_iter()
        .map(|(pubkey, (_, metadata))| (pubkey, metadata))
        .collect()
}
