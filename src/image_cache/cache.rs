//! In-memory avatar cache with batched population.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::RwLock;

use super::error::Result;
use super::fetcher::{FetchedImage, ImageFetcher};
use super::types::{AvatarRequest, ImageCacheEntry, LoadReport, FALLBACK_CONTENT_TYPE};
use super::writer::CacheWriter;
use crate::config::ImageCacheConfig;
use crate::contacts::ContactStorage;

/// Avatar cache keyed by pubkey and validated by source URL.
///
/// Reads are served from memory. Downloads run in bounded concurrent
/// batches; results land in memory at once and reach the database through
/// the [`CacheWriter`] queue.
pub struct ImageCache {
    entries: RwLock<HashMap<String, ImageCacheEntry>>,
    in_flight: Mutex<HashSet<InFlightKey>>,
    fetcher: Arc<dyn ImageFetcher>,
    writer: CacheWriter,
    config: ImageCacheConfig,
}

/// A download is identified by contact and source, so a changed picture
/// URL is fetched even while the old one is still downloading.
type InFlightKey = (String, String);

/// Releases an in-flight claim when dropped.
struct InFlightClaim<'a> {
    set: &'a Mutex<HashSet<InFlightKey>>,
    key: InFlightKey,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.key);
        }
    }
}

impl ImageCache {
    /// Creates the cache and warm-loads persisted entries.
    ///
    /// Must be called from within a Tokio runtime: this spawns the
    /// persistence task.
    ///
    /// # Errors
    ///
    /// Returns an error if persisted entries cannot be read.
    pub fn new(
        storage: Arc<ContactStorage>,
        fetcher: Arc<dyn ImageFetcher>,
        config: ImageCacheConfig,
    ) -> Result<Arc<Self>> {
        let entries: HashMap<String, ImageCacheEntry> = storage
            .load_images()?
            .into_iter()
            .map(|entry| (entry.pubkey.clone(), entry))
            .collect();

        tracing::debug!("Warm-loaded {} cached avatars", entries.len());

        Ok(Arc::new(Self {
            entries: RwLock::new(entries),
            in_flight: Mutex::new(HashSet::new()),
            fetcher,
            writer: CacheWriter::spawn(storage),
            config,
        }))
    }

    /// Returns the entry for `pubkey` if it is valid for `current_url`.
    pub async fn get(&self, pubkey: &str, current_url: Option<&str>) -> Option<ImageCacheEntry> {
        self.entries
            .read()
            .await
            .get(pubkey)
            .filter(|entry| entry.is_valid_for(current_url))
            .cloned()
    }

    /// Whether a valid entry exists for the request.
    pub async fn is_cached(&self, request: &AvatarRequest) -> bool {
        self.entries
            .read()
            .await
            .get(&request.pubkey)
            .is_some_and(|entry| entry.is_valid_for(Some(request.url.as_str())))
    }

    /// Number of entries held in memory, valid or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Initial list load: fetches the first `eager_count` requests and
    /// returns the rest, minus already cached ones, as deferred.
    pub async fn load_initial(&self, requests: Vec<AvatarRequest>) -> LoadReport {
        let split = self.config.eager_count.min(requests.len());
        let mut eager = requests;
        let rest = eager.split_off(split);

        let mut report = self.populate(&eager).await;

        let mut deferred = Vec::with_capacity(rest.len());
        for request in rest {
            if !self.is_cached(&request).await {
                deferred.push(request);
            }
        }
        report.deferred = deferred;
        report
    }

    /// Scroll-into-view load for the visible rows.
    pub async fn on_visible(&self, requests: Vec<AvatarRequest>) -> LoadReport {
        self.populate(&requests).await
    }

    /// Fetches every request that is neither cached nor in flight.
    ///
    /// Runs `batch_size` downloads concurrently and pauses `batch_delay`
    /// between batches.
    pub async fn populate(&self, requests: &[AvatarRequest]) -> LoadReport {
        let mut report = LoadReport::default();
        let mut claimed = Vec::new();

        for request in requests {
            if self.is_cached(request).await {
                report.cached += 1;
                continue;
            }
            match self.claim(request) {
                Some(claim) => claimed.push((request, claim)),
                None => report.in_flight += 1,
            }
        }

        if claimed.is_empty() {
            return report;
        }

        let batch_size = self.config.batch_size.max(1);
        let batch_count = claimed.len().div_ceil(batch_size);
        let mut batches = Vec::with_capacity(batch_count);
        let mut iter = claimed.into_iter();
        loop {
            let batch: Vec<_> = iter.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            batches.push(batch);
        }

        for (index, batch) in batches.into_iter().enumerate() {
            if index > 0 && !self.config.batch_delay().is_zero() {
                tokio::time::sleep(self.config.batch_delay()).await;
            }

            let results = join_all(batch.into_iter().map(|(request, claim)| async move {
                let fetched = self.fetcher.fetch_image(&request.url).await;
                (request, fetched, claim)
            }))
            .await;

            for (request, fetched, _claim) in results {
                match fetched {
                    Some(image) => {
                        self.store(request, image).await;
                        report.fetched += 1;
                    }
                    None => report.failed += 1,
                }
            }
        }

        tracing::debug!(
            "Avatar load: {} fetched, {} cached, {} in flight, {} failed",
            report.fetched,
            report.cached,
            report.in_flight,
            report.failed
        );

        report
    }

    /// Starts a population for one avatar without waiting for it.
    pub fn enqueue(self: &Arc<Self>, pubkey: impl Into<String>, url: impl Into<String>) {
        let cache = Arc::clone(self);
        let request = AvatarRequest::new(pubkey, url);
        tokio::spawn(async move {
            cache.populate(std::slice::from_ref(&request)).await;
        });
    }

    /// Drops the entry for `pubkey` from memory and storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer task has stopped.
    pub async fn evict(&self, pubkey: &str) -> Result<()> {
        self.entries.write().await.remove(pubkey);
        self.writer.remove(pubkey)
    }

    /// Waits until every queued write has reached the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer task has stopped.
    pub async fn flush(&self) -> Result<()> {
        self.writer.flush().await
    }

    fn claim(&self, request: &AvatarRequest) -> Option<InFlightClaim<'_>> {
        let key = (request.pubkey.clone(), request.url.clone());
        let mut set = self.in_flight.lock().ok()?;
        if set.insert(key.clone()) {
            Some(InFlightClaim {
                set: &self.in_flight,
                key,
            })
        } else {
            None
        }
    }

    async fn store(&self, request: &AvatarRequest, image: FetchedImage) {
        let mut entry = ImageCacheEntry::new(
            request.pubkey.clone(),
            request.url.clone(),
            image.payload,
            chrono::Utc::now().timestamp(),
        );
        if entry.content_type == FALLBACK_CONTENT_TYPE {
            if let Some(content_type) = image.content_type.filter(|ct| ct.starts_with("image/")) {
                entry.content_type = content_type;
            }
        }

        self.entries
            .write()
            .await
            .insert(entry.pubkey.clone(), entry.clone());

        if let Err(e) = self.writer.put(entry) {
            tracing::warn!("Avatar for {} not persisted: {e}", request.pubkey);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingFetcher {
        calls: AtomicUsize,
        fail_urls: HashSet<String>,
        delay: Duration,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_urls: HashSet::new(),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl ImageFetcher for CountingFetcher {
        async fn fetch_image(&self, url: &str) -> Option<FetchedImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_urls.contains(url) {
                return None;
            }
            Some(FetchedImage {
                payload: url.as_bytes().to_vec(),
                content_type: Some("image/png".to_string()),
            })
        }
    }

    fn config() -> ImageCacheConfig {
        ImageCacheConfig {
            eager_count: 2,
            batch_size: 2,
            batch_delay_ms: 0,
            ..ImageCacheConfig::default()
        }
    }

    fn request(id: u8, url: &str) -> AvatarRequest {
        AvatarRequest::new(format!("{id:064x}"), url)
    }

    fn cache_with(fetcher: Arc<CountingFetcher>) -> (Arc<ImageCache>, Arc<ContactStorage>) {
        let storage = Arc::new(ContactStorage::in_memory().unwrap());
        let cache = ImageCache::new(storage.clone(), fetcher, config()).unwrap();
        (cache, storage)
    }

    #[tokio::test]
    async fn populate_fetches_and_serves_from_memory() {
        let fetcher = Arc::new(CountingFetcher::new());
        let (cache, _) = cache_with(fetcher.clone());
        let req = request(1, "https://a/1.png");

        let report = cache.populate(std::slice::from_ref(&req)).await;
        assert_eq!(report.fetched, 1);

        let entry = cache.get(&req.pubkey, Some(req.url.as_str())).await.unwrap();
        assert_eq!(entry.content_type, "image/png");

        let again = cache.populate(std::slice::from_ref(&req)).await;
        assert_eq!(again.cached, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn changed_url_is_a_miss() {
        let fetcher = Arc::new(CountingFetcher::new());
        let (cache, _) = cache_with(fetcher.clone());
        cache.populate(&[request(1, "https://a/1.png")]).await;

        assert!(cache
            .get(&format!("{:064x}", 1), Some("https://a/2.png"))
            .await
            .is_none());

        let report = cache.populate(&[request(1, "https://a/2.png")]).await;
        assert_eq!(report.fetched, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn duplicate_requests_fetch_once() {
        let fetcher = Arc::new(CountingFetcher::new());
        let (cache, _) = cache_with(fetcher.clone());

        let report = cache
            .populate(&[request(1, "https://a/1.png"), request(1, "https://a/1.png")])
            .await;

        assert_eq!(report.fetched, 1);
        assert_eq!(report.in_flight, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn changed_url_is_fetched_while_old_one_downloads() {
        let fetcher = Arc::new(CountingFetcher {
            delay: Duration::from_millis(50),
            ..CountingFetcher::new()
        });
        let (cache, _) = cache_with(fetcher.clone());
        let old = request(1, "https://a/old.png");
        let new = request(1, "https://a/new.png");

        let (first, second, repeat) = tokio::join!(
            cache.populate(std::slice::from_ref(&old)),
            cache.populate(std::slice::from_ref(&new)),
            cache.populate(std::slice::from_ref(&new)),
        );

        assert_eq!(first.fetched, 1);
        assert_eq!(second.fetched, 1);
        assert_eq!(repeat.in_flight, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert!(cache.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let mut fetcher = CountingFetcher::new();
        fetcher.fail_urls.insert("https://a/broken.png".to_string());
        let (cache, _) = cache_with(Arc::new(fetcher));

        let report = cache.populate(&[request(1, "https://a/broken.png")]).await;
        assert_eq!(report.failed, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn load_initial_defers_the_tail() {
        let fetcher = Arc::new(CountingFetcher::new());
        let (cache, _) = cache_with(fetcher.clone());
        let requests: Vec<_> = (1..=5)
            .map(|i| request(i, &format!("https://a/{i}.png")))
            .collect();

        let report = cache.load_initial(requests.clone()).await;

        assert_eq!(report.fetched, 2);
        assert_eq!(report.deferred, requests[2..].to_vec());

        let visible = cache.on_visible(report.deferred).await;
        assert_eq!(visible.fetched, 3);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn warm_load_restores_persisted_entries() {
        let fetcher = Arc::new(CountingFetcher::new());
        let (cache, storage) = cache_with(fetcher.clone());
        let req = request(1, "https://a/1.png");
        cache.populate(std::slice::from_ref(&req)).await;
        cache.flush().await.unwrap();

        let reopened = ImageCache::new(storage, fetcher.clone(), config()).unwrap();
        assert!(reopened.is_cached(&req).await);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn evict_removes_everywhere() {
        let fetcher = Arc::new(CountingFetcher::new());
        let (cache, storage) = cache_with(fetcher);
        let req = request(1, "https://a/1.png");
        cache.populate(std::slice::from_ref(&req)).await;

        cache.evict(&req.pubkey).await.unwrap();
        cache.flush().await.unwrap();

        assert!(!cache.is_cached(&req).await);
        assert!(storage.get_image(&req.pubkey).unwrap().is_none());
    }

    #[tokio::test]
    async fn enqueue_populates_in_background() {
        let fetcher = Arc::new(CountingFetcher::new());
        let (cache, _) = cache_with(fetcher);
        let req = request(1, "https://a/1.png");

        cache.enqueue(req.pubkey.clone(), req.url.clone());

        for _ in 0..50 {
            if cache.is_cached(&req).await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cache.is_cached(&req).await);
    }
}
