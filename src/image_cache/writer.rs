//! Single-consumer persistence queue for avatar entries.
//!
//! Concurrent downloads never touch the database directly: they hand
//! entries to a [`CacheWriter`], and one background task owning the
//! receiver applies them in arrival order.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::error::{ImageCacheError, Result};
use super::types::ImageCacheEntry;
use crate::contacts::ContactStorage;

enum WriteCommand {
    Put(ImageCacheEntry),
    Remove(String),
    Flush(oneshot::Sender<()>),
}

/// Handle to the persistence task. Cheap to clone.
#[derive(Clone)]
pub struct CacheWriter {
    tx: mpsc::UnboundedSender<WriteCommand>,
}

impl CacheWriter {
    /// Spawns the writer task.
    ///
    /// Must be called from within a Tokio runtime. The task ends when the
    /// last handle is dropped.
    #[must_use]
    pub fn spawn(storage: Arc<ContactStorage>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(storage, rx));
        Self { tx }
    }

    /// Queues an entry for persistence.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer task has stopped.
    pub fn put(&self, entry: ImageCacheEntry) -> Result<()> {
        self.tx
            .send(WriteCommand::Put(entry))
            .map_err(|_| ImageCacheError::WriterClosed)
    }

    /// Queues removal of the entry for `pubkey`.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer task has stopped.
    pub fn remove(&self, pubkey: &str) -> Result<()> {
        self.tx
            .send(WriteCommand::Remove(pubkey.to_string()))
            .map_err(|_| ImageCacheError::WriterClosed)
    }

    /// Waits until every command queued before this call has been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer task has stopped.
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(WriteCommand::Flush(done_tx))
            .map_err(|_| ImageCacheError::WriterClosed)?;
        done_rx.await.map_err(|_| ImageCacheError::WriterClosed)
    }
}

async fn run(storage: Arc<ContactStorage>, mut rx: mpsc::UnboundedReceiver<WriteCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            WriteCommand::Put(entry) => apply_put(&storage, &entry),
            WriteCommand::Remove(pubkey) => {
                if let Err(e) = storage.delete_image(&pubkey) {
                    tracing::warn!("Failed to remove cached avatar for {pubkey}: {e}");
                }
            }
            WriteCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("Image cache writer stopped");
}

fn apply_put(storage: &ContactStorage, entry: &ImageCacheEntry) {
    if let Err(e) = storage.save_image(entry) {
        tracing::warn!("Failed to persist avatar for {}: {e}", entry.pubkey);
        return;
    }

    match storage.update_picture_cache(&entry.pubkey, &entry.source_url, &entry.data_url()) {
        Ok(true) => tracing::debug!("Cached avatar for {}", entry.pubkey),
        Ok(false) => tracing::debug!(
            "Avatar for {} stored; contact no longer uses {}",
            entry.pubkey,
            entry.source_url
        ),
        Err(e) => tracing::warn!("Failed to update picture cache for {}: {e}", entry.pubkey),
    }
}
