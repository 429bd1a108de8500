//! The reconciliation pass.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;

use super::diff::FollowDiff;
use super::session::{Session, SessionRegistry};
use super::summary::{PassStatus, RefreshSummary};
use crate::config::ReconcileConfig;
use crate::contacts::{Contact, ContactStorage, ContactsError};
use crate::nostr::short_pubkey;
use crate::privacy::PrivacyPublisher;
use crate::profile::ProfileEnricher;
use crate::services::FollowListSource;

/// One relationship write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Demote,
    Promote,
    Add { exists: bool },
}

/// What a successful write did.
struct Applied {
    change: Change,
    visibility_changed: bool,
    created: bool,
}

/// Reconciles one owner's relationships with their published follow list.
///
/// A pass is not transactional: every row write stands on its own, and
/// a pass interrupted at any point leaves state the next pass converges
/// from.
pub struct ReconciliationEngine {
    storage: Arc<ContactStorage>,
    follows: Arc<dyn FollowListSource>,
    enricher: Arc<ProfileEnricher>,
    publisher: Arc<PrivacyPublisher>,
    sessions: SessionRegistry,
    config: ReconcileConfig,
}

impl ReconciliationEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(
        storage: Arc<ContactStorage>,
        follows: Arc<dyn FollowListSource>,
        enricher: Arc<ProfileEnricher>,
        publisher: Arc<PrivacyPublisher>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            storage,
            follows,
            enricher,
            publisher,
            sessions: SessionRegistry::new(),
            config,
        }
    }

    /// Runs one pass for `owner_pubkey` (normalized hex).
    ///
    /// Starting a pass supersedes any pass already running for the same
    /// owner. Failures are folded into the returned summary.
    pub async fn refresh(&self, owner_pubkey: &str) -> RefreshSummary {
        let session = self.sessions.begin(owner_pubkey);
        let owner = short_pubkey(owner_pubkey);
        tracing::info!("Refreshing contacts for {owner} (pass {})", session.generation());

        let local = match self.storage.get_relationships(owner_pubkey) {
            Ok(local) => local,
            Err(e) => {
                tracing::warn!("Refresh for {owner} aborted: {e}");
                return RefreshSummary::aborted(e);
            }
        };

        let snapshot = match self.follows.fetch_follow_list(owner_pubkey).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Refresh for {owner} aborted, follow list unavailable: {e}");
                return RefreshSummary::aborted(ContactsError::NetworkUnavailable(e.to_string()));
            }
        };

        if !self.sessions.is_current(&session) {
            return RefreshSummary::new(PassStatus::Superseded);
        }

        let mut diff = FollowDiff::compute(&local, &snapshot.pubkeys);
        if !snapshot.list_found && !diff.to_private.is_empty() {
            if self.config.demote_on_missing_list {
                tracing::warn!(
                    "No follow list found for {owner}; demoting {} contacts",
                    diff.to_private.len()
                );
            } else {
                tracing::warn!(
                    "No follow list found for {owner}; keeping {} public contacts",
                    diff.to_private.len()
                );
                diff = diff.without_demotions();
            }
        }

        tracing::debug!(
            "Diff for {owner}: {} to private, {} to public, {} to add, {} unchanged",
            diff.to_private.len(),
            diff.to_public.len(),
            diff.to_add.len(),
            diff.unchanged.len()
        );

        let mut summary = RefreshSummary::new(PassStatus::Completed);
        summary.unchanged = diff.unchanged.len();

        let changes = self.plan(&diff, &mut summary);
        let Some((visibility_changed, created)) =
            self.apply_changes(&session, changes, &mut summary).await
        else {
            summary.status = PassStatus::Superseded;
            return summary;
        };

        if !self.sessions.is_current(&session) {
            summary.status = PassStatus::Superseded;
            return summary;
        }

        let targets = self.enrichment_targets(owner_pubkey, created, &mut summary);
        if !targets.is_empty() {
            summary.enriched = self.enricher.enrich(&targets).await.updated;
        }

        if visibility_changed {
            if !self.sessions.is_current(&session) {
                summary.status = PassStatus::Superseded;
                return summary;
            }
            summary.publish = self.publisher.publish(owner_pubkey).await;
        }

        tracing::info!("Refresh for {owner} done: {}", summary.message());
        summary
    }

    /// Orders the writes: demotions, promotions, then additions.
    fn plan(&self, diff: &FollowDiff, summary: &mut RefreshSummary) -> Vec<(String, Change)> {
        let to_add: Vec<String> = diff.to_add.iter().cloned().collect();
        let existing = match self.storage.existing_pubkeys(&to_add) {
            Ok(existing) => existing,
            Err(e) => {
                // INSERT OR IGNORE keeps additions correct without this
                tracing::warn!("Existence check failed, treating all additions as new: {e}");
                summary.failures.push(e);
                HashSet::new()
            }
        };

        diff.to_private
            .iter()
            .map(|pk| (pk.clone(), Change::Demote))
            .chain(diff.to_public.iter().map(|pk| (pk.clone(), Change::Promote)))
            .chain(to_add.into_iter().map(|pk| {
                let exists = existing.contains(&pk);
                (pk, Change::Add { exists })
            }))
            .collect()
    }

    /// Applies writes in bounded batches.
    ///
    /// Returns `None` if the pass was superseded between batches, else
    /// whether any visibility changed and which placeholders were created.
    async fn apply_changes(
        &self,
        session: &Session,
        changes: Vec<(String, Change)>,
        summary: &mut RefreshSummary,
    ) -> Option<(bool, Vec<String>)> {
        let mut visibility_changed = false;
        let mut created = Vec::new();
        let owner_pubkey = session.owner();
        let batch_size = self.config.batch_size.max(1);

        for (index, batch) in changes.chunks(batch_size).enumerate() {
            if index > 0 && !self.config.batch_delay().is_zero() {
                tokio::time::sleep(self.config.batch_delay()).await;
            }
            if !self.sessions.is_current(session) {
                tracing::info!(
                    "Refresh for {} superseded after {index} batches",
                    short_pubkey(owner_pubkey)
                );
                return None;
            }

            let now = chrono::Utc::now().timestamp();
            let results = join_all(batch.iter().map(|(pubkey, change)| async move {
                (pubkey, self.apply(owner_pubkey, pubkey, *change, now))
            }))
            .await;

            for (pubkey, result) in results {
                match result {
                    Ok(applied) => {
                        visibility_changed |= applied.visibility_changed;
                        if applied.created {
                            created.push(pubkey.clone());
                        }
                        match applied.change {
                            Change::Demote => summary.to_private += 1,
                            Change::Promote => summary.to_public += 1,
                            Change::Add { .. } => summary.added += 1,
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to update contact {pubkey}: {e}");
                        summary.failures.push(ContactsError::PartialPersistenceFailure {
                            pubkey: pubkey.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        Some((visibility_changed, created))
    }

    fn apply(
        &self,
        owner_pubkey: &str,
        pubkey: &str,
        change: Change,
        now: i64,
    ) -> crate::contacts::Result<Applied> {
        let mut created = false;
        let is_public = match change {
            Change::Demote => false,
            Change::Promote => true,
            Change::Add { exists } => {
                if !exists {
                    created = self
                        .storage
                        .insert_contact_if_absent(&Contact::placeholder(pubkey, now))?;
                }
                true
            }
        };

        let visibility_changed = self
            .storage
            .set_visibility(owner_pubkey, pubkey, is_public, now)?;

        Ok(Applied {
            change,
            visibility_changed,
            created,
        })
    }

    /// New placeholders first, then older public contacts never synced.
    fn enrichment_targets(
        &self,
        owner_pubkey: &str,
        created: Vec<String>,
        summary: &mut RefreshSummary,
    ) -> Vec<String> {
        let mut seen: HashSet<String> = created.iter().cloned().collect();
        let mut targets = created;

        match self
            .storage
            .pending_profile_pubkeys(owner_pubkey, self.config.max_pending_profiles)
        {
            Ok(pending) => {
                targets.extend(pending.into_iter().filter(|pk| seen.insert(pk.clone())));
            }
            Err(e) => {
                tracing::warn!("Could not list contacts awaiting profiles: {e}");
                summary.failures.push(e);
            }
        }

        targets
    }
}
