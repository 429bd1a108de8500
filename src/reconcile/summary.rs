//! Aggregate result of a reconciliation pass.

use crate::contacts::ContactsError;
use crate::privacy::PublishOutcome;

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    /// Every step ran; individual row failures may still be listed.
    Completed,
    /// The pass stopped before writing anything.
    Aborted,
    /// A newer pass for the same owner took over.
    Superseded,
}

/// Counts and failures of one pass.
#[derive(Debug)]
pub struct RefreshSummary {
    /// How the pass ended.
    pub status: PassStatus,
    /// Follows that were new to this owner.
    pub added: usize,
    /// Contacts demoted to private.
    pub to_private: usize,
    /// Contacts promoted to public.
    pub to_public: usize,
    /// Pubkeys that needed no write.
    pub unchanged: usize,
    /// Contacts whose profile changed.
    pub enriched: usize,
    /// Failures recorded along the way.
    pub failures: Vec<ContactsError>,
    /// What happened to the follow list broadcast.
    pub publish: PublishOutcome,
}

impl RefreshSummary {
    pub(crate) const fn new(status: PassStatus) -> Self {
        Self {
            status,
            added: 0,
            to_private: 0,
            to_public: 0,
            unchanged: 0,
            enriched: 0,
            failures: Vec::new(),
            publish: PublishOutcome::NotNeeded,
        }
    }

    pub(crate) fn aborted(failure: ContactsError) -> Self {
        let mut summary = Self::new(PassStatus::Aborted);
        summary.failures.push(failure);
        summary
    }

    /// Whether any relationship was written.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.added + self.to_private + self.to_public > 0
    }

    /// One line for the user, e.g. "Added 3 contacts, 1 converted to private".
    #[must_use]
    pub fn message(&self) -> String {
        match self.status {
            PassStatus::Aborted => {
                return self.failures.first().map_or_else(
                    || "Could not refresh contacts".to_string(),
                    |e| format!("Could not refresh contacts: {e}"),
                );
            }
            PassStatus::Superseded => return "Refresh replaced by a newer one".to_string(),
            PassStatus::Completed => {}
        }

        let mut parts = Vec::new();
        if self.added > 0 {
            let noun = if self.added == 1 { "contact" } else { "contacts" };
            parts.push(format!("Added {} {noun}", self.added));
        }
        if self.to_private > 0 {
            parts.push(format!("{} converted to private", self.to_private));
        }
        if self.to_public > 0 {
            parts.push(format!("{} converted to public", self.to_public));
        }
        if !self.failures.is_empty() {
            parts.push(format!("{} failed to save", self.failures.len()));
        }

        let mut message = if parts.is_empty() {
            "Contacts are up to date".to_string()
        } else {
            parts.join(", ")
        };

        if self.publish.is_pending() {
            message.push_str(" (saved locally, not yet published)");
        }
        message
    }
}
