//! Follow list reconciliation.
//!
//! # Architecture
//!
//! ```text
//! refresh(owner)
//!     │
//!     ├─ SessionRegistry::begin        (supersede older passes)
//!     ├─ ContactStorage::get_relationships   L = {pubkey -> is_public}
//!     ├─ FollowListSource::fetch_follow_list R (abort on failure)
//!     ├─ FollowDiff::compute           to_private / to_public / to_add / unchanged
//!     ├─ batched writes                demotions, promotions, placeholders
//!     ├─ ProfileEnricher::enrich       new and unsynced contacts
//!     └─ PrivacyPublisher::publish     when any visibility changed
//! ```
//!
//! A pass that finds no follow list at all does not demote anyone unless
//! [`ReconcileConfig::demote_on_missing_list`](crate::config::ReconcileConfig)
//! is set; an existing but empty follow list always does.

mod diff;
mod engine;
mod session;
mod summary;

pub use diff::FollowDiff;
pub use engine::ReconciliationEngine;
pub use session::{Session, SessionRegistry};
pub use summary::{PassStatus, RefreshSummary};
