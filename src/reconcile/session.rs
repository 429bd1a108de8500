//! Per-owner pass generations.
//!
//! Starting a pass bumps the owner's generation; an older pass notices
//! it is no longer current and stops before its next write batch.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Handle for one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    owner_pubkey: String,
    generation: u64,
}

impl Session {
    /// Owner this pass reconciles.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner_pubkey
    }

    /// Generation number of this pass.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// Generation counters keyed by owner pubkey.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    generations: Mutex<HashMap<String, u64>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a pass for `owner_pubkey`, superseding any running one.
    pub fn begin(&self, owner_pubkey: &str) -> Session {
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let generation = generations.entry(owner_pubkey.to_string()).or_insert(0);
        *generation += 1;

        Session {
            owner_pubkey: owner_pubkey.to_string(),
            generation: *generation,
        }
    }

    /// Whether `session` is still the newest pass for its owner.
    pub fn is_current(&self, session: &Session) -> bool {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session.owner_pubkey)
            == Some(&session.generation)
    }
}
