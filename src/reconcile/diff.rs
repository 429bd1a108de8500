//! Four-way partition of local relationships against a remote follow set.

use std::collections::{BTreeSet, HashMap};

/// How each pubkey must change to match the remote follow set.
///
/// The four sets are disjoint and together cover every pubkey that is
/// either stored locally or present remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowDiff {
    /// Public locally, absent remotely.
    pub to_private: BTreeSet<String>,
    /// Private locally, present remotely.
    pub to_public: BTreeSet<String>,
    /// Present remotely, unknown locally.
    pub to_add: BTreeSet<String>,
    /// Already consistent.
    pub unchanged: BTreeSet<String>,
}

impl FollowDiff {
    /// Partitions `local` (`pubkey -> is_public`) against `remote`.
    #[must_use]
    pub fn compute(local: &HashMap<String, bool>, remote: &BTreeSet<String>) -> Self {
        let mut diff = Self::default();

        for (pubkey, &is_public) in local {
            let followed = remote.contains(pubkey);
            let bucket = match (is_public, followed) {
                (true, false) => &mut diff.to_private,
                (false, true) => &mut diff.to_public,
                _ => &mut diff.unchanged,
            };
            bucket.insert(pubkey.clone());
        }

        diff.to_add = remote
            .iter()
            .filter(|pubkey| !local.contains_key(*pubkey))
            .cloned()
            .collect();

        diff
    }

    /// Moves every demotion into `unchanged`.
    #[must_use]
    pub fn without_demotions(mut self) -> Self {
        self.unchanged.append(&mut self.to_private);
        self
    }

    /// Number of relationship writes the diff calls for.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.to_private.len() + self.to_public.len() + self.to_add.len()
    }

    /// Whether nothing needs to be written.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.change_count() == 0
    }
}
