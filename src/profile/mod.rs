//! Profile metadata enrichment.
//!
//! Contacts start as placeholders; the enricher fills them from the
//! newest profile document of each pubkey with an additive merge: what the
//! document carries overwrites, what it omits is kept.

mod enricher;
mod types;

pub use enricher::{EnrichmentReport, ProfileEnricher};
pub use types::ProfileMetadata;
