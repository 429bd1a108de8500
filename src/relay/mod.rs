//! Relay access for follow lists and profile metadata.
//!
//! # Architecture
//!
//! ```text
//! ReconciliationEngine / ProfileEnricher / PrivacyPublisher
//!     │
//!     ▼
//! services traits (FollowListSource, ProfileSource, FollowListPublisher)
//!     │
//!     ▼
//! RelayClient (nostr-sdk Client, no signer)
//!     │
//!     ▼
//! Nostr Relays (wss:// only)
//! ```
//!
//! | Operation | Kind |
//! |-----------|------|
//! | Follow list fetch / publish | 3 |
//! | Profile metadata fetch | 0 |

mod client;
mod error;
mod types;

pub use client::RelayClient;
pub use error::{RelayError, RelayResult};
pub use types::{FollowListSnapshot, ProfileDocument, PublishResult};
