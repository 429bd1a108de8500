//! Local contact store.
//!
//! This module provides the address book and its per-owner visibility:
//!
//! - [`Contact`]: an identity with display data and an extension map
//! - [`UserContactRelationship`]: whether an owner follows it publicly
//! - [`ContactStorage`]: the `SQLite` store, also holding avatars and
//!   decryption hints
//! - [`ContactManager`]: the API the application talks to
//!
//! # Architecture
//!
//! ```text
//! ContactManager
//!     ├── ReconciliationEngine ── FollowListSource
//!     │       └── ProfileEnricher ── ProfileSource
//!     ├── PrivacyPublisher ── FollowListPublisher
//!     ├── DecryptionResolver ── Decryptor
//!     └── ImageCache ── ImageFetcher
//!             │
//!             ▼
//!       ContactStorage (SQLite)
//! ```

mod error;
mod manager;
mod storage;
mod types;

pub use error::{ContactsError, Result};
pub use manager::{ContactManager, ContactServices};
pub use storage::{ContactStorage, EXISTENCE_QUERY_CHUNK};
pub use types::{Contact, ContactEntry, UserContactRelationship};
