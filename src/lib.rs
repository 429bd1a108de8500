//! Nostr Mail Core Library
//!
//! Contact management for nostr-mail: keeps the local address book in
//! step with the account's published follow list, enriches contacts with
//! profile metadata and avatars, and works out which contact's key
//! decrypts an inbound message.
//!
//! The main entry point is [`ContactManager`].

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod config;
pub mod contacts;
pub mod decrypt;
pub mod image_cache;
pub mod logging;
pub mod nostr;
pub mod privacy;
pub mod profile;
pub mod reconcile;
pub mod relay;
pub mod services;

pub use config::CoreConfig;
pub use contacts::{Contact, ContactEntry, ContactManager, ContactServices, ContactsError};
pub use decrypt::{DecryptionError, InboundMessage, Resolution};
pub use privacy::PublishOutcome;
pub use reconcile::{PassStatus, RefreshSummary};
