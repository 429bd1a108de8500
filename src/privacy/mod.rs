//! Follow list broadcast on visibility changes.
//!
//! A follow list event replaces the previous one wholesale, so every
//! change re-sends the owner's complete public set, never a delta.

mod publisher;

pub use publisher::{PrivacyPublisher, PublishOutcome};
