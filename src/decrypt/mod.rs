//! Sender resolution for inbound encrypted mail.
//!
//! Mail headers do not reliably say which nostr key encrypted a message,
//! and several contacts may share one address. The resolver tries keys in
//! a fixed order and remembers the winner, so later messages from the
//! same sender decrypt on the first attempt.

mod decryptor;
mod error;
mod resolver;
mod types;

pub use decryptor::{Decryptor, Nip44Decryptor};
pub use error::{DecryptionError, Result};
pub use resolver::DecryptionResolver;
pub use types::{InboundMessage, Resolution, ResolutionPath};
