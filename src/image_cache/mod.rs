//! Avatar cache.
//!
//! # Architecture
//!
//! ```text
//! load_initial / on_visible / enqueue
//!     │
//!     ▼
//! ImageCache (memory map + in-flight set)
//!     │  batches of concurrent downloads
//!     ▼
//! ImageFetcher (HttpImageFetcher)
//!     │
//!     ▼
//! CacheWriter (single consumer) ──► image_cache table + contacts.picture_cache
//! ```
//!
//! An entry is valid only while its `source_url` equals the contact's
//! current picture URL.

mod cache;
mod error;
mod fetcher;
mod types;
mod writer;

pub use cache::ImageCache;
pub use error::{ImageCacheError, Result};
pub use fetcher::{FetchedImage, HttpImageFetcher, ImageFetcher, USER_AGENT};
pub use types::{AvatarRequest, ImageCacheEntry, LoadReport, FALLBACK_CONTENT_TYPE};
pub use writer::CacheWriter;
