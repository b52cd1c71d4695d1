//! Core types and traits for the slugline URL shortener.
//!
//! This crate provides the record model, the expiry classification and the
//! storage contract shared by the storage backends and the resolver.

pub mod clock;
pub mod error;
pub mod expiry;
pub mod normalize;
pub mod record;
pub mod slug;
pub mod store;

pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use error::{CoreError, StorageError};
pub use expiry::{ExpiryPolicy, RecordState};
pub use normalize::{StandardNormalizer, UrlNormalizer};
pub use record::ShortenedUrl;
pub use slug::Slug;
pub use store::{Reactivation, RecordStore};
