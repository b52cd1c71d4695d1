use crate::expiry::{ExpiryPolicy, RecordState};
use crate::slug::Slug;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A stored slug to URL mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortenedUrl {
    /// The slug. Never changes once the record exists.
    pub token: Slug,
    /// The destination URL, already normalized.
    pub url: String,
    /// When the record stops resolving. `None` means never.
    pub expires_at: Option<Timestamp>,
    /// When the record was first written. Informational only.
    pub created_at: Timestamp,
}

impl ShortenedUrl {
    /// Creates a record that never expires.
    pub fn new(token: Slug, url: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            token,
            url: url.into(),
            expires_at: None,
            created_at,
        }
    }

    /// Sets the expiry timestamp of the record.
    pub fn with_expiry(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Classifies the record at `now`. Shorthand for [`ExpiryPolicy::state`].
    pub fn state(&self, now: Timestamp) -> RecordState {
        ExpiryPolicy::state(self, now)
    }
}
