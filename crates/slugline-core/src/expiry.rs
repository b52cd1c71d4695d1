use crate::record::ShortenedUrl;
use jiff::Timestamp;

/// Lifecycle state of a record at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// The record resolves.
    Live,
    /// The record is retired but kept around for reactivation.
    Expired {
        /// The expiry timestamp stored on the record.
        at: Timestamp,
    },
}

impl RecordState {
    pub fn is_live(&self) -> bool {
        matches!(self, RecordState::Live)
    }
}

/// Classifies records as live or expired.
///
/// Every store backend and the resolver go through this type, so there is
/// exactly one definition of "expired": `expires_at` is set and strictly
/// earlier than the reference time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpiryPolicy;

impl ExpiryPolicy {
    pub fn state(record: &ShortenedUrl, now: Timestamp) -> RecordState {
        match record.expires_at {
            Some(at) if at < now => RecordState::Expired { at },
            _ => RecordState::Live,
        }
    }

    pub fn is_expired(record: &ShortenedUrl, now: Timestamp) -> bool {
        !Self::state(record, now).is_live()
    }

    pub fn is_live(record: &ShortenedUrl, now: Timestamp) -> bool {
        Self::state(record, now).is_live()
    }

    /// Keeps only the records that are expired at `now`.
    pub fn expired<'a, I>(records: I, now: Timestamp) -> impl Iterator<Item = ShortenedUrl> + 'a
    where
        I: IntoIterator<Item = ShortenedUrl>,
        I::IntoIter: 'a,
    {
        records
            .into_iter()
            .filter(move |record| Self::is_expired(record, now))
    }
}
