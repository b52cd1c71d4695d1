use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use slugline_core::error::Result;
use slugline_core::{ExpiryPolicy, Reactivation, RecordStore, ShortenedUrl, Slug, StorageError};
use smol_str::SmolStr;
use tracing::trace;

/// In-memory implementation of [`RecordStore`] using DashMap.
///
/// One entry per slug. Writes go through DashMap's entry API, which holds
/// the shard lock for the slug across the check and the mutation, so two
/// concurrent writers on the same slug are serialized.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: DashMap<SmolStr, ShortenedUrl>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: DashMap::with_capacity(capacity),
        }
    }

    /// Number of stored records, live or expired.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns a copy of every stored record.
    pub fn snapshot(&self) -> Vec<ShortenedUrl> {
        self.records
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn key(token: &Slug) -> SmolStr {
        SmolStr::new(token.as_str())
    }
}

#[async_trait]
impl RecordStore for InMemoryRepository {
    async fn find_by_token(&self, token: &Slug) -> Result<Option<ShortenedUrl>> {
        Ok(self
            .records
            .get(token.as_str())
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_url(&self, url: &str) -> Result<Vec<ShortenedUrl>> {
        let mut records: Vec<ShortenedUrl> = self
            .records
            .iter()
            .filter(|entry| entry.value().url == url)
            .map(|entry| entry.value().clone())
            .collect();

        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.token.cmp(&b.token))
        });
        Ok(records)
    }

    async fn create(&self, record: ShortenedUrl, now: Timestamp) -> Result<ShortenedUrl> {
        match self.records.entry(Self::key(&record.token)) {
            Entry::Occupied(mut occupied) => {
                if ExpiryPolicy::is_live(occupied.get(), now) {
                    return Err(StorageError::Conflict(record.token.to_string()));
                }
                trace!(slug = %record.token, "overwriting expired record");
                occupied.insert(record.clone());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record.clone());
            }
        }

        Ok(record)
    }

    async fn reactivate(
        &self,
        token: &Slug,
        reactivation: Reactivation<'_>,
        now: Timestamp,
    ) -> Result<Option<ShortenedUrl>> {
        let Some(mut entry) = self.records.get_mut(token.as_str()) else {
            return Ok(None);
        };

        let record = entry.value_mut();
        if ExpiryPolicy::is_live(record, now) || !reactivation.applies_to(record) {
            return Ok(None);
        }

        reactivation.apply(record);
        Ok(Some(record.clone()))
    }

    async fn expire(&self, token: &Slug, now: Timestamp) -> Result<bool> {
        let Some(mut entry) = self.records.get_mut(token.as_str()) else {
            return Ok(false);
        };

        let record = entry.value_mut();
        if ExpiryPolicy::is_expired(record, now) {
            return Ok(false);
        }

        record.expires_at = Some(now);
        Ok(true)
    }
}
