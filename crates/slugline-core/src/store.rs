use crate::error::Result;
use crate::expiry::ExpiryPolicy;
use crate::record::ShortenedUrl;
use crate::slug::Slug;
use async_trait::async_trait;
use jiff::Timestamp;

/// How an expired record is brought back to life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reactivation<'a> {
    /// Keep the stored URL. Applies only while the record still maps to
    /// the given URL.
    Matching(&'a str),
    /// Overwrite the stored URL with the given one.
    Rewrite(&'a str),
}

impl<'a> Reactivation<'a> {
    /// Returns the URL the record holds after reactivation.
    pub fn url(&self) -> &'a str {
        match self {
            Reactivation::Matching(url) | Reactivation::Rewrite(url) => url,
        }
    }

    /// Whether the reactivation may be applied to `record`.
    pub fn applies_to(&self, record: &ShortenedUrl) -> bool {
        match self {
            Reactivation::Matching(url) => record.url == *url,
            Reactivation::Rewrite(_) => true,
        }
    }

    /// Applies the reactivation to a record in place.
    pub fn apply(&self, record: &mut ShortenedUrl) {
        record.expires_at = None;
        if let Reactivation::Rewrite(url) = self {
            record.url = (*url).to_string();
        }
    }
}

/// Durable storage of slug to URL mappings.
///
/// Every write is atomic with respect to the slug key: a backend must make
/// the check and the mutation of `create`, `reactivate` and `expire` a single
/// step, so that at most one live record per slug can ever exist.
///
/// Classifying operations take the reference time explicitly and classify
/// through [`ExpiryPolicy`].
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Returns the record for `token`, live or expired.
    async fn find_by_token(&self, token: &Slug) -> Result<Option<ShortenedUrl>>;

    /// Returns every record for `url`, live or expired, oldest first.
    async fn find_by_url(&self, url: &str) -> Result<Vec<ShortenedUrl>>;

    /// Inserts a new record.
    ///
    /// Fails with [`StorageError::Conflict`](crate::StorageError::Conflict)
    /// if a record for the same slug is live at `now`. An expired record
    /// holding the slug is overwritten.
    async fn create(&self, record: ShortenedUrl, now: Timestamp) -> Result<ShortenedUrl>;

    /// Clears the expiry of the record for `token` if it is expired at `now`
    /// and `reactivation` applies to it.
    ///
    /// Returns `None` if there is no such record, which includes losing a
    /// race against a concurrent writer.
    async fn reactivate(
        &self,
        token: &Slug,
        reactivation: Reactivation<'_>,
        now: Timestamp,
    ) -> Result<Option<ShortenedUrl>>;

    /// Sets `expires_at = now` on the live record for `token`.
    /// Returns `false` if no live record exists.
    async fn expire(&self, token: &Slug, now: Timestamp) -> Result<bool>;

    /// Returns the record for `token` only if it is live at `now`.
    async fn find_live_by_token(
        &self,
        token: &Slug,
        now: Timestamp,
    ) -> Result<Option<ShortenedUrl>> {
        Ok(self
            .find_by_token(token)
            .await?
            .filter(|record| ExpiryPolicy::is_live(record, now)))
    }

    /// Returns the record for `token` only if it is expired at `now`.
    async fn find_expired_by_token(
        &self,
        token: &Slug,
        now: Timestamp,
    ) -> Result<Option<ShortenedUrl>> {
        Ok(self
            .find_by_token(token)
            .await?
            .filter(|record| ExpiryPolicy::is_expired(record, now)))
    }

    /// Returns a record for `url` that is live at `now`, if any.
    async fn find_live_by_url(&self, url: &str, now: Timestamp) -> Result<Option<ShortenedUrl>> {
        Ok(self
            .find_by_url(url)
            .await?
            .into_iter()
            .find(|record| ExpiryPolicy::is_live(record, now)))
    }

    /// Returns a record for `url` that is expired at `now`, if any.
    async fn find_expired_by_url(
        &self,
        url: &str,
        now: Timestamp,
    ) -> Result<Option<ShortenedUrl>> {
        Ok(ExpiryPolicy::expired(self.find_by_url(url).await?, now).next())
    }
}
