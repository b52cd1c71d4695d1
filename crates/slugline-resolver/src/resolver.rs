use crate::error::{ResolverError, Result};
use crate::token::TokenGenerator;
use slugline_core::{
    Clock, MonotonicClock, Reactivation, RecordStore, ShortenedUrl, Slug, StorageError,
    SystemClock,
};
use slugline_generator::Generator;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// How many times a create decision is re-run after a conditional store
/// write reports that a concurrent writer got there first.
pub const MAX_DECISION_ROUNDS: usize = 3;

/// The slug lifecycle engine.
///
/// Decides for every create request whether to reactivate an expired
/// mapping, reuse a live one, issue a new slug, or reject the request.
/// Reactivation always wins over fresh creation.
///
/// The resolver never holds locks itself. Each store write is conditional,
/// and when one reports a lost race the whole decision is taken again
/// against the new store state.
///
/// The clock is read through a [`MonotonicClock`], so a decision always
/// sees an instant later than any expiry this resolver stamped before it.
#[derive(Debug)]
pub struct SlugResolver<S, G, C = SystemClock> {
    store: Arc<S>,
    tokens: TokenGenerator<G>,
    clock: MonotonicClock<C>,
}

impl<S: RecordStore, G: Generator> SlugResolver<S, G, SystemClock> {
    pub fn new(store: Arc<S>, tokens: TokenGenerator<G>) -> Self {
        Self::with_clock(store, tokens, SystemClock)
    }
}

impl<S: RecordStore, G: Generator, C: Clock> SlugResolver<S, G, C> {
    pub fn with_clock(store: Arc<S>, tokens: TokenGenerator<G>, clock: C) -> Self {
        Self {
            store,
            tokens,
            clock: MonotonicClock::new(clock),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn clock(&self) -> &C {
        self.clock.inner()
    }

    /// Maps `url` to a generated slug.
    ///
    /// An expired record for the same URL is reactivated under its old slug.
    /// Failing that, a live record for the URL is returned unchanged, so
    /// repeated calls converge on one slug. Only when neither exists is a new
    /// slug issued.
    ///
    /// Reactivation is tried before live reuse. A URL holding both a live and
    /// an expired slug therefore ends up with two live slugs.
    pub async fn create_dynamic(&self, url: &str) -> Result<ShortenedUrl> {
        ensure_url(url)?;

        for round in 1..=MAX_DECISION_ROUNDS {
            let now = self.clock.now();

            let Some(expired) = self.store.find_expired_by_url(url, now).await? else {
                if let Some(live) = self.store.find_live_by_url(url, now).await? {
                    debug!(slug = %live.token, "url already has a live slug");
                    return Ok(live);
                }
                let record = self.tokens.issue(self.store.as_ref(), url, now).await?;
                info!(slug = %record.token, url = %url, "issued new slug");
                return Ok(record);
            };

            if let Some(record) = self
                .store
                .reactivate(&expired.token, Reactivation::Matching(url), now)
                .await?
            {
                info!(slug = %record.token, url = %url, "reactivated expired slug");
                return Ok(record);
            }

            warn!(slug = %expired.token, round, "expired record changed before reactivation");
        }

        // Every round found an expired record that another writer then
        // claimed. Issue a fresh slug rather than fail the request.
        let now = self.clock.now();
        let record = self.tokens.issue(self.store.as_ref(), url, now).await?;
        info!(slug = %record.token, url = %url, "issued new slug after contention");
        Ok(record)
    }

    /// Maps `url` to the caller-chosen `slug`.
    ///
    /// - an expired record under `slug` is reactivated and pointed at `url`;
    /// - a live record under `slug` for the same URL is returned unchanged;
    /// - a live record under `slug` for another URL is
    ///   [`ResolverError::SlugTaken`];
    /// - otherwise a new record is created.
    pub async fn create_custom(&self, url: &str, slug: &Slug) -> Result<ShortenedUrl> {
        ensure_url(url)?;

        for round in 1..=MAX_DECISION_ROUNDS {
            let now = self.clock.now();

            if self.store.find_expired_by_token(slug, now).await?.is_some() {
                if let Some(record) = self
                    .store
                    .reactivate(slug, Reactivation::Rewrite(url), now)
                    .await?
                {
                    info!(slug = %slug, url = %url, "reactivated custom slug");
                    return Ok(record);
                }
                warn!(slug = %slug, round, "custom slug changed before reactivation");
                continue;
            }

            if let Some(live) = self.store.find_live_by_token(slug, now).await? {
                if live.url == url {
                    debug!(slug = %slug, "custom slug already maps to url");
                    return Ok(live);
                }
                debug!(slug = %slug, existing = %live.url, requested = %url, "custom slug taken");
                return Err(ResolverError::SlugTaken { slug: slug.clone() });
            }

            match self
                .store
                .create(ShortenedUrl::new(slug.clone(), url, now), now)
                .await
            {
                Ok(record) => {
                    info!(slug = %slug, url = %url, "created custom slug");
                    return Ok(record);
                }
                Err(StorageError::Conflict(_)) => {
                    warn!(slug = %slug, round, "custom slug created concurrently");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ResolverError::Contended { slug: slug.clone() })
    }

    /// Returns the live record for `slug`, or `None` if there is none.
    pub async fn resolve(&self, slug: &Slug) -> Result<Option<ShortenedUrl>> {
        let now = self.clock.now();
        trace!(slug = %slug, "resolving slug");

        let record = self.store.find_live_by_token(slug, now).await?;

        match &record {
            Some(record) => debug!(slug = %slug, url = %record.url, "resolved slug"),
            None => trace!(slug = %slug, "slug not found"),
        }
        Ok(record)
    }

    /// Expires the live record for `slug`.
    /// Returns `false` if there is no live record.
    pub async fn expire_by_token(&self, slug: &Slug) -> Result<bool> {
        let now = self.clock.now();
        let expired = self.store.expire(slug, now).await?;

        if expired {
            info!(slug = %slug, "expired slug");
        } else {
            debug!(slug = %slug, "no live record to expire");
        }
        Ok(expired)
    }
}

fn ensure_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(ResolverError::InvalidUrl("URL cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenSettings;
    use async_trait::async_trait;
    use jiff::{SignedDuration, Timestamp};
    use slugline_core::error::Result as StoreResult;
    use slugline_core::ManualClock;
    use slugline_generator::SeqGenerator;
    use slugline_storage::InMemoryRepository;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type TestResolver = SlugResolver<InMemoryRepository, SeqGenerator, ManualClock>;

    fn start() -> Timestamp {
        Timestamp::from_second(1_700_000_000).unwrap()
    }

    fn test_resolver() -> (TestResolver, ManualClock) {
        let clock = ManualClock::new(start());
        let tokens = TokenGenerator::new(
            SeqGenerator::with_prefix("sl").unwrap(),
            TokenSettings::default(),
        );
        let resolver =
            SlugResolver::with_clock(Arc::new(InMemoryRepository::new()), tokens, clock.clone());
        (resolver, clock)
    }

    fn slug(s: &str) -> Slug {
        Slug::new(s).unwrap()
    }

    async fn seed<S: RecordStore>(
        resolver: &SlugResolver<S, SeqGenerator, ManualClock>,
        token: &str,
        url: &str,
        expires_at: Option<Timestamp>,
    ) {
        let mut record = ShortenedUrl::new(Slug::new_unchecked(token), url, start());
        record.expires_at = expires_at;
        resolver.store().create(record, start()).await.unwrap();
    }

    fn yesterday() -> Option<Timestamp> {
        Some(start() - SignedDuration::from_hours(24))
    }

    const WINNER_URL: &str = "http://winner.example/";

    /// Store where another writer wins the next few conditional writes.
    ///
    /// A lost reactivation leaves the record untouched. A lost create first
    /// stores a live record for [`WINNER_URL`] under the requested slug.
    struct Racy {
        inner: InMemoryRepository,
        lost_reactivations: AtomicUsize,
        lost_creates: AtomicUsize,
    }

    impl Racy {
        fn losing(reactivations: usize, creates: usize) -> Self {
            Self {
                inner: InMemoryRepository::new(),
                lost_reactivations: AtomicUsize::new(reactivations),
                lost_creates: AtomicUsize::new(creates),
            }
        }
    }

    fn lose(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    #[async_trait]
    impl RecordStore for Racy {
        async fn find_by_token(&self, token: &Slug) -> StoreResult<Option<ShortenedUrl>> {
            self.inner.find_by_token(token).await
        }

        async fn find_by_url(&self, url: &str) -> StoreResult<Vec<ShortenedUrl>> {
            self.inner.find_by_url(url).await
        }

        async fn create(
            &self,
            record: ShortenedUrl,
            now: Timestamp,
        ) -> StoreResult<ShortenedUrl> {
            if lose(&self.lost_creates) {
                let winner = ShortenedUrl::new(record.token.clone(), WINNER_URL, now);
                self.inner.create(winner, now).await?;
                return Err(StorageError::Conflict(record.token.to_string()));
            }
            self.inner.create(record, now).await
        }

        async fn reactivate(
            &self,
            token: &Slug,
            reactivation: Reactivation<'_>,
            now: Timestamp,
        ) -> StoreResult<Option<ShortenedUrl>> {
            if lose(&self.lost_reactivations) {
                return Ok(None);
            }
            self.inner.reactivate(token, reactivation, now).await
        }

        async fn expire(&self, token: &Slug, now: Timestamp) -> StoreResult<bool> {
            self.inner.expire(token, now).await
        }
    }

    fn racy_resolver(store: Racy) -> SlugResolver<Racy, SeqGenerator, ManualClock> {
        let tokens = TokenGenerator::new(
            SeqGenerator::with_prefix("sl").unwrap(),
            TokenSettings::default(),
        );
        SlugResolver::with_clock(Arc::new(store), tokens, ManualClock::new(start()))
    }

    #[tokio::test]
    async fn dynamic_creates_new_record() {
        let (resolver, _clock) = test_resolver();

        let record = resolver.create_dynamic("http://www.example.com/").await.unwrap();

        assert_eq!(record.token.as_str(), "sl000000");
        assert_eq!(record.url, "http://www.example.com/");
        assert_eq!(record.expires_at, None);
    }

    #[tokio::test]
    async fn dynamic_reactivates_expired_record_for_url() {
        let (resolver, _clock) = test_resolver();
        seed(
            &resolver,
            "12345",
            "http://example.com/",
            Some(start() - SignedDuration::from_hours(24)),
        )
        .await;

        let record = resolver.create_dynamic("http://example.com/").await.unwrap();

        assert_eq!(record.token.as_str(), "12345");
        assert_eq!(record.expires_at, None);
        assert_eq!(resolver.store().len(), 1);
    }

    #[tokio::test]
    async fn dynamic_returns_live_record_for_url() {
        let (resolver, _clock) = test_resolver();
        seed(&resolver, "12345", "http://example.com/", None).await;

        let record = resolver.create_dynamic("http://example.com/").await.unwrap();

        assert_eq!(record.token.as_str(), "12345");
        assert_eq!(resolver.store().len(), 1);
    }

    #[tokio::test]
    async fn dynamic_prefers_reactivation_over_live_reuse() {
        // The URL keeps two live slugs afterwards. Documented behaviour, not
        // a guarantee callers should rely on.
        let (resolver, _clock) = test_resolver();
        seed(&resolver, "live1", "http://example.com/", None).await;
        seed(
            &resolver,
            "gone1",
            "http://example.com/",
            Some(start() - SignedDuration::from_hours(24)),
        )
        .await;

        let record = resolver.create_dynamic("http://example.com/").await.unwrap();

        assert_eq!(record.token.as_str(), "gone1");
        assert!(resolver.resolve(&slug("live1")).await.unwrap().is_some());
        assert!(resolver.resolve(&slug("gone1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn dynamic_rejects_empty_url() {
        let (resolver, _clock) = test_resolver();

        let err = resolver.create_dynamic("").await.unwrap_err();

        assert!(matches!(err, ResolverError::InvalidUrl(_)));
        assert!(resolver.store().is_empty());
    }

    #[tokio::test]
    async fn custom_creates_new_record() {
        let (resolver, _clock) = test_resolver();

        let record = resolver
            .create_custom("http://www.example.com/", &slug("custom"))
            .await
            .unwrap();

        assert_eq!(record.token.as_str(), "custom");
        assert_eq!(record.expires_at, None);
    }

    #[tokio::test]
    async fn custom_is_idempotent_for_same_url() {
        let (resolver, _clock) = test_resolver();

        let first = resolver
            .create_custom("http://www.example.com/", &slug("custom"))
            .await
            .unwrap();
        let second = resolver
            .create_custom("http://www.example.com/", &slug("custom"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(resolver.store().len(), 1);
    }

    #[tokio::test]
    async fn custom_rejects_slug_held_by_other_url() {
        let (resolver, _clock) = test_resolver();
        seed(&resolver, "12345", "http://example.com/", None).await;

        let err = resolver
            .create_custom("http://example2.com/", &slug("12345"))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolverError::SlugTaken { .. }));
        assert_eq!(err.to_string(), "Slug already taken.");
        let kept = resolver.resolve(&slug("12345")).await.unwrap().unwrap();
        assert_eq!(kept.url, "http://example.com/");
    }

    #[tokio::test]
    async fn custom_reactivates_expired_slug_same_url() {
        let (resolver, _clock) = test_resolver();
        seed(
            &resolver,
            "12345",
            "http://example.com/",
            Some(start() - SignedDuration::from_hours(24)),
        )
        .await;

        let record = resolver
            .create_custom("http://example.com/", &slug("12345"))
            .await
            .unwrap();

        assert_eq!(record.token.as_str(), "12345");
        assert_eq!(record.url, "http://example.com/");
        assert_eq!(record.expires_at, None);
    }

    #[tokio::test]
    async fn custom_reactivation_rewrites_url() {
        let (resolver, _clock) = test_resolver();
        seed(
            &resolver,
            "12345",
            "http://old.example/",
            Some(start() - SignedDuration::from_hours(24)),
        )
        .await;

        let record = resolver
            .create_custom("http://new.example/", &slug("12345"))
            .await
            .unwrap();

        assert_eq!(record.url, "http://new.example/");
        assert_eq!(record.expires_at, None);
        assert_eq!(resolver.store().len(), 1);
    }

    #[tokio::test]
    async fn resolve_ignores_expired_records() {
        let (resolver, _clock) = test_resolver();
        seed(
            &resolver,
            "gone1",
            "http://example.com/",
            Some(start() - SignedDuration::from_secs(1)),
        )
        .await;

        assert!(resolver.resolve(&slug("gone1")).await.unwrap().is_none());
        assert!(resolver.resolve(&slug("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolve_sees_expiry_pass() {
        let (resolver, clock) = test_resolver();
        seed(
            &resolver,
            "soon1",
            "http://example.com/",
            Some(start() + SignedDuration::from_secs(30)),
        )
        .await;

        assert!(resolver.resolve(&slug("soon1")).await.unwrap().is_some());

        clock.advance(SignedDuration::from_secs(31));
        assert!(resolver.resolve(&slug("soon1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expire_then_resolve() {
        let (resolver, _clock) = test_resolver();
        let record = resolver.create_dynamic("http://example.com/").await.unwrap();

        assert!(resolver.expire_by_token(&record.token).await.unwrap());

        assert!(resolver.resolve(&record.token).await.unwrap().is_none());
        assert!(!resolver.expire_by_token(&record.token).await.unwrap());
    }

    #[tokio::test]
    async fn expire_unknown_slug_is_false() {
        let (resolver, _clock) = test_resolver();
        assert!(!resolver.expire_by_token(&slug("nope")).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_custom_creates_agree() {
        let (resolver, _clock) = test_resolver();
        let resolver = Arc::new(resolver);
        let mut handles = vec![];

        for i in 0..8 {
            let resolver = Arc::clone(&resolver);
            handles.push(tokio::spawn(async move {
                let url = format!("http://example{}.com/", i % 2);
                resolver.create_custom(&url, &slug("contested")).await
            }));
        }

        let mut created = vec![];
        for handle in handles {
            match handle.await.unwrap() {
                Ok(record) => created.push(record),
                Err(err) => assert!(matches!(err, ResolverError::SlugTaken { .. })),
            }
        }

        assert!(!created.is_empty());
        assert!(created.iter().all(|record| record == &created[0]));
        assert_eq!(resolver.store().len(), 1);
    }

    #[tokio::test]
    async fn expire_at_creation_instant_is_one_shot() {
        let (resolver, clock) = test_resolver();

        let record = resolver.create_dynamic("http://example.com/").await.unwrap();
        assert!(resolver.expire_by_token(&record.token).await.unwrap());

        assert!(resolver.resolve(&record.token).await.unwrap().is_none());
        assert!(!resolver.expire_by_token(&record.token).await.unwrap());

        let revived = resolver
            .create_custom("http://example.com/", &record.token)
            .await
            .unwrap();
        assert_eq!(revived.expires_at, None);
        assert_eq!(clock.now(), start());
    }

    #[tokio::test]
    async fn custom_reactivation_retries_after_lost_race() {
        let resolver = racy_resolver(Racy::losing(1, 0));
        seed(&resolver, "12345", "http://old.example/", yesterday()).await;

        let record = resolver
            .create_custom("http://new.example/", &slug("12345"))
            .await
            .unwrap();

        assert_eq!(record.url, "http://new.example/");
        assert_eq!(record.expires_at, None);
        assert_eq!(resolver.store().lost_reactivations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn custom_gives_up_after_repeated_lost_reactivations() {
        let resolver = racy_resolver(Racy::losing(MAX_DECISION_ROUNDS, 0));
        seed(&resolver, "12345", "http://old.example/", yesterday()).await;

        let err = resolver
            .create_custom("http://new.example/", &slug("12345"))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolverError::Contended { .. }));
        let kept = resolver.store().find_by_token(&slug("12345")).await.unwrap().unwrap();
        assert_eq!(kept.url, "http://old.example/");
        assert_eq!(kept.expires_at, yesterday());
    }

    #[tokio::test]
    async fn custom_create_lost_to_other_url_is_taken() {
        let resolver = racy_resolver(Racy::losing(0, 1));

        let err = resolver
            .create_custom("http://mine.example/", &slug("custom"))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolverError::SlugTaken { .. }));
        let live = resolver.resolve(&slug("custom")).await.unwrap().unwrap();
        assert_eq!(live.url, WINNER_URL);
    }

    #[tokio::test]
    async fn custom_create_lost_to_same_url_returns_winner() {
        let resolver = racy_resolver(Racy::losing(0, 1));

        let record = resolver
            .create_custom(WINNER_URL, &slug("custom"))
            .await
            .unwrap();

        assert_eq!(record.token.as_str(), "custom");
        assert_eq!(record.url, WINNER_URL);
        assert_eq!(resolver.store().inner.len(), 1);
    }

    #[tokio::test]
    async fn dynamic_reactivation_retries_after_lost_race() {
        let resolver = racy_resolver(Racy::losing(1, 0));
        seed(&resolver, "gone1", "http://example.com/", yesterday()).await;

        let record = resolver.create_dynamic("http://example.com/").await.unwrap();

        assert_eq!(record.token.as_str(), "gone1");
        assert_eq!(record.expires_at, None);
        assert_eq!(resolver.store().inner.len(), 1);
    }

    #[tokio::test]
    async fn dynamic_issues_fresh_slug_after_repeated_lost_reactivations() {
        let resolver = racy_resolver(Racy::losing(MAX_DECISION_ROUNDS, 0));
        seed(&resolver, "gone1", "http://example.com/", yesterday()).await;

        let record = resolver.create_dynamic("http://example.com/").await.unwrap();

        assert_eq!(record.token.as_str(), "sl000000");
        assert_eq!(record.url, "http://example.com/");
        assert!(resolver.resolve(&slug("gone1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dynamic_moves_on_when_generated_slug_is_taken_concurrently() {
        let resolver = racy_resolver(Racy::losing(0, 1));

        let record = resolver.create_dynamic("http://example.com/").await.unwrap();

        assert_eq!(record.token.as_str(), "sl000001");
        let winner = resolver.resolve(&slug("sl000000")).await.unwrap().unwrap();
        assert_eq!(winner.url, WINNER_URL);
    }
}
