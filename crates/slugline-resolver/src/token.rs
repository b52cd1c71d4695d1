use crate::error::{ResolverError, Result};
use jiff::Timestamp;
use slugline_core::{RecordStore, ShortenedUrl, Slug, StorageError};
use slugline_generator::Generator;
use tracing::{error, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct TokenSettings {
    /// How many candidates are tried before giving up.
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Issues records under freshly generated slugs.
///
/// Candidates come from a pure [`Generator`]. A candidate that already has
/// a record, live or expired, is skipped so that retired slugs never start
/// pointing somewhere else. A candidate that loses the race inside
/// [`RecordStore::create`] is skipped as well. Both consume an attempt and
/// the loop is bounded by `max_attempts`.
#[derive(Debug)]
pub struct TokenGenerator<G> {
    generator: G,
    max_attempts: usize,
}

impl<G: Generator> TokenGenerator<G> {
    pub fn new(generator: G, settings: TokenSettings) -> Self {
        Self {
            generator,
            max_attempts: settings.max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Stores a never-expiring record for `url` under a slug that has never
    /// been used.
    pub async fn issue<S: RecordStore>(
        &self,
        store: &S,
        url: &str,
        now: Timestamp,
    ) -> Result<ShortenedUrl> {
        for attempt in 1..=self.max_attempts {
            let candidate: Slug = self.generator.generate().into();

            if store.find_by_token(&candidate).await?.is_some() {
                warn!(slug = %candidate, attempt, "generated slug is already in use");
                continue;
            }

            let record = ShortenedUrl::new(candidate, url, now);
            match store.create(record, now).await {
                Ok(record) => return Ok(record),
                Err(StorageError::Conflict(slug)) => {
                    warn!(slug = %slug, attempt, "generated slug was taken concurrently");
                }
                Err(e) => return Err(e.into()),
            }
        }

        error!(attempts = self.max_attempts, "slug generation exhausted");
        Err(ResolverError::TokenGenerationExhausted {
            attempts: self.max_attempts,
        })
    }
}
