use crate::error::Result;
use crate::resolver::SlugResolver;
use async_trait::async_trait;
use slugline_core::{Clock, RecordStore, ShortenedUrl, Slug, StandardNormalizer, UrlNormalizer};
use slugline_generator::Generator;
use std::sync::Arc;
use tracing::debug;
use typed_builder::TypedBuilder;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Boundary configuration of a [`ResolutionService`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceSettings {
    /// Prefix of the externally visible short links.
    #[builder(default = DEFAULT_BASE_URL.to_string(), setter(into))]
    pub base_url: String,
    /// Canonicalize URLs before storing and matching them.
    #[builder(default = true)]
    pub auto_normalize: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Outcome of a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub record: ShortenedUrl,
    /// Absolute short link for the record's slug.
    pub short_url: String,
}

/// The operations offered to the boundary layer.
///
/// Not-found is a regular outcome: `resolve` answers `None` and `expire`
/// answers `false`.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Maps `url` to `custom_slug` if given, else to a generated slug.
    async fn create(&self, url: &str, custom_slug: Option<&str>) -> Result<Created>;

    /// Returns the destination of a live slug.
    async fn resolve(&self, slug: &str) -> Result<Option<String>>;

    /// Retires a live slug.
    async fn expire(&self, slug: &str) -> Result<bool>;
}

/// Public API surface over a [`SlugResolver`].
///
/// Normalizes incoming URLs, validates custom slugs and builds the short
/// link from the configured base URL.
pub struct ResolutionService<S, G, C> {
    resolver: Arc<SlugResolver<S, G, C>>,
    normalizer: Arc<dyn UrlNormalizer>,
    base_url: String,
}

impl<S, G, C> Clone for ResolutionService<S, G, C> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            normalizer: Arc::clone(&self.normalizer),
            base_url: self.base_url.clone(),
        }
    }
}

impl<S: RecordStore, G: Generator, C: Clock> ResolutionService<S, G, C> {
    /// Creates a service using [`StandardNormalizer`] configured from
    /// `settings.auto_normalize`.
    pub fn new(resolver: SlugResolver<S, G, C>, settings: ServiceSettings) -> Self {
        let normalizer = StandardNormalizer::new(settings.auto_normalize);
        Self::with_normalizer(resolver, Arc::new(normalizer), settings)
    }

    pub fn with_normalizer(
        resolver: SlugResolver<S, G, C>,
        normalizer: Arc<dyn UrlNormalizer>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            normalizer,
            base_url: settings.base_url,
        }
    }

    pub fn resolver(&self) -> &SlugResolver<S, G, C> {
        &self.resolver
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl<S: RecordStore, G: Generator, C: Clock> Shortener for ResolutionService<S, G, C> {
    async fn create(&self, url: &str, custom_slug: Option<&str>) -> Result<Created> {
        let url = self.normalizer.normalize(url)?;

        let record = match custom_slug {
            Some(raw) => {
                let slug = Slug::new(raw)?;
                self.resolver.create_custom(&url, &slug).await?
            }
            None => self.resolver.create_dynamic(&url).await?,
        };

        let short_url = record.token.to_url(&self.base_url);
        debug!(slug = %record.token, short_url = %short_url, "created short link");
        Ok(Created { record, short_url })
    }

    async fn resolve(&self, slug: &str) -> Result<Option<String>> {
        if slug.is_empty() {
            return Ok(None);
        }
        let record = self.resolver.resolve(&Slug::new_unchecked(slug)).await?;
        Ok(record.map(|record| record.url))
    }

    async fn expire(&self, slug: &str) -> Result<bool> {
        if slug.is_empty() {
            return Ok(false);
        }
        self.resolver.expire_by_token(&Slug::new_unchecked(slug)).await
    }
}
