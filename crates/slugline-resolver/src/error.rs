use slugline_core::{CoreError, Slug, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolverError>;

#[derive(Debug, Clone, Error)]
pub enum ResolverError {
    /// The custom slug is live and mapped to a different URL.
    #[error("Slug already taken.")]
    SlugTaken { slug: Slug },
    #[error("no free slug found after {attempts} attempts")]
    TokenGenerationExhausted { attempts: usize },
    /// Concurrent writers kept invalidating the decision for this slug.
    #[error("slug {slug} is contended by concurrent writers")]
    Contended { slug: Slug },
    #[error("invalid slug: {0}")]
    InvalidSlug(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("storage error: {0}")]
    Storage(
        #[from]
        #[source]
        StorageError,
    ),
}

impl ResolverError {
    /// Whether the caller can fix the request and try again.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ResolverError::SlugTaken { .. }
                | ResolverError::InvalidSlug(_)
                | ResolverError::InvalidUrl(_)
        )
    }

    /// HTTP status the boundary layer answers with.
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            422
        } else {
            500
        }
    }
}

impl From<CoreError> for ResolverError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidSlug(message) => Self::InvalidSlug(message),
            CoreError::InvalidUrl(message) => Self::InvalidUrl(message),
        }
    }
}
