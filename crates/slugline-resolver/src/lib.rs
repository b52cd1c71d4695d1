//! Slug lifecycle engine.
//!
//! [`SlugResolver`] decides, for every create request, whether to reactivate
//! an expired mapping, reuse a live one, issue a new slug, or reject the
//! request. [`ResolutionService`] wraps it with URL normalization and short
//! link construction for the boundary layer.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use slugline_generator::RandomGenerator;
//! use slugline_resolver::{
//!     ResolutionService, ServiceSettings, Shortener, SlugResolver, TokenGenerator, TokenSettings,
//! };
//! use slugline_storage::InMemoryRepository;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tokens = TokenGenerator::new(RandomGenerator::default(), TokenSettings::default());
//! let resolver = SlugResolver::new(Arc::new(InMemoryRepository::new()), tokens);
//! let service = ResolutionService::new(resolver, ServiceSettings::default());
//!
//! let created = service.create("https://example.com", None).await?;
//! assert_eq!(
//!     service.resolve(created.record.token.as_str()).await?,
//!     Some("https://example.com/".to_string())
//! );
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod resolver;
pub mod service;
pub mod token;

pub use error::{ResolverError, Result};
pub use resolver::{SlugResolver, MAX_DECISION_ROUNDS};
pub use service::{Created, ResolutionService, ServiceSettings, Shortener};
pub use token::{TokenGenerator, TokenSettings};
