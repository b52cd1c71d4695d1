use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::Display;

/// The short identifier a long URL is mapped to.
///
/// Slugs compare byte-wise, so `Abc` and `abc` are different slugs.
/// Caller-supplied slugs must be 3-32 characters long and contain only
/// alphanumeric characters, hyphens, or underscores.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(SmolStr);

/// Shortest accepted custom slug.
pub const MIN_LENGTH: usize = 3;
/// Longest accepted custom slug.
pub const MAX_LENGTH: usize = 32;

impl Slug {
    /// Creates a custom `Slug` after validating the input.
    ///
    /// Valid slugs are 3-32 characters and contain only `[a-zA-Z0-9_-]`.
    pub fn new(slug: impl AsRef<str>) -> Result<Self, CoreError> {
        let slug = slug.as_ref();
        Self::validate(slug)?;
        Ok(Self(SmolStr::new(slug)))
    }

    /// Creates a `Slug` without validation.
    ///
    /// Use this for generator output and for lookups, where an unknown
    /// slug simply resolves to nothing.
    pub fn new_unchecked(slug: impl AsRef<str>) -> Self {
        Self(SmolStr::new(slug.as_ref()))
    }

    /// Builds the externally visible short link for this slug.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self)
    }

    /// Returns the slug as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(slug: &str) -> Result<(), CoreError> {
        let length = slug.chars().count();
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&length) {
            return Err(CoreError::InvalidSlug(format!(
                "length must be between {} and {}, got {}",
                MIN_LENGTH, MAX_LENGTH, length
            )));
        }

        if !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidSlug(format!(
                "must contain only alphanumeric characters, hyphens, or underscores: '{}'",
                slug
            )));
        }

        Ok(())
    }
}

impl Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
