use thiserror::Error;

/// Rejected generator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("alphabet must contain at least two distinct characters")]
    Alphabet,
    #[error("slug length must be at least 1")]
    Length,
    #[error("prefix may only contain alphanumeric characters, hyphens, or underscores: '{0}'")]
    Prefix(String),
    #[error("prefix '{prefix}' with width {width} cannot yield slugs of {min}-{max} characters")]
    Width {
        prefix: String,
        width: usize,
        min: usize,
        max: usize,
    },
}
