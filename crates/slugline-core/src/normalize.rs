use crate::error::CoreError;
use url::Url;

/// Canonicalizes destination URLs before they are stored or looked up.
///
/// Implementations must be idempotent: normalizing an already normalized
/// URL returns it unchanged.
pub trait UrlNormalizer: Send + Sync + 'static {
    fn normalize(&self, raw: &str) -> Result<String, CoreError>;
}

/// The default normalizer.
///
/// With `auto_clean` set, the URL is parsed and re-serialized in canonical
/// form: scheme and host are lower-cased and an empty path becomes `/`.
/// Without it, the input is only trimmed.
#[derive(Debug, Clone, Copy)]
pub struct StandardNormalizer {
    auto_clean: bool,
}

impl StandardNormalizer {
    pub fn new(auto_clean: bool) -> Self {
        Self { auto_clean }
    }

    pub fn auto_clean(&self) -> bool {
        self.auto_clean
    }
}

impl Default for StandardNormalizer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl UrlNormalizer for StandardNormalizer {
    fn normalize(&self, raw: &str) -> Result<String, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidUrl("URL cannot be empty".to_string()));
        }

        if !self.auto_clean {
            return Ok(trimmed.to_string());
        }

        let parsed = Url::parse(trimmed)
            .map_err(|e| CoreError::InvalidUrl(format!("{}: {}", trimmed, e)))?;
        Ok(parsed.into())
    }
}
