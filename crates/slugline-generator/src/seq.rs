use crate::error::SettingsError;
use crate::random::BASE62;
use crate::Generator;
use slugline_core::slug::{MAX_LENGTH, MIN_LENGTH};
use slugline_core::Slug;
use std::sync::atomic::{AtomicU64, Ordering};
use typed_builder::TypedBuilder;

/// Base62 digits needed for `u64::MAX`.
const MAX_DIGITS: usize = 11;

#[derive(Debug, Clone, TypedBuilder)]
pub struct SeqSettings {
    /// Fixed leading part of every slug, e.g. a node name.
    #[builder(default, setter(into))]
    pub prefix: String,
    /// Minimum number of counter digits; shorter counters are zero-padded.
    #[builder(default = 6)]
    pub width: usize,
    /// First counter value handed out.
    #[builder(default = 0)]
    pub start: u64,
}

/// Deterministic slugs: a prefix followed by a base62 counter.
///
/// `sl` with width 6 yields `sl000000`, `sl000001`, ..., `sl00000Z`,
/// `sl000010`. Settings are checked up front so that every slug the
/// generator can ever produce is also a valid custom slug.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
    width: usize,
}

impl SeqGenerator {
    pub fn new(settings: SeqSettings) -> Result<Self, SettingsError> {
        let SeqSettings {
            prefix,
            width,
            start,
        } = settings;

        if !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(SettingsError::Prefix(prefix));
        }

        let shortest = prefix.len() + width;
        let longest = prefix.len() + width.max(MAX_DIGITS);
        if width == 0 || shortest < MIN_LENGTH || longest > MAX_LENGTH {
            return Err(SettingsError::Width {
                prefix,
                width,
                min: MIN_LENGTH,
                max: MAX_LENGTH,
            });
        }

        Ok(Self {
            counter: AtomicU64::new(start),
            prefix,
            width,
        })
    }

    /// Default width and start with the given prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Result<Self, SettingsError> {
        Self::new(SeqSettings::builder().prefix(prefix).build())
    }

    /// The counter value the next slug will carry.
    pub fn next_value(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Generator for SeqGenerator {
    type Output = Slug;

    fn generate(&self) -> Slug {
        let value = self.counter.fetch_add(1, Ordering::Relaxed);
        let digits = encode_base62(value);

        let mut slug = String::with_capacity(self.prefix.len() + self.width.max(digits.len()));
        slug.push_str(&self.prefix);
        slug.extend(std::iter::repeat('0').take(self.width.saturating_sub(digits.len())));
        slug.push_str(&digits);
        Slug::new_unchecked(slug)
    }
}

fn encode_base62(mut value: u64) -> String {
    let alphabet = BASE62.as_bytes();
    let mut digits = Vec::with_capacity(MAX_DIGITS);
    loop {
        digits.push(alphabet[(value % 62) as usize]);
        value /= 62;
        if value == 0 {
            break;
        }
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}
