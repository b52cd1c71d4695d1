use crate::error::SettingsError;
use crate::Generator;
use rand::Rng;
use slugline_core::Slug;
use typed_builder::TypedBuilder;

/// URL-safe base62 alphabet.
pub const BASE62: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 62^7 is about 3.5e12, so collisions stay negligible well past
/// millions of stored slugs.
pub const DEFAULT_LENGTH: usize = 7;

/// Configures a [`RandomGenerator`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct GeneratorSettings {
    #[builder(default = BASE62.to_string(), setter(into))]
    pub alphabet: String,
    #[builder(default = DEFAULT_LENGTH)]
    pub length: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Draws every character of a slug uniformly from the alphabet.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    alphabet: Vec<char>,
    length: usize,
}

impl RandomGenerator {
    pub fn new(settings: GeneratorSettings) -> Result<Self, SettingsError> {
        let mut alphabet: Vec<char> = settings.alphabet.chars().collect();
        alphabet.sort_unstable();
        alphabet.dedup();

        if alphabet.len() < 2 {
            return Err(SettingsError::Alphabet);
        }
        if settings.length == 0 {
            return Err(SettingsError::Length);
        }

        Ok(Self {
            alphabet,
            length: settings.length,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self {
            alphabet: BASE62.chars().collect(),
            length: DEFAULT_LENGTH,
        }
    }
}

impl Generator for RandomGenerator {
    type Output = Slug;

    fn generate(&self) -> Slug {
        let mut rng = rand::rng();
        let slug: String = (0..self.length)
            .map(|_| self.alphabet[rng.random_range(0..self.alphabet.len())])
            .collect();
        Slug::new_unchecked(slug)
    }
}
