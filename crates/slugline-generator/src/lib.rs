pub mod error;
pub mod random;
pub mod seq;

pub use error::SettingsError;
pub use random::{GeneratorSettings, RandomGenerator};
pub use seq::{SeqGenerator, SeqSettings};

use slugline_core::Slug;

/// Trait for producing slug candidates.
///
/// Implementations are pure generators that don't interact with storage.
/// Whether a candidate is free is decided by the caller against the
/// record store.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<Slug>;
    /// Produces the next slug candidate.
    fn generate(&self) -> Self::Output;
}

impl<G: Generator> Generator for std::sync::Arc<G> {
    type Output = G::Output;

    fn generate(&self) -> Self::Output {
        (**self).generate()
    }
}
