use formyard_application::RandomSource;
use rand::Rng;
use rand::seq::index;

/// Random source backed by the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandomSource;

impl ThreadRandomSource {
    /// Creates a random source.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RandomSource for ThreadRandomSource {
    fn index_below(&self, upper: u64) -> u64 {
        rand::thread_rng().gen_range(0..upper.max(1))
    }

    fn sample_indices(&self, length: usize, amount: usize) -> Vec<usize> {
        index::sample(&mut rand::thread_rng(), length, amount.min(length)).into_vec()
    }
}
