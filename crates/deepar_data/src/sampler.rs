//! Orders in which a loader visits window indices.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use deepar_core::Seed;

/// Produces the index order for one pass over a dataset.
pub trait Sampler {
    /// Indices `0..n` in visiting order.
    fn sample(&mut self, n: usize) -> Vec<usize>;
}

/// Visits windows in index order.
#[derive(Debug, Clone, Default)]
pub struct SequentialSampler;

impl Sampler for SequentialSampler {
    fn sample(&mut self, n: usize) -> Vec<usize> {
        (0..n).collect()
    }
}

/// Visits windows in a seeded random order.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: ChaCha8Rng,
}

impl RandomSampler {
    /// Create a sampler whose permutations depend only on `seed`.
    #[must_use]
    pub fn new(seed: Seed) -> Self {
        Self { rng: seed.to_rng() }
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, n: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut self.rng);
        indices
    }
}
