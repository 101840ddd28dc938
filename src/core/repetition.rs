/// Repetition policy — decides whether the next scene immediately repeats
/// the current base element, before any transition prediction happens.

use rand::Rng;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct RepetitionPolicy {
    probabilities: FxHashMap<String, f64>,
}

impl RepetitionPolicy {
    pub fn new(probabilities: FxHashMap<String, f64>) -> Self {
        Self { probabilities }
    }

    /// Repeat probability of a base element, 0.0 when never observed.
    pub fn probability(&self, base: &str) -> f64 {
        self.probabilities.get(base).copied().unwrap_or(0.0)
    }

    /// Draw u in [0, 1) and repeat when u is below the element's probability.
    pub fn should_repeat<R: Rng + ?Sized>(&self, base: &str, rng: &mut R) -> bool {
        let draw: f64 = rng.gen();
        draw < self.probability(base)
    }
}
