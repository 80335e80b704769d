use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the uniform sample used by full-jitter backoff. Injectable so
/// property tests can observe the sampled window deterministically
/// (Design Notes, spec.md §9: "Randomness as a dependency").
pub trait JitterSource: Send + Sync {
    /// Sample a uniform integer in the inclusive range `[0, upper]`.
    /// `upper <= 0` always returns 0.
    fn sample_inclusive(&self, upper: i64) -> i64;
}

/// Production jitter source backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn sample_inclusive(&self, upper: i64) -> i64 {
        if upper <= 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..=upper)
    }
}

/// Deterministic jitter source for tests: a seeded RNG behind a lock.
pub struct SeededJitter(Mutex<StdRng>);

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self(Mutex::new(StdRng::seed_from_u64(seed)))
    }
}

impl JitterSource for SeededJitter {
    fn sample_inclusive(&self, upper: i64) -> i64 {
        if upper <= 0 {
            return 0;
        }
        self.0.lock().gen_range(0..=upper)
    }
}
