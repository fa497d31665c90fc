//! Simulated environment.

use std::{
    future::Future,
    ops::Range,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use latchkey_core::Environment;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Environment on turmoil's virtual clock with a seeded RNG.
///
/// Time comes from `tokio::time`, which turmoil drives, so sleeping in a
/// simulated host costs no wall-clock time. Clones share the RNG stream.
#[derive(Debug, Clone)]
pub struct SimEnv {
    seed: u64,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Environment seeded with zero.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment with a specific RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed, rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))) }
    }

    /// Seed this environment was built with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw a value from `range`. Returns `range.start` if the RNG lock is
    /// poisoned or the range is empty.
    pub fn gen_range(&self, range: Range<u64>) -> u64 {
        if range.is_empty() {
            return range.start;
        }
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(range),
            Err(_) => range.start,
        }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_draws() {
        let a = SimEnv::with_seed(7);
        let b = SimEnv::with_seed(7);
        let draws_a: Vec<_> = (0..16).map(|_| a.gen_range(0..1000)).collect();
        let draws_b: Vec<_> = (0..16).map(|_| b.gen_range(0..1000)).collect();
        assert_eq!(draws_a, draws_b);
    }

    #[test]
    fn clones_share_the_stream() {
        let env = SimEnv::with_seed(1);
        let fresh = SimEnv::with_seed(1);
        let first = env.clone().gen_range(0..u64::MAX);
        assert_eq!(first, fresh.gen_range(0..u64::MAX));
        assert_eq!(env.gen_range(0..u64::MAX), fresh.gen_range(0..u64::MAX));
    }

    #[test]
    fn empty_range_yields_start() {
        assert_eq!(SimEnv::new().gen_range(5..5), 5);
    }
}
