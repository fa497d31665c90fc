//! Environment abstraction for deterministic testing.
//!
//! Node drivers never call the system clock or sleep directly. They go through
//! [`Environment`], so the same driver runs on the tokio clock in production,
//! on tokio's paused clock in unit tests, and on turmoil's virtual clock in
//! simulation.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Isolation: implementations must not share global state

use std::{
    future::Future,
    time::{Duration, Instant},
};

/// Abstract environment providing time and async sleeping.
///
/// Protocol state machines never touch this trait; only drivers and the
/// blocking helpers in [`crate::wait`] and [`crate::credential`] do.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time. Never decreases.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Production environment backed by the tokio clock.
///
/// Uses `tokio::time` rather than `std::time` so that paused-clock tests
/// (`#[tokio::test(start_paused = true)]`) drive it deterministically.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a system environment.
    pub const fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_advances_paused_clock() {
        let env = SystemEnv::new();
        let before = env.now();
        env.sleep(Duration::from_millis(20)).await;
        assert!(env.now().duration_since(before) >= Duration::from_millis(20));
    }
}
