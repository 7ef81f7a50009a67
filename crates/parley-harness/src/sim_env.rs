//! Simulated environment.
//!
//! Clones share one clock and one random stream, so every component handed a
//! clone observes the same time and draws from the same sequence.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use parley_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Virtual clock start, 2024-01-01T00:00:00Z.
const START_SECS: i64 = 1_704_067_200;

#[derive(Debug)]
struct SimState {
    rng: ChaCha8Rng,
    now: DateTime<Utc>,
}

/// Seeded, manually clocked [`Environment`].
#[derive(Debug, Clone)]
pub struct SimEnv {
    state: Arc<Mutex<SimState>>,
}

impl SimEnv {
    /// Environment seeded with 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment whose random stream is fully determined by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        let state = SimState {
            rng: ChaCha8Rng::seed_from_u64(seed),
            now: DateTime::from_timestamp(START_SECS, 0).unwrap_or_default(),
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the wall clock forward. Saturates instead of overflowing.
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut state = self.state();
        state.now = state.now.checked_add_signed(delta).unwrap_or(state.now);
    }

    /// Set the wall clock.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.state().now = now;
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> DateTime<Utc> {
        self.state().now
    }

    /// Sleeps on the tokio clock. Tests pause it (`start_paused`) so timeouts
    /// elapse instantly.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.state().rng.fill_bytes(buffer);
    }
}
