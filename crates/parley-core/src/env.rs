//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples session logic from system resources
//! (wall clock, randomness, timers). This enables:
//!
//! - Deterministic tests: a simulated environment provides a manually advanced
//!   clock and a seeded RNG, so device ids and timestamps are reproducible.
//!
//! - Production runtime: the system environment uses the real clock and OS
//!   entropy without any change to the session logic.
//!
//! # Invariants
//!
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Abstract environment providing time, randomness, and async primitives.
///
/// Session logic only ever reads the clock and draws random bytes. Sleeping is
/// reserved for driver code that needs to bound a wait.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current wall-clock time.
    ///
    /// Used to stamp locally acknowledged messages when the transport receipt
    /// carries no server timestamp.
    fn now(&self) -> DateTime<Utc>;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be used
    /// by driver code (not session logic).
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Determinism during tests: Given the same RNG seed, this produces the
    ///   same sequence of bytes
    /// - Unpredictability in production: Uses OS entropy
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u128`.
    ///
    /// Used for device identifiers.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }
}
