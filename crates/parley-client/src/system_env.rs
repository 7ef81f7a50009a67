//! Production Environment implementation using system time and RNG.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parley_core::Environment;

/// Production environment using the wall clock and OS randomness.
///
/// - `chrono::Utc::now()` for time
/// - `tokio::time::sleep()` for async sleeping
/// - `getrandom` for randomness
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // Unsupported platform. Zeroes keep the device id well-formed.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}
