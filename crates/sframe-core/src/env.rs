//! Environment abstraction for deterministic testing.
//!
//! Decouples the session state machine from system resources (time,
//! randomness), so production code runs against real clocks and entropy
//! while tests run against a virtual clock and a seeded RNG.

use std::time::Duration;

/// Abstract environment providing time, randomness, and sleep.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards.
/// - `random_bytes()` uses cryptographically secure entropy in production.
/// - Methods are infallible except in exceptional circumstances (e.g. OS
///   entropy exhaustion).
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; deterministic test
    /// environments use a virtual instant that never advances on its own.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// This is the only async method in the trait, used solely by the
    /// rekey-deadline and MLS-timeout driver logic, never by `seal`/`open`.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);
}

/// Production environment backed by the system clock and OS entropy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        use rand::RngCore;
        rand::thread_rng().fill_bytes(buffer);
    }
}
