//! Time source for breaker decisions.
//!
//! All breaker arithmetic runs on whole seconds from a monotonic origin, so
//! the engine is immune to wall-clock adjustments. Tests substitute their own
//! [`Clock`] to drive the sleep window and bucket expiry deterministically.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;

/// Source of the current time in whole seconds.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Seconds elapsed since the clock's origin.
    fn now_secs(&self) -> u64;
}

/// Default clock, anchored to a process-wide [`Instant`].
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_secs(&self) -> u64 {
        self.origin.elapsed().as_secs()
    }
}

static SHARED: Lazy<Arc<MonotonicClock>> = Lazy::new(|| Arc::new(MonotonicClock::new()));

/// The process-wide monotonic clock used by registry-created breakers.
pub(crate) fn shared() -> Arc<dyn Clock> {
    SHARED.clone() as Arc<dyn Clock>
}
