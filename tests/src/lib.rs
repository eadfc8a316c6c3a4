//! Testing utilities for the overcurrent breaker.
//!
//! Provides a hand-driven clock and a scripted downstream so scenarios can
//! cross sleep windows and bucket boundaries without wall-clock sleeps.

use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use overcurrent::Clock;

/// Install a compact subscriber once so breaker transition logs show up
/// when a scenario runs with `RUST_LOG=overcurrent=debug`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .try_init();
    });
}

/// Clock that only moves when a test tells it to.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Jump to an absolute second.
    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}

/// Error produced by a scripted downstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("downstream unavailable")]
pub struct Unavailable;

/// Downstream stand-in that counts how often it was actually invoked.
///
/// The count only moves when a call body runs, so it distinguishes calls
/// the breaker admitted from calls it rejected.
#[derive(Debug, Default)]
pub struct FlakyService {
    calls: AtomicUsize,
}

impl FlakyService {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// How many calls the breaker let through.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn call(&self, succeed: bool) -> Result<(), Unavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if succeed { Ok(()) } else { Err(Unavailable) }
    }

    pub async fn ok(&self) -> Result<(), Unavailable> {
        self.call(true).await
    }

    pub async fn fail(&self) -> Result<(), Unavailable> {
        self.call(false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_on_request() {
        let clock = ManualClock::arc();
        assert_eq!(clock.now_secs(), 0);
        clock.advance(65);
        assert_eq!(clock.now_secs(), 65);
        clock.set(10);
        assert_eq!(clock.now_secs(), 10);
    }

    #[tokio::test]
    async fn flaky_service_counts_invocations() {
        let service = FlakyService::arc();
        assert!(service.ok().await.is_ok());
        assert_eq!(service.fail().await, Err(Unavailable));
        assert_eq!(service.calls(), 2);
    }
}
