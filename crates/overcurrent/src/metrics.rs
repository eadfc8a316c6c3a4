//! Per-breaker counters.
//!
//! Metrics are observational only; nothing in the decision engine reads
//! them back.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::state::State;

/// Running totals for one breaker.
#[derive(Debug, Default)]
pub struct BreakerMetrics {
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
    probes: AtomicU64,
    transitions: AtomicU64,
}

impl BreakerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_probe(&self) {
        self.probes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transition(&self, _from: State, _to: State) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    pub fn probes(&self) -> u64 {
        self.probes.load(Ordering::Relaxed)
    }

    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    /// Completed calls, successful or not. Rejections are not calls.
    pub fn total_calls(&self) -> u64 {
        self.successes() + self.failures()
    }

    /// Failure share of completed calls, in percent.
    pub fn failure_rate(&self) -> f64 {
        let total = self.total_calls();
        if total == 0 {
            return 0.0;
        }
        (self.failures() as f64 / total as f64) * 100.0
    }

    /// Point-in-time copy for reporting.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            successes: self.successes(),
            failures: self.failures(),
            rejections: self.rejections(),
            probes: self.probes(),
            transitions: self.transitions(),
            failure_rate: self.failure_rate(),
        }
    }

    pub fn reset(&self) {
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.rejections.store(0, Ordering::Relaxed);
        self.probes.store(0, Ordering::Relaxed);
        self.transitions.store(0, Ordering::Relaxed);
    }
}

/// Serializable view of [`BreakerMetrics`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub successes: u64,
    pub failures: u64,
    pub rejections: u64,
    pub probes: u64,
    pub transitions: u64,
    pub failure_rate: f64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "successes={} failures={} rejections={} probes={} transitions={} failure_rate={:.2}%",
            self.successes,
            self.failures,
            self.rejections,
            self.probes,
            self.transitions,
            self.failure_rate
        )
    }
}
