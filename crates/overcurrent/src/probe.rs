//! Token pool bounding the probes of one half-open episode.
//!
//! Tokens are never released one at a time; the pool is drained probe by
//! probe and bulk-refilled on a state change. That ties the probe budget to
//! a single half-open episode regardless of how the probes interleave.

use std::sync::atomic::{AtomicU32, Ordering};

/// Fixed-capacity, non-blocking token pool.
#[derive(Debug)]
pub struct ProbePool {
    capacity: u32,
    available: AtomicU32,
}

impl ProbePool {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            available: AtomicU32::new(capacity),
        }
    }

    /// A pool with no tokens until the first [`refill`](Self::refill).
    ///
    /// The breaker starts its pool this way: tokens only become visible
    /// after the episode counters they are recorded against were zeroed.
    pub(crate) fn drained(capacity: u32) -> Self {
        Self {
            capacity,
            available: AtomicU32::new(0),
        }
    }

    /// Take one token. Returns `false` once the pool is empty.
    pub fn try_acquire(&self) -> bool {
        let mut current = self.available.load(Ordering::SeqCst);
        loop {
            if current == 0 {
                return false;
            }
            match self.available.compare_exchange(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Restore the pool to full capacity. Idempotent when already full.
    pub fn refill(&self) {
        self.available.store(self.capacity, Ordering::SeqCst);
    }

    pub fn available(&self) -> u32 {
        self.available.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}
