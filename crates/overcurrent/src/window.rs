//! Bucketed sliding-window request/failure counter.
//!
//! The window divides its interval into [`BUCKET_COUNT`](crate::config::BUCKET_COUNT)
//! ring buckets and keeps two parallel rings, one for requests and one for
//! failures. Updates are O(1); reading the error percentage walks the ring
//! once and skips buckets whose stamp has fallen out of the interval.
//!
//! The estimate is advisory: increments from concurrent callers are
//! serialized by a single short-lived mutex, but a read interleaving with a
//! failure record may observe the request ring one count ahead of the
//! failure ring. That skews the percentage by at most one sample.

use parking_lot::Mutex;

use crate::config::{BUCKET_COUNT, MIN_SAMPLES_CLOSED};

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    val: u32,
    /// Second this bucket was last reset to.
    stamp: u64,
}

#[derive(Debug)]
struct Ring {
    reqs: [Bucket; BUCKET_COUNT],
    fails: [Bucket; BUCKET_COUNT],
    /// Second the current pass over the ring started.
    epoch: u64,
}

/// Rolling request/failure counter over a fixed interval.
#[derive(Debug)]
pub struct SlidingWindow {
    interval: u64,
    span: u64,
    ring: Mutex<Ring>,
}

impl SlidingWindow {
    /// `interval` must be a positive multiple of [`BUCKET_COUNT`]; the
    /// configuration layer guarantees this before a window is built.
    pub fn new(interval: u64) -> Self {
        debug_assert!(interval > 0 && interval % BUCKET_COUNT as u64 == 0);
        Self {
            interval,
            span: interval / BUCKET_COUNT as u64,
            ring: Mutex::new(Ring {
                reqs: [Bucket::default(); BUCKET_COUNT],
                fails: [Bucket::default(); BUCKET_COUNT],
                epoch: 0,
            }),
        }
    }

    /// Record one request at `now`, counting it as a failure unless `success`.
    pub fn record_at(&self, now: u64, success: bool) {
        let mut ring = self.ring.lock();

        let mut diff = now.saturating_sub(ring.epoch);
        if diff >= self.interval {
            ring.epoch = now;
            diff = 0;
        }
        let loc = (diff / self.span) as usize;

        bump(&mut ring.reqs[loc], now, self.interval);
        if !success {
            bump(&mut ring.fails[loc], now, self.interval);
        }
    }

    /// Failure percentage over the live buckets, half-up rounded.
    ///
    /// Returns `None` while fewer than
    /// [`MIN_SAMPLES_CLOSED`](crate::config::MIN_SAMPLES_CLOSED) requests are
    /// in the window; below that floor the estimate is too noisy to act on.
    pub fn error_percent_at(&self, now: u64) -> Option<u32> {
        let ring = self.ring.lock();
        let cutoff = now.checked_sub(self.interval);

        let reqs: u64 = live_total(&ring.reqs, cutoff);
        if reqs < u64::from(MIN_SAMPLES_CLOSED) {
            return None;
        }
        let fails: u64 = live_total(&ring.fails, cutoff);
        Some(((100 * fails + reqs / 2) / reqs) as u32)
    }

    /// Total live requests and failures, mostly for observability.
    pub fn totals_at(&self, now: u64) -> (u64, u64) {
        let ring = self.ring.lock();
        let cutoff = now.checked_sub(self.interval);
        (live_total(&ring.reqs, cutoff), live_total(&ring.fails, cutoff))
    }

    /// Drop all history and restart the window at `now`.
    pub fn clear_at(&self, now: u64) {
        let mut ring = self.ring.lock();
        ring.reqs = [Bucket::default(); BUCKET_COUNT];
        ring.fails = [Bucket::default(); BUCKET_COUNT];
        ring.epoch = now;
    }
}

fn bump(bucket: &mut Bucket, now: u64, interval: u64) {
    // An untouched bucket or a stale slice from a previous pass over the ring
    // restarts at this second.
    if bucket.val == 0 || now.saturating_sub(bucket.stamp) >= interval {
        bucket.val = 1;
        bucket.stamp = now;
    } else {
        bucket.val += 1;
    }
}

// `cutoff` is `None` while less than one full interval has elapsed, in which
// case nothing can be stale yet and every bucket counts.
fn live_total(buckets: &[Bucket; BUCKET_COUNT], cutoff: Option<u64>) -> u64 {
    buckets
        .iter()
        .filter(|b| cutoff.is_none_or(|c| b.stamp > c))
        .map(|b| u64::from(b.val))
        .sum()
}
