//! Breaker state machine.
//!
//! A [`Breaker`] owns the state variable and everything that feeds it: the
//! sliding window behind the closed-state failure estimate, the token pool
//! bounding half-open probes, and the per-episode probe counters.
//!
//! ```text
//!            failure rate over window >= threshold
//!   CLOSED ------------------------------------------> OPEN
//!      ^                                                |
//!      | probes healthy                                 | sleep window
//!      |                                                v
//!      +----------------- HALF-OPEN <------------------+
//!                             |
//!                             | probes unhealthy
//!                             v
//!                           OPEN
//! ```
//!
//! All transitions are compare-and-swap on a single atomic; losers observe
//! the new state and fall in line. No lock is held while the caller's work
//! runs: the engine decides, the future executes, the outcome is recorded.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::clock::{self, Clock};
use crate::config::BreakerConfig;
use crate::error::{BreakerError, ConfigError};
use crate::metrics::BreakerMetrics;
use crate::probe::ProbePool;
use crate::window::SlidingWindow;

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    /// Passing calls through and learning from outcomes.
    Closed,
    /// Rejecting calls until the sleep window elapses.
    Open,
    /// Admitting a bounded number of probes to decide whether to reclose.
    HalfOpen,
}

impl State {
    const fn as_u8(self) -> u8 {
        match self {
            State::Closed => 0,
            State::Open => 1,
            State::HalfOpen => 2,
        }
    }
}

impl From<u8> for State {
    fn from(value: u8) -> Self {
        match value {
            1 => State::Open,
            2 => State::HalfOpen,
            _ => State::Closed,
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Closed => write!(f, "closed"),
            State::Open => write!(f, "open"),
            State::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// What the breaker decided to do with one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run the work and feed the outcome into the window.
    Pass,
    /// Refuse without running the work.
    Reject,
    /// Run the work as a health probe, subject to a token.
    Probe,
}

/// Per-operation circuit breaker.
pub struct Breaker {
    config: BreakerConfig,
    state: AtomicU8,
    /// Second at which the current open period ends. Only meaningful while
    /// open; a transiently stale read biases one admission at most.
    open_until: AtomicU64,
    window: SlidingWindow,
    probes: ProbePool,
    probe_reqs: AtomicU32,
    probe_fails: AtomicU32,
    metrics: BreakerMetrics,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Breaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Breaker")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Breaker {
    /// Build a standalone breaker from `config`.
    ///
    /// Breakers meant to be shared by name should instead go through
    /// [`BreakerConfig::register`].
    pub fn new(config: BreakerConfig) -> Result<Arc<Self>, ConfigError> {
        Self::with_clock(config, clock::shared())
    }

    /// Build a breaker on a caller-supplied clock.
    pub fn with_clock(
        config: BreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>, ConfigError> {
        Ok(Self::build(config.validated()?, clock))
    }

    /// `config` must already be validated.
    pub(crate) fn build(config: BreakerConfig, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(State::Closed.as_u8()),
            open_until: AtomicU64::new(0),
            window: SlidingWindow::new(config.interval_secs),
            probes: ProbePool::drained(config.probe_max),
            probe_reqs: AtomicU32::new(0),
            probe_fails: AtomicU32::new(0),
            metrics: BreakerMetrics::new(),
            clock,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &BreakerMetrics {
        &self.metrics
    }

    pub fn state(&self) -> State {
        State::from(self.state.load(Ordering::SeqCst))
    }

    /// What the breaker would do with a call arriving now.
    pub fn decide(&self) -> Decision {
        self.decide_at(self.clock.now_secs())
    }

    /// Pure admission query at an explicit second.
    pub fn decide_at(&self, now: u64) -> Decision {
        match self.state() {
            State::Closed => Decision::Pass,
            State::Open => {
                if now < self.open_until.load(Ordering::SeqCst) {
                    Decision::Reject
                } else {
                    Decision::Probe
                }
            }
            State::HalfOpen => Decision::Probe,
        }
    }

    /// Run `run` under this breaker's policy.
    ///
    /// Returns the work's value on success, [`BreakerError::Open`] when the
    /// call was refused, or the work's error untouched. No breaker lock is
    /// held while the future runs.
    pub async fn execute<F, T, E>(&self, run: F) -> Result<T, BreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        self.guard(run, None::<fn(&BreakerError<E>)>).await
    }

    /// Like [`Breaker::execute`], additionally notifying `fallback` with any
    /// error the caller is about to receive. The fallback runs synchronously
    /// on the calling task; panics from it are not caught.
    pub async fn execute_with_fallback<F, T, E, N>(
        &self,
        run: F,
        fallback: N,
    ) -> Result<T, BreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
        N: FnOnce(&BreakerError<E>),
    {
        self.guard(run, Some(fallback)).await
    }

    async fn guard<F, T, E, N>(&self, run: F, fallback: Option<N>) -> Result<T, BreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
        N: FnOnce(&BreakerError<E>),
    {
        let now = self.clock.now_secs();
        match self.decide_at(now) {
            Decision::Reject => Err(self.reject(fallback)),
            Decision::Pass => match run.await {
                Ok(value) => {
                    self.on_pass_complete(self.clock.now_secs(), true);
                    Ok(value)
                }
                Err(cause) => {
                    self.on_pass_complete(self.clock.now_secs(), false);
                    Err(notify(fallback, BreakerError::Service(cause)))
                }
            },
            Decision::Probe => {
                if !self.try_probe_at(now) {
                    return Err(self.reject(fallback));
                }
                match run.await {
                    Ok(value) => {
                        self.on_probe_complete(self.clock.now_secs(), true);
                        Ok(value)
                    }
                    Err(cause) => {
                        self.on_probe_complete(self.clock.now_secs(), false);
                        Err(notify(fallback, BreakerError::Service(cause)))
                    }
                }
            }
        }
    }

    fn reject<E, N>(&self, fallback: Option<N>) -> BreakerError<E>
    where
        E: std::error::Error + 'static,
        N: FnOnce(&BreakerError<E>),
    {
        self.metrics.record_rejection();
        notify(fallback, BreakerError::Open(self.config.name.clone()))
    }

    /// Claim an admission for a probe at `now`.
    ///
    /// The pool is kept drained between episodes, so the caller that wins
    /// the open-to-half-open swap zeroes the episode counters and only then
    /// refills the pool: a token can never be drawn before the counters it
    /// will be recorded against are reset. From half-open, admission is one
    /// token. If the episode already ended and the breaker reclosed, the
    /// call is simply admitted.
    pub(crate) fn try_probe_at(&self, now: u64) -> bool {
        match self.state() {
            State::Open => {
                if now < self.open_until.load(Ordering::SeqCst) {
                    return false;
                }
                if self.transition(State::Open, State::HalfOpen) {
                    self.probe_reqs.store(0, Ordering::SeqCst);
                    self.probe_fails.store(0, Ordering::SeqCst);
                    self.probes.refill();
                }
                self.probes.try_acquire()
            }
            State::HalfOpen => self.probes.try_acquire(),
            State::Closed => true,
        }
    }

    /// Outcome of a call admitted while closed.
    pub(crate) fn on_pass_complete(&self, now: u64, success: bool) {
        if success {
            self.metrics.record_success();
        } else {
            self.metrics.record_failure();
        }
        self.window.record_at(now, success);
        if success || self.state() != State::Closed {
            return;
        }
        if let Some(percent) = self.window.error_percent_at(now) {
            if percent >= self.config.error_percent_closed {
                self.open_until
                    .store(now + self.config.sleep_window_secs, Ordering::SeqCst);
                self.transition(State::Closed, State::Open);
            }
        }
    }

    /// Outcome of an admitted probe. Once the episode has seen `probe_max`
    /// probes, exactly one completion wins the re-decision.
    pub(crate) fn on_probe_complete(&self, now: u64, success: bool) {
        self.metrics.record_probe();
        let reqs = self.probe_reqs.fetch_add(1, Ordering::SeqCst) + 1;
        let fails = if success {
            self.metrics.record_success();
            self.probe_fails.load(Ordering::SeqCst)
        } else {
            self.metrics.record_failure();
            self.probe_fails.fetch_add(1, Ordering::SeqCst) + 1
        };

        if reqs < self.config.probe_max {
            return;
        }

        let percent = ((100 * u64::from(fails) + u64::from(reqs) / 2) / u64::from(reqs)) as u32;
        if percent >= self.config.error_percent_half_open {
            self.open_until
                .store(now + self.config.sleep_window_secs, Ordering::SeqCst);
            self.transition(State::HalfOpen, State::Open);
        } else if self.transition(State::HalfOpen, State::Closed) {
            self.window.clear_at(now);
        }
    }

    fn transition(&self, from: State, to: State) -> bool {
        let swapped = self
            .state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if swapped {
            self.metrics.record_transition(from, to);
            match to {
                State::Open => {
                    tracing::warn!(name = %self.config.name, from = %from, to = %to, "breaker opened")
                }
                State::HalfOpen => {
                    tracing::info!(name = %self.config.name, from = %from, to = %to, "breaker probing downstream")
                }
                State::Closed => {
                    tracing::info!(name = %self.config.name, from = %from, to = %to, "breaker closed")
                }
            }
        }
        swapped
    }
}

fn notify<E, N>(fallback: Option<N>, err: BreakerError<E>) -> BreakerError<E>
where
    E: std::error::Error + 'static,
    N: FnOnce(&BreakerError<E>),
{
    if let Some(callback) = fallback {
        callback(&err);
    }
    err
}
