//! Breaker policy configuration.
//!
//! A [`BreakerConfig`] names a policy and carries the knobs of the decision
//! engine. Values are validated and floored when the config is turned into a
//! breaker, either directly through [`Breaker::new`](crate::Breaker::new) or
//! by registering it under its name with [`BreakerConfig::register`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::registry;
use crate::state::Breaker;

/// Number of ring buckets each sliding window is divided into.
pub const BUCKET_COUNT: usize = 20;

/// Windowed requests required before the closed-state estimator may trip.
pub const MIN_SAMPLES_CLOSED: u32 = 10;

/// Default sliding-window length in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Default minimum open duration in seconds.
pub const DEFAULT_SLEEP_WINDOW_SECS: u64 = 65;

/// Default number of probes a half-open episode admits.
pub const DEFAULT_PROBE_MAX: u32 = 20;

/// Default failure-percentage threshold for both trip decisions.
pub const DEFAULT_ERROR_PERCENT: u32 = 50;

/// Policy for one named breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Registry key. Must not be empty.
    pub name: String,
    /// Length of the sliding window in seconds. Must be a positive multiple
    /// of [`BUCKET_COUNT`].
    pub interval_secs: u64,
    /// Minimum time spent open before a probe is allowed. Floored to
    /// `interval_secs`.
    pub sleep_window_secs: u64,
    /// Probes a half-open episode admits before re-deciding. Floored to
    /// [`DEFAULT_PROBE_MAX`].
    pub probe_max: u32,
    /// Closed-state failure percentage (1..=100) that opens the breaker.
    pub error_percent_closed: u32,
    /// Half-open failure percentage (1..=100) that re-opens the breaker.
    pub error_percent_half_open: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            sleep_window_secs: DEFAULT_SLEEP_WINDOW_SECS,
            probe_max: DEFAULT_PROBE_MAX,
            error_percent_closed: DEFAULT_ERROR_PERCENT,
            error_percent_half_open: DEFAULT_ERROR_PERCENT,
        }
    }
}

impl BreakerConfig {
    /// Start a config for the given policy name with default knobs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the sliding-window length in seconds.
    pub fn with_interval(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    /// Set the minimum open duration in seconds.
    pub fn with_sleep_window(mut self, secs: u64) -> Self {
        self.sleep_window_secs = secs;
        self
    }

    /// Set the number of probes admitted per half-open episode.
    pub fn with_probe_max(mut self, probes: u32) -> Self {
        self.probe_max = probes;
        self
    }

    /// Set the closed-state trip threshold in percent.
    pub fn with_error_percent(mut self, percent: u32) -> Self {
        self.error_percent_closed = percent;
        self
    }

    /// Set the half-open re-trip threshold in percent.
    pub fn with_probe_error_percent(mut self, percent: u32) -> Self {
        self.error_percent_half_open = percent;
        self
    }

    /// Validate hard constraints and apply floors, yielding a config a
    /// breaker can be built from.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.interval_secs == 0 || self.interval_secs % BUCKET_COUNT as u64 != 0 {
            return Err(ConfigError::UnevenInterval(self.interval_secs));
        }
        for percent in [self.error_percent_closed, self.error_percent_half_open] {
            if !(1..=100).contains(&percent) {
                return Err(ConfigError::ThresholdOutOfRange(percent));
            }
        }
        self.sleep_window_secs = self.sleep_window_secs.max(self.interval_secs);
        self.probe_max = self.probe_max.max(DEFAULT_PROBE_MAX);
        Ok(self)
    }

    /// Register the named breaker, creating it if absent.
    ///
    /// Returns the already-registered instance when the name is taken; the
    /// registry never replaces a live breaker.
    pub fn register(self) -> Result<Arc<Breaker>, ConfigError> {
        registry::register(self)
    }
}
