//! Error types surfaced by the breaker.

use thiserror::Error;

/// Rejected configuration. Returned before any breaker state is touched.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("breaker name must not be empty")]
    EmptyName,

    #[error("interval of {0}s must be a positive multiple of 20")]
    UnevenInterval(u64),

    #[error("error percent threshold {0} is outside 1..=100")]
    ThresholdOutOfRange(u32),
}

/// Outcome of a guarded call that did not succeed.
///
/// Downstream errors pass through unchanged as [`BreakerError::Service`];
/// the breaker never swallows or rewraps what the work returned.
#[derive(Debug, Error)]
pub enum BreakerError<E>
where
    E: std::error::Error + 'static,
{
    /// The breaker refused to invoke the work.
    #[error("breaker '{0}' is open")]
    Open(String),

    /// The policy name passed to the entry point was empty.
    #[error("breaker name must not be empty")]
    EmptyName,

    /// The work ran and failed; the inner error is untouched.
    #[error(transparent)]
    Service(E),
}

impl<E> BreakerError<E>
where
    E: std::error::Error + 'static,
{
    /// True when the breaker rejected the call without running the work.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open(_))
    }

    /// The downstream error, if the work ran and failed.
    pub fn into_service(self) -> Option<E> {
        match self {
            BreakerError::Service(err) => Some(err),
            _ => None,
        }
    }
}
