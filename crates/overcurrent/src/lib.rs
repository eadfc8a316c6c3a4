//! Per-operation circuit breaker.
//!
//! `overcurrent` wraps a fallible unit of work and short-circuits it when
//! recent failure rates say the downstream is unhealthy. Callers name a
//! policy, hand over a future, and the engine decides whether to run it,
//! reject it immediately, or admit it as one of a bounded number of health
//! probes:
//! - a bucketed sliding window estimates the closed-state failure rate;
//! - crossing the threshold opens the breaker for at least a sleep window;
//! - after the sleep window a token-limited pool of probes decides whether
//!   to reclose or re-open.
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                        Breaker                               |
//! |                                                              |
//! |   +---------+   failure rate >= threshold   +--------+       |
//! |   | CLOSED  | ----------------------------> |  OPEN  |       |
//! |   +---------+                               +--------+       |
//! |        ^                                        |            |
//! |        | probes healthy            sleep window |            |
//! |        |                                        v            |
//! |        +------------------ +-----------+ <------+            |
//! |                            | HALF-OPEN |                     |
//! |                            +-----------+                     |
//! |                                  |                           |
//! |                                  | probes unhealthy          |
//! |                                  v                           |
//! |                              re-OPEN                         |
//! +--------------------------------------------------------------+
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use overcurrent::BreakerConfig;
//!
//! // Optional: pin a policy up front. Unregistered names get defaults.
//! BreakerConfig::new("search")
//!     .with_interval(60)
//!     .with_error_percent(50)
//!     .register()?;
//!
//! match overcurrent::execute("search", query_downstream()).await {
//!     Ok(hits) => render(hits),
//!     Err(err) if err.is_open() => render_degraded(),
//!     Err(err) => return Err(err.into_service().unwrap().into()),
//! }
//! ```
//!
//! The breaker holds no lock while the caller's future runs, never retries,
//! and never interprets cancellation: dropping the future before completion
//! records nothing.

pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod registry;
pub mod state;
pub mod window;

pub use clock::{Clock, MonotonicClock};
pub use config::BreakerConfig;
pub use error::{BreakerError, ConfigError};
pub use metrics::{BreakerMetrics, MetricsSnapshot};
pub use probe::ProbePool;
pub use state::{Breaker, Decision, State};
pub use window::SlidingWindow;

use std::future::Future;

/// Run `run` under the breaker registered as `name`.
///
/// The breaker is created with the default policy on first use of the name.
/// Returns the work's value, [`BreakerError::Open`] if the call was
/// rejected, or the work's own error untouched. An empty `name` is refused
/// before any breaker state is touched.
pub async fn execute<F, T, E>(name: &str, run: F) -> Result<T, BreakerError<E>>
where
    F: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    if name.is_empty() {
        return Err(BreakerError::EmptyName);
    }
    registry::breaker(name).execute(run).await
}

/// Like [`execute`], additionally notifying `fallback` with any error the
/// caller is about to receive.
pub async fn execute_with_fallback<F, T, E, N>(
    name: &str,
    run: F,
    fallback: N,
) -> Result<T, BreakerError<E>>
where
    F: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
    N: FnOnce(&BreakerError<E>),
{
    if name.is_empty() {
        return Err(BreakerError::EmptyName);
    }
    registry::breaker(name)
        .execute_with_fallback(run, fallback)
        .await
}
