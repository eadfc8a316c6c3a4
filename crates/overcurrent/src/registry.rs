//! Process-global breaker registry.
//!
//! One breaker per policy name for the lifetime of the process. Lookups take
//! the shared lock; a first-time insert re-checks under the exclusive lock
//! so concurrent callers racing on a new name construct exactly one breaker.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::clock;
use crate::config::BreakerConfig;
use crate::error::ConfigError;
use crate::state::Breaker;

static REGISTRY: Lazy<RwLock<HashMap<String, Arc<Breaker>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// The breaker registered under `name`, created with the default policy if
/// this is the first time the name is seen. `name` must not be empty; the
/// entry points check that before calling in.
pub fn breaker(name: &str) -> Arc<Breaker> {
    if let Some(found) = REGISTRY.read().get(name) {
        return Arc::clone(found);
    }

    let mut map = REGISTRY.write();
    if let Some(found) = map.get(name) {
        return Arc::clone(found);
    }
    let created = Breaker::build(BreakerConfig::new(name), clock::shared());
    tracing::info!(name, "created breaker with default policy");
    map.insert(name.to_string(), Arc::clone(&created));
    created
}

/// The breaker registered under `name`, if any.
pub fn get(name: &str) -> Option<Arc<Breaker>> {
    REGISTRY.read().get(name).map(Arc::clone)
}

/// Register a breaker built from `config` under its name.
///
/// If the name is already taken the existing instance is returned untouched;
/// a live breaker is never replaced.
pub fn register(config: BreakerConfig) -> Result<Arc<Breaker>, ConfigError> {
    let config = config.validated()?;

    let mut map = REGISTRY.write();
    if let Some(found) = map.get(&config.name) {
        return Ok(Arc::clone(found));
    }
    let name = config.name.clone();
    let created = Breaker::build(config, clock::shared());
    tracing::info!(name = %name, "registered breaker");
    map.insert(name, Arc::clone(&created));
    Ok(created)
}
