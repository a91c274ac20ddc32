use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kube::Client;
use tokio_util::sync::CancellationToken;

use crate::controller::config::ConfigSource;
use crate::controller::store::{KubeStore, ObjectStore};
use crate::health::HealthState;

/// Shared context for the controller
#[derive(Clone)]
pub struct Context {
    /// Cluster access used by every reconcile
    pub store: Arc<dyn ObjectStore>,
    /// Where operator settings are loaded from on each reconcile
    pub config: ConfigSource,
    /// Cancelled on shutdown to stop in-flight readiness probes
    pub cancel: CancellationToken,
    /// Health state for recording metrics (optional)
    pub health_state: Option<Arc<HealthState>>,
    /// Consecutive failed reconciles per SearchOperator, for backoff
    pub retries: RetryCounter,
}

impl Context {
    pub fn new(
        client: Client,
        health_state: Option<Arc<HealthState>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store: Arc::new(KubeStore::new(client)),
            config: ConfigSource::Environment,
            cancel,
            health_state,
            retries: RetryCounter::default(),
        }
    }

    /// Context over an arbitrary store with a fixed configuration
    pub fn with_store(store: Arc<dyn ObjectStore>, config: ConfigSource) -> Self {
        Self {
            store,
            config,
            cancel: CancellationToken::new(),
            health_state: None,
            retries: RetryCounter::default(),
        }
    }
}

/// Failure counts keyed by `namespace/name`
#[derive(Clone, Debug, Default)]
pub struct RetryCounter {
    counts: Arc<Mutex<HashMap<String, u32>>>,
}

impl RetryCounter {
    /// Record a failure and return the number of failures before it
    pub fn record_failure(&self, key: &str) -> u32 {
        let mut counts = self.lock();
        let count = counts.entry(key.to_string()).or_insert(0);
        let previous = *count;
        *count = count.saturating_add(1);
        previous
    }

    pub fn reset(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn failures(&self, key: &str) -> u32 {
        self.lock().get(key).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
