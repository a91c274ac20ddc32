//! Operator configuration
//!
//! Settings are re-read at the start of every reconcile through a
//! [`ConfigSource`], so changes to the deployment environment are picked up
//! without caching them in process-wide state.

use std::time::Duration;

use tracing::warn;

/// Environment variable gating the Redisgraph deployment
pub const DEPLOY_REDISGRAPH_ENV: &str = "DEPLOY_REDISGRAPH";
/// Environment variable naming the default storage class
pub const STORAGE_CLASS_ENV: &str = "STORAGE_CLASS";
/// Environment variable for the readiness wait bound in seconds
pub const POD_WAIT_SECONDS_ENV: &str = "POD_WAIT_SECONDS";
/// Environment variable for the readiness poll interval in milliseconds
pub const POD_POLL_MILLIS_ENV: &str = "POD_POLL_MILLIS";
/// Environment variable for the steady-state re-check wait in seconds
pub const POD_FAST_WAIT_SECONDS_ENV: &str = "POD_FAST_WAIT_SECONDS";
/// Environment variable for the storage size used when none is customized
pub const DEFAULT_STORAGE_SIZE_ENV: &str = "DEFAULT_STORAGE_SIZE";

const DEFAULT_POD_WAIT_SECONDS: u64 = 180;
const DEFAULT_POD_POLL_MILLIS: u64 = 1000;
const DEFAULT_FAST_WAIT_SECONDS: u64 = 1;
const DEFAULT_STORAGE_SIZE: &str = "10Gi";

/// Configuration consulted once per reconcile
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorConfig {
    /// Whether Redisgraph should be deployed at all
    pub deploy_redisgraph: bool,
    /// Storage class for the claim; empty selects the platform default
    pub storage_class: String,
    /// Storage size used when the customization does not provide a valid one
    pub default_storage_size: String,
    /// Readiness wait on the first observation of a configuration
    pub pod_wait: Duration,
    /// Readiness wait once a previous pass observed the same mode running
    pub fast_pod_wait: Duration,
    /// Interval between readiness polls
    pub poll_interval: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            deploy_redisgraph: true,
            storage_class: String::new(),
            default_storage_size: DEFAULT_STORAGE_SIZE.to_string(),
            pod_wait: Duration::from_secs(DEFAULT_POD_WAIT_SECONDS),
            fast_pod_wait: Duration::from_secs(DEFAULT_FAST_WAIT_SECONDS),
            poll_interval: Duration::from_millis(DEFAULT_POD_POLL_MILLIS),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Unparseable values fall back to their defaults. An unparseable
    /// `DEPLOY_REDISGRAPH` keeps the deployment enabled.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let deploy_redisgraph = match lookup(DEPLOY_REDISGRAPH_ENV) {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "Ignoring unparseable {}", DEPLOY_REDISGRAPH_ENV);
                true
            }),
            None => true,
        };

        let storage_class = lookup(STORAGE_CLASS_ENV)
            .map(|s| s.trim().to_string())
            .unwrap_or(defaults.storage_class);

        let default_storage_size = lookup(DEFAULT_STORAGE_SIZE_ENV)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.default_storage_size);

        let pod_wait = parse_u64(&lookup, POD_WAIT_SECONDS_ENV)
            .map(Duration::from_secs)
            .unwrap_or(defaults.pod_wait);
        let fast_pod_wait = parse_u64(&lookup, POD_FAST_WAIT_SECONDS_ENV)
            .map(Duration::from_secs)
            .unwrap_or(defaults.fast_pod_wait);
        let poll_interval = parse_u64(&lookup, POD_POLL_MILLIS_ENV)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);

        Self {
            deploy_redisgraph,
            storage_class,
            default_storage_size,
            pod_wait,
            fast_pod_wait,
            poll_interval,
        }
    }
}

/// Parse booleans the way Kubernetes manifests usually spell them
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" => Some(true),
        "0" | "f" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn parse_u64<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(value = %raw, "Ignoring unparseable {}", key);
            None
        }
    }
}

/// Where each reconcile obtains its [`OperatorConfig`]
#[derive(Clone, Debug)]
pub enum ConfigSource {
    /// Read the process environment on every load
    Environment,
    /// A fixed configuration, used by tests and embedders
    Static(OperatorConfig),
}

impl ConfigSource {
    pub fn load(&self) -> OperatorConfig {
        match self {
            ConfigSource::Environment => OperatorConfig::from_env(),
            ConfigSource::Static(config) => config.clone(),
        }
    }
}
