pub mod config;
pub mod context;
pub mod error;
pub mod probe;
pub mod reconciler;
pub mod restart;
pub mod state_machine;
pub mod status;
pub mod store;
pub mod validation;

pub use config::{ConfigSource, OperatorConfig};
pub use context::{Context, RetryCounter};
pub use error::{BackoffConfig, Error, Result};
pub use probe::{ProbeOutcome, ProbeResult, ReadinessProber};
pub use reconciler::{error_policy, reconcile};
pub use restart::restart_dependents;
pub use state_machine::{PersistencePreference, Step, StorageSettings};
pub use status::{StatusManager, StatusReport};
pub use store::{KubeStore, ObjectStore};
