//! Persistence decision engine for the Redisgraph workload
//!
//! Pure functions that resolve the effective storage settings, pick the mode
//! and wait bound for the first readiness probe, and map each probe outcome to
//! the next step of a reconcile. Nothing here touches the cluster.
//!
//! ```text
//!   preference      Ready                  not ready
//!   ----------      -----                  ---------
//!   Explicit(true)  UsingDurableStorage    FailedUsingDurableStorage
//!   Explicit(false) NoPersistence          FailedNoPersistence
//!   Default         UsingDurableStorage    fall back to EmptyDir
//!     (EmptyDir)    DegradedEphemeral      FailedDegraded
//! ```

use std::fmt;
use std::time::Duration;

use tracing::warn;

use crate::controller::config::OperatorConfig;
use crate::controller::probe::ProbeOutcome;
use crate::controller::validation::{validate_storage_class, validate_storage_size};
use crate::crd::{PersistenceStatus, SearchCustomization, SearchCustomizationStatus, SearchOperator};
use crate::resources::StorageMode;

/// Persistence preference taken from the SearchCustomization
///
/// `Default` and `Explicit(false)` are distinct inputs: only an unset
/// preference may fall back to EmptyDir or report a degraded status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PersistencePreference {
    /// No customization, or one without `persistence`. Durable storage is attempted.
    Default,
    /// Set by an administrator
    Explicit(bool),
}

impl PersistencePreference {
    pub fn from_customization(customization: Option<&SearchCustomization>) -> Self {
        match customization.and_then(|c| c.spec.persistence) {
            Some(persist) => PersistencePreference::Explicit(persist),
            None => PersistencePreference::Default,
        }
    }

    /// Whether durable storage is requested, explicitly or by default
    pub fn wants_durable(&self) -> bool {
        match self {
            PersistencePreference::Default => true,
            PersistencePreference::Explicit(persist) => *persist,
        }
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, PersistencePreference::Explicit(_))
    }

    /// Storage mode of the first attempt
    pub fn initial_mode(&self) -> StorageMode {
        StorageMode::from_persistence(self.wants_durable())
    }
}

impl fmt::Display for PersistencePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistencePreference::Default => write!(f, "default"),
            PersistencePreference::Explicit(true) => write!(f, "explicit-durable"),
            PersistencePreference::Explicit(false) => write!(f, "explicit-ephemeral"),
        }
    }
}

/// Storage settings in effect for one reconcile
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageSettings {
    pub preference: PersistencePreference,
    /// Empty selects the platform default class
    pub storage_class: String,
    pub storage_size: String,
}

impl StorageSettings {
    /// Whether these settings match the ones recorded at the last successful publish
    pub fn matches_applied(&self, applied: &SearchCustomizationStatus) -> bool {
        applied.persist == Some(self.preference.wants_durable())
            && applied.storage_class.as_deref().unwrap_or_default() == self.storage_class
            && applied.storage_size.as_deref() == Some(self.storage_size.as_str())
    }

    /// Whether dependents must restart after publishing these settings
    ///
    /// Only a change relative to a previous successful publish counts. The
    /// first publish for a customization never restarts anything.
    pub fn restart_required(&self, applied: Option<&SearchCustomizationStatus>) -> bool {
        let Some(applied) = applied else {
            return false;
        };
        let Some(persist) = applied.persist else {
            return false;
        };
        let size_changed = applied
            .storage_size
            .as_deref()
            .is_some_and(|size| size != self.storage_size);
        persist != self.preference.wants_durable() || size_changed
    }
}

/// Resolve the storage settings from the customization and operator config
///
/// A non-empty customization class overrides the configured one. Malformed
/// values are treated as unset.
pub fn resolve_settings(
    customization: Option<&SearchCustomization>,
    config: &OperatorConfig,
) -> StorageSettings {
    let preference = PersistencePreference::from_customization(customization);
    let spec = customization.map(|c| &c.spec);

    let storage_class = match spec
        .and_then(|s| s.storage_class.as_deref())
        .map(str::trim)
        .filter(|class| !class.is_empty())
    {
        Some(class) => match validate_storage_class(class) {
            Ok(()) => class.to_string(),
            Err(e) => {
                warn!(error = %e, "Ignoring customized storage class");
                config.storage_class.clone()
            }
        },
        None => config.storage_class.clone(),
    };

    let storage_size = match spec
        .and_then(|s| s.storage_size.as_deref())
        .map(str::trim)
        .filter(|size| !size.is_empty())
    {
        Some(size) => match validate_storage_size(size) {
            Ok(()) => size.to_string(),
            Err(e) => {
                warn!(error = %e, "Ignoring customized storage size");
                config.default_storage_size.clone()
            }
        },
        None => config.default_storage_size.clone(),
    };

    StorageSettings {
        preference,
        storage_class,
        storage_size,
    }
}

/// Status published when a workload in `mode` became ready
pub fn settled_status(preference: PersistencePreference, mode: StorageMode) -> PersistenceStatus {
    match (mode, preference) {
        (StorageMode::Durable, _) => PersistenceStatus::UsingDurableStorage,
        (StorageMode::Ephemeral, PersistencePreference::Default) => {
            PersistenceStatus::DegradedEphemeral
        }
        (StorageMode::Ephemeral, PersistencePreference::Explicit(_)) => {
            PersistenceStatus::NoPersistence
        }
    }
}

/// Status published when no further attempt is possible
pub fn failed_status(preference: PersistencePreference) -> PersistenceStatus {
    match preference {
        PersistencePreference::Explicit(true) => PersistenceStatus::FailedUsingDurableStorage,
        PersistencePreference::Explicit(false) => PersistenceStatus::FailedNoPersistence,
        PersistencePreference::Default => PersistenceStatus::FailedDegraded,
    }
}

/// Mode to retry with after `mode` failed, if any
///
/// Only the default preference falls back, and only once, from durable to
/// EmptyDir.
pub fn fallback_mode(preference: PersistencePreference, mode: StorageMode) -> Option<StorageMode> {
    match (preference, mode) {
        (PersistencePreference::Default, StorageMode::Durable) => Some(StorageMode::Ephemeral),
        _ => None,
    }
}

/// What the reconciler does after a probe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Workload is running; publish this status
    Settled(PersistenceStatus),
    /// Delete the workload and retry in this mode with the full wait
    FallBack(StorageMode),
    /// Delete the workload, publish this status and fail the reconcile
    Failed(PersistenceStatus),
}

pub fn next_step(
    preference: PersistencePreference,
    mode: StorageMode,
    outcome: ProbeOutcome,
) -> Step {
    match outcome {
        ProbeOutcome::Ready => Step::Settled(settled_status(preference, mode)),
        ProbeOutcome::Unschedulable | ProbeOutcome::TimedOut => {
            match fallback_mode(preference, mode) {
                Some(next) => Step::FallBack(next),
                None => Step::Failed(failed_status(preference)),
            }
        }
    }
}

/// Mode and wait bound of the first readiness probe in a reconcile
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbePlan {
    pub mode: StorageMode,
    pub wait: Duration,
    /// True when a previous pass already saw this mode running
    pub fast: bool,
}

/// Mode a running status describes
pub fn running_mode(status: PersistenceStatus) -> Option<StorageMode> {
    match status {
        PersistenceStatus::UsingDurableStorage => Some(StorageMode::Durable),
        PersistenceStatus::NoPersistence | PersistenceStatus::DegradedEphemeral => {
            Some(StorageMode::Ephemeral)
        }
        _ => None,
    }
}

/// Plan the first probe of a reconcile from the observable status
///
/// The short wait applies only when the last publish was for the current
/// generation, reported the status this attempt would settle on, and recorded
/// the same storage settings. A previous degraded result under unchanged
/// settings goes straight to EmptyDir instead of retrying the claim.
pub fn plan_first_probe(
    operator: &SearchOperator,
    customization: Option<&SearchCustomization>,
    settings: &StorageSettings,
    config: &OperatorConfig,
) -> ProbePlan {
    let full = ProbePlan {
        mode: settings.preference.initial_mode(),
        wait: config.pod_wait,
        fast: false,
    };

    let Some(status) = operator.status.as_ref() else {
        return full;
    };
    let Some(previous) = status.persistence else {
        return full;
    };
    if status.observed_generation.is_none()
        || status.observed_generation != operator.metadata.generation
    {
        return full;
    }

    let settings_unchanged = match customization {
        Some(c) => c
            .status
            .as_ref()
            .is_some_and(|applied| settings.matches_applied(applied)),
        None => true,
    };
    if !settings_unchanged {
        return full;
    }

    let Some(mode) = running_mode(previous) else {
        return full;
    };
    let mode = match (previous, settings.preference) {
        (PersistenceStatus::DegradedEphemeral, PersistencePreference::Default) => mode,
        _ => full.mode,
    };

    if settled_status(settings.preference, mode) == previous {
        ProbePlan {
            mode,
            wait: config.fast_pod_wait,
            fast: true,
        }
    } else {
        full
    }
}
