//! Readiness probing for the Redisgraph pod
//!
//! The prober polls pods matching a label selector until one is ready, one
//! reports a scheduling failure, or the wait bound elapses. Only pods created
//! for the storage mode under test count, since pods of a deleted StatefulSet
//! stay listed until garbage collection removes them.

use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::controller::error::{Error, Result};
use crate::controller::store::ObjectStore;
use crate::resources::StorageMode;
use crate::resources::redisgraph::pod_storage_mode;

/// Pod condition reason reported when the scheduler cannot place a pod
pub const UNSCHEDULABLE_REASON: &str = "Unschedulable";

/// Classification of a readiness check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// A matching pod reports all containers ready
    Ready,
    /// A matching pod carries a scheduling failure condition
    Unschedulable,
    /// Neither was observed before the deadline
    TimedOut,
}

impl ProbeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeOutcome::Ready)
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Ready => write!(f, "Ready"),
            ProbeOutcome::Unschedulable => write!(f, "Unschedulable"),
            ProbeOutcome::TimedOut => write!(f, "TimedOut"),
        }
    }
}

/// Result of one probe cycle. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeResult {
    pub outcome: ProbeOutcome,
    pub elapsed: Duration,
}

/// Whether every container of the pod reports ready
pub fn pod_is_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .is_some_and(|statuses| !statuses.is_empty() && statuses.iter().all(|c| c.ready))
}

/// Whether the pod carries an `Unschedulable` condition
pub fn pod_is_unschedulable(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.reason.as_deref() == Some(UNSCHEDULABLE_REASON))
        })
}

/// Classify the current pod set for a workload in `mode`
///
/// Pods that are being deleted, or whose `persist` volume belongs to the
/// other mode, are ignored. Returns `None` while the outcome is still pending.
pub fn classify(pods: &[Pod], mode: StorageMode) -> Option<ProbeOutcome> {
    let live: Vec<&Pod> = pods
        .iter()
        .filter(|p| p.metadata.deletion_timestamp.is_none())
        .filter(|p| pod_storage_mode(p).is_none_or(|m| m == mode))
        .collect();

    if live.iter().any(|p| pod_is_ready(p)) {
        Some(ProbeOutcome::Ready)
    } else if live.iter().any(|p| pod_is_unschedulable(p)) {
        Some(ProbeOutcome::Unschedulable)
    } else {
        None
    }
}

/// Bounded poller for pod readiness
#[derive(Clone, Debug)]
pub struct ReadinessProber {
    poll_interval: Duration,
}

impl ReadinessProber {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Poll `selector` in `ns` for up to `max_wait` until a pod in `mode` settles
    ///
    /// Returns promptly with [`Error::Cancelled`] once `cancel` fires. The call
    /// never outlives `max_wait` by more than one poll interval.
    pub async fn probe(
        &self,
        store: &dyn ObjectStore,
        ns: &str,
        selector: &str,
        mode: StorageMode,
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProbeResult> {
        let start = Instant::now();
        let deadline = start + max_wait;

        loop {
            let pods = store.list_pods(ns, selector).await?;
            if let Some(outcome) = classify(&pods, mode) {
                let elapsed = start.elapsed();
                info!(%outcome, ?elapsed, "Redisgraph readiness probe finished");
                return Ok(ProbeResult { outcome, elapsed });
            }

            let now = Instant::now();
            if now >= deadline {
                let elapsed = start.elapsed();
                info!(?elapsed, "Redisgraph pod not ready before deadline");
                return Ok(ProbeResult {
                    outcome: ProbeOutcome::TimedOut,
                    elapsed,
                });
            }

            let sleep_for = self.poll_interval.min(deadline - now);
            debug!(pods = pods.len(), ?sleep_for, "Waiting for Redisgraph pod");
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
    }
}
