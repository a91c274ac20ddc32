//! Reconciliation logic for SearchOperator resources
//!
//! Each pass provisions the Redisgraph credential, claim and StatefulSet,
//! waits a bounded time for the pod, and publishes the resulting persistence
//! status. Readiness failures publish a failure status and then fail the
//! reconcile so the controller retries with backoff.

use std::sync::Arc;
use std::time::Instant;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument, warn};

use crate::controller::context::Context;
use crate::controller::error::{BackoffConfig, Error, Result};
use crate::controller::probe::{ProbeResult, ReadinessProber};
use crate::controller::restart::restart_dependents;
use crate::controller::state_machine::{
    Step, StorageSettings, next_step, plan_first_probe, resolve_settings, running_mode,
};
use crate::controller::status::{StatusManager, StatusReport};
use crate::controller::store::ObjectStore;
use crate::crd::{PersistenceStatus, SearchCustomization, SearchOperator};
use crate::resources::common::{
    CUSTOMIZATION_NAME, PVC_NAME, SECRET_NAME, STATEFULSET_NAME, redisgraph_selector,
};
use crate::resources::redisgraph::{
    build_volume_claim, build_workload, claim_matches, storage_mode_of, template_matches,
};
use crate::resources::secret::{PASSWORD_LENGTH, build_credential, generate_password};
use crate::resources::StorageMode;

/// Default backoff configuration for error handling
fn default_backoff() -> BackoffConfig {
    BackoffConfig::default()
}

/// Main reconciliation function
#[instrument(skip(operator, ctx), fields(name = %operator.name_any(), namespace = operator.namespace().unwrap_or_default()))]
pub async fn reconcile(operator: Arc<SearchOperator>, ctx: Arc<Context>) -> Result<Action> {
    let start = Instant::now();
    let ns = operator
        .namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let name = operator.name_any();

    info!("Reconciling SearchOperator");

    let result = reconcile_operator(&ctx, &ns, &name).await;
    if result.is_ok() {
        ctx.retries.reset(&retry_key(&ns, &name));
    }

    if let Some(state) = &ctx.health_state {
        match &result {
            Ok(_) => {
                state
                    .metrics
                    .record_reconcile(&ns, &name, start.elapsed().as_secs_f64());
                state.mark_reconciled();
            }
            Err(_) => state.metrics.record_error(&ns, &name),
        }
    }

    match &result {
        Ok(_) => info!("Reconciliation completed successfully"),
        Err(Error::PodNotRunning) => warn!("Redisgraph pod not running, will retry"),
        Err(e) => error!("Reconciliation failed: {}", e),
    }
    result
}

fn retry_key(ns: &str, name: &str) -> String {
    format!("{}/{}", ns, name)
}

/// Error policy for the controller with exponential backoff
///
/// The delay grows with each consecutive failure of the same SearchOperator
/// and starts over after a successful reconcile.
pub fn error_policy(operator: Arc<SearchOperator>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = operator.name_any();
    let backoff = default_backoff();

    let attempt = ctx
        .retries
        .record_failure(&retry_key(&operator.namespace().unwrap_or_default(), &name));
    let delay = backoff.delay_for_error(error, attempt);

    if error.is_retryable() {
        warn!(
            "Retryable error for {} (attempt {}): {:?}, requeuing in {:?}",
            name,
            attempt + 1,
            error,
            delay
        );
    } else {
        error!(
            "Non-retryable error for {}: {:?}, requeuing in {:?} for manual intervention",
            name, error, delay
        );
    }

    Action::requeue(delay)
}

async fn reconcile_operator(ctx: &Context, ns: &str, name: &str) -> Result<Action> {
    let store = ctx.store.as_ref();
    let config = ctx.config.load();

    // The watch cache can lag behind status writes from the previous pass
    let Some(operator) = store.get_operator(ns, name).await? else {
        debug!("SearchOperator {}/{} no longer exists", ns, name);
        return Ok(Action::await_change());
    };

    if !config.deploy_redisgraph {
        return disable_deployment(ctx, &operator, ns).await;
    }

    ensure_credential(store, &operator, ns).await?;

    let customization = store.get_customization(ns, CUSTOMIZATION_NAME).await?;
    let settings = resolve_settings(customization.as_ref(), &config);
    let plan = plan_first_probe(&operator, customization.as_ref(), &settings, &config);
    info!(
        preference = %settings.preference,
        mode = %plan.mode,
        fast = plan.fast,
        "Resolved Redisgraph storage settings"
    );

    let previous = operator.status.as_ref().and_then(|s| s.persistence);
    let prober = ReadinessProber::new(config.poll_interval);
    let mut mode = plan.mode;
    let mut wait = plan.wait;
    let mut recheck = plan.fast;

    loop {
        if mode.is_durable() {
            ensure_claim(store, &operator, ns, &settings).await?;
        }
        ensure_workload(store, &operator, ns, mode).await?;

        let mut probe = probe_workload(ctx, &prober, ns, mode, wait).await?;
        if recheck && !probe.outcome.is_ready() {
            // Only a failure over the full bound may change the storage mode
            info!(
                outcome = %probe.outcome,
                "Redisgraph not ready on steady-state check, waiting the full bound"
            );
            probe = probe_workload(ctx, &prober, ns, mode, config.pod_wait).await?;
        }
        recheck = false;

        match next_step(settings.preference, mode, probe.outcome) {
            Step::Settled(status) => {
                publish(
                    ctx,
                    &operator,
                    customization.as_ref(),
                    &StatusReport::settled(status, &settings),
                )
                .await?;
                restart_if_changed(ctx, ns, &settings, customization.as_ref(), previous, mode)
                    .await;
                return Ok(Action::await_change());
            }
            Step::FallBack(next) => {
                warn!(
                    outcome = %probe.outcome,
                    "Redisgraph not ready using {} storage, falling back to {}",
                    mode, next
                );
                store.delete_statefulset(ns, STATEFULSET_NAME).await?;
                mode = next;
                wait = config.pod_wait;
            }
            Step::Failed(status) => {
                warn!(outcome = %probe.outcome, "Redisgraph not ready using {} storage", mode);
                store.delete_statefulset(ns, STATEFULSET_NAME).await?;
                publish(
                    ctx,
                    &operator,
                    customization.as_ref(),
                    &StatusReport::failed(status),
                )
                .await?;
                return Err(Error::PodNotRunning);
            }
        }
    }
}

/// Remove the workload and report it as intentionally not deployed
async fn disable_deployment(ctx: &Context, operator: &SearchOperator, ns: &str) -> Result<Action> {
    let store = ctx.store.as_ref();
    if store.delete_statefulset(ns, STATEFULSET_NAME).await? {
        info!("Deleted Redisgraph StatefulSet, deployment disabled");
    }
    let customization = store.get_customization(ns, CUSTOMIZATION_NAME).await?;
    publish(
        ctx,
        operator,
        customization.as_ref(),
        &StatusReport::deploy_disabled(),
    )
    .await?;
    Ok(Action::await_change())
}

async fn probe_workload(
    ctx: &Context,
    prober: &ReadinessProber,
    ns: &str,
    mode: StorageMode,
    wait: std::time::Duration,
) -> Result<ProbeResult> {
    let probe = prober
        .probe(
            ctx.store.as_ref(),
            ns,
            &redisgraph_selector(),
            mode,
            wait,
            &ctx.cancel,
        )
        .await?;
    if let Some(state) = &ctx.health_state {
        state
            .metrics
            .record_probe(probe.outcome, probe.elapsed.as_secs_f64());
    }
    Ok(probe)
}

async fn publish(
    ctx: &Context,
    operator: &SearchOperator,
    customization: Option<&SearchCustomization>,
    report: &StatusReport,
) -> Result<()> {
    StatusManager::new(ctx.store.as_ref())
        .publish(operator, customization, report)
        .await?;
    if let (Some(state), Some(ns)) = (&ctx.health_state, operator.namespace()) {
        state.metrics.set_persistence_status(&ns, report.persistence);
    }
    if report.persistence == PersistenceStatus::DegradedEphemeral {
        warn!("Redisgraph is running without durable storage");
    }
    Ok(())
}

/// Create the credential Secret if missing. An existing Secret is never modified.
async fn ensure_credential(store: &dyn ObjectStore, operator: &SearchOperator, ns: &str) -> Result<()> {
    if store.get_secret(ns, SECRET_NAME).await?.is_some() {
        debug!("Secret {} already exists", SECRET_NAME);
        return Ok(());
    }
    let secret = build_credential(operator, &generate_password(PASSWORD_LENGTH));
    store.create_secret(&secret).await?;
    info!("Created Secret {}", SECRET_NAME);
    Ok(())
}

/// Make the PersistentVolumeClaim match the resolved class and size
///
/// A claim created with other settings is deleted together with the
/// StatefulSet mounting it and created again. While the old claim is still
/// terminating the pass fails with a conflict and is retried.
async fn ensure_claim(
    store: &dyn ObjectStore,
    operator: &SearchOperator,
    ns: &str,
    settings: &StorageSettings,
) -> Result<()> {
    if let Some(existing) = store.get_claim(ns, PVC_NAME).await? {
        if existing.metadata.deletion_timestamp.is_some() {
            return Err(claim_terminating());
        }
        if claim_matches(&existing, &settings.storage_class, &settings.storage_size) {
            debug!("PersistentVolumeClaim {} is up to date", PVC_NAME);
            return Ok(());
        }

        info!(
            storage_class = %settings.storage_class,
            storage_size = %settings.storage_size,
            "Storage settings changed, recreating PersistentVolumeClaim {}",
            PVC_NAME
        );
        store.delete_statefulset(ns, STATEFULSET_NAME).await?;
        store.delete_claim(ns, PVC_NAME).await?;
        if store.get_claim(ns, PVC_NAME).await?.is_some() {
            return Err(claim_terminating());
        }
    }
    let claim = build_volume_claim(operator, &settings.storage_class, &settings.storage_size);
    store.create_claim(&claim).await?;
    info!(
        storage_class = %settings.storage_class,
        storage_size = %settings.storage_size,
        "Created PersistentVolumeClaim {}",
        PVC_NAME
    );
    Ok(())
}

fn claim_terminating() -> Error {
    Error::Conflict(format!("PersistentVolumeClaim {} is still terminating", PVC_NAME))
}

/// Make the StatefulSet match `mode`
///
/// A StatefulSet on the other volume source is deleted and recreated. One on
/// the same source is replaced only when its managed fields drifted.
async fn ensure_workload(
    store: &dyn ObjectStore,
    operator: &SearchOperator,
    ns: &str,
    mode: StorageMode,
) -> Result<()> {
    let mut desired = build_workload(operator, mode);

    let Some(existing) = store.get_statefulset(ns, STATEFULSET_NAME).await? else {
        store.create_statefulset(&desired).await?;
        info!("Created StatefulSet {} using {} storage", STATEFULSET_NAME, mode);
        return Ok(());
    };

    if storage_mode_of(&existing) != Some(mode) {
        store.delete_statefulset(ns, STATEFULSET_NAME).await?;
        store.create_statefulset(&desired).await?;
        info!("Recreated StatefulSet {} using {} storage", STATEFULSET_NAME, mode);
    } else if !template_matches(&existing, &desired) {
        desired.metadata.resource_version = existing.resource_version();
        store.replace_statefulset(&desired).await?;
        info!("Updated StatefulSet {}", STATEFULSET_NAME);
    } else {
        debug!("StatefulSet {} is up to date", STATEFULSET_NAME);
    }
    Ok(())
}

/// Restart collector pods if storage changed since the last success
///
/// Changes are detected from the settings recorded on the customization and
/// from the storage mode behind the previously published status, which still
/// applies after the customization was deleted.
async fn restart_if_changed(
    ctx: &Context,
    ns: &str,
    settings: &StorageSettings,
    customization: Option<&SearchCustomization>,
    previous: Option<PersistenceStatus>,
    mode: StorageMode,
) {
    let applied = customization.and_then(|c| c.status.as_ref());
    let mode_changed = previous
        .and_then(running_mode)
        .is_some_and(|before| before != mode);
    if !settings.restart_required(applied) && !mode_changed {
        return;
    }

    info!("Storage settings changed, restarting search collector");
    match restart_dependents(ctx.store.as_ref(), ns).await {
        Ok(count) => {
            if let Some(state) = &ctx.health_state {
                state.metrics.record_collector_restarts(ns, count as u64);
            }
        }
        Err(e) => warn!(error = %e, "Failed to restart search collector"),
    }
}
