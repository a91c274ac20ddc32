pub mod controller;
pub mod crd;
pub mod health;
pub mod resources;

pub use controller::{
    BackoffConfig, ConfigSource, Context, Error, KubeStore, ObjectStore, OperatorConfig, Result,
    error_policy, reconcile,
};
pub use crd::{PersistenceStatus, SearchCustomization, SearchOperator};
pub use health::{HealthState, Metrics};

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, Secret};
use kube::runtime::Controller;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::resources::common::{OPERATOR_NAME, redisgraph_selector};

/// Helper to create a namespaced or cluster-wide API based on scope.
fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// The SearchOperator that owns the Redisgraph workload in `obj`'s namespace
fn canonical_operator<K: Resource>(obj: &K) -> Option<ObjectRef<SearchOperator>> {
    obj.namespace()
        .map(|ns| ObjectRef::new(OPERATOR_NAME).within(&ns))
}

/// Run the operator controller (cluster-wide).
///
/// If health_state is provided, metrics will be recorded for reconciliations.
pub async fn run_controller(
    client: Client,
    health_state: Option<Arc<HealthState>>,
    cancel: CancellationToken,
) {
    run_controller_scoped(client, health_state, None, cancel).await
}

/// Run the operator controller with optional namespace scoping.
///
/// When `namespace` is `Some(ns)`, only watches resources in that namespace.
/// When `namespace` is `None`, watches resources cluster-wide. Cancelling
/// `cancel` stops in-flight readiness probes.
pub async fn run_controller_scoped(
    client: Client,
    health_state: Option<Arc<HealthState>>,
    namespace: Option<&str>,
    cancel: CancellationToken,
) {
    let scope_msg = namespace.unwrap_or("cluster-wide");
    tracing::info!(
        "Starting controller for SearchOperator resources (scope: {})",
        scope_msg
    );

    if let Some(ref state) = health_state {
        state.set_ready(true).await;
    }

    let ctx = Arc::new(Context::new(client.clone(), health_state, cancel));

    let operators: Api<SearchOperator> = scoped_api(client.clone(), namespace);
    let customizations: Api<SearchCustomization> = scoped_api(client.clone(), namespace);
    let statefulsets: Api<StatefulSet> = scoped_api(client.clone(), namespace);
    let secrets: Api<Secret> = scoped_api(client.clone(), namespace);
    let claims: Api<PersistentVolumeClaim> = scoped_api(client.clone(), namespace);
    let pods: Api<Pod> = scoped_api(client.clone(), namespace);

    let watcher_config = WatcherConfig::default().any_semantic();
    let pod_watcher_config = watcher_config.clone().labels(&redisgraph_selector());

    // SearchCustomization is not owned, and Redisgraph pods are owned by the
    // StatefulSet, so both are mapped onto the namespace's SearchOperator
    Controller::new(operators, watcher_config.clone())
        .owns(statefulsets, watcher_config.clone())
        .owns(secrets, watcher_config.clone())
        .owns(claims, watcher_config.clone())
        .watches(customizations, watcher_config, |c| canonical_operator(&c))
        .watches(pods, pod_watcher_config, |p| canonical_operator(&p))
        .graceful_shutdown_on(ctx.cancel.clone().cancelled_owned())
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    tracing::debug!("Reconciled: {}", obj.name);
                }
                Err(e) => {
                    // Watch events for a deleted SearchOperator still trigger a pass
                    let is_not_found = matches!(
                        &e,
                        kube::runtime::controller::Error::ReconcilerFailed(err, _) if err.is_not_found()
                    );
                    if is_not_found {
                        tracing::debug!("Object no longer exists (likely deleted): {:?}", e);
                    } else {
                        tracing::error!("Reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    tracing::info!("Controller stream ended");
}
