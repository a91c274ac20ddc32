//! Test fixtures and builders for SearchOperator and SearchCustomization resources
//!
//! ```rust,ignore
//! let operator = SearchOperatorBuilder::new(TEST_NAMESPACE).with_generation(2).build();
//! let customization = create_test_customization(TEST_NAMESPACE, Some(false), None);
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use k8s_openapi::api::core::v1::{ContainerStatus, Pod, PodCondition, PodStatus};
use kube::core::ObjectMeta;
use search_operator::controller::OperatorConfig;
use search_operator::crd::{
    PersistenceStatus, PodResource, SearchCustomization, SearchCustomizationSpec,
    SearchCustomizationStatus, SearchOperator, SearchOperatorSpec, SearchOperatorStatus,
};
use search_operator::resources::common::{
    COLLECTOR_APP, COLLECTOR_COMPONENT, CUSTOMIZATION_NAME, OPERATOR_NAME,
};

/// Namespace used by most tests
pub const TEST_NAMESPACE: &str = "open-cluster-management";

// =============================================================================
// Convenience Functions for Simple Test Cases
// =============================================================================

/// Create a SearchOperator with default spec and no status
pub fn create_test_operator(namespace: &str) -> SearchOperator {
    SearchOperatorBuilder::new(namespace).build()
}

/// Create a SearchCustomization with the given persistence preference and size
pub fn create_test_customization(
    namespace: &str,
    persistence: Option<bool>,
    storage_size: Option<&str>,
) -> SearchCustomization {
    SearchCustomization {
        metadata: ObjectMeta {
            name: Some(CUSTOMIZATION_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some("customization-uid".to_string()),
            generation: Some(1),
            ..Default::default()
        },
        spec: SearchCustomizationSpec {
            persistence,
            storage_class: None,
            storage_size: storage_size.map(str::to_string),
        },
        status: None,
    }
}

/// Applied settings as recorded after a successful publish
pub fn applied_status(
    persistence: PersistenceStatus,
    persist: bool,
    storage_size: &str,
) -> SearchCustomizationStatus {
    SearchCustomizationStatus {
        persistence: Some(persistence),
        persist: Some(persist),
        storage_class: None,
        storage_size: Some(storage_size.to_string()),
    }
}

/// Configuration with short waits, for use with paused tokio time
pub fn test_config() -> OperatorConfig {
    OperatorConfig {
        deploy_redisgraph: true,
        storage_class: String::new(),
        default_storage_size: "10Gi".to_string(),
        pod_wait: Duration::from_secs(10),
        fast_pod_wait: Duration::from_secs(1),
        poll_interval: Duration::from_millis(250),
    }
}

/// A search collector pod
pub fn create_collector_pod(namespace: &str, name: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([
                ("app".to_string(), COLLECTOR_APP.to_string()),
                ("component".to_string(), COLLECTOR_COMPONENT.to_string()),
            ])),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Pod status with all containers ready
pub fn ready_status() -> PodStatus {
    PodStatus {
        phase: Some("Running".to_string()),
        container_statuses: Some(vec![ContainerStatus {
            name: "redisgraph".to_string(),
            ready: true,
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// Pod status the scheduler reports when it cannot place the pod
pub fn unschedulable_status() -> PodStatus {
    PodStatus {
        phase: Some("Pending".to_string()),
        conditions: Some(vec![PodCondition {
            type_: "PodScheduled".to_string(),
            status: "False".to_string(),
            reason: Some("Unschedulable".to_string()),
            message: Some(
                "0/3 nodes are available: pod has unbound immediate PersistentVolumeClaims"
                    .to_string(),
            ),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// Pod status of a pod that is scheduled but still starting
pub fn pending_status() -> PodStatus {
    PodStatus {
        phase: Some("Pending".to_string()),
        container_statuses: Some(vec![ContainerStatus {
            name: "redisgraph".to_string(),
            ready: false,
            ..Default::default()
        }]),
        ..Default::default()
    }
}

// =============================================================================
// SearchOperator Builder
// =============================================================================

/// Builder for SearchOperator test fixtures
#[allow(dead_code)]
pub struct SearchOperatorBuilder {
    namespace: String,
    generation: i64,
    resources: PodResource,
    node_selector: BTreeMap<String, String>,
    pull_secret: Option<String>,
    status: Option<SearchOperatorStatus>,
}

#[allow(dead_code)]
impl SearchOperatorBuilder {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            generation: 1,
            resources: PodResource::default(),
            node_selector: BTreeMap::new(),
            pull_secret: None,
            status: None,
        }
    }

    pub fn with_generation(mut self, generation: i64) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_resources(mut self, request_memory: &str, limit_memory: &str) -> Self {
        self.resources.request_memory = request_memory.to_string();
        self.resources.limit_memory = limit_memory.to_string();
        self
    }

    pub fn with_node_selector(mut self, key: &str, value: &str) -> Self {
        self.node_selector.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_pull_secret(mut self, name: &str) -> Self {
        self.pull_secret = Some(name.to_string());
        self
    }

    /// Status as published by a previous pass for `observed_generation`
    pub fn with_published(mut self, persistence: PersistenceStatus, observed_generation: i64) -> Self {
        self.status = Some(SearchOperatorStatus {
            persistence: Some(persistence),
            deploy_redisgraph: Some(persistence != PersistenceStatus::DeployDisabled),
            observed_generation: Some(observed_generation),
        });
        self
    }

    pub fn build(self) -> SearchOperator {
        SearchOperator {
            metadata: ObjectMeta {
                name: Some(OPERATOR_NAME.to_string()),
                namespace: Some(self.namespace),
                uid: Some("operator-uid-12345".to_string()),
                generation: Some(self.generation),
                ..Default::default()
            },
            spec: SearchOperatorSpec {
                redisgraph_resource: self.resources,
                node_selector: self.node_selector,
                pull_secret: self.pull_secret,
                ..Default::default()
            },
            status: self.status,
        }
    }
}
