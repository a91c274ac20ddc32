use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// SearchOperator is the Schema for the searchoperators API
///
/// One instance per namespace describes the Redisgraph workload that backs
/// search. The operator never edits the spec; it only publishes status.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "search.open-cluster-management.io",
    version = "v1alpha1",
    kind = "SearchOperator",
    plural = "searchoperators",
    namespaced,
    status = "SearchOperatorStatus",
    printcolumn = r#"{"name":"Persistence", "type":"string", "jsonPath":".status.persistence"}"#,
    printcolumn = r#"{"name":"Deployed", "type":"boolean", "jsonPath":".status.deployRedisgraph"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SearchOperatorSpec {
    /// Compute requests and limits for the Redisgraph container
    #[serde(default)]
    pub redisgraph_resource: PodResource,

    /// Image overrides for the managed workload
    #[serde(default)]
    pub search_image_overrides: ImageOverrides,

    /// Node selector copied onto the Redisgraph pod template
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Image pull secret used by the Redisgraph pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_secret: Option<String>,
}

/// CPU and memory request/limit pair for the Redisgraph container
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PodResource {
    /// CPU request (e.g., "25m")
    #[serde(default = "default_request_cpu")]
    pub request_cpu: String,

    /// Memory request (e.g., "64Mi")
    #[serde(default = "default_request_memory")]
    pub request_memory: String,

    /// CPU limit (e.g., "250m")
    #[serde(default = "default_limit_cpu")]
    pub limit_cpu: String,

    /// Memory limit (e.g., "1Gi")
    #[serde(default = "default_limit_memory")]
    pub limit_memory: String,
}

impl Default for PodResource {
    fn default() -> Self {
        Self {
            request_cpu: default_request_cpu(),
            request_memory: default_request_memory(),
            limit_cpu: default_limit_cpu(),
            limit_memory: default_limit_memory(),
        }
    }
}

fn default_request_cpu() -> String {
    "25m".to_string()
}

fn default_request_memory() -> String {
    "128Mi".to_string()
}

fn default_limit_cpu() -> String {
    "500m".to_string()
}

fn default_limit_memory() -> String {
    "4Gi".to_string()
}

/// Image overrides for search components
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageOverrides {
    /// Redisgraph image with TLS support
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redisgraph_tls: Option<String>,
}

/// Status of the SearchOperator
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchOperatorStatus {
    /// Storage mode outcome of the last reconcile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence: Option<PersistenceStatus>,

    /// Whether Redisgraph was deployed on the last reconcile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_redisgraph: Option<bool>,

    /// Generation of the SearchOperator observed by the last publish
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Storage mode outcome published on both SearchOperator and SearchCustomization
///
/// Serialized as the human-readable text operators read with `kubectl get`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq, Hash)]
pub enum PersistenceStatus {
    /// Redisgraph is running with a bound PersistentVolumeClaim
    #[serde(rename = "Redisgraph is using PersistenceVolumeClaim")]
    UsingDurableStorage,
    /// Persistence was explicitly disabled; Redisgraph runs on EmptyDir
    #[serde(rename = "Node level persistence using EmptyDir")]
    NoPersistence,
    /// The default durable attempt failed and Redisgraph fell back to EmptyDir
    #[serde(rename = "Degraded mode using EmptyDir. Unable to use PersistenceVolumeClaim")]
    DegradedEphemeral,
    #[serde(rename = "Unable to create Redisgraph Deployment using PVC")]
    FailedUsingDurableStorage,
    #[serde(rename = "Unable to create Redisgraph Deployment")]
    FailedNoPersistence,
    #[serde(rename = "Unable to create Redisgraph Deployment in Degraded Mode")]
    FailedDegraded,
    /// Deployment is switched off by the operator configuration
    #[serde(rename = "Redisgraph Pod not running")]
    DeployDisabled,
}

impl PersistenceStatus {
    pub const ALL: [PersistenceStatus; 7] = [
        PersistenceStatus::UsingDurableStorage,
        PersistenceStatus::NoPersistence,
        PersistenceStatus::DegradedEphemeral,
        PersistenceStatus::FailedUsingDurableStorage,
        PersistenceStatus::FailedNoPersistence,
        PersistenceStatus::FailedDegraded,
        PersistenceStatus::DeployDisabled,
    ];

    /// Text written to the status subresource
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistenceStatus::UsingDurableStorage => "Redisgraph is using PersistenceVolumeClaim",
            PersistenceStatus::NoPersistence => "Node level persistence using EmptyDir",
            PersistenceStatus::DegradedEphemeral => {
                "Degraded mode using EmptyDir. Unable to use PersistenceVolumeClaim"
            }
            PersistenceStatus::FailedUsingDurableStorage => {
                "Unable to create Redisgraph Deployment using PVC"
            }
            PersistenceStatus::FailedNoPersistence => "Unable to create Redisgraph Deployment",
            PersistenceStatus::FailedDegraded => {
                "Unable to create Redisgraph Deployment in Degraded Mode"
            }
            PersistenceStatus::DeployDisabled => "Redisgraph Pod not running",
        }
    }

    /// Short label value used for metrics
    pub fn metric_label(&self) -> &'static str {
        match self {
            PersistenceStatus::UsingDurableStorage => "UsingDurableStorage",
            PersistenceStatus::NoPersistence => "NoPersistence",
            PersistenceStatus::DegradedEphemeral => "DegradedEphemeral",
            PersistenceStatus::FailedUsingDurableStorage => "FailedUsingDurableStorage",
            PersistenceStatus::FailedNoPersistence => "FailedNoPersistence",
            PersistenceStatus::FailedDegraded => "FailedDegraded",
            PersistenceStatus::DeployDisabled => "DeployDisabled",
        }
    }

    /// True for the statuses that describe a running Redisgraph pod
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            PersistenceStatus::UsingDurableStorage
                | PersistenceStatus::NoPersistence
                | PersistenceStatus::DegradedEphemeral
        )
    }
}

impl std::fmt::Display for PersistenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
