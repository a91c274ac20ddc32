//! SearchCustomization CRD definition
//!
//! An optional, administrator-owned override for Redisgraph storage. It is not
//! owned by the SearchOperator and is read fresh on every reconcile.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::PersistenceStatus;

/// SearchCustomization is the Schema for the searchcustomizations API
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "search.open-cluster-management.io",
    version = "v1alpha1",
    kind = "SearchCustomization",
    plural = "searchcustomizations",
    namespaced,
    status = "SearchCustomizationStatus",
    printcolumn = r#"{"name":"Persistence", "type":"boolean", "jsonPath":".spec.persistence"}"#,
    printcolumn = r#"{"name":"Size", "type":"string", "jsonPath":".spec.storageSize"}"#,
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.persistence"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SearchCustomizationSpec {
    /// Whether Redisgraph should use a PersistentVolumeClaim.
    /// Unset means durable storage is attempted with fallback to EmptyDir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence: Option<bool>,

    /// Storage class for the claim (uses the operator default if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    /// Size of the persistent volume (e.g., "10Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_size: Option<String>,
}

/// Status of the SearchCustomization
///
/// `persistence` mirrors the SearchOperator status. The remaining fields record
/// the storage settings in effect at the last successful publish.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchCustomizationStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence: Option<PersistenceStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_size: Option<String>,
}
