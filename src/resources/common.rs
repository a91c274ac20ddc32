//! Common utilities for Kubernetes resource generation
//!
//! Names, labels and owner references shared by every resource the operator
//! creates on behalf of a SearchOperator.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;

use crate::crd::SearchOperator;

/// API version for the search CRDs
pub const API_VERSION: &str = "search.open-cluster-management.io/v1alpha1";

/// Kind for SearchOperator CRD
pub const KIND: &str = "SearchOperator";

/// Operator field manager name for writes
pub const FIELD_MANAGER: &str = "search-operator";

/// Canonical SearchOperator instance name in a namespace
pub const OPERATOR_NAME: &str = "searchoperator";

/// Canonical SearchCustomization instance name in a namespace
pub const CUSTOMIZATION_NAME: &str = "searchcustomization";

/// Name of the Redisgraph StatefulSet
pub const STATEFULSET_NAME: &str = "search-redisgraph";

/// Name of the Redisgraph PersistentVolumeClaim
pub const PVC_NAME: &str = "search-redisgraph-pvc-0";

/// Name of the Redisgraph credentials Secret
pub const SECRET_NAME: &str = "redisgraph-user-secret";

/// Key holding the Redisgraph password in the credentials Secret
pub const SECRET_PASSWORD_KEY: &str = "redispwd";

/// `app` label value for Redisgraph pods
pub const APP_NAME: &str = "search";

/// `component` label value for Redisgraph pods
pub const COMPONENT: &str = "redisgraph";

/// `app` label value of the search collector
pub const COLLECTOR_APP: &str = "search-prod";

/// `component` label value of the search collector
pub const COLLECTOR_COMPONENT: &str = "search-collector";

/// Owner reference pointing at the SearchOperator
///
/// Attached to every resource the operator creates so that deleting the
/// SearchOperator garbage-collects them.
pub fn owner_reference(operator: &SearchOperator) -> OwnerReference {
    OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: KIND.to_string(),
        name: operator.name_any(),
        uid: operator.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Labels carried by Redisgraph pods and used to find them
pub fn redisgraph_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), APP_NAME.to_string()),
        ("component".to_string(), COMPONENT.to_string()),
    ])
}

/// Labels applied to every object the operator creates
pub fn standard_labels() -> BTreeMap<String, String> {
    let mut labels = redisgraph_labels();
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        FIELD_MANAGER.to_string(),
    );
    labels
}

/// Render a label map as a Kubernetes equality selector (`k=v,k2=v2`)
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Selector matching Redisgraph pods
pub fn redisgraph_selector() -> String {
    label_selector(&redisgraph_labels())
}

/// Selector matching search collector pods
pub fn collector_selector() -> String {
    label_selector(&BTreeMap::from([
        ("app".to_string(), COLLECTOR_APP.to_string()),
        ("component".to_string(), COLLECTOR_COMPONENT.to_string()),
    ]))
}
