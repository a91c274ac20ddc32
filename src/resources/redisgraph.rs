//! Redisgraph workload resources
//!
//! Redisgraph runs as a single-replica StatefulSet. Its `persist` volume is
//! either the operator-created PersistentVolumeClaim or an EmptyDir. Volume
//! sources are immutable on a StatefulSet, so switching mode means deleting
//! and recreating it rather than patching.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, EnvVar, EnvVarSource,
    LocalObjectReference, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, Pod, PodSecurityContext, PodSpec, PodTemplateSpec, Probe,
    ResourceRequirements, SecretKeySelector, SecurityContext, TCPSocketAction, Volume,
    VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use kube::core::ObjectMeta;

use crate::crd::{PodResource, SearchOperator};
use crate::resources::common::{
    PVC_NAME, SECRET_NAME, SECRET_PASSWORD_KEY, STATEFULSET_NAME, owner_reference,
    redisgraph_labels, standard_labels,
};

/// Default Redisgraph image, overridable through `searchImageOverrides.redisgraphTls`
pub const DEFAULT_REDISGRAPH_IMAGE: &str = "quay.io/stolostron/redisgraph-tls:2.4.0";

/// Name of the data volume in the pod template
pub const DATA_VOLUME: &str = "persist";

/// Mount path of the data volume
pub const DATA_MOUNT_PATH: &str = "/redis-data";

/// Port Redisgraph listens on
pub const REDIS_PORT: i32 = 6380;

/// Non-root user Redisgraph runs as
const REDIS_USER: i64 = 10001;

/// Volume source used for the Redisgraph data directory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageMode {
    /// PersistentVolumeClaim-backed data
    Durable,
    /// EmptyDir-backed data, lost when the pod is recreated
    Ephemeral,
}

impl StorageMode {
    pub fn from_persistence(use_persistence: bool) -> Self {
        if use_persistence {
            StorageMode::Durable
        } else {
            StorageMode::Ephemeral
        }
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, StorageMode::Durable)
    }
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMode::Durable => write!(f, "durable"),
            StorageMode::Ephemeral => write!(f, "ephemeral"),
        }
    }
}

/// Convert the SearchOperator resource pair into container requirements
fn container_resources(resources: &PodResource) -> ResourceRequirements {
    ResourceRequirements {
        requests: Some(BTreeMap::from([
            ("cpu".to_string(), Quantity(resources.request_cpu.clone())),
            ("memory".to_string(), Quantity(resources.request_memory.clone())),
        ])),
        limits: Some(BTreeMap::from([
            ("cpu".to_string(), Quantity(resources.limit_cpu.clone())),
            ("memory".to_string(), Quantity(resources.limit_memory.clone())),
        ])),
        ..Default::default()
    }
}

fn data_volume(mode: StorageMode) -> Volume {
    match mode {
        StorageMode::Durable => Volume {
            name: DATA_VOLUME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: PVC_NAME.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        },
        StorageMode::Ephemeral => Volume {
            name: DATA_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    }
}

/// Build the Redisgraph StatefulSet for the given storage mode
pub fn build_workload(operator: &SearchOperator, mode: StorageMode) -> StatefulSet {
    let labels = redisgraph_labels();
    let image = operator
        .spec
        .search_image_overrides
        .redisgraph_tls
        .clone()
        .filter(|image| !image.is_empty())
        .unwrap_or_else(|| DEFAULT_REDISGRAPH_IMAGE.to_string());

    let env_vars = vec![
        EnvVar {
            name: "REDIS_PASSWORD".to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: SECRET_NAME.to_string(),
                    key: SECRET_PASSWORD_KEY.to_string(),
                    optional: Some(false),
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        EnvVar {
            name: "REDIS_GRAPH_SSL".to_string(),
            value: Some("true".to_string()),
            ..Default::default()
        },
        EnvVar {
            name: "PERSISTENCE".to_string(),
            value: Some(mode.is_durable().to_string()),
            ..Default::default()
        },
    ];

    let readiness_probe = Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(REDIS_PORT),
            ..Default::default()
        }),
        initial_delay_seconds: Some(5),
        period_seconds: Some(10),
        timeout_seconds: Some(2),
        failure_threshold: Some(3),
        ..Default::default()
    };

    let container = Container {
        name: "redisgraph".to_string(),
        image: Some(image),
        image_pull_policy: Some("IfNotPresent".to_string()),
        ports: Some(vec![ContainerPort {
            container_port: REDIS_PORT,
            name: Some("redisgraph".to_string()),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(env_vars),
        volume_mounts: Some(vec![VolumeMount {
            name: DATA_VOLUME.to_string(),
            mount_path: DATA_MOUNT_PATH.to_string(),
            ..Default::default()
        }]),
        resources: Some(container_resources(&operator.spec.redisgraph_resource)),
        readiness_probe: Some(readiness_probe),
        security_context: Some(SecurityContext {
            allow_privilege_escalation: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    };

    let node_selector = if operator.spec.node_selector.is_empty() {
        None
    } else {
        Some(operator.spec.node_selector.clone())
    };

    let image_pull_secrets = operator
        .spec
        .pull_secret
        .as_ref()
        .filter(|s| !s.is_empty())
        .map(|name| {
            vec![LocalObjectReference {
                name: name.clone(),
            }]
        });

    StatefulSet {
        metadata: ObjectMeta {
            name: Some(STATEFULSET_NAME.to_string()),
            namespace: operator.namespace(),
            labels: Some(standard_labels()),
            owner_references: Some(vec![owner_reference(operator)]),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            replicas: Some(1),
            service_name: Some(STATEFULSET_NAME.to_string()),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(vec![data_volume(mode)]),
                    node_selector,
                    image_pull_secrets,
                    security_context: Some(PodSecurityContext {
                        run_as_user: Some(REDIS_USER),
                        run_as_non_root: Some(true),
                        fs_group: Some(REDIS_USER),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the PersistentVolumeClaim backing durable mode
///
/// An empty `storage_class` leaves the class unset so the platform default applies.
pub fn build_volume_claim(
    operator: &SearchOperator,
    storage_class: &str,
    storage_size: &str,
) -> PersistentVolumeClaim {
    let storage_class_name = if storage_class.is_empty() {
        None
    } else {
        Some(storage_class.to_string())
    };

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(PVC_NAME.to_string()),
            namespace: operator.namespace(),
            labels: Some(standard_labels()),
            owner_references: Some(vec![owner_reference(operator)]),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name,
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(storage_size.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Storage mode of an existing StatefulSet, read from its `persist` volume
pub fn storage_mode_of(sts: &StatefulSet) -> Option<StorageMode> {
    spec_storage_mode(sts.spec.as_ref()?.template.spec.as_ref()?)
}

/// Storage mode a Redisgraph pod was created with
pub fn pod_storage_mode(pod: &Pod) -> Option<StorageMode> {
    spec_storage_mode(pod.spec.as_ref()?)
}

fn spec_storage_mode(spec: &PodSpec) -> Option<StorageMode> {
    let volume = spec
        .volumes
        .as_ref()?
        .iter()
        .find(|v| v.name == DATA_VOLUME)?;

    if volume.persistent_volume_claim.is_some() {
        Some(StorageMode::Durable)
    } else if volume.empty_dir.is_some() {
        Some(StorageMode::Ephemeral)
    } else {
        None
    }
}

/// Whether an existing claim was created with `storage_class` and `storage_size`
///
/// An empty `storage_class` accepts whatever class the platform defaulted to.
pub fn claim_matches(claim: &PersistentVolumeClaim, storage_class: &str, storage_size: &str) -> bool {
    let Some(spec) = claim.spec.as_ref() else {
        return false;
    };
    let requested = spec
        .resources
        .as_ref()
        .and_then(|r| r.requests.as_ref())
        .and_then(|r| r.get("storage"))
        .map(|q| q.0.as_str());

    let class_matches =
        storage_class.is_empty() || spec.storage_class_name.as_deref() == Some(storage_class);
    class_matches && requested == Some(storage_size)
}

/// Whether the operator-managed fields of two pod templates agree
///
/// Only fields this module sets are compared, since the API server fills in
/// defaults on everything else.
pub fn template_matches(existing: &StatefulSet, desired: &StatefulSet) -> bool {
    let pod_spec = |sts: &StatefulSet| {
        sts.spec
            .as_ref()
            .and_then(|s| s.template.spec.clone())
            .unwrap_or_default()
    };
    let (current, wanted) = (pod_spec(existing), pod_spec(desired));

    let container_fields = |spec: &PodSpec| {
        spec.containers
            .iter()
            .map(|c| (c.name.clone(), c.image.clone(), c.env.clone(), c.resources.clone()))
            .collect::<Vec<_>>()
    };

    container_fields(&current) == container_fields(&wanted)
        && current.node_selector == wanted.node_selector
        && current.image_pull_secrets == wanted.image_pull_secrets
}
