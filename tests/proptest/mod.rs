// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for the persistence decision engine and resource generation
//!
//! These tests use proptest to generate random inputs and verify that:
//! 1. Every probe outcome maps to exactly one step, and only the default
//!    preference ever falls back
//! 2. Storage settings validation never panics and is deterministic
//! 3. Generated workloads always carry the requested storage mode
//! 4. The short probe wait is only planned from a matching published status

use std::collections::BTreeMap;
use std::time::Duration;

use kube::core::ObjectMeta;
use proptest::prelude::*;

use search_operator::controller::config::OperatorConfig;
use search_operator::controller::probe::ProbeOutcome;
use search_operator::controller::state_machine::{
    PersistencePreference, Step, failed_status, fallback_mode, next_step, plan_first_probe,
    resolve_settings, settled_status,
};
use search_operator::controller::validation::{validate_storage_class, validate_storage_size};
use search_operator::crd::{
    PersistenceStatus, PodResource, SearchCustomization, SearchCustomizationSpec,
    SearchCustomizationStatus, SearchOperator, SearchOperatorSpec, SearchOperatorStatus,
};
use search_operator::resources::StorageMode;
use search_operator::resources::common::{CUSTOMIZATION_NAME, OPERATOR_NAME};
use search_operator::resources::redisgraph::{
    build_volume_claim, build_workload, storage_mode_of, template_matches,
};

const NAMESPACE: &str = "open-cluster-management";

// =============================================================================
// Helper functions
// =============================================================================

fn config() -> OperatorConfig {
    OperatorConfig {
        deploy_redisgraph: true,
        storage_class: String::new(),
        default_storage_size: "10Gi".to_string(),
        pod_wait: Duration::from_secs(180),
        fast_pod_wait: Duration::from_secs(5),
        poll_interval: Duration::from_secs(1),
    }
}

fn operator(
    generation: i64,
    resources: PodResource,
    node_selector: BTreeMap<String, String>,
    status: Option<SearchOperatorStatus>,
) -> SearchOperator {
    SearchOperator {
        metadata: ObjectMeta {
            name: Some(OPERATOR_NAME.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            uid: Some("operator-uid".to_string()),
            generation: Some(generation),
            ..Default::default()
        },
        spec: SearchOperatorSpec {
            redisgraph_resource: resources,
            node_selector,
            ..Default::default()
        },
        status,
    }
}

fn customization(
    spec: SearchCustomizationSpec,
    status: Option<SearchCustomizationStatus>,
) -> SearchCustomization {
    SearchCustomization {
        metadata: ObjectMeta {
            name: Some(CUSTOMIZATION_NAME.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..Default::default()
        },
        spec,
        status,
    }
}

// =============================================================================
// Strategies
// =============================================================================

fn preference() -> impl Strategy<Value = PersistencePreference> {
    prop_oneof![
        Just(PersistencePreference::Default),
        any::<bool>().prop_map(PersistencePreference::Explicit),
    ]
}

fn storage_mode() -> impl Strategy<Value = StorageMode> {
    prop_oneof![Just(StorageMode::Durable), Just(StorageMode::Ephemeral)]
}

fn probe_outcome() -> impl Strategy<Value = ProbeOutcome> {
    prop_oneof![
        Just(ProbeOutcome::Ready),
        Just(ProbeOutcome::Unschedulable),
        Just(ProbeOutcome::TimedOut),
    ]
}

fn persistence_status() -> impl Strategy<Value = PersistenceStatus> {
    prop::sample::select(PersistenceStatus::ALL.to_vec())
}

/// Generate a valid storage size (shrinks toward smaller values)
fn valid_storage_size() -> impl Strategy<Value = String> {
    prop_oneof![
        (1..=999u32).prop_map(|n| format!("{}Mi", n)),
        (1..=100u32).prop_map(|n| format!("{}Gi", n)),
        (1..=10u32).prop_map(|n| format!("{}Ti", n)),
        (1..=100u32).prop_map(|n| format!("{}G", n)),
        (1..=u32::MAX).prop_map(|n| n.to_string()),
    ]
}

/// Generate an invalid storage size (shrinks toward simpler invalid cases)
fn invalid_storage_size() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("".to_string()),
        Just("0Gi".to_string()),
        (1..=100u32).prop_map(|n| format!("{}GB", n)),
        (1..=100u32).prop_map(|n| format!("-{}Gi", n)),
        (1..=100u32).prop_map(|n| format!("{} Gi", n)),
        (1..=100u32).prop_map(|n| format!("{}.5.5Gi", n)),
        "[a-z]{3,8}".prop_map(|s| s),
    ]
}

/// Generate a DNS-1123 storage class name
fn valid_storage_class() -> impl Strategy<Value = String> {
    "[a-z0-9]([a-z0-9-]{0,20}[a-z0-9])?(\\.[a-z0-9]{1,10})?"
}

fn pod_resource() -> impl Strategy<Value = PodResource> {
    (1..=1000u32, 1..=4096u32, 1..=4000u32, 1..=16u32).prop_map(
        |(req_cpu, req_mem, lim_cpu, lim_mem)| PodResource {
            request_cpu: format!("{}m", req_cpu),
            request_memory: format!("{}Mi", req_mem),
            limit_cpu: format!("{}m", lim_cpu),
            limit_memory: format!("{}Gi", lim_mem),
        },
    )
}

fn node_selector() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-z]{1,8}(/[a-z]{1,8})?", "[a-z0-9]{0,8}", 0..3)
}

fn customization_spec() -> impl Strategy<Value = SearchCustomizationSpec> {
    (
        prop::option::of(any::<bool>()),
        prop::option::of(prop_oneof![valid_storage_class(), ".*"]),
        prop::option::of(prop_oneof![valid_storage_size(), ".*"]),
    )
        .prop_map(|(persistence, storage_class, storage_size)| SearchCustomizationSpec {
            persistence,
            storage_class,
            storage_size,
        })
}

fn customization_status() -> impl Strategy<Value = SearchCustomizationStatus> {
    (
        prop::option::of(persistence_status()),
        prop::option::of(any::<bool>()),
        prop::option::of(valid_storage_size()),
    )
        .prop_map(|(persistence, persist, storage_size)| SearchCustomizationStatus {
            persistence,
            persist,
            storage_class: None,
            storage_size,
        })
}

fn operator_status() -> impl Strategy<Value = SearchOperatorStatus> {
    (
        prop::option::of(persistence_status()),
        prop::option::of(1..=5i64),
    )
        .prop_map(|(persistence, observed_generation)| SearchOperatorStatus {
            persistence,
            deploy_redisgraph: Some(true),
            observed_generation,
        })
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A ready probe always settles on a running status
    #[test]
    fn prop_ready_always_settles(pref in preference(), mode in storage_mode()) {
        match next_step(pref, mode, ProbeOutcome::Ready) {
            Step::Settled(status) => {
                prop_assert!(status.is_running());
                prop_assert_eq!(status, settled_status(pref, mode));
            }
            other => prop_assert!(false, "ready probe produced {:?}", other),
        }
    }

    /// Only the default preference on durable storage falls back, and only to EmptyDir
    #[test]
    fn prop_fallback_only_from_default_durable(
        pref in preference(),
        mode in storage_mode(),
        outcome in probe_outcome(),
    ) {
        let step = next_step(pref, mode, outcome);
        match step {
            Step::FallBack(next) => {
                prop_assert_eq!(pref, PersistencePreference::Default);
                prop_assert_eq!(mode, StorageMode::Durable);
                prop_assert_eq!(next, StorageMode::Ephemeral);
                prop_assert!(outcome != ProbeOutcome::Ready);
            }
            Step::Failed(status) => {
                prop_assert!(!status.is_running());
                prop_assert_eq!(status, failed_status(pref));
                prop_assert!(fallback_mode(pref, mode).is_none());
            }
            Step::Settled(_) => prop_assert_eq!(outcome, ProbeOutcome::Ready),
        }
    }

    /// An explicit durable preference never publishes an EmptyDir status
    #[test]
    fn prop_explicit_durable_never_degrades(outcome in probe_outcome()) {
        let pref = PersistencePreference::Explicit(true);
        let step = next_step(pref, pref.initial_mode(), outcome);
        prop_assert!(matches!(
            step,
            Step::Settled(PersistenceStatus::UsingDurableStorage)
                | Step::Failed(PersistenceStatus::FailedUsingDurableStorage)
        ));
    }

    #[test]
    fn prop_valid_storage_size_accepted(size in valid_storage_size()) {
        prop_assert!(validate_storage_size(&size).is_ok(), "rejected {}", size);
    }

    #[test]
    fn prop_invalid_storage_size_rejected(size in invalid_storage_size()) {
        prop_assert!(validate_storage_size(&size).is_err(), "accepted {:?}", size);
    }

    /// Arbitrary input never panics and always gives the same answer
    #[test]
    fn prop_storage_size_validation_deterministic(size in ".*") {
        let first = validate_storage_size(&size).is_ok();
        let second = validate_storage_size(&size).is_ok();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_valid_storage_class_accepted(class in valid_storage_class()) {
        prop_assert!(validate_storage_class(&class).is_ok(), "rejected {}", class);
    }

    #[test]
    fn prop_uppercase_storage_class_rejected(class in "[A-Z][a-zA-Z]{0,10}") {
        prop_assert!(validate_storage_class(&class).is_err());
    }

    /// Resolved settings are always usable, whatever the customization holds
    #[test]
    fn prop_resolved_settings_always_valid(spec in prop::option::of(customization_spec())) {
        let customization = spec.map(|spec| customization(spec, None));
        let settings = resolve_settings(customization.as_ref(), &config());

        prop_assert!(validate_storage_size(&settings.storage_size).is_ok());
        prop_assert!(
            settings.storage_class.is_empty()
                || validate_storage_class(&settings.storage_class).is_ok()
        );
        let expected = match customization.as_ref().and_then(|c| c.spec.persistence) {
            Some(persist) => PersistencePreference::Explicit(persist),
            None => PersistencePreference::Default,
        };
        prop_assert_eq!(settings.preference, expected);
    }

    /// The generated StatefulSet always mounts the requested volume source
    #[test]
    fn prop_workload_carries_storage_mode(
        mode in storage_mode(),
        resources in pod_resource(),
        selector in node_selector(),
    ) {
        let operator = operator(1, resources, selector, None);
        let sts = build_workload(&operator, mode);

        prop_assert_eq!(storage_mode_of(&sts), Some(mode));
        prop_assert!(template_matches(&sts, &build_workload(&operator, mode)));
    }

    /// Changing the container resources is always detected as drift
    #[test]
    fn prop_resource_change_is_drift(
        mode in storage_mode(),
        a in pod_resource(),
        b in pod_resource(),
    ) {
        let first = build_workload(&operator(1, a.clone(), BTreeMap::new(), None), mode);
        let second = build_workload(&operator(2, b.clone(), BTreeMap::new(), None), mode);
        prop_assert_eq!(template_matches(&first, &second), a == b);
    }

    #[test]
    fn prop_claim_requests_resolved_size(size in valid_storage_size()) {
        let claim = build_volume_claim(
            &operator(1, PodResource::default(), BTreeMap::new(), None),
            "",
            &size,
        );
        let spec = claim.spec.unwrap();
        prop_assert!(spec.storage_class_name.is_none());
        let requests = spec.resources.unwrap().requests.unwrap();
        prop_assert_eq!(&requests.get("storage").unwrap().0, &size);
    }

    /// Without a published status the first probe always uses the full wait
    #[test]
    fn prop_no_status_never_fast(
        generation in 1..=5i64,
        spec in prop::option::of(customization_spec()),
    ) {
        let operator = operator(generation, PodResource::default(), BTreeMap::new(), None);
        let customization = spec.map(|spec| customization(spec, None));
        let settings = resolve_settings(customization.as_ref(), &config());

        let plan = plan_first_probe(&operator, customization.as_ref(), &settings, &config());
        prop_assert!(!plan.fast);
        prop_assert_eq!(plan.wait, config().pod_wait);
        prop_assert_eq!(plan.mode, settings.preference.initial_mode());
    }

    /// A fast plan always targets the status that was last published
    #[test]
    fn prop_fast_plan_matches_published_status(
        generation in 1..=5i64,
        status in operator_status(),
        spec in prop::option::of(customization_spec()),
        applied in prop::option::of(customization_status()),
    ) {
        let previous = status.persistence;
        let observed = status.observed_generation;
        let operator = operator(generation, PodResource::default(), BTreeMap::new(), Some(status));
        let customization = spec.map(|spec| customization(spec, applied));
        let settings = resolve_settings(customization.as_ref(), &config());

        let plan = plan_first_probe(&operator, customization.as_ref(), &settings, &config());
        if plan.fast {
            let previous = previous.unwrap();
            prop_assert!(previous.is_running());
            prop_assert_eq!(observed, Some(generation));
            prop_assert_eq!(settled_status(settings.preference, plan.mode), previous);
            prop_assert_eq!(plan.wait, config().fast_pod_wait);
        } else {
            prop_assert_eq!(plan.wait, config().pod_wait);
        }
    }
}

// =============================================================================
// Edge Case Tests
// =============================================================================

mod edge_case_tests {
    use super::*;

    #[test]
    fn test_every_status_has_distinct_text() {
        let mut seen: Vec<&str> = PersistenceStatus::ALL.iter().map(|s| s.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), PersistenceStatus::ALL.len());
    }

    #[test]
    fn test_failure_statuses_are_not_running() {
        for status in [
            PersistenceStatus::FailedUsingDurableStorage,
            PersistenceStatus::FailedNoPersistence,
            PersistenceStatus::FailedDegraded,
            PersistenceStatus::DeployDisabled,
        ] {
            assert!(!status.is_running(), "{:?}", status);
        }
    }
}
