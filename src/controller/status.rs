//! Status publication for SearchOperator and SearchCustomization
//!
//! Every reconcile exit path publishes exactly one [`StatusReport`]. The
//! persistence text is mirrored into the SearchCustomization whenever one
//! exists, so the two objects never disagree.

use kube::ResourceExt;
use tracing::{debug, info};

use crate::controller::error::{Error, Result};
use crate::controller::state_machine::StorageSettings;
use crate::controller::store::ObjectStore;
use crate::crd::{
    PersistenceStatus, SearchCustomization, SearchCustomizationStatus, SearchOperator,
    SearchOperatorStatus,
};
use crate::resources::common::CUSTOMIZATION_NAME;

/// Outcome of a reconcile pass, ready to be written to status
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    pub persistence: PersistenceStatus,
    pub deploy_redisgraph: bool,
    /// Settings to record as applied. Only set for running outcomes.
    pub applied: Option<StorageSettings>,
}

impl StatusReport {
    /// Redisgraph is running with `settings`
    pub fn settled(persistence: PersistenceStatus, settings: &StorageSettings) -> Self {
        Self {
            persistence,
            deploy_redisgraph: true,
            applied: Some(settings.clone()),
        }
    }

    /// Redisgraph could not be started
    pub fn failed(persistence: PersistenceStatus) -> Self {
        Self {
            persistence,
            deploy_redisgraph: true,
            applied: None,
        }
    }

    /// Deployment is switched off
    pub fn deploy_disabled() -> Self {
        Self {
            persistence: PersistenceStatus::DeployDisabled,
            deploy_redisgraph: false,
            applied: None,
        }
    }
}

/// Writes status reports through an [`ObjectStore`]
pub struct StatusManager<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> StatusManager<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Publish `report` to the SearchOperator and its SearchCustomization
    ///
    /// Both objects are re-fetched before anything is written. A missing
    /// SearchOperator, or a missing SearchCustomization that the caller
    /// passed in, fails with [`Error::NotFound`] and writes nothing. When the
    /// caller had no customization but one exists now, its persistence text
    /// is still mirrored. Unchanged statuses are not rewritten.
    ///
    /// Returns whether anything was written.
    pub async fn publish(
        &self,
        operator: &SearchOperator,
        customization: Option<&SearchCustomization>,
        report: &StatusReport,
    ) -> Result<bool> {
        let ns = operator
            .namespace()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        let name = operator.name_any();

        let mut current = self
            .store
            .get_operator(&ns, &name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("SearchOperator {}/{}", ns, name)))?;

        let customization_name = customization
            .map(|c| c.name_any())
            .unwrap_or_else(|| CUSTOMIZATION_NAME.to_string());
        let current_customization = self
            .store
            .get_customization(&ns, &customization_name)
            .await?;
        if customization.is_some() && current_customization.is_none() {
            return Err(Error::NotFound(format!(
                "SearchCustomization {}/{}",
                ns, customization_name
            )));
        }

        let mut written = false;

        let desired = SearchOperatorStatus {
            persistence: Some(report.persistence),
            deploy_redisgraph: Some(report.deploy_redisgraph),
            observed_generation: operator.metadata.generation,
        };
        if current.status.as_ref() != Some(&desired) {
            current.status = Some(desired);
            self.store.update_operator_status(&current).await?;
            written = true;
        }

        if let Some(mut current_customization) = current_customization {
            let previous = current_customization.status.clone().unwrap_or_default();
            let desired = customization_status(&previous, report, customization.is_some());
            if current_customization.status.as_ref() != Some(&desired) {
                current_customization.status = Some(desired);
                self.store
                    .update_customization_status(&current_customization)
                    .await?;
                written = true;
            }
        }

        if written {
            info!(status = %report.persistence, "Published Redisgraph status");
        } else {
            debug!(status = %report.persistence, "Status unchanged");
        }
        Ok(written)
    }
}

/// Next SearchCustomization status for `report`
///
/// Applied settings are only recorded when the report carries them and the
/// customization took part in resolving them.
fn customization_status(
    previous: &SearchCustomizationStatus,
    report: &StatusReport,
    resolved_from_customization: bool,
) -> SearchCustomizationStatus {
    let mut next = SearchCustomizationStatus {
        persistence: Some(report.persistence),
        ..previous.clone()
    };
    if let (Some(applied), true) = (&report.applied, resolved_from_customization) {
        next.persist = Some(applied.preference.wants_durable());
        next.storage_class = if applied.storage_class.is_empty() {
            None
        } else {
            Some(applied.storage_class.clone())
        };
        next.storage_size = Some(applied.storage_size.clone());
    }
    next
}
