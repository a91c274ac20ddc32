//! Object store access for the reconciler
//!
//! The reconciler only talks to the cluster through [`ObjectStore`], which keeps
//! the decision logic testable against an in-memory store while production uses
//! [`KubeStore`] over the Kubernetes API.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, Secret};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

use crate::controller::error::{Error, Result};
use crate::crd::{SearchCustomization, SearchOperator};
use crate::resources::common::FIELD_MANAGER;

/// Cluster operations the reconciler depends on
///
/// `get_*` return `Ok(None)` for missing objects. Writes surface missing
/// objects and write conflicts as errors for which [`Error::is_not_found`] and
/// [`Error::is_conflict`] hold.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_operator(&self, ns: &str, name: &str) -> Result<Option<SearchOperator>>;

    /// Write the status subresource of a SearchOperator
    async fn update_operator_status(&self, operator: &SearchOperator) -> Result<()>;

    async fn get_customization(&self, ns: &str, name: &str)
    -> Result<Option<SearchCustomization>>;

    /// Write the status subresource of a SearchCustomization
    async fn update_customization_status(&self, customization: &SearchCustomization)
    -> Result<()>;

    async fn get_secret(&self, ns: &str, name: &str) -> Result<Option<Secret>>;

    async fn create_secret(&self, secret: &Secret) -> Result<()>;

    async fn get_claim(&self, ns: &str, name: &str) -> Result<Option<PersistentVolumeClaim>>;

    async fn create_claim(&self, claim: &PersistentVolumeClaim) -> Result<()>;

    /// Delete a PersistentVolumeClaim. Returns `false` if it did not exist.
    async fn delete_claim(&self, ns: &str, name: &str) -> Result<bool>;

    async fn get_statefulset(&self, ns: &str, name: &str) -> Result<Option<StatefulSet>>;

    async fn create_statefulset(&self, sts: &StatefulSet) -> Result<()>;

    /// Replace an existing StatefulSet. The caller carries the resource version it read.
    async fn replace_statefulset(&self, sts: &StatefulSet) -> Result<()>;

    /// Delete a StatefulSet. Returns `false` if it did not exist.
    async fn delete_statefulset(&self, ns: &str, name: &str) -> Result<bool>;

    /// List pods matching an equality label selector (`k=v,k2=v2`)
    async fn list_pods(&self, ns: &str, selector: &str) -> Result<Vec<Pod>>;

    /// Delete a pod. Returns `false` if it did not exist.
    async fn delete_pod(&self, ns: &str, name: &str) -> Result<bool>;
}

/// [`ObjectStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, ns: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), ns)
    }
}

fn namespace_of<K: kube::Resource>(resource: &K) -> Result<String> {
    resource
        .namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))
}

/// Treat a 404 on delete as "already gone"
fn deleted<T>(result: std::result::Result<T, kube::Error>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_operator(&self, ns: &str, name: &str) -> Result<Option<SearchOperator>> {
        Ok(self.api::<SearchOperator>(ns).get_opt(name).await?)
    }

    async fn update_operator_status(&self, operator: &SearchOperator) -> Result<()> {
        let ns = namespace_of(operator)?;
        let patch = serde_json::json!({ "status": operator.status });
        self.api::<SearchOperator>(&ns)
            .patch_status(
                &operator.name_any(),
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await?;
        debug!("Updated SearchOperator status: {}", operator.name_any());
        Ok(())
    }

    async fn get_customization(
        &self,
        ns: &str,
        name: &str,
    ) -> Result<Option<SearchCustomization>> {
        Ok(self.api::<SearchCustomization>(ns).get_opt(name).await?)
    }

    async fn update_customization_status(
        &self,
        customization: &SearchCustomization,
    ) -> Result<()> {
        let ns = namespace_of(customization)?;
        let patch = serde_json::json!({ "status": customization.status });
        self.api::<SearchCustomization>(&ns)
            .patch_status(
                &customization.name_any(),
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await?;
        debug!(
            "Updated SearchCustomization status: {}",
            customization.name_any()
        );
        Ok(())
    }

    async fn get_secret(&self, ns: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self.api::<Secret>(ns).get_opt(name).await?)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<()> {
        let ns = namespace_of(secret)?;
        self.api::<Secret>(&ns)
            .create(&PostParams::default(), secret)
            .await?;
        debug!("Created Secret: {}", secret.name_any());
        Ok(())
    }

    async fn get_claim(&self, ns: &str, name: &str) -> Result<Option<PersistentVolumeClaim>> {
        Ok(self.api::<PersistentVolumeClaim>(ns).get_opt(name).await?)
    }

    async fn create_claim(&self, claim: &PersistentVolumeClaim) -> Result<()> {
        let ns = namespace_of(claim)?;
        self.api::<PersistentVolumeClaim>(&ns)
            .create(&PostParams::default(), claim)
            .await?;
        debug!("Created PersistentVolumeClaim: {}", claim.name_any());
        Ok(())
    }

    async fn delete_claim(&self, ns: &str, name: &str) -> Result<bool> {
        deleted(
            self.api::<PersistentVolumeClaim>(ns)
                .delete(name, &DeleteParams::background())
                .await,
        )
    }

    async fn get_statefulset(&self, ns: &str, name: &str) -> Result<Option<StatefulSet>> {
        Ok(self.api::<StatefulSet>(ns).get_opt(name).await?)
    }

    async fn create_statefulset(&self, sts: &StatefulSet) -> Result<()> {
        let ns = namespace_of(sts)?;
        self.api::<StatefulSet>(&ns)
            .create(&PostParams::default(), sts)
            .await?;
        debug!("Created StatefulSet: {}", sts.name_any());
        Ok(())
    }

    async fn replace_statefulset(&self, sts: &StatefulSet) -> Result<()> {
        let ns = namespace_of(sts)?;
        self.api::<StatefulSet>(&ns)
            .replace(&sts.name_any(), &PostParams::default(), sts)
            .await?;
        debug!("Replaced StatefulSet: {}", sts.name_any());
        Ok(())
    }

    async fn delete_statefulset(&self, ns: &str, name: &str) -> Result<bool> {
        deleted(
            self.api::<StatefulSet>(ns)
                .delete(name, &DeleteParams::background())
                .await,
        )
    }

    async fn list_pods(&self, ns: &str, selector: &str) -> Result<Vec<Pod>> {
        let pods = self
            .api::<Pod>(ns)
            .list(&ListParams::default().labels(selector))
            .await?;
        Ok(pods.items)
    }

    async fn delete_pod(&self, ns: &str, name: &str) -> Result<bool> {
        deleted(
            self.api::<Pod>(ns)
                .delete(name, &DeleteParams::default())
                .await,
        )
    }
}
