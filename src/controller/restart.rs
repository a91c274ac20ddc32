//! Restart of the search collector after storage changes
//!
//! The collector caches what it has sent to Redisgraph. When Redisgraph comes
//! back on different storage, deleting the collector pods makes their
//! Deployment recreate them and resend everything.

use kube::ResourceExt;
use tracing::{info, warn};

use crate::controller::error::Result;
use crate::controller::store::ObjectStore;
use crate::resources::common::collector_selector;

/// Delete every collector pod in `ns`
///
/// Individual delete failures are logged and skipped. Returns the number of
/// pods deleted.
pub async fn restart_dependents(store: &dyn ObjectStore, ns: &str) -> Result<usize> {
    let pods = store.list_pods(ns, &collector_selector()).await?;
    if pods.is_empty() {
        info!("No search collector pods to restart");
        return Ok(0);
    }

    let mut restarted = 0;
    for pod in &pods {
        let name = pod.name_any();
        match store.delete_pod(ns, &name).await {
            Ok(true) => {
                info!(pod = %name, "Restarted search collector pod");
                restarted += 1;
            }
            Ok(false) => {}
            Err(e) => warn!(pod = %name, error = %e, "Failed to restart search collector pod"),
        }
    }

    Ok(restarted)
}
