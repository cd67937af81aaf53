//! Pod listing and deletion.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams};
use kube::Client;
use tracing::debug;

use crate::error::StoreError;
use crate::instance::Instance;
use crate::selector::ScopeSelector;

/// Source of candidate pods and the place victims are deleted from.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// List every pod that may be in `scope`. Callers still apply the scope filter.
    async fn list(&self, scope: &ScopeSelector) -> Result<Vec<Instance>, StoreError>;

    /// Delete one pod.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

/// [`InstanceStore`] backed by the Kubernetes core/v1 pods API.
#[derive(Clone)]
pub struct KubeInstanceStore {
    client: Client,
}

impl KubeInstanceStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl InstanceStore for KubeInstanceStore {
    async fn list(&self, scope: &ScopeSelector) -> Result<Vec<Instance>, StoreError> {
        let pods: Api<Pod> = match scope.single_namespace() {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };

        let list = pods.list(&ListParams::default()).await?;
        debug!(
            count = list.items.len(),
            namespace = scope.single_namespace().unwrap_or("*"),
            "Listed pods"
        );

        Ok(list.items.iter().map(Instance::from).collect())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);

        debug!(namespace = %namespace, name = %name, "Calling pod delete endpoint");
        pods.delete(name, &DeleteParams::default()).await?;

        Ok(())
    }
}
