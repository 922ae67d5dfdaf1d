//! [`IngressClient`] backed by `kube::Api<Ingress>`.

use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;

use crate::cluster::{ClusterError, IngressClient};

#[derive(Clone)]
pub struct KubeIngressClient {
    client: Client,
}

impl std::fmt::Debug for KubeIngressClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeIngressClient").finish_non_exhaustive()
    }
}

impl KubeIngressClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Ingress> {
        if namespace.is_empty() {
            Api::default_namespaced(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }
}

#[async_trait]
impl IngressClient for KubeIngressClient {
    async fn create(&self, namespace: &str, ingress: &Ingress) -> Result<Ingress, ClusterError> {
        Ok(self
            .api(namespace)
            .create(&PostParams::default(), ingress)
            .await?)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        // Either the deleted object or a pending-deletion status; both mean accepted
        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}
