//! # Cluster Access
//!
//! Narrow interfaces between the reconciliation core and the Kubernetes API.
//!
//! - [`ObjectCache`]: point-in-time reads from a watch-fed local cache
//! - [`IngressClient`]: create and delete calls against the API server
//!
//! Both are traits so the worker pool and reconciler can run against in-memory fakes.

pub mod client;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
use thiserror::Error;

pub use client::KubeIngressClient;
pub use store::ReflectorCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("{kind} {key} not found in cache")]
    NotFound { kind: String, key: String },
    #[error("{kind} cache read failed: {reason}")]
    Unavailable { kind: String, reason: String },
}

impl CacheError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("object not found")]
    NotFound,
    #[error("API request rejected with status {code}: {message}")]
    Rejected { code: u16, message: String },
    #[error("API request failed: {0}")]
    Request(#[source] kube::Error),
}

impl From<kube::Error> for ClusterError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(api_err) if api_err.code == 404 => ClusterError::NotFound,
            kube::Error::Api(api_err) => ClusterError::Rejected {
                code: api_err.code,
                message: api_err.message,
            },
            other => ClusterError::Request(other),
        }
    }
}

/// Read side of an informer cache
pub trait ObjectCache<K>: Send + Sync {
    /// Look up one object by namespace and name
    ///
    /// # Errors
    ///
    /// [`CacheError::NotFound`] when the cache holds no such object.
    fn get(&self, namespace: &str, name: &str) -> Result<Arc<K>, CacheError>;
}

/// Write side of the API server, restricted to what the reconciler needs
#[async_trait]
pub trait IngressClient: Send + Sync {
    /// Create `ingress` in `namespace`
    async fn create(&self, namespace: &str, ingress: &Ingress) -> Result<Ingress, ClusterError>;

    /// Delete the Ingress `namespace/name`
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}
