//! # Reconciler
//!
//! Brings one Service's Ingress in line with the Service's trigger annotation.
//!
//! ## Reconciliation Flow
//!
//! 1. Read the Service from the cache. A missing Service is a success: the Ingress it
//!    owned is removed by owner-reference garbage collection.
//! 2. The Ingress is desired when the Service carries the trigger annotation,
//!    whatever its value.
//! 3. Read the Ingress with the same namespace and name from the cache.
//! 4. Create it when desired and missing, delete it when present and not desired,
//!    otherwise do nothing. An existing Ingress is never updated.
//!
//! Deleting an Ingress that is already gone counts as success, so a re-sync before
//! the cache has observed a deletion is harmless.

pub mod ingress;
pub mod types;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use tracing::{debug, info};

use crate::cluster::{ClusterError, IngressClient, ObjectCache};
use crate::config::ControllerConfig;
use crate::controller::key::{KeyError, ObjectKey};
use crate::observability::metrics;

pub use ingress::IngressTemplate;
pub use types::{ReconcilerError, SyncAction};

/// Synchronizes one key. Implemented by [`Reconciler`] and by test doubles.
#[async_trait]
pub trait KeyReconciler: Send + Sync {
    async fn sync(&self, key: &ObjectKey) -> Result<SyncAction, ReconcilerError>;
}

pub struct Reconciler {
    services: Arc<dyn ObjectCache<Service>>,
    ingresses: Arc<dyn ObjectCache<Ingress>>,
    client: Arc<dyn IngressClient>,
    trigger_annotation: String,
    template: IngressTemplate,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("trigger_annotation", &self.trigger_annotation)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        services: Arc<dyn ObjectCache<Service>>,
        ingresses: Arc<dyn ObjectCache<Ingress>>,
        client: Arc<dyn IngressClient>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            services,
            ingresses,
            client,
            trigger_annotation: config.trigger_annotation.clone(),
            template: IngressTemplate::from_config(config),
        }
    }

    async fn sync_key(&self, key: &ObjectKey) -> Result<SyncAction, ReconcilerError> {
        if key.name.is_empty() {
            return Err(KeyError::MissingName.into());
        }
        let (namespace, name) = (key.namespace.as_str(), key.name.as_str());

        let service = match self.services.get(namespace, name) {
            Ok(service) => service,
            Err(e) if e.is_not_found() => {
                debug!(key = %key, "Service no longer exists, nothing to do");
                return Ok(SyncAction::PrimaryGone);
            }
            Err(source) => {
                return Err(ReconcilerError::CacheRead {
                    key: key.clone(),
                    source,
                })
            }
        };

        let desired = service
            .metadata
            .annotations
            .as_ref()
            .is_some_and(|annotations| annotations.contains_key(&self.trigger_annotation));

        let ingress_exists = match self.ingresses.get(namespace, name) {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(source) => {
                return Err(ReconcilerError::CacheRead {
                    key: key.clone(),
                    source,
                })
            }
        };

        match (desired, ingress_exists) {
            (true, false) => self.create(&service, namespace, name).await,
            (false, true) => self.delete(namespace, name).await,
            _ => Ok(SyncAction::NoOp),
        }
    }

    async fn create(
        &self,
        service: &Service,
        namespace: &str,
        name: &str,
    ) -> Result<SyncAction, ReconcilerError> {
        let ingress = self.template.build(service)?;
        match self.client.create(namespace, &ingress).await {
            Ok(_) => {
                metrics::record_ingress_operation("create", "success");
                info!(
                    operation = "create",
                    resource.name = name,
                    resource.namespace = namespace,
                    "Ingress created for {} in namespace {}",
                    name,
                    namespace
                );
                Ok(SyncAction::Created)
            }
            Err(source) => {
                metrics::record_ingress_operation("create", "error");
                Err(ReconcilerError::Create {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    source,
                })
            }
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<SyncAction, ReconcilerError> {
        match self.client.delete(namespace, name).await {
            Ok(()) => {
                metrics::record_ingress_operation("delete", "success");
                info!(
                    operation = "delete",
                    resource.name = name,
                    resource.namespace = namespace,
                    "Ingress deleted for {} in namespace {}",
                    name,
                    namespace
                );
                Ok(SyncAction::Deleted)
            }
            Err(ClusterError::NotFound) => {
                metrics::record_ingress_operation("delete", "not_found");
                debug!(
                    resource.name = name,
                    resource.namespace = namespace,
                    "Ingress already deleted"
                );
                Ok(SyncAction::AlreadyDeleted)
            }
            Err(source) => {
                metrics::record_ingress_operation("delete", "error");
                Err(ReconcilerError::Delete {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    source,
                })
            }
        }
    }
}

#[async_trait]
impl KeyReconciler for Reconciler {
    async fn sync(&self, key: &ObjectKey) -> Result<SyncAction, ReconcilerError> {
        let start = Instant::now();
        metrics::increment_reconciliations();

        let result = self.sync_key(key).await;

        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::increment_reconciliation_errors();
        }
        result
    }
}
