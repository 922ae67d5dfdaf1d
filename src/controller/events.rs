//! # Event Router
//!
//! Translates watch notifications from the Service and Ingress informers into work
//! queue keys.
//!
//! - **Service**: `Added` and `Deleted` always enqueue the Service key. `Updated`
//!   enqueues the new key unless the old and new objects are identical.
//! - **Ingress**: only `Deleted` is routed. The Ingress' controller owner reference is
//!   inspected and, when it points at a Service, the owner's key is enqueued so the
//!   Ingress gets re-created if it is still wanted.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use tracing::{debug, error};

use crate::constants::PRIMARY_KIND;
use crate::controller::key::{KeyError, ObjectKey};
use crate::controller::queue::WorkQueue;
use crate::observability::metrics;

/// One change observed by an informer
#[derive(Debug, Clone)]
pub enum Notification<K> {
    Added(Arc<K>),
    Updated { old: Arc<K>, new: Arc<K> },
    Deleted(Arc<K>),
}

impl<K> Notification<K> {
    /// Label used in logs and metrics
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::Added(_) => "added",
            Notification::Updated { .. } => "updated",
            Notification::Deleted(_) => "deleted",
        }
    }
}

/// Notification tagged with the collection it came from
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Service(Notification<Service>),
    Ingress(Notification<Ingress>),
}

/// Owner of an Ingress, copied out of its controller owner reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
}

impl OwnerRef {
    /// The owner reference flagged `controller: true`, if any
    #[must_use]
    pub fn controller_of(meta: &ObjectMeta) -> Option<Self> {
        meta.owner_references
            .as_ref()?
            .iter()
            .find(|reference| reference.controller == Some(true))
            .map(|reference| Self {
                kind: reference.kind.clone(),
                name: reference.name.clone(),
            })
    }
}

/// Routes notifications to the work queue
#[derive(Debug, Clone)]
pub struct EventRouter {
    queue: WorkQueue<ObjectKey>,
    primary_kind: String,
}

impl EventRouter {
    #[must_use]
    pub fn new(queue: WorkQueue<ObjectKey>) -> Self {
        Self {
            queue,
            primary_kind: PRIMARY_KIND.to_string(),
        }
    }

    pub fn route(&self, event: WatchEvent) {
        match event {
            WatchEvent::Service(notification) => self.on_service(notification),
            WatchEvent::Ingress(notification) => self.on_ingress(notification),
        }
    }

    pub fn on_service(&self, notification: Notification<Service>) {
        metrics::increment_events("Service", notification.event_name());
        match notification {
            Notification::Added(service) | Notification::Deleted(service) => {
                self.enqueue(ObjectKey::from_meta(&service.metadata));
            }
            Notification::Updated { old, new } => {
                if old == new {
                    debug!(service = %new.name_any(), "Service unchanged, skipping update");
                    return;
                }
                self.enqueue(ObjectKey::from_meta(&new.metadata));
            }
        }
    }

    pub fn on_ingress(&self, notification: Notification<Ingress>) {
        metrics::increment_events("Ingress", notification.event_name());
        let Notification::Deleted(ingress) = notification else {
            return;
        };

        let Some(owner) = OwnerRef::controller_of(&ingress.metadata) else {
            debug!(ingress = %ingress.name_any(), "deleted Ingress has no controller, ignoring");
            return;
        };
        if owner.kind != self.primary_kind {
            debug!(
                ingress = %ingress.name_any(),
                owner.kind = %owner.kind,
                "deleted Ingress is not owned by a Service, ignoring"
            );
            return;
        }

        let key = if owner.name.is_empty() {
            Err(KeyError::MissingName)
        } else {
            Ok(ObjectKey::new(ingress.namespace().unwrap_or_default(), owner.name))
        };
        self.enqueue(key);
    }

    fn enqueue(&self, key: Result<ObjectKey, KeyError>) {
        match key {
            Ok(key) => {
                debug!(key = %key, "enqueue");
                self.queue.add(key);
            }
            Err(e) => {
                error!(error = %e, "failed to extract key from notification, dropping event");
                metrics::increment_event_key_errors();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::backoff::ItemExponentialRateLimiter;
    use crate::controller::queue::ItemState;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn router() -> (EventRouter, WorkQueue<ObjectKey>) {
        let queue = WorkQueue::new(ItemExponentialRateLimiter::new(Duration::ZERO, Duration::ZERO));
        (EventRouter::new(queue.clone()), queue)
    }

    fn service(namespace: &str, name: &str) -> Arc<Service> {
        Arc::new(Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn ingress_owned_by(namespace: &str, name: &str, kind: &str, owner: &str) -> Arc<Ingress> {
        Arc::new(Ingress {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                owner_references: Some(vec![OwnerReference {
                    api_version: "v1".to_string(),
                    kind: kind.to_string(),
                    name: owner.to_string(),
                    uid: "uid-1".to_string(),
                    controller: Some(true),
                    block_owner_deletion: Some(true),
                }]),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_service_added_and_deleted_enqueue() {
        let (router, queue) = router();
        router.on_service(Notification::Added(service("ns1", "web")));
        assert_eq!(queue.get().await, Some(ObjectKey::new("ns1", "web")));

        router.on_service(Notification::Deleted(service("ns1", "api")));
        assert_eq!(queue.get().await, Some(ObjectKey::new("ns1", "api")));
    }

    #[test]
    fn test_service_identical_update_suppressed() {
        let (router, queue) = router();
        let svc = service("ns1", "web");
        router.on_service(Notification::Updated {
            old: Arc::clone(&svc),
            new: svc,
        });
        assert!(queue.is_empty());
    }

    #[test]
    fn test_service_changed_update_enqueues_new_key() {
        let (router, queue) = router();
        let old = service("ns1", "web");
        let mut changed = (*old).clone();
        changed.metadata.annotations = Some(BTreeMap::from([(
            "ingress/http".to_string(),
            "true".to_string(),
        )]));

        router.on_service(Notification::Updated {
            old,
            new: Arc::new(changed),
        });
        assert_eq!(
            queue.state_of(&ObjectKey::new("ns1", "web")),
            ItemState::Queued
        );
    }

    #[test]
    fn test_service_without_name_is_dropped() {
        let (router, queue) = router();
        let nameless = Arc::new(Service {
            metadata: ObjectMeta {
                namespace: Some("ns1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        });
        router.on_service(Notification::Added(nameless));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_ingress_deleted_enqueues_owner_key_once() {
        let (router, queue) = router();
        router.on_ingress(Notification::Deleted(ingress_owned_by(
            "ns1", "svc-a", "Service", "svc-a",
        )));

        assert_eq!(queue.len(), 1);
        assert_eq!(
            queue.state_of(&ObjectKey::new("ns1", "svc-a")),
            ItemState::Queued
        );
    }

    #[test]
    fn test_ingress_deleted_uses_owner_name() {
        let (router, queue) = router();
        router.on_ingress(Notification::Deleted(ingress_owned_by(
            "ns1", "route", "Service", "backend",
        )));
        assert_eq!(
            queue.state_of(&ObjectKey::new("ns1", "backend")),
            ItemState::Queued
        );
    }

    #[test]
    fn test_ingress_deleted_with_foreign_owner_ignored() {
        let (router, queue) = router();
        router.on_ingress(Notification::Deleted(ingress_owned_by(
            "ns1", "svc-a", "Deployment", "svc-a",
        )));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_ingress_deleted_without_owner_ignored() {
        let (router, queue) = router();
        let orphan = Arc::new(Ingress {
            metadata: ObjectMeta {
                name: Some("svc-a".to_string()),
                namespace: Some("ns1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        });
        router.on_ingress(Notification::Deleted(orphan));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_ingress_added_and_updated_ignored() {
        let (router, queue) = router();
        let ingress = ingress_owned_by("ns1", "svc-a", "Service", "svc-a");
        router.on_ingress(Notification::Added(Arc::clone(&ingress)));
        router.on_ingress(Notification::Updated {
            old: Arc::clone(&ingress),
            new: ingress,
        });
        assert!(queue.is_empty());
    }

    #[test]
    fn test_non_controller_owner_reference_is_not_followed() {
        let mut ingress = (*ingress_owned_by("ns1", "svc-a", "Service", "svc-a")).clone();
        if let Some(refs) = ingress.metadata.owner_references.as_mut() {
            refs[0].controller = None;
        }
        assert_eq!(OwnerRef::controller_of(&ingress.metadata), None);

        let (router, queue) = router();
        router.on_ingress(Notification::Deleted(Arc::new(ingress)));
        assert!(queue.is_empty());
    }
}
