//! Common test utilities
//!
//! In-memory stand-ins for the informer caches and the Ingress API, plus fixtures.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ingress_operator::prelude::*;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

/// Cache keyed by `(namespace, name)`
#[derive(Debug)]
pub struct FakeCache<K> {
    kind: &'static str,
    objects: Mutex<HashMap<(String, String), Arc<K>>>,
    broken: AtomicBool,
}

impl<K> FakeCache<K> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            objects: Mutex::new(HashMap::new()),
            broken: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, namespace: &str, name: &str, object: K) {
        self.objects
            .lock()
            .expect("lock")
            .insert((namespace.to_string(), name.to_string()), Arc::new(object));
    }

    pub fn remove(&self, namespace: &str, name: &str) {
        self.objects
            .lock()
            .expect("lock")
            .remove(&(namespace.to_string(), name.to_string()));
    }

    /// Make every read fail with a non-NotFound error
    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }
}

impl<K: Send + Sync> ObjectCache<K> for FakeCache<K> {
    fn get(&self, namespace: &str, name: &str) -> Result<Arc<K>, CacheError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable {
                kind: self.kind.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.objects
            .lock()
            .expect("lock")
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| CacheError::NotFound {
                kind: self.kind.to_string(),
                key: ObjectKey::new(namespace, name).to_string(),
            })
    }
}

/// Records calls; can be told to fail creates or to report deletes as NotFound
#[derive(Debug, Default)]
pub struct FakeIngressClient {
    pub creates: Mutex<Vec<Ingress>>,
    pub deletes: Mutex<Vec<ObjectKey>>,
    fail_creates: AtomicBool,
    delete_not_found: AtomicBool,
}

impl FakeIngressClient {
    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn delete_not_found(&self, not_found: bool) {
        self.delete_not_found.store(not_found, Ordering::SeqCst);
    }

    pub fn create_count(&self) -> usize {
        self.creates.lock().expect("lock").len()
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.lock().expect("lock").len()
    }
}

#[async_trait]
impl IngressClient for FakeIngressClient {
    async fn create(&self, _namespace: &str, ingress: &Ingress) -> Result<Ingress, ClusterError> {
        self.creates.lock().expect("lock").push(ingress.clone());
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(ClusterError::Rejected {
                code: 500,
                message: "injected failure".to_string(),
            });
        }
        Ok(ingress.clone())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.deletes
            .lock()
            .expect("lock")
            .push(ObjectKey::new(namespace, name));
        if self.delete_not_found.load(Ordering::SeqCst) {
            return Err(ClusterError::NotFound);
        }
        Ok(())
    }
}

/// Caches, client and the reconciler wired over them
pub struct Harness {
    pub services: Arc<FakeCache<Service>>,
    pub ingresses: Arc<FakeCache<Ingress>>,
    pub client: Arc<FakeIngressClient>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new() -> Self {
        let services = Arc::new(FakeCache::new("Service"));
        let ingresses = Arc::new(FakeCache::new("Ingress"));
        let client = Arc::new(FakeIngressClient::default());
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&services) as Arc<dyn ObjectCache<Service>>,
            Arc::clone(&ingresses) as Arc<dyn ObjectCache<Ingress>>,
            Arc::clone(&client) as Arc<dyn IngressClient>,
            &ControllerConfig::default(),
        ));
        Self {
            services,
            ingresses,
            client,
            reconciler,
        }
    }
}

/// Sink that remembers every reported key
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<ObjectKey>>,
}

impl RecordingReporter {
    pub fn count(&self) -> usize {
        self.reports.lock().expect("lock").len()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, key: &ObjectKey, _error: &ReconcilerError) {
        self.reports.lock().expect("lock").push(key.clone());
    }
}

pub fn service(namespace: &str, name: &str, annotated: bool) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{name}")),
            annotations: annotated
                .then(|| BTreeMap::from([("ingress/http".to_string(), "true".to_string())])),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn owned_ingress(namespace: &str, name: &str, owner_kind: &str) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            owner_references: Some(vec![OwnerReference {
                api_version: "v1".to_string(),
                kind: owner_kind.to_string(),
                name: name.to_string(),
                uid: format!("uid-{name}"),
                controller: Some(true),
                block_owner_deletion: Some(true),
            }]),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Queue that re-admits failed keys immediately
pub fn immediate_queue() -> WorkQueue<ObjectKey> {
    WorkQueue::new(ItemExponentialRateLimiter::new(Duration::ZERO, Duration::ZERO))
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
