//! # Informers
//!
//! Watch streams feeding the reflector caches and the event router.
//!
//! A `kube_runtime` watcher only reports the current state of each object. The
//! [`NotificationTranslator`] rebuilds the `Added` / `Updated { old, new }` /
//! `Deleted` notifications the router expects by comparing each event with the cache
//! before the event is applied:
//!
//! - an object the cache does not hold yet is `Added`, one it already holds is
//!   `Updated` with the cached copy as `old`
//! - after a relist, cached objects missing from the new listing are `Deleted`
//!
//! Notifications are routed only after the cache has been updated, so a worker that
//! picks up the key reads state at least as new as the notification. Objects of a
//! (re)list are routed together once the listing is complete.

use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{Api, Client, Resource};
use kube_runtime::reflector::{self, ObjectRef, Store};
use kube_runtime::watcher::{self, watcher};
use kube_runtime::WatchStreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Instrument};

use crate::controller::events::{EventRouter, Notification, WatchEvent};
use crate::runtime::error_policy::handle_watch_stream_error;

/// Turns watcher events into router notifications
pub struct NotificationTranslator<K>
where
    K: Resource,
    K::DynamicType: Eq + Hash + Clone,
{
    /// Objects reported by the (re)list in progress
    seen: HashSet<ObjectRef<K>>,
    /// Notifications of the (re)list in progress
    pending: Vec<Notification<K>>,
}

impl<K> fmt::Debug for NotificationTranslator<K>
where
    K: Resource,
    K::DynamicType: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationTranslator")
            .field("seen", &self.seen.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<K> Default for NotificationTranslator<K>
where
    K: Resource,
    K::DynamicType: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
            pending: Vec::new(),
        }
    }
}

impl<K> NotificationTranslator<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Eq + Hash + Clone + Default,
{
    /// Notifications for `event`, given the cache as it was before applying it
    ///
    /// (Re)list events are held back and returned all at once on `InitDone`.
    pub fn translate(&mut self, cache: &Store<K>, event: &watcher::Event<K>) -> Vec<Notification<K>> {
        match event {
            watcher::Event::Apply(obj) => vec![Self::applied(cache, obj)],
            watcher::Event::Delete(obj) => vec![Notification::Deleted(Arc::new(obj.clone()))],
            watcher::Event::Init => {
                self.seen.clear();
                self.pending.clear();
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                self.seen.insert(ObjectRef::from_obj(obj));
                let notification = Self::applied(cache, obj);
                self.pending.push(notification);
                Vec::new()
            }
            watcher::Event::InitDone => {
                let mut notifications = std::mem::take(&mut self.pending);
                notifications.extend(
                    cache
                        .state()
                        .into_iter()
                        .filter(|obj| !self.seen.contains(&ObjectRef::from_obj(obj.as_ref())))
                        .map(Notification::Deleted),
                );
                self.seen.clear();
                notifications
            }
        }
    }

    fn applied(cache: &Store<K>, obj: &K) -> Notification<K> {
        let new = Arc::new(obj.clone());
        match cache.get(&ObjectRef::from_obj(obj)) {
            Some(old) => Notification::Updated { old, new },
            None => Notification::Added(new),
        }
    }
}

/// Caches of the two watched collections
#[derive(Debug)]
pub struct Informers {
    pub services: Store<Service>,
    pub ingresses: Store<Ingress>,
    handles: Vec<JoinHandle<()>>,
}

impl Informers {
    /// Start the Service and Ingress informers
    ///
    /// `namespace` restricts both watches; `None` watches every namespace.
    #[must_use]
    pub fn start(
        client: &Client,
        namespace: Option<&str>,
        router: &EventRouter,
        token: &CancellationToken,
    ) -> Self {
        let (services, service_writer) = reflector::store::<Service>();
        let (ingresses, ingress_writer) = reflector::store::<Ingress>();

        let handles = vec![
            tokio::spawn(run_informer(
                api(client, namespace),
                service_writer,
                router.clone(),
                WatchEvent::Service,
                token.clone(),
            )),
            tokio::spawn(run_informer(
                api(client, namespace),
                ingress_writer,
                router.clone(),
                WatchEvent::Ingress,
                token.clone(),
            )),
        ];

        Self {
            services,
            ingresses,
            handles,
        }
    }

    /// Wait until both caches hold a complete listing
    ///
    /// # Errors
    ///
    /// Fails when `timeout` elapses first or an informer stopped before syncing.
    pub async fn wait_for_cache_sync(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, async {
            self.services
                .wait_until_ready()
                .await
                .context("Service informer stopped before its cache synced")?;
            self.ingresses
                .wait_until_ready()
                .await
                .context("Ingress informer stopped before its cache synced")?;
            Ok::<(), anyhow::Error>(())
        })
        .await
        .with_context(|| format!("caches did not sync within {}s", timeout.as_secs()))??;
        info!(
            services = self.services.state().len(),
            ingresses = self.ingresses.state().len(),
            "Caches synced"
        );
        Ok(())
    }

    /// Wait for both informer tasks to stop
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "informer task failed");
            }
        }
    }
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Drive one watch stream until `token` is cancelled
async fn run_informer<K>(
    api: Api<K>,
    mut writer: reflector::store::Writer<K>,
    router: EventRouter,
    into_event: fn(Notification<K>) -> WatchEvent,
    token: CancellationToken,
) where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Eq + Hash + Clone + Default,
{
    let kind = K::kind(&K::DynamicType::default()).into_owned();
    let span = tracing::span!(tracing::Level::INFO, "controller.informer", resource.kind = %kind);

    async move {
        let cache = writer.as_reader();
        let mut translator = NotificationTranslator::<K>::default();
        let mut stream = watcher(api, watcher::Config::default())
            .default_backoff()
            .boxed();

        info!("Starting informer");
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                next = stream.next() => match next {
                    Some(Ok(event)) => {
                        let notifications = translator.translate(&cache, &event);
                        writer.apply_watcher_event(&event);
                        for notification in notifications {
                            router.route(into_event(notification));
                        }
                    }
                    Some(Err(e)) => {
                        handle_watch_stream_error(&kind, &e);
                    }
                    None => {
                        debug!("watch stream ended");
                        break;
                    }
                },
            }
        }
        info!("Informer stopped");
    }
    .instrument(span)
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn service(name: &str, version: &str) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("ns1".to_string()),
                resource_version: Some(version.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn step(
        translator: &mut NotificationTranslator<Service>,
        writer: &mut reflector::store::Writer<Service>,
        event: watcher::Event<Service>,
    ) -> Vec<Notification<Service>> {
        let cache = writer.as_reader();
        let notifications = translator.translate(&cache, &event);
        writer.apply_watcher_event(&event);
        notifications
    }

    fn names(notifications: &[Notification<Service>]) -> Vec<(String, &'static str)> {
        notifications
            .iter()
            .map(|n| {
                let obj = match n {
                    Notification::Added(o) | Notification::Deleted(o) => o,
                    Notification::Updated { new, .. } => new,
                };
                (obj.metadata.name.clone().unwrap_or_default(), n.event_name())
            })
            .collect()
    }

    #[test]
    fn test_initial_list_is_released_on_init_done() {
        let (_reader, mut writer) = reflector::store::<Service>();
        let mut translator = NotificationTranslator::default();

        assert!(step(&mut translator, &mut writer, watcher::Event::Init).is_empty());
        assert!(step(&mut translator, &mut writer, watcher::Event::InitApply(service("a", "1"))).is_empty());
        assert!(step(&mut translator, &mut writer, watcher::Event::InitApply(service("b", "1"))).is_empty());

        let released = step(&mut translator, &mut writer, watcher::Event::InitDone);
        assert_eq!(
            names(&released),
            vec![("a".to_string(), "added"), ("b".to_string(), "added")]
        );
    }

    #[test]
    fn test_debug_reports_relist_progress() {
        let (_reader, mut writer) = reflector::store::<Service>();
        let mut translator = NotificationTranslator::default();
        step(&mut translator, &mut writer, watcher::Event::Init);
        step(&mut translator, &mut writer, watcher::Event::InitApply(service("a", "1")));

        assert_eq!(
            format!("{translator:?}"),
            "NotificationTranslator { seen: 1, pending: 1 }"
        );
    }

    #[tokio::test]
    async fn test_join_survives_a_panicked_informer() {
        let informers = Informers {
            services: reflector::store::<Service>().0,
            ingresses: reflector::store::<Ingress>().0,
            handles: vec![
                tokio::spawn(async { panic!("watch task died"); }),
                tokio::spawn(async {}),
            ],
        };

        tokio::time::timeout(Duration::from_secs(2), informers.join())
            .await
            .expect("join should return");
    }

    #[test]
    fn test_apply_and_delete_after_sync() {
        let (_reader, mut writer) = reflector::store::<Service>();
        let mut translator = NotificationTranslator::default();
        step(&mut translator, &mut writer, watcher::Event::Init);
        step(&mut translator, &mut writer, watcher::Event::InitApply(service("a", "1")));
        step(&mut translator, &mut writer, watcher::Event::InitDone);

        let mut updated = service("a", "2");
        updated.metadata.annotations = Some(BTreeMap::from([(
            "ingress/http".to_string(),
            String::new(),
        )]));
        let notifications = step(&mut translator, &mut writer, watcher::Event::Apply(updated));
        match notifications.as_slice() {
            [Notification::Updated { old, new }] => {
                assert_eq!(old.metadata.resource_version.as_deref(), Some("1"));
                assert_eq!(new.metadata.resource_version.as_deref(), Some("2"));
            }
            other => panic!("expected one update, got {other:?}"),
        }

        let added = step(&mut translator, &mut writer, watcher::Event::Apply(service("c", "1")));
        assert_eq!(names(&added), vec![("c".to_string(), "added")]);

        let deleted = step(&mut translator, &mut writer, watcher::Event::Delete(service("c", "1")));
        assert_eq!(names(&deleted), vec![("c".to_string(), "deleted")]);
    }

    #[test]
    fn test_relist_reports_vanished_objects_as_deleted() {
        let (_reader, mut writer) = reflector::store::<Service>();
        let mut translator = NotificationTranslator::default();
        step(&mut translator, &mut writer, watcher::Event::Init);
        step(&mut translator, &mut writer, watcher::Event::InitApply(service("a", "1")));
        step(&mut translator, &mut writer, watcher::Event::InitApply(service("b", "1")));
        step(&mut translator, &mut writer, watcher::Event::InitDone);

        // "b" was deleted while the watch was down
        step(&mut translator, &mut writer, watcher::Event::Init);
        step(&mut translator, &mut writer, watcher::Event::InitApply(service("a", "1")));
        let released = step(&mut translator, &mut writer, watcher::Event::InitDone);

        assert_eq!(
            names(&released),
            vec![("a".to_string(), "updated"), ("b".to_string(), "deleted")]
        );
        assert_eq!(writer.as_reader().state().len(), 1);
    }
}
