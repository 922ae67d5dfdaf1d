//! [`ObjectCache`] backed by a `kube_runtime` reflector store.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use kube::Resource;
use kube_runtime::reflector::{ObjectRef, Store};

use crate::cluster::{CacheError, ObjectCache};
use crate::controller::key::ObjectKey;

pub struct ReflectorCache<K>
where
    K: Resource + 'static,
    K::DynamicType: Eq + Hash + Clone,
{
    store: Store<K>,
}

impl<K> ReflectorCache<K>
where
    K: Resource + 'static,
    K::DynamicType: Eq + Hash + Clone,
{
    #[must_use]
    pub fn new(store: Store<K>) -> Self {
        Self { store }
    }
}

impl<K> Clone for ReflectorCache<K>
where
    K: Resource + 'static,
    K::DynamicType: Eq + Hash + Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<K> fmt::Debug for ReflectorCache<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectorCache")
            .field("objects", &self.store.state().len())
            .finish()
    }
}

impl<K> ObjectCache<K> for ReflectorCache<K>
where
    K: Resource + Clone + Send + Sync + 'static,
    K::DynamicType: Eq + Hash + Clone + Default + Send + Sync,
{
    fn get(&self, namespace: &str, name: &str) -> Result<Arc<K>, CacheError> {
        let mut object_ref = ObjectRef::<K>::new(name);
        if !namespace.is_empty() {
            object_ref = object_ref.within(namespace);
        }
        self.store.get(&object_ref).ok_or_else(|| CacheError::NotFound {
            kind: K::kind(&K::DynamicType::default()).into_owned(),
            key: ObjectKey::new(namespace, name).to_string(),
        })
    }
}
