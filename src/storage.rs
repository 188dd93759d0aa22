//! Component and factory stores
//!
//! Both stores are plain `ahash` maps. They are only reachable through
//! [`Registry`], which the container keeps behind a single `RwLock`.

use crate::factory::AnyFactory;
use crate::tracker::ResolutionTracker;
use crate::TypeKey;
use ahash::RandomState;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A constructed, type-erased component
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

/// Downcast an erased instance, keeping it intact on failure
#[inline]
pub(crate) fn downcast_instance<T: Send + Sync + 'static>(
    instance: Instance,
) -> std::result::Result<Arc<T>, Instance> {
    instance.downcast::<T>()
}

/// Constructed singletons, one per key
#[derive(Default)]
pub(crate) struct ComponentStore {
    instances: HashMap<TypeKey, Instance, RandomState>,
}

impl ComponentStore {
    #[inline]
    pub fn get(&self, key: &TypeKey) -> Option<Instance> {
        self.instances.get(key).map(Arc::clone)
    }

    #[inline]
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.instances.contains_key(key)
    }

    /// Unconditional insert (eager registration).
    ///
    /// Returns the instance it displaced. Callers drop it after releasing
    /// the registry lock, since its `Drop` may use the container.
    #[inline]
    pub fn insert(&mut self, key: TypeKey, instance: Instance) -> Option<Instance> {
        self.instances.insert(key, instance)
    }

    /// Store a lazily constructed instance unless one is already present.
    ///
    /// Returns whichever instance ends up stored, and the candidate if it was
    /// rejected.
    pub fn commit(&mut self, key: TypeKey, instance: Instance) -> (Instance, Option<Instance>) {
        match self.instances.get(&key) {
            Some(existing) => (Arc::clone(existing), Some(instance)),
            None => {
                self.instances.insert(key, Arc::clone(&instance));
                (instance, None)
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.instances.keys().copied()
    }
}

/// Registered constructors, one per key (last write wins)
#[derive(Default)]
pub(crate) struct FactoryStore {
    factories: HashMap<TypeKey, AnyFactory, RandomState>,
}

impl FactoryStore {
    #[inline]
    pub fn get(&self, key: &TypeKey) -> Option<AnyFactory> {
        self.factories.get(key).cloned()
    }

    #[inline]
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.factories.contains_key(key)
    }

    /// Insert or replace; returns the replaced factory
    #[inline]
    pub fn insert(&mut self, key: TypeKey, factory: AnyFactory) -> Option<AnyFactory> {
        self.factories.insert(key, factory)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.factories.keys().copied()
    }
}

/// All shared mutable state of a container
#[derive(Default)]
pub(crate) struct Registry {
    pub components: ComponentStore,
    pub factories: FactoryStore,
    pub tracker: ResolutionTracker,
}

impl Registry {
    /// Whether the key can be resolved at all
    #[inline]
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.components.contains(key) || self.factories.contains(key)
    }

    /// Every key with an instance or a factory, deduplicated
    pub fn registered_keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self.components.keys().collect();
        for key in self.factories.keys() {
            if !self.components.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("instances", &self.components.len())
            .field("factories", &self.factories.len())
            .field("resolving", &self.tracker.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestService {
        value: i32,
    }

    fn instance(value: i32) -> Instance {
        Arc::new(TestService { value })
    }

    #[test]
    fn test_component_insert_and_get() {
        let mut store = ComponentStore::default();
        let key = TypeKey::of::<TestService>();
        assert!(!store.contains(&key));

        store.insert(key, instance(42));

        let service = downcast_instance::<TestService>(store.get(&key).unwrap()).unwrap();
        assert_eq!(service.value, 42);
    }

    #[test]
    fn test_commit_keeps_first() {
        let mut store = ComponentStore::default();
        let key = TypeKey::of::<TestService>();

        let (first, rejected) = store.commit(key, instance(1));
        assert!(rejected.is_none());
        let (second, rejected) = store.commit(key, instance(2));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);

        // The losing candidate is handed back, not dropped in place
        let rejected = downcast_instance::<TestService>(rejected.unwrap()).unwrap();
        assert_eq!(rejected.value, 2);
    }

    #[test]
    fn test_insert_overwrites() {
        let mut store = ComponentStore::default();
        let key = TypeKey::of::<TestService>();

        assert!(store.insert(key, instance(1)).is_none());
        let displaced = store.insert(key, instance(2)).unwrap();
        assert_eq!(downcast_instance::<TestService>(displaced).unwrap().value, 1);

        let service = downcast_instance::<TestService>(store.get(&key).unwrap()).unwrap();
        assert_eq!(service.value, 2);
    }

    #[test]
    fn test_downcast_mismatch_returns_instance() {
        let erased = instance(5);
        let back = downcast_instance::<String>(erased).unwrap_err();
        assert!(back.downcast::<TestService>().is_ok());
    }

    #[test]
    fn test_factory_replace() {
        let mut store = FactoryStore::default();
        let key = TypeKey::of::<TestService>();

        assert!(store.insert(key, AnyFactory::infallible(|_| TestService { value: 1 })).is_none());
        assert!(store.insert(key, AnyFactory::infallible(|_| TestService { value: 2 })).is_some());
        assert_eq!(store.len(), 1);
        assert!(store.contains(&key));
    }

    #[test]
    fn test_registered_keys_deduplicates() {
        let mut registry = Registry::default();
        let key = TypeKey::of::<TestService>();
        registry
            .factories
            .insert(key, AnyFactory::infallible(|_| TestService { value: 1 }));
        registry.components.insert(key, instance(1));
        registry.components.insert(TypeKey::of::<u8>(), Arc::new(0_u8));

        let keys = registry.registered_keys();
        assert_eq!(keys.len(), 2);
        assert!(registry.contains(&key));
        assert!(!registry.contains(&TypeKey::of::<u16>()));
    }
}
