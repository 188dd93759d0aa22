//! Lazy singleton container and resolution engine
//!
//! The `Container` stores eager instances and factories and resolves
//! components by type. Construction is lazy, happens at most once per key,
//! and every factory invocation runs on its own worker thread under a
//! deadline so that a hung or panicking constructor cannot take the caller
//! down with it.

use crate::config::{ContainerBuilder, ContainerConfig};
use crate::diagnostics::Diagnostics;
use crate::factory::AnyFactory;
use crate::key::join_path;
use crate::storage::{Instance, Registry, downcast_instance};
use crate::tracker::InFlight;
use crate::{CancellationToken, Context, DiError, Injectable, Result, TypeKey};
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[cfg(feature = "logging")]
use tracing::{debug, error, trace, warn};

struct Inner {
    /// Component store, factory store and resolution tracker
    registry: RwLock<Registry>,
    config: ContainerConfig,
    context: Context,
}

/// Thread-safe lazy singleton container.
///
/// Cloning is cheap and every clone shares the same registrations; pass the
/// container to whoever needs to resolve components.
///
/// # Examples
///
/// ```rust
/// use graph_injector::Container;
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let container = Container::new();
/// container.register(Config { url: "postgres://localhost".into() });
/// container.register_factory(|r| Database { url: r.require::<Config>().url.clone() });
/// container.register_factory(|r| UserService { db: r.require::<Database>() });
///
/// let users = container.get::<UserService>().unwrap();
/// assert_eq!(users.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl Container {
    /// Create a container with the default configuration and context.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use graph_injector::Container;
    /// let container = Container::new();
    /// assert!(container.is_empty());
    /// ```
    #[inline]
    pub fn new() -> Self {
        Self::from_parts(ContainerConfig::default(), Context::default())
    }

    /// Create a container whose factories see `context`
    #[inline]
    pub fn with_context(context: Context) -> Self {
        Self::from_parts(ContainerConfig::default(), context)
    }

    /// Start building a container with custom settings
    #[inline]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub(crate) fn from_parts(config: ContainerConfig, context: Context) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "graph_injector",
            context = context.name(),
            timeout_ms = config.resolution_timeout.as_millis() as u64,
            "Creating new DI container"
        );

        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(Registry::default()),
                config,
                context,
            }),
        }
    }

    // =========================================================================
    // Registration Methods
    // =========================================================================

    /// Register an eager singleton.
    ///
    /// Overwrites any instance already stored for `T`, including one built by
    /// a factory.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use graph_injector::Container;
    ///
    /// struct Database { url: String }
    ///
    /// let container = Container::new();
    /// container.register(Database { url: "postgres://localhost".into() });
    /// assert!(container.is_resolved::<Database>());
    /// ```
    #[inline]
    pub fn register<T: Injectable>(&self, instance: T) {
        self.register_instance(TypeKey::of::<T>(), Arc::new(instance));
    }

    /// Alias for [`register`](Self::register).
    #[inline]
    pub fn singleton<T: Injectable>(&self, instance: T) {
        self.register(instance);
    }

    /// Register an already shared instance under `T`
    #[inline]
    pub fn register_arc<T: Injectable>(&self, instance: Arc<T>) {
        self.register_instance(TypeKey::of::<T>(), instance);
    }

    /// Register an instance under an explicit key.
    ///
    /// The value is not checked against the key; a typed `get` of a
    /// mismatching key reports [`DiError::TypeMismatch`].
    #[inline]
    pub fn register_erased(&self, key: TypeKey, instance: Arc<dyn Any + Send + Sync>) {
        self.register_instance(key, instance);
    }

    fn register_instance(&self, key: TypeKey, instance: Instance) {
        let displaced = {
            let mut registry = self.inner.registry.write();
            let displaced = registry.components.insert(key, instance);

            #[cfg(feature = "logging")]
            debug!(
                target: "graph_injector",
                service = key.name(),
                kind = "instance",
                replaced = displaced.is_some(),
                instance_count = registry.components.len(),
                "Registering eager singleton"
            );

            displaced
        };
        // Released outside the lock: a component's Drop may use the container
        drop(displaced);
    }

    /// Register a lazy singleton.
    ///
    /// The factory runs on first `get` and receives a [`Resolver`] for its own
    /// dependencies. Registering again for the same type replaces the factory.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use graph_injector::Container;
    ///
    /// struct Pool { size: usize }
    ///
    /// let container = Container::new();
    /// container.register_factory(|_| Pool { size: 4 });
    /// container.register_factory(|_| Pool { size: 16 }); // last write wins
    ///
    /// assert_eq!(container.get::<Pool>().unwrap().size, 16);
    /// ```
    #[inline]
    pub fn register_factory<T: Injectable, F>(&self, factory: F)
    where
        F: Fn(&Resolver) -> T + Send + Sync + 'static,
    {
        self.insert_factory(TypeKey::of::<T>(), AnyFactory::infallible(factory));
    }

    /// Alias for [`register_factory`](Self::register_factory).
    #[inline]
    pub fn lazy<T: Injectable, F>(&self, factory: F)
    where
        F: Fn(&Resolver) -> T + Send + Sync + 'static,
    {
        self.register_factory(factory);
    }

    /// Register a lazy singleton whose factory can fail.
    ///
    /// An `Err` is returned to the caller of `get` as is and is not cached.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use graph_injector::{Container, DiError};
    ///
    /// struct Config { port: u16 }
    /// struct Server { port: u16 }
    ///
    /// let container = Container::new();
    /// container.register_try_factory(|r| {
    ///     let config = r.get::<Config>()?;
    ///     Ok(Server { port: config.port })
    /// });
    ///
    /// assert!(matches!(container.get::<Server>(), Err(DiError::NotRegistered { .. })));
    /// ```
    #[inline]
    pub fn register_try_factory<T: Injectable, F>(&self, factory: F)
    where
        F: Fn(&Resolver) -> Result<T> + Send + Sync + 'static,
    {
        self.insert_factory(TypeKey::of::<T>(), AnyFactory::fallible(factory));
    }

    fn insert_factory(&self, key: TypeKey, factory: AnyFactory) {
        let replaced = {
            let mut registry = self.inner.registry.write();
            let replaced = registry.factories.insert(key, factory);

            #[cfg(feature = "logging")]
            debug!(
                target: "graph_injector",
                service = key.name(),
                kind = "factory",
                replaced = replaced.is_some(),
                factory_count = registry.factories.len(),
                "Registering lazy singleton (will be created on first access)"
            );

            replaced
        };
        drop(replaced);
    }

    // =========================================================================
    // Resolution Methods
    // =========================================================================

    /// Resolve a component by type.
    ///
    /// Returns the stored instance, or runs the registered factory once and
    /// stores its result. Concurrent callers for the same type all receive
    /// the same `Arc`.
    ///
    /// # Errors
    ///
    /// - [`DiError::NotRegistered`] if nothing is registered for `T`
    /// - [`DiError::CircularDependency`] if `T` depends on itself
    /// - [`DiError::ResolutionTimeout`] if the factory exceeds the resolution timeout
    /// - [`DiError::FactoryPanic`] if the factory panicked
    /// - whatever a fallible factory returned
    #[inline]
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        self.resolve_typed::<T>(&[])
    }

    /// Alias for [`get`](Self::get).
    #[inline]
    pub fn resolve<T: Injectable>(&self) -> Result<Arc<T>> {
        self.get::<T>()
    }

    /// Resolve, discarding the error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use graph_injector::Container;
    ///
    /// struct OptionalService;
    ///
    /// let container = Container::new();
    /// assert!(container.try_get::<OptionalService>().is_none());
    /// ```
    #[inline]
    pub fn try_get<T: Injectable>(&self) -> Option<Arc<T>> {
        self.get::<T>().ok()
    }

    /// Resolve by explicit key without a static type
    #[inline]
    pub fn get_erased(&self, key: &TypeKey) -> Result<Arc<dyn Any + Send + Sync>> {
        self.resolve_key(*key, &[])
    }

    /// Resolve from async code.
    ///
    /// Already constructed components are returned directly; otherwise the
    /// blocking resolution runs on tokio's blocking pool.
    #[cfg(feature = "async")]
    pub async fn get_async<T: Injectable>(&self) -> Result<Arc<T>> {
        if let Some(instance) = self.cached::<T>() {
            return Ok(instance);
        }

        let container = self.clone();
        tokio::task::spawn_blocking(move || container.get::<T>())
            .await
            .map_err(|e| DiError::Internal(format!("async resolution task failed: {e}")))?
    }

    fn resolve_typed<T: Injectable>(&self, path: &[TypeKey]) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        let instance = self.resolve_key(key, path)?;
        downcast_instance::<T>(instance).map_err(|_| DiError::type_mismatch::<T>(key))
    }

    #[cfg(feature = "async")]
    fn cached<T: Injectable>(&self) -> Option<Arc<T>> {
        let instance = self
            .inner
            .registry
            .read()
            .components
            .get(&TypeKey::of::<T>())?;
        downcast_instance::<T>(instance).ok()
    }

    /// Resolution engine. `path` holds the keys the calling chain is
    /// currently constructing.
    fn resolve_key(&self, key: TypeKey, path: &[TypeKey]) -> Result<Instance> {
        // Fast path: shared lock only
        if let Some(instance) = self.inner.registry.read().components.get(&key) {
            #[cfg(feature = "logging")]
            trace!(
                target: "graph_injector",
                service = key.name(),
                location = "store",
                "Component resolved from store"
            );
            return Ok(instance);
        }

        if path.contains(&key) {
            return Err(self.circular(key, path));
        }

        let (flight, factory) = {
            let mut registry = self.inner.registry.write();

            // Another caller may have committed while we were unlocked
            if let Some(instance) = registry.components.get(&key) {
                return Ok(instance);
            }

            match registry.tracker.get(&key) {
                Some(flight) => (flight, None),
                None => {
                    let Some(factory) = registry.factories.get(&key) else {
                        #[cfg(feature = "logging")]
                        debug!(
                            target: "graph_injector",
                            service = key.name(),
                            "Component not registered"
                        );
                        return Err(DiError::NotRegistered { key });
                    };
                    let flight = InFlight::new(self.inner.context.token().child_token());
                    registry.tracker.mark(key, Arc::clone(&flight));
                    (flight, Some(factory))
                }
            }
        };

        let deadline = Instant::now() + self.inner.config.resolution_timeout;
        match factory {
            Some(factory) => self.construct(key, path, factory, flight, deadline),
            None => self.await_flight(key, &flight, deadline),
        }
    }

    fn circular(&self, key: TypeKey, path: &[TypeKey]) -> DiError {
        let mut cycle = path.to_vec();
        cycle.push(key);
        let in_resolution = self.inner.registry.read().tracker.keys();

        #[cfg(feature = "logging")]
        warn!(
            target: "graph_injector",
            service = key.name(),
            path = %join_path(&cycle),
            in_resolution = %join_path(&in_resolution),
            "Circular dependency detected"
        );

        DiError::CircularDependency {
            key,
            path: cycle,
            in_resolution,
        }
    }

    /// Run `factory` on a worker thread and wait for it to settle `flight`.
    fn construct(
        &self,
        key: TypeKey,
        path: &[TypeKey],
        factory: AnyFactory,
        flight: Arc<InFlight>,
        deadline: Instant,
    ) -> Result<Instance> {
        let mut chain = path.to_vec();
        chain.push(key);

        #[cfg(feature = "logging")]
        debug!(
            target: "graph_injector",
            service = key.name(),
            path = %join_path(&chain),
            fallible = factory.is_fallible(),
            "Constructing component"
        );

        let resolver = Resolver {
            container: self.clone(),
            path: Arc::from(chain),
            token: flight.token().clone(),
        };
        let container = self.clone();
        let worker_flight = Arc::clone(&flight);

        let spawned = thread::Builder::new()
            .name(self.inner.config.worker_name.clone())
            .spawn(move || {
                let outcome = factory.call(key, &resolver);
                container.settle(key, &worker_flight, outcome);
            });

        if let Err(e) = spawned {
            return self.settle(
                key,
                &flight,
                Err(DiError::Internal(format!(
                    "failed to spawn factory worker for {key}: {e}"
                ))),
            );
        }

        match flight.wait_until(deadline) {
            Some(outcome) => outcome,
            None => self.abandon(key, &flight),
        }
    }

    /// Wait for a construction started by an independent caller
    fn await_flight(&self, key: TypeKey, flight: &InFlight, deadline: Instant) -> Result<Instance> {
        #[cfg(feature = "logging")]
        trace!(
            target: "graph_injector",
            service = key.name(),
            "Component under construction by another caller, waiting"
        );

        match flight.wait_until(deadline) {
            Some(outcome) => outcome,
            None => {
                let timeout = self.inner.config.resolution_timeout;

                #[cfg(feature = "logging")]
                error!(
                    target: "graph_injector",
                    service = key.name(),
                    timeout_ms = timeout.as_millis() as u64,
                    diagnostics = %self.diagnostics(),
                    "Timed out waiting for in-flight construction, suspected deadlock"
                );

                Err(DiError::ResolutionTimeout { key, timeout })
            }
        }
    }

    /// Commit the outcome of a factory invocation and clear its mark.
    ///
    /// If the invocation was already abandoned the outcome is dropped.
    fn settle(&self, key: TypeKey, flight: &Arc<InFlight>, outcome: Result<Instance>) -> Result<Instance> {
        #[cfg_attr(not(feature = "logging"), allow(unused_assignments, unused_variables))]
        let mut committed = false;
        let mut rejected = None;
        let result = flight.settle_with(|| {
            committed = true;
            let mut registry = self.inner.registry.write();
            registry.tracker.clear(&key, flight);
            // Last writer loses: an instance stored meanwhile is kept
            outcome.map(|instance| {
                let (stored, loser) = registry.components.commit(key, instance);
                rejected = loser;
                stored
            })
        });
        // Both locks are released here
        drop(rejected);

        #[cfg(feature = "logging")]
        {
            let elapsed_ms = flight.elapsed().as_millis() as u64;
            match (&result, committed) {
                (_, false) => debug!(
                    target: "graph_injector",
                    service = key.name(),
                    elapsed_ms,
                    "Discarding late result of abandoned factory"
                ),
                (Ok(_), true) => debug!(
                    target: "graph_injector",
                    service = key.name(),
                    elapsed_ms,
                    "Component constructed"
                ),
                (Err(e @ DiError::FactoryPanic { .. }), true) => error!(
                    target: "graph_injector",
                    service = key.name(),
                    elapsed_ms,
                    error = %e,
                    "Factory panicked"
                ),
                (Err(e), true) => warn!(
                    target: "graph_injector",
                    service = key.name(),
                    elapsed_ms,
                    error = %e,
                    "Component construction failed"
                ),
            }
        }

        result
    }

    /// Give up on a factory that missed its deadline
    fn abandon(&self, key: TypeKey, flight: &Arc<InFlight>) -> Result<Instance> {
        let timeout = self.inner.config.resolution_timeout;
        let mut snapshot = None;
        let result = flight.settle_with(|| {
            let mut registry = self.inner.registry.write();
            snapshot = Some(diagnostics_of(&registry));
            registry.tracker.clear(&key, flight);
            Err(DiError::ResolutionTimeout { key, timeout })
        });

        if let Some(_snapshot) = snapshot {
            flight.token().cancel();

            #[cfg(feature = "logging")]
            error!(
                target: "graph_injector",
                service = key.name(),
                timeout_ms = timeout.as_millis() as u64,
                diagnostics = %_snapshot,
                "Factory did not complete in time, suspected deadlock; abandoning invocation"
            );
        }

        result
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    /// Check whether `T` has an instance or a factory
    #[inline]
    pub fn contains<T: Injectable>(&self) -> bool {
        self.contains_key(&TypeKey::of::<T>())
    }

    /// Check by key
    #[inline]
    pub fn contains_key(&self, key: &TypeKey) -> bool {
        self.inner.registry.read().contains(key)
    }

    /// Check whether an instance of `T` is already stored
    #[inline]
    pub fn is_resolved<T: Injectable>(&self) -> bool {
        self.inner
            .registry
            .read()
            .components
            .contains(&TypeKey::of::<T>())
    }

    /// Check whether a factory invocation for `T` is in flight
    #[inline]
    pub fn is_resolving<T: Injectable>(&self) -> bool {
        self.inner
            .registry
            .read()
            .tracker
            .is_resolving(&TypeKey::of::<T>())
    }

    /// Number of distinct registered keys
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.registry.read().registered_keys().len()
    }

    /// Whether nothing is registered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys with an instance or a factory
    pub fn registered_keys(&self) -> Vec<TypeKey> {
        self.inner.registry.read().registered_keys()
    }

    /// Snapshot of instances, factories and in-flight constructions
    pub fn diagnostics(&self) -> Diagnostics {
        diagnostics_of(&self.inner.registry.read())
    }

    /// The configuration this container was built with
    #[inline]
    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// The construction context shared with factories
    #[inline]
    pub fn context(&self) -> &Context {
        &self.inner.context
    }
}

fn diagnostics_of(registry: &Registry) -> Diagnostics {
    Diagnostics::new(
        registry.components.keys().collect(),
        registry.factories.keys().collect(),
        registry.tracker.keys(),
    )
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("context", &self.inner.context.name())
            .field("registry", &*self.inner.registry.read())
            .field("resolution_timeout", &self.inner.config.resolution_timeout)
            .finish()
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Handle a factory uses to resolve its own dependencies.
///
/// Besides the container it carries the chain of keys being constructed, so
/// a dependency on a key already in that chain is reported as
/// [`DiError::CircularDependency`] instead of hanging.
#[derive(Clone)]
pub struct Resolver {
    container: Container,
    path: Arc<[TypeKey]>,
    token: CancellationToken,
}

impl Resolver {
    /// Resolve a dependency
    #[inline]
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        self.container.resolve_typed::<T>(&self.path)
    }

    /// Resolve a dependency, discarding the error
    #[inline]
    pub fn try_get<T: Injectable>(&self) -> Option<Arc<T>> {
        self.get::<T>().ok()
    }

    /// Resolve a required dependency.
    ///
    /// Meant for factories registered with
    /// [`register_factory`](Container::register_factory). Fallible factories
    /// should use [`get`](Self::get) with `?` instead.
    ///
    /// # Panics
    ///
    /// Panics with the [`DiError`] itself as payload. The container catches
    /// it and returns that error from the outer `get`, so infallible
    /// factories report missing or circular dependencies accurately.
    ///
    /// The panic still goes through the process panic hook, so the default
    /// hook prints a `Box<dyn Any>` panic message for the worker thread on
    /// stderr. Use [`register_try_factory`](Container::register_try_factory)
    /// and `r.get::<T>()?` where that output is unwanted.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use graph_injector::{Container, DiError};
    /// use std::sync::Arc;
    ///
    /// struct Cache;
    /// struct Api { cache: Arc<Cache> }
    /// struct Worker { cache: Arc<Cache> }
    ///
    /// let container = Container::new();
    /// container.register_factory(|r| Api { cache: r.require::<Cache>() });
    /// container.register_try_factory(|r| Ok(Worker { cache: r.get::<Cache>()? }));
    ///
    /// // Same error either way, only `Api` goes through the panic hook
    /// assert!(matches!(container.get::<Api>(), Err(DiError::NotRegistered { .. })));
    /// assert!(matches!(container.get::<Worker>(), Err(DiError::NotRegistered { .. })));
    ///
    /// container.register(Cache);
    /// let api = container.get::<Api>().unwrap();
    /// let worker = container.get::<Worker>().unwrap();
    /// assert!(Arc::ptr_eq(&api.cache, &worker.cache));
    /// ```
    #[inline]
    pub fn require<T: Injectable>(&self) -> Arc<T> {
        match self.get::<T>() {
            Ok(instance) => instance,
            Err(e) => std::panic::panic_any(e),
        }
    }

    /// Resolve a dependency by explicit key
    #[inline]
    pub fn get_erased(&self, key: &TypeKey) -> Result<Arc<dyn Any + Send + Sync>> {
        self.container.resolve_key(*key, &self.path)
    }

    /// Construction context of the container
    #[inline]
    pub fn context(&self) -> &Context {
        self.container.context()
    }

    /// Token cancelled when this invocation is abandoned or the context is cancelled
    #[inline]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    /// Shorthand for `cancellation().is_cancelled()`
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Keys under construction in this chain, outermost first
    #[inline]
    pub fn path(&self) -> &[TypeKey] {
        &self.path
    }

    /// Key being constructed
    #[inline]
    pub fn key(&self) -> TypeKey {
        self.path[self.path.len() - 1]
    }

    /// The container being resolved from.
    ///
    /// Resolving through the container directly bypasses cycle detection;
    /// prefer [`get`](Self::get).
    #[inline]
    pub fn container(&self) -> &Container {
        &self.container
    }

    #[cfg(test)]
    pub(crate) fn detached(container: &Container, key: TypeKey) -> Self {
        Self {
            container: container.clone(),
            path: Arc::from(vec![key]),
            token: container.context().token().child_token(),
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("path", &join_path(&self.path))
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
