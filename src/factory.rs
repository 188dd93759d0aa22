//! Factory types for constructing components
//!
//! Factories are type-erased into [`AnyFactory`] at registration so the
//! resolution engine only ever deals with `Arc<dyn Any + Send + Sync>`.
//! Invocation goes through [`AnyFactory::call`], which contains panics.

use crate::container::Resolver;
use crate::storage::Instance;
use crate::{DiError, Injectable, Result, TypeKey};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Type-erased constructor
type BuildFn = dyn Fn(&Resolver) -> Result<Instance> + Send + Sync;

/// A registered constructor for one key
///
/// Cloning is cheap; the resolution engine clones the factory out of the
/// store so it can run without holding the container lock.
#[derive(Clone)]
pub(crate) struct AnyFactory {
    build: Arc<BuildFn>,
    type_name: &'static str,
    fallible: bool,
}

impl AnyFactory {
    /// Wrap a constructor that always produces a value
    #[inline]
    pub fn infallible<T: Injectable, F>(factory: F) -> Self
    where
        F: Fn(&Resolver) -> T + Send + Sync + 'static,
    {
        Self {
            build: Arc::new(move |resolver| Ok(Arc::new(factory(resolver)) as Instance)),
            type_name: std::any::type_name::<T>(),
            fallible: false,
        }
    }

    /// Wrap a constructor that may fail
    #[inline]
    pub fn fallible<T: Injectable, F>(factory: F) -> Self
    where
        F: Fn(&Resolver) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            build: Arc::new(move |resolver| factory(resolver).map(|v| Arc::new(v) as Instance)),
            type_name: std::any::type_name::<T>(),
            fallible: true,
        }
    }

    /// Whether the constructor was registered as fallible
    #[inline]
    pub fn is_fallible(&self) -> bool {
        self.fallible
    }

    /// Run the constructor, turning a panic into an error.
    ///
    /// A panic whose payload is a [`DiError`] (see
    /// [`Resolver::require`](crate::Resolver::require)) is returned as that
    /// error; any other payload becomes [`DiError::FactoryPanic`].
    pub fn call(&self, key: TypeKey, resolver: &Resolver) -> Result<Instance> {
        #[cfg(feature = "logging")]
        trace!(
            target: "graph_injector",
            service = self.type_name,
            fallible = self.fallible,
            "Invoking factory"
        );

        match panic::catch_unwind(AssertUnwindSafe(|| (self.build)(resolver))) {
            Ok(result) => result,
            Err(payload) => Err(contain_panic(key, payload)),
        }
    }
}

impl std::fmt::Debug for AnyFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyFactory")
            .field("type_name", &self.type_name)
            .field("fallible", &self.fallible)
            .finish()
    }
}

/// Convert a caught panic payload into an error
pub(crate) fn contain_panic(key: TypeKey, payload: Box<dyn Any + Send>) -> DiError {
    match payload.downcast::<DiError>() {
        Ok(err) => *err,
        Err(payload) => DiError::FactoryPanic {
            key,
            payload: panic_message(payload.as_ref()),
        },
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
