//! # graph-injector - Lazy Object-Graph Resolution for Rust
//!
//! A thread-safe dependency injection container that wires interdependent
//! services lazily, by type, without callers knowing construction order.
//!
//! ## Features
//!
//! - 🔒 **Type-keyed** - Any `Send + Sync + 'static` type can be registered
//! - 🏭 **Lazy singletons** - Factories run on first access, at most once per type
//! - 🧵 **Concurrent** - Any number of threads may resolve at once; losers of the
//!   construction race receive the winner's instance
//! - 🔄 **Cycle detection** - Dependency cycles fail fast with the full path
//! - ⏱️ **Hang detection** - Factories run under a deadline (5s by default)
//! - 🛡️ **Panic containment** - A panicking factory becomes an error, never a crash
//! - 📊 **Observable** - Optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use graph_injector::Container;
//! use std::sync::Arc;
//!
//! struct Config {
//!     url: String,
//! }
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let container = Container::new();
//!
//! // Eager instance
//! container.register(Config { url: "postgres://localhost".into() });
//!
//! // Lazy factories resolve their own dependencies
//! container.register_factory(|r| Database { url: r.require::<Config>().url.clone() });
//! container.register_factory(|r| UserService { db: r.require::<Database>() });
//!
//! // Resolve - returns Arc<T>, the same one for every caller
//! let users = container.get::<UserService>().unwrap();
//! let again = container.get::<UserService>().unwrap();
//! assert!(Arc::ptr_eq(&users, &again));
//! ```
//!
//! ## Failure Modes
//!
//! ```rust
//! use graph_injector::{Container, DiError};
//! use std::time::Duration;
//!
//! struct A;
//! struct B;
//!
//! let container = Container::builder()
//!     .resolution_timeout(Duration::from_secs(1))
//!     .build();
//!
//! container.register_factory(|r| { r.require::<B>(); A });
//! container.register_factory(|r| { r.require::<A>(); B });
//!
//! assert!(matches!(
//!     container.get::<A>(),
//!     Err(DiError::CircularDependency { .. })
//! ));
//! ```

mod config;
mod container;
mod context;
mod diagnostics;
mod error;
mod factory;
mod key;
#[cfg(feature = "logging")]
pub mod logging;
mod storage;
mod tracker;

pub use config::*;
pub use container::*;
pub use context::*;
pub use diagnostics::*;
pub use error::*;
pub use key::{Injectable, TypeKey};

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CancellationToken, Container, ContainerBuilder, Context, DiError, Injectable, Resolver,
        Result, TypeKey,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Database {
        url: String,
    }

    #[allow(dead_code)]
    struct UserService {
        db: Arc<Database>,
    }

    #[test]
    fn test_singleton_registration() {
        let container = Container::new();
        container.singleton(Database { url: "test".into() });

        let db = container.get::<Database>().unwrap();
        assert_eq!(db.url, "test");
    }

    #[test]
    fn test_multiple_resolve_same_instance() {
        let container = Container::new();
        container.lazy(|_| Database { url: "test".into() });

        let db1 = container.get::<Database>().unwrap();
        let db2 = container.resolve::<Database>().unwrap();

        // Same Arc instance
        assert!(Arc::ptr_eq(&db1, &db2));
    }

    #[test]
    fn test_lazy_wiring() {
        static CREATED: AtomicU32 = AtomicU32::new(0);

        let container = Container::new();
        container.register_factory(|r| UserService {
            db: r.require::<Database>(),
        });
        container.register_factory(|_| {
            CREATED.fetch_add(1, Ordering::SeqCst);
            Database {
                url: "lazy".into(),
            }
        });

        assert_eq!(CREATED.load(Ordering::SeqCst), 0);

        let users = container.get::<UserService>().unwrap();
        let db = container.get::<Database>().unwrap();
        assert_eq!(CREATED.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&users.db, &db));
    }

    #[test]
    fn test_trait_object_contract() {
        trait Clock: Send + Sync {
            fn now(&self) -> u64;
        }

        struct Fixed;
        impl Clock for Fixed {
            fn now(&self) -> u64 {
                42
            }
        }

        let container = Container::new();
        container.register_factory::<Arc<dyn Clock>, _>(|_| Arc::new(Fixed));

        let clock = container.get::<Arc<dyn Clock>>().unwrap();
        assert_eq!(clock.now(), 42);
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let container: Container = Container::builder().build();
        let key: TypeKey = TypeKey::of::<Database>();
        let result: Result<Arc<Database>> = container.get::<Database>();
        assert!(matches!(result, Err(DiError::NotRegistered { key: k }) if k == key));
    }
}
