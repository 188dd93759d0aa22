//! Container configuration
//!
//! Configuration is programmatic. Use [`Container::builder`](crate::Container::builder)
//! to adjust the defaults:
//!
//! ```rust
//! use graph_injector::{Container, Context};
//! use std::time::Duration;
//!
//! let container = Container::builder()
//!     .resolution_timeout(Duration::from_secs(2))
//!     .worker_name("wiring")
//!     .context(Context::new("orders-service"))
//!     .build();
//!
//! assert_eq!(container.config().resolution_timeout, Duration::from_secs(2));
//! ```

use crate::{Container, Context};
use std::time::Duration;

/// Default wall-clock budget for a single factory invocation
pub const DEFAULT_RESOLUTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Default name prefix for factory worker threads
pub const DEFAULT_WORKER_NAME: &str = "graph-injector";

/// Tunables for a [`Container`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// How long `get` waits for a factory before reporting a suspected deadlock
    pub resolution_timeout: Duration,
    /// Name given to the threads factories run on
    pub worker_name: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            resolution_timeout: DEFAULT_RESOLUTION_TIMEOUT,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }
}

/// Fluent builder for [`Container`]
#[derive(Debug, Clone, Default)]
pub struct ContainerBuilder {
    config: ContainerConfig,
    context: Option<Context>,
}

impl ContainerBuilder {
    /// Start from the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-resolution timeout
    pub fn resolution_timeout(mut self, timeout: Duration) -> Self {
        self.config.resolution_timeout = timeout;
        self
    }

    /// Set the factory worker thread name
    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.config.worker_name = name.into();
        self
    }

    /// Set the construction context exposed to factories
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the container
    pub fn build(self) -> Container {
        Container::from_parts(self.config, self.context.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::default();
        assert_eq!(config.resolution_timeout, Duration::from_secs(5));
        assert_eq!(config.worker_name, "graph-injector");
    }

    #[test]
    fn test_builder_chain() {
        let container = ContainerBuilder::new()
            .resolution_timeout(Duration::from_millis(250))
            .worker_name("boot")
            .context(Context::new("tests"))
            .build();

        assert_eq!(
            container.config().resolution_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(container.config().worker_name, "boot");
        assert_eq!(container.context().name(), "tests");
    }

    #[test]
    fn test_builder_replaces_config() {
        let config = ContainerConfig {
            resolution_timeout: Duration::from_secs(1),
            worker_name: "custom".into(),
        };
        let container = ContainerBuilder::new().config(config.clone()).build();
        assert_eq!(container.config(), &config);
        assert_eq!(container.context().name(), "default");
    }
}
