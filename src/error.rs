//! Error types for component resolution

use crate::key::{TypeKey, join_path};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while resolving components
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// No instance and no factory registered for the key
    #[error("Component not registered: {key}")]
    NotRegistered { key: TypeKey },

    /// The key is already being constructed by the current call chain
    #[error("Circular dependency detected while resolving {key}: {}", join_path(.path))]
    CircularDependency {
        key: TypeKey,
        /// Resolution path that closes the cycle, ending with `key`
        path: Vec<TypeKey>,
        /// Keys marked in resolution container-wide when the cycle was found
        in_resolution: Vec<TypeKey>,
    },

    /// The factory did not complete within the resolution budget
    #[error("Resolution of {key} timed out after {}ms (suspected deadlock)", .timeout.as_millis())]
    ResolutionTimeout { key: TypeKey, timeout: Duration },

    /// The factory panicked
    #[error("Factory for {key} panicked: {payload}")]
    FactoryPanic { key: TypeKey, payload: String },

    /// A fallible factory reported a failure of its own
    #[error("Failed to create component {key}: {reason}")]
    CreationFailed { key: TypeKey, reason: String },

    /// An erased registration holds a value of another type
    #[error("Component registered under {key} is not a {expected}")]
    TypeMismatch {
        key: TypeKey,
        expected: &'static str,
    },

    /// Internal error
    #[error("Internal DI error: {0}")]
    Internal(String),
}

impl DiError {
    /// Create a NotRegistered error for a type
    #[inline]
    pub fn not_registered<T: 'static>() -> Self {
        Self::NotRegistered {
            key: TypeKey::of::<T>(),
        }
    }

    /// Create a CreationFailed error
    #[inline]
    pub fn creation_failed<T: 'static>(reason: impl Into<String>) -> Self {
        Self::CreationFailed {
            key: TypeKey::of::<T>(),
            reason: reason.into(),
        }
    }

    /// Create a TypeMismatch error
    #[inline]
    pub(crate) fn type_mismatch<T: 'static>(key: TypeKey) -> Self {
        Self::TypeMismatch {
            key,
            expected: std::any::type_name::<T>(),
        }
    }

    /// The key the error is about, if any
    pub fn key(&self) -> Option<TypeKey> {
        match self {
            Self::NotRegistered { key }
            | Self::CircularDependency { key, .. }
            | Self::ResolutionTimeout { key, .. }
            | Self::FactoryPanic { key, .. }
            | Self::CreationFailed { key, .. }
            | Self::TypeMismatch { key, .. } => Some(*key),
            Self::Internal(_) => None,
        }
    }

    /// Whether a later attempt may succeed without changing the registrations.
    ///
    /// Only timeouts qualify; everything else is a wiring or constructor defect.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ResolutionTimeout { .. })
    }
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    struct ServiceA;
    struct ServiceB;

    #[test]
    fn test_not_registered_message() {
        let err = DiError::not_registered::<ServiceA>();
        assert!(err.to_string().contains("ServiceA"));
        assert_eq!(err.key(), Some(TypeKey::of::<ServiceA>()));
    }

    #[test]
    fn test_circular_message_shows_path() {
        let a = TypeKey::of::<ServiceA>();
        let b = TypeKey::of::<ServiceB>();
        let err = DiError::CircularDependency {
            key: a,
            path: vec![a, b, a],
            in_resolution: vec![a, b],
        };
        assert!(
            err.to_string()
                .ends_with("ServiceA -> ServiceB -> ServiceA")
        );
    }

    #[test]
    fn test_retryable() {
        let timeout = DiError::ResolutionTimeout {
            key: TypeKey::of::<ServiceA>(),
            timeout: Duration::from_millis(50),
        };
        assert!(timeout.is_retryable());
        assert!(timeout.to_string().contains("50ms"));
        assert!(!DiError::not_registered::<ServiceA>().is_retryable());
        assert!(!DiError::Internal("x".into()).is_retryable());
        assert_eq!(DiError::Internal("x".into()).key(), None);
    }

    #[test]
    fn test_creation_failed() {
        let err = DiError::creation_failed::<ServiceB>("connection refused");
        assert_eq!(
            err.to_string(),
            format!(
                "Failed to create component {}: connection refused",
                std::any::type_name::<ServiceB>()
            )
        );
    }
}
