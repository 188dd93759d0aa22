//! Point-in-time view of a container, used in timeout reports

use crate::TypeKey;
use crate::key::join_path;
use std::fmt;

/// Snapshot of what a container knows about its keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Keys with a constructed or eagerly registered instance
    pub instances: Vec<TypeKey>,
    /// Keys with a registered factory
    pub factories: Vec<TypeKey>,
    /// Keys whose factory is currently running
    pub resolving: Vec<TypeKey>,
}

impl Diagnostics {
    pub(crate) fn new(
        mut instances: Vec<TypeKey>,
        mut factories: Vec<TypeKey>,
        mut resolving: Vec<TypeKey>,
    ) -> Self {
        // Map iteration order is random; sort so reports are stable
        instances.sort_by_key(|k| k.name());
        factories.sort_by_key(|k| k.name());
        resolving.sort_by_key(|k| k.name());
        Self {
            instances,
            factories,
            resolving,
        }
    }

    /// Factory-backed keys that have not been constructed yet
    pub fn pending(&self) -> Vec<TypeKey> {
        self.factories
            .iter()
            .filter(|k| !self.instances.contains(k))
            .copied()
            .collect()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |keys: &[TypeKey]| {
            if keys.is_empty() {
                "-".to_string()
            } else {
                join_path(keys).replace(" -> ", ", ")
            }
        };
        write!(
            f,
            "instances=[{}] factories=[{}] resolving=[{}]",
            list(&self.instances),
            list(&self.factories),
            list(&self.resolving)
        )
    }
}
