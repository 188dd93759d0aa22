//! Type keys and the injectable marker trait
//!
//! Components are keyed by the Rust type they are registered as. A
//! [`TypeKey`] pairs the `TypeId` used for lookup with the type name used in
//! errors and log output.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Marker trait for types that can be registered in a [`Container`](crate::Container).
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
///
/// Trait contracts are registered through a sized handle such as
/// `Arc<dyn Greeter>`:
///
/// ```rust
/// use graph_injector::Container;
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".into() }
/// }
///
/// let container = Container::new();
/// container.register::<Arc<dyn Greeter>>(Arc::new(English));
///
/// let greeter = container.get::<Arc<dyn Greeter>>().unwrap();
/// assert_eq!(greeter.greet(), "hello");
/// ```
pub trait Injectable: Send + Sync + 'static {
    /// Returns the key this type is registered under
    #[inline]
    fn type_key() -> TypeKey
    where
        Self: Sized,
    {
        TypeKey::of::<Self>()
    }
}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

/// Identity of a registrable contract.
///
/// Equality and hashing only look at the `TypeId`; the name is carried for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for the type `T`
    #[inline]
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without module paths, e.g. `Arc<dyn Greeter>`
    pub fn short_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        let mut segment = String::new();
        for ch in self.name.chars() {
            match ch {
                ':' => segment.clear(),
                '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                    out.push_str(&segment);
                    segment.clear();
                    out.push(ch);
                }
                _ => segment.push(ch),
            }
        }
        out.push_str(&segment);
        out
    }
}

impl PartialEq for TypeKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Render a list of keys as `A -> B -> C`
pub(crate) fn join_path(keys: &[TypeKey]) -> String {
    keys.iter()
        .map(TypeKey::short_name)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    struct Logger;
    struct Database;

    mod nested {
        pub struct Logger;
    }

    #[test]
    fn test_key_identity() {
        assert_eq!(TypeKey::of::<Logger>(), TypeKey::of::<Logger>());
        assert_ne!(TypeKey::of::<Logger>(), TypeKey::of::<Database>());
        // Same short name, different type
        assert_ne!(TypeKey::of::<Logger>(), TypeKey::of::<nested::Logger>());
    }

    #[test]
    fn test_key_hashing() {
        let mut set = HashSet::new();
        set.insert(TypeKey::of::<Logger>());
        set.insert(TypeKey::of::<Logger>());
        set.insert(TypeKey::of::<Database>());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_short_name() {
        assert_eq!(TypeKey::of::<Logger>().short_name(), "Logger");
        assert_eq!(
            TypeKey::of::<Arc<Database>>().short_name(),
            "Arc<Database>"
        );
        assert_eq!(TypeKey::of::<u32>().short_name(), "u32");
    }

    #[test]
    fn test_injectable_key() {
        assert_eq!(Logger::type_key(), TypeKey::of::<Logger>());
    }

    #[test]
    fn test_join_path() {
        let path = [TypeKey::of::<Logger>(), TypeKey::of::<Database>()];
        assert_eq!(join_path(&path), "Logger -> Database");
    }
}
