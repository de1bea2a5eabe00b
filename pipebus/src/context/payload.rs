//! Typed payload bag for ambient context capabilities.

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

type PayloadMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// A thread-safe map of ambient payloads keyed by type.
///
/// Clones share the same underlying map. A child bag created with
/// [`child`](Self::child) sees its parent's payloads on lookup, while
/// insertions into the child stay local to it.
#[derive(Clone, Default)]
pub struct PayloadBag {
    entries: Arc<RwLock<PayloadMap>>,
    parent: Option<Box<PayloadBag>>,
}

impl PayloadBag {
    /// Creates a new empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child bag that falls back to this bag on lookup.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            entries: Arc::default(),
            parent: Some(Box::new(self.clone())),
        }
    }

    /// Looks up a payload by type, searching parents when absent locally.
    #[must_use]
    pub fn try_get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let local = self
            .entries
            .read()
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok());

        local.or_else(|| self.parent.as_ref().and_then(|p| p.try_get::<T>()))
    }

    /// Returns true if a payload of type `T` is visible from this bag.
    #[must_use]
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.try_get::<T>().is_some()
    }

    /// Inserts a payload, replacing any local value of the same type.
    ///
    /// Returns the previous local value, if any.
    pub fn insert<T: Any + Send + Sync>(&self, value: T) -> Option<Arc<T>> {
        self.entries
            .write()
            .insert(TypeId::of::<T>(), Arc::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
    }

    /// Returns the visible payload of type `T`, adding one from `factory` if
    /// none exists.
    pub fn get_or_add<T, F>(&self, factory: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.try_get::<T>() {
            return existing;
        }

        let mut entries = self.entries.write();
        if let Some(existing) = entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
        {
            return existing;
        }

        let value = Arc::new(factory());
        entries.insert(TypeId::of::<T>(), value.clone());
        value
    }

    /// Returns the number of local payloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no local payloads are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for PayloadBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadBag")
            .field("len", &self.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct TenantId(String);

    #[derive(Debug, PartialEq)]
    struct RetryCount(u32);

    #[test]
    fn test_insert_and_get() {
        let bag = PayloadBag::new();
        bag.insert(TenantId("acme".to_string()));

        assert_eq!(bag.try_get::<TenantId>().unwrap().0, "acme");
        assert!(bag.try_get::<RetryCount>().is_none());
    }

    #[test]
    fn test_insert_replaces() {
        let bag = PayloadBag::new();
        assert!(bag.insert(RetryCount(1)).is_none());
        let previous = bag.insert(RetryCount(2)).unwrap();

        assert_eq!(*previous, RetryCount(1));
        assert_eq!(*bag.try_get::<RetryCount>().unwrap(), RetryCount(2));
    }

    #[test]
    fn test_child_sees_parent() {
        let parent = PayloadBag::new();
        parent.insert(TenantId("acme".to_string()));

        let child = parent.child();
        child.insert(RetryCount(3));

        assert!(child.contains::<TenantId>());
        assert!(child.contains::<RetryCount>());
        assert!(!parent.contains::<RetryCount>());
    }

    #[test]
    fn test_child_shadows_parent() {
        let parent = PayloadBag::new();
        parent.insert(RetryCount(1));
        let child = parent.child();
        child.insert(RetryCount(9));

        assert_eq!(child.try_get::<RetryCount>().unwrap().0, 9);
        assert_eq!(parent.try_get::<RetryCount>().unwrap().0, 1);
    }

    #[test]
    fn test_get_or_add_only_once() {
        let bag = PayloadBag::new();
        let first = bag.get_or_add(|| RetryCount(1));
        let second = bag.get_or_add(|| RetryCount(2));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_trait_object_payload() {
        trait Clock: Send + Sync {
            fn now(&self) -> u64;
        }
        struct Fixed;
        impl Clock for Fixed {
            fn now(&self) -> u64 {
                42
            }
        }

        let bag = PayloadBag::new();
        bag.insert::<Arc<dyn Clock>>(Arc::new(Fixed));

        let clock = bag.try_get::<Arc<dyn Clock>>().unwrap();
        assert_eq!(clock.now(), 42);
    }
}
