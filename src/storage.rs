//! Identifier-keyed storage for definitions
//!
//! Uses DashMap for lock-free concurrent access.

use crate::definition::{Concrete, Definition};
use crate::{Container, DiError, Instance, Result};
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;

/// Collection of [`Definition`]s, one per identifier.
///
/// Adding under an existing identifier replaces the previous definition,
/// including its cached instance.
pub struct DefinitionAggregate {
    definitions: DashMap<String, Arc<Definition>, RandomState>,
}

impl DefinitionAggregate {
    /// Create new empty storage.
    ///
    /// 8 shards keep creation cheap; containers rarely hold more than a few
    /// dozen definitions.
    #[inline]
    pub fn new() -> Self {
        Self {
            definitions: DashMap::with_capacity_and_hasher_and_shard_amount(
                0,
                RandomState::new(),
                8,
            ),
        }
    }

    /// Create with pre-allocated capacity, scaling the shard count with it.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        let shard_amount = if capacity <= 16 {
            8
        } else if capacity <= 64 {
            16
        } else {
            32
        };
        Self {
            definitions: DashMap::with_capacity_and_hasher_and_shard_amount(
                capacity,
                RandomState::new(),
                shard_amount,
            ),
        }
    }

    /// Create and store a definition, replacing any previous one under `id`
    pub fn add(&self, id: impl Into<String>, concrete: Concrete, shared: bool) -> Arc<Definition> {
        let id = id.into();
        let definition = Arc::new(Definition::new(id.clone(), concrete));
        definition.set_shared(shared);
        self.definitions.insert(id, Arc::clone(&definition));
        definition
    }

    #[inline]
    pub fn has(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    /// Definition stored under `id`
    #[inline]
    pub fn get(&self, id: &str) -> Result<Arc<Definition>> {
        self.find(id).ok_or_else(|| DiError::not_found(id))
    }

    #[inline]
    pub fn find(&self, id: &str) -> Option<Arc<Definition>> {
        self.definitions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Build the service stored under `id`
    pub fn resolve(&self, container: &Container, id: &str, force_new: bool) -> Result<Instance> {
        // the map guard must not be held while building
        self.get(id)?.make(container, force_new)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// All stored identifiers, in no particular order
    pub fn ids(&self) -> Vec<String> {
        self.definitions.iter().map(|r| r.key().clone()).collect()
    }
}

impl Default for DefinitionAggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DefinitionAggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionAggregate")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let aggregate = DefinitionAggregate::new();
        aggregate.add("config", Concrete::literal(7u16), true);

        let definition = aggregate.get("config").unwrap();
        assert_eq!(definition.id(), "config");
        assert!(definition.is_shared());
        assert!(aggregate.has("config"));
        assert_eq!(aggregate.len(), 1);
    }

    #[test]
    fn test_get_missing() {
        let aggregate = DefinitionAggregate::with_capacity(100);
        let err = aggregate.get("missing").unwrap_err();
        assert!(err.is_not_found());
        assert!(aggregate.is_empty());
    }

    #[test]
    fn test_readd_replaces() {
        let container = Container::new();
        let aggregate = DefinitionAggregate::new();

        aggregate.add("value", Concrete::literal(1u8), true);
        let first = aggregate.resolve(&container, "value", false).unwrap();

        aggregate.add("value", Concrete::literal(2u8), false);
        let second = aggregate.resolve(&container, "value", false).unwrap();

        assert_eq!(*first.downcast::<u8>().unwrap(), 1);
        assert_eq!(*second.downcast::<u8>().unwrap(), 2);
        assert!(!aggregate.get("value").unwrap().is_shared());
        assert_eq!(aggregate.ids(), vec!["value".to_string()]);
    }
}
