//! Secondary indices for predicate push-down
//!
//! This module provides secondary indices that let queries answer simple
//! predicates without loading every entity of a kind:
//! - PropertyIndex: (kind, property) → value → entity ids, serves `find`
//! - LinkIndex: (kind, link) → source ids, serves `find_with_links` / `find_links`

use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};

use strata_core::{EntityId, Value};

/// Secondary index: (type_id, property) → value → ids
///
/// Ids within one value bucket are kept ordered, so a push-down scan yields
/// entities in creation order just like a full scan would.
#[derive(Debug, Clone, Default)]
pub struct PropertyIndex {
    index: FxHashMap<u32, FxHashMap<String, BTreeMap<Value, BTreeSet<EntityId>>>>,
}

impl PropertyIndex {
    /// Create a new empty PropertyIndex
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `id` has `property = value`
    pub fn insert(&mut self, id: EntityId, property: &str, value: Value) {
        self.index
            .entry(id.type_id())
            .or_default()
            .entry(property.to_string())
            .or_default()
            .entry(value)
            .or_default()
            .insert(id);
    }

    /// Forget that `id` has `property = value`
    ///
    /// Empty buckets are removed so the index does not accumulate dead keys.
    pub fn remove(&mut self, id: EntityId, property: &str, value: &Value) {
        let Some(by_property) = self.index.get_mut(&id.type_id()) else {
            return;
        };
        if let Some(by_value) = by_property.get_mut(property) {
            if let Some(ids) = by_value.get_mut(value) {
                ids.remove(&id);
                if ids.is_empty() {
                    by_value.remove(value);
                }
            }
            if by_value.is_empty() {
                by_property.remove(property);
            }
        }
        if by_property.is_empty() {
            self.index.remove(&id.type_id());
        }
    }

    /// Get all ids of a kind with `property = value`
    pub fn get(&self, type_id: u32, property: &str, value: &Value) -> Option<&BTreeSet<EntityId>> {
        self.index.get(&type_id)?.get(property)?.get(value)
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Secondary index: (type_id, link) → source id → link count
///
/// Links are multi-valued, so each source keeps a count of outgoing links
/// with the given name and leaves the index when the count reaches zero.
#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
    index: FxHashMap<u32, FxHashMap<String, BTreeMap<EntityId, usize>>>,
}

impl LinkIndex {
    /// Create a new empty LinkIndex
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more `link` edge leaving `source`
    pub fn insert(&mut self, source: EntityId, link: &str) {
        *self
            .index
            .entry(source.type_id())
            .or_default()
            .entry(link.to_string())
            .or_default()
            .entry(source)
            .or_default() += 1;
    }

    /// Forget one `link` edge leaving `source`
    pub fn remove(&mut self, source: EntityId, link: &str) {
        let Some(by_link) = self.index.get_mut(&source.type_id()) else {
            return;
        };
        if let Some(sources) = by_link.get_mut(link) {
            if let Some(count) = sources.get_mut(&source) {
                *count -= 1;
                if *count == 0 {
                    sources.remove(&source);
                }
            }
            if sources.is_empty() {
                by_link.remove(link);
            }
        }
        if by_link.is_empty() {
            self.index.remove(&source.type_id());
        }
    }

    /// Ids of a kind having at least one `link` edge, in id order
    pub fn sources(&self, type_id: u32, link: &str) -> impl Iterator<Item = EntityId> + '_ {
        self.index
            .get(&type_id)
            .and_then(|by_link| by_link.get(link))
            .into_iter()
            .flat_map(|sources| sources.keys().copied())
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
