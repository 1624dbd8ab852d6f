//! Entity table with its secondary indices
//!
//! `StoreData` is the unit that is snapshotted per transaction and swapped in
//! on commit. Every mutation keeps `PropertyIndex` and `LinkIndex` in step
//! with the records, and bumps the mutation counter that transactions use to
//! tell read-only work from writes.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use strata_core::{EntityId, StrataError, StrataResult, Value};

use crate::index::{LinkIndex, PropertyIndex};
use crate::record::EntityRecord;

/// Committed or working state of the entity store
#[derive(Debug, Clone, Default)]
pub struct StoreData {
    /// Version of the last commit this state reflects
    pub(crate) version: u64,
    /// Number of mutations applied since creation
    pub(crate) mutations: u64,
    kinds: Vec<String>,
    kind_ids: FxHashMap<String, u32>,
    next_local_ids: Vec<u64>,
    entities: BTreeMap<EntityId, EntityRecord>,
    property_index: PropertyIndex,
    link_index: LinkIndex,
}

impl StoreData {
    /// Create empty state at version 0
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Kinds
    // =========================================================================

    /// Numeric id of a registered kind
    pub fn kind_id(&self, kind: &str) -> Option<u32> {
        self.kind_ids.get(kind).copied()
    }

    /// Kind name for a numeric id
    pub fn kind_name(&self, type_id: u32) -> Option<&str> {
        self.kinds.get(type_id as usize).map(String::as_str)
    }

    /// Registered kind names in registration order
    pub fn kinds(&self) -> &[String] {
        &self.kinds
    }

    /// Get or assign the numeric id of a kind
    pub fn register_kind(&mut self, kind: &str) -> u32 {
        if let Some(id) = self.kind_ids.get(kind) {
            return *id;
        }
        let id = self.kinds.len() as u32;
        self.kinds.push(kind.to_string());
        self.kind_ids.insert(kind.to_string(), id);
        self.next_local_ids.push(0);
        self.mutations += 1;
        id
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// True if the entity exists
    pub fn exists(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get an entity record
    pub fn record(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    fn record_or_err(&self, id: EntityId) -> StrataResult<&EntityRecord> {
        self.entities.get(&id).ok_or(StrataError::EntityNotFound(id))
    }

    fn record_mut(&mut self, id: EntityId) -> StrataResult<&mut EntityRecord> {
        self.entities
            .get_mut(&id)
            .ok_or(StrataError::EntityNotFound(id))
    }

    /// Create an entity of a registered kind
    pub fn create_entity(&mut self, type_id: u32) -> StrataResult<EntityId> {
        let next = self
            .next_local_ids
            .get_mut(type_id as usize)
            .ok_or_else(|| StrataError::invalid_input(format!("Unknown type id {}", type_id)))?;
        let id = EntityId::new(type_id, *next);
        *next += 1;
        self.entities.insert(id, EntityRecord::new());
        self.mutations += 1;
        Ok(id)
    }

    /// Ids of all entities of a kind, in creation order
    pub fn ids_of_kind(&self, type_id: u32) -> Vec<EntityId> {
        self.entities
            .range(EntityId::new(type_id, 0)..=EntityId::new(type_id, u64::MAX))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Delete an entity, its index entries and every link pointing at it
    ///
    /// Returns false if the entity did not exist.
    pub fn delete_entity(&mut self, id: EntityId) -> bool {
        let Some(record) = self.entities.remove(&id) else {
            return false;
        };
        for (name, value) in record.properties() {
            self.property_index.remove(id, name, value);
        }
        for link in record.links() {
            self.link_index.remove(id, &link.name);
        }
        let link_index = &mut self.link_index;
        for (source, other) in self.entities.iter_mut() {
            for name in other.delete_links_to(id) {
                link_index.remove(*source, &name);
            }
        }
        self.mutations += 1;
        true
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Get a property value
    pub fn get_property(&self, id: EntityId, name: &str) -> StrataResult<Option<Value>> {
        Ok(self.record_or_err(id)?.property(name).cloned())
    }

    /// Set a property, returning the previous value
    pub fn set_property(
        &mut self,
        id: EntityId,
        name: &str,
        value: Value,
    ) -> StrataResult<Option<Value>> {
        let previous = self.record_mut(id)?.set_property(name, value.clone());
        if let Some(old) = &previous {
            self.property_index.remove(id, name, old);
        }
        self.property_index.insert(id, name, value);
        self.mutations += 1;
        Ok(previous)
    }

    /// Delete a property, returning the previous value
    pub fn delete_property(&mut self, id: EntityId, name: &str) -> StrataResult<Option<Value>> {
        let previous = self.record_mut(id)?.delete_property(name);
        if let Some(old) = &previous {
            self.property_index.remove(id, name, old);
            self.mutations += 1;
        }
        Ok(previous)
    }

    /// All properties of an entity
    pub fn properties(&self, id: EntityId) -> StrataResult<BTreeMap<String, Value>> {
        Ok(self.record_or_err(id)?.properties().clone())
    }

    // =========================================================================
    // Links
    // =========================================================================

    /// First target of `name`, if any
    pub fn get_link(&self, id: EntityId, name: &str) -> StrataResult<Option<EntityId>> {
        Ok(self.record_or_err(id)?.link_targets(name).next())
    }

    /// All targets of `name`, in insertion order
    pub fn get_links(&self, id: EntityId, name: &str) -> StrataResult<Vec<EntityId>> {
        Ok(self.record_or_err(id)?.link_targets(name).collect())
    }

    /// Add a link; returns false if it already existed
    pub fn add_link(&mut self, id: EntityId, name: &str, target: EntityId) -> StrataResult<bool> {
        if !self.exists(target) {
            return Err(StrataError::EntityNotFound(target));
        }
        let added = self.record_mut(id)?.add_link(name, target);
        if added {
            self.link_index.insert(id, name);
            self.mutations += 1;
        }
        Ok(added)
    }

    /// Remove a link; returns false if it did not exist
    pub fn delete_link(&mut self, id: EntityId, name: &str, target: EntityId) -> StrataResult<bool> {
        let removed = self.record_mut(id)?.delete_link(name, target);
        if removed {
            self.link_index.remove(id, name);
            self.mutations += 1;
        }
        Ok(removed)
    }

    /// Remove every `name` link of an entity, returning how many were removed
    pub fn delete_links(&mut self, id: EntityId, name: &str) -> StrataResult<usize> {
        let targets = self.get_links(id, name)?;
        for target in &targets {
            self.delete_link(id, name, *target)?;
        }
        Ok(targets.len())
    }

    /// Replace every `name` link of an entity with a single link (or none)
    pub fn set_link(
        &mut self,
        id: EntityId,
        name: &str,
        target: Option<EntityId>,
    ) -> StrataResult<()> {
        if let Some(target) = target {
            if !self.exists(target) {
                return Err(StrataError::EntityNotFound(target));
            }
        }
        self.delete_links(id, name)?;
        if let Some(target) = target {
            self.add_link(id, name, target)?;
        }
        Ok(())
    }

    // =========================================================================
    // Index lookups
    // =========================================================================

    /// Ids of a kind with `property = value`, via the property index
    pub fn find(&self, type_id: u32, property: &str, value: &Value) -> Vec<EntityId> {
        self.property_index
            .get(type_id, property, value)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Ids of a kind with at least one `link`, via the link index
    pub fn find_with_links(&self, type_id: u32, link: &str) -> Vec<EntityId> {
        self.link_index.sources(type_id, link).collect()
    }

    /// Ids of a kind with a `link` pointing at `target`
    pub fn find_links(&self, type_id: u32, target: EntityId, link: &str) -> Vec<EntityId> {
        self.link_index
            .sources(type_id, link)
            .filter(|source| {
                self.entities
                    .get(source)
                    .is_some_and(|r| r.has_link(link, target))
            })
            .collect()
    }
}
