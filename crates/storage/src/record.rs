//! Stored entity representation
//!
//! An `EntityRecord` is the engine-side state of one entity: its properties
//! and its outgoing links in insertion order.

use smallvec::SmallVec;
use std::collections::BTreeMap;

use strata_core::{EntityId, Value};

/// One outgoing link instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    /// Persisted link name
    pub name: String,
    /// Link target
    pub target: EntityId,
}

impl LinkEntry {
    /// Create a link entry
    pub fn new(name: impl Into<String>, target: EntityId) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }
}

/// Properties and links of a stored entity
#[derive(Debug, Clone, Default)]
pub struct EntityRecord {
    properties: BTreeMap<String, Value>,
    // most entities carry only a handful of links
    links: SmallVec<[LinkEntry; 4]>,
}

impl EntityRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a property value
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// All properties, ordered by name
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Set a property, returning the previous value
    pub fn set_property(&mut self, name: &str, value: Value) -> Option<Value> {
        self.properties.insert(name.to_string(), value)
    }

    /// Remove a property, returning the previous value
    pub fn delete_property(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// All outgoing links in insertion order
    pub fn links(&self) -> &[LinkEntry] {
        &self.links
    }

    /// Targets of links named `name`, in insertion order
    pub fn link_targets<'a>(&'a self, name: &'a str) -> impl Iterator<Item = EntityId> + 'a {
        self.links
            .iter()
            .filter(move |l| l.name == name)
            .map(|l| l.target)
    }

    /// True if the record has a `name` link to `target`
    pub fn has_link(&self, name: &str, target: EntityId) -> bool {
        self.links.iter().any(|l| l.name == name && l.target == target)
    }

    /// Append a link; returns false if the same link already exists
    pub fn add_link(&mut self, name: &str, target: EntityId) -> bool {
        if self.has_link(name, target) {
            return false;
        }
        self.links.push(LinkEntry::new(name, target));
        true
    }

    /// Remove one link; returns false if it did not exist
    pub fn delete_link(&mut self, name: &str, target: EntityId) -> bool {
        match self
            .links
            .iter()
            .position(|l| l.name == name && l.target == target)
        {
            Some(pos) => {
                self.links.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Remove every link pointing at `target`, returning the removed names
    pub fn delete_links_to(&mut self, target: EntityId) -> Vec<String> {
        let mut removed = Vec::new();
        self.links.retain(|l| {
            if l.target == target {
                removed.push(l.name.clone());
                false
            } else {
                true
            }
        });
        removed
    }
}
