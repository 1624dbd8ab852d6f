//! Entity model: kinds and their link descriptors
//!
//! Application code names links by their code-facing name. The store may
//! persist a link under a different name (`db_name`); everything that touches
//! storage translates through the model first, so renaming stays invisible
//! to callers and predicates.

use rustc_hash::FxHashMap;

use strata_core::StrataResult;

use crate::query::{LazyResultSequence, Predicate, Query};
use crate::session::TransientSession;

/// A named property-link of an entity kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDescriptor {
    name: String,
    db_name: Option<String>,
}

impl LinkDescriptor {
    /// Link persisted under its code-facing name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_name: None,
        }
    }

    /// Link persisted under a different name
    pub fn renamed(name: impl Into<String>, db_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_name: Some(db_name.into()),
        }
    }

    /// Code-facing name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Persisted name
    pub fn db_name(&self) -> &str {
        self.db_name.as_deref().unwrap_or(&self.name)
    }
}

/// An entity kind and the links declared on it
///
/// ```text
/// let user = EntityType::new("User").renamed_link("supervisor", "boss");
/// let bosses = user.query(&session, link("supervisor").ne_null())?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    kind: String,
    links: Vec<LinkDescriptor>,
}

impl EntityType {
    /// Kind without declared links
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            links: Vec::new(),
        }
    }

    /// Declare a link persisted under its own name
    pub fn link(mut self, name: impl Into<String>) -> Self {
        self.links.push(LinkDescriptor::new(name));
        self
    }

    /// Declare a link persisted under `db_name`
    pub fn renamed_link(mut self, name: impl Into<String>, db_name: impl Into<String>) -> Self {
        self.links.push(LinkDescriptor::renamed(name, db_name));
        self
    }

    /// Kind name
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Declared links
    pub fn links(&self) -> &[LinkDescriptor] {
        &self.links
    }

    /// Persisted name of a link; undeclared links map to themselves
    pub fn link_db_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.links
            .iter()
            .find(|l| l.name == name)
            .map_or(name, LinkDescriptor::db_name)
    }

    /// Every entity of this kind in `session`
    pub fn all(&self, session: &TransientSession) -> StrataResult<LazyResultSequence> {
        Query::all(self.clone()).evaluate(session)
    }

    /// Entities of this kind in `session` matching `predicate`
    pub fn query(
        &self,
        session: &TransientSession,
        predicate: Predicate,
    ) -> StrataResult<LazyResultSequence> {
        Query::new(self.clone(), predicate).evaluate(session)
    }
}

/// Registered entity kinds, by kind name
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    types: FxHashMap<String, EntityType>,
}

impl ModelRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind, replacing any previous definition
    pub fn register(&mut self, entity_type: EntityType) -> Option<EntityType> {
        self.types.insert(entity_type.kind.clone(), entity_type)
    }

    /// Look up a kind
    pub fn get(&self, kind: &str) -> Option<&EntityType> {
        self.types.get(kind)
    }

    /// Registered kind, or an undeclared one for unknown names
    pub fn entity_type(&self, kind: &str) -> EntityType {
        self.get(kind)
            .cloned()
            .unwrap_or_else(|| EntityType::new(kind))
    }

    /// Persisted name of `link` on `kind`
    pub fn link_db_name(&self, kind: &str, link: &str) -> String {
        match self.get(kind) {
            Some(t) => t.link_db_name(link).to_string(),
            None => link.to_string(),
        }
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
