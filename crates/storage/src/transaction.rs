//! Store transactions
//!
//! A `StoreTransaction` works on a private deep clone of the committed state
//! taken at begin (snapshot isolation) and publishes it at commit if nobody
//! committed in between (first-committer-wins).
//!
//! ## Lifecycle
//!
//! ```text
//! begin()  → working = clone(committed), base_version = committed.version
//! ...reads and writes hit `working`; cursors share it...
//! commit() → IF no mutations: Ok(base_version)
//!            IF committed.version != base_version: Err(Conflict)
//!            ELSE committed = working, version + 1, transaction re-bases
//! revert() → working = clone(committed)
//! ```
//!
//! A transaction stays usable after a successful commit, so sessions can
//! flush intermediate work without reopening.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use strata_core::{EntityId, PersistentIterator, StrataError, StrataResult, Value};

use crate::cursor::{CursorRegistry, StoreEntityIterator, StoreLinkIterator};
use crate::data::StoreData;
use crate::record::LinkEntry;

/// Unit of work against an `EntityStore`
pub struct StoreTransaction {
    txn_id: u64,
    committed: Arc<RwLock<StoreData>>,
    working: Arc<RwLock<StoreData>>,
    base_version: u64,
    base_mutations: u64,
    cursors: Arc<CursorRegistry>,
}

impl StoreTransaction {
    pub(crate) fn begin(
        txn_id: u64,
        committed: Arc<RwLock<StoreData>>,
        cursors: Arc<CursorRegistry>,
    ) -> Self {
        // Clone under the read lock so version and data belong together.
        let snapshot = committed.read().clone();
        let base_version = snapshot.version;
        let base_mutations = snapshot.mutations;
        tracing::trace!(target: "strata::storage", txn_id, base_version, "transaction begun");
        Self {
            txn_id,
            committed,
            working: Arc::new(RwLock::new(snapshot)),
            base_version,
            base_mutations,
            cursors,
        }
    }

    /// Transaction id
    pub fn id(&self) -> u64 {
        self.txn_id
    }

    /// Committed version this transaction is based on
    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    /// True if the working state differs from the base snapshot
    pub fn is_dirty(&self) -> bool {
        self.working.read().mutations != self.base_mutations
    }

    // =========================================================================
    // Kinds and identity
    // =========================================================================

    /// Kind names known to this transaction
    pub fn entity_types(&self) -> Vec<String> {
        self.working.read().kinds().to_vec()
    }

    /// Kind name of an entity id
    pub fn kind_name(&self, id: EntityId) -> Option<String> {
        self.working.read().kind_name(id.type_id()).map(str::to_string)
    }

    /// Parse the textual form of an entity id
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for malformed text or an unknown type id.
    pub fn to_entity_id(&self, representation: &str) -> StrataResult<EntityId> {
        let id: EntityId = representation.parse()?;
        if self.working.read().kind_name(id.type_id()).is_none() {
            return Err(StrataError::invalid_input(format!(
                "Unknown type id in entity id '{}'",
                representation
            )));
        }
        Ok(id)
    }

    /// True if the entity exists in this transaction's view
    pub fn exists(&self, id: EntityId) -> bool {
        self.working.read().exists(id)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Create an entity of `kind`, registering the kind if needed
    pub fn new_entity(&mut self, kind: &str) -> StrataResult<EntityId> {
        let mut data = self.working.write();
        let type_id = data.register_kind(kind);
        data.create_entity(type_id)
    }

    /// Delete an entity; returns false if it did not exist
    pub fn delete_entity(&mut self, id: EntityId) -> bool {
        self.working.write().delete_entity(id)
    }

    /// Set a property, returning the previous value
    pub fn set_property(
        &mut self,
        id: EntityId,
        name: &str,
        value: Value,
    ) -> StrataResult<Option<Value>> {
        self.working.write().set_property(id, name, value)
    }

    /// Delete a property, returning the previous value
    pub fn delete_property(&mut self, id: EntityId, name: &str) -> StrataResult<Option<Value>> {
        self.working.write().delete_property(id, name)
    }

    /// Replace all `name` links with one target, or clear them with `None`
    pub fn set_link(
        &mut self,
        id: EntityId,
        name: &str,
        target: Option<EntityId>,
    ) -> StrataResult<()> {
        self.working.write().set_link(id, name, target)
    }

    /// Add a link; returns false if it already existed
    pub fn add_link(&mut self, id: EntityId, name: &str, target: EntityId) -> StrataResult<bool> {
        self.working.write().add_link(id, name, target)
    }

    /// Remove one link; returns false if it did not exist
    pub fn delete_link(&mut self, id: EntityId, name: &str, target: EntityId) -> StrataResult<bool> {
        self.working.write().delete_link(id, name, target)
    }

    /// Remove every `name` link of an entity
    pub fn delete_links(&mut self, id: EntityId, name: &str) -> StrataResult<usize> {
        self.working.write().delete_links(id, name)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a property value
    pub fn get_property(&self, id: EntityId, name: &str) -> StrataResult<Option<Value>> {
        self.working.read().get_property(id, name)
    }

    /// All properties of an entity
    pub fn properties(&self, id: EntityId) -> StrataResult<BTreeMap<String, Value>> {
        self.working.read().properties(id)
    }

    /// First target of `name`
    pub fn get_link(&self, id: EntityId, name: &str) -> StrataResult<Option<EntityId>> {
        self.working.read().get_link(id, name)
    }

    /// All targets of `name` in insertion order
    pub fn get_links(&self, id: EntityId, name: &str) -> StrataResult<Vec<EntityId>> {
        self.working.read().get_links(id, name)
    }

    // =========================================================================
    // Iterators
    // =========================================================================

    fn plain(&self, ids: Vec<EntityId>) -> PersistentIterator {
        PersistentIterator::Plain(Box::new(StoreEntityIterator::open(
            ids,
            self.working.clone(),
            self.cursors.clone(),
        )))
    }

    /// All entities of `kind`; empty for an unknown kind
    pub fn get_all(&self, kind: &str) -> PersistentIterator {
        let ids = {
            let data = self.working.read();
            data.kind_id(kind)
                .map(|t| data.ids_of_kind(t))
                .unwrap_or_default()
        };
        self.plain(ids)
    }

    /// Entities of `kind` with `property = value`, answered by the property index
    pub fn find(&self, kind: &str, property: &str, value: &Value) -> PersistentIterator {
        let ids = {
            let data = self.working.read();
            data.kind_id(kind)
                .map(|t| data.find(t, property, value))
                .unwrap_or_default()
        };
        self.plain(ids)
    }

    /// Entities of `kind` with at least one `link`, answered by the link index
    pub fn find_with_links(&self, kind: &str, link: &str) -> PersistentIterator {
        let ids = {
            let data = self.working.read();
            data.kind_id(kind)
                .map(|t| data.find_with_links(t, link))
                .unwrap_or_default()
        };
        self.plain(ids)
    }

    /// Entities of `kind` whose `link` points at `target`
    pub fn find_links(&self, kind: &str, target: EntityId, link: &str) -> PersistentIterator {
        let ids = {
            let data = self.working.read();
            data.kind_id(kind)
                .map(|t| data.find_links(t, target, link))
                .unwrap_or_default()
        };
        self.plain(ids)
    }

    /// Link-indexed iterator over the outgoing links of `owner`
    ///
    /// With `names` empty every link is traversed; otherwise only links whose
    /// name is listed. Order is link insertion order.
    pub fn link_iterator(&self, owner: EntityId, names: &[&str]) -> StrataResult<PersistentIterator> {
        let links: Vec<LinkEntry> = {
            let data = self.working.read();
            let record = data
                .record(owner)
                .ok_or(StrataError::EntityNotFound(owner))?;
            record
                .links()
                .iter()
                .filter(|l| names.is_empty() || names.contains(&l.name.as_str()))
                .cloned()
                .collect()
        };
        Ok(PersistentIterator::LinkIndexed(Box::new(
            StoreLinkIterator::open(owner, links, self.working.clone(), self.cursors.clone()),
        )))
    }

    // =========================================================================
    // Commit / revert
    // =========================================================================

    /// Publish the working state
    ///
    /// Read-only transactions never conflict and leave the version unchanged.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if another transaction committed since this one
    /// began (or last committed). The working state is kept, so the caller
    /// may still `revert()`.
    pub fn commit(&mut self) -> StrataResult<u64> {
        if !self.is_dirty() {
            return Ok(self.base_version);
        }
        let mut committed = self.committed.write();
        if committed.version != self.base_version {
            return Err(StrataError::Conflict {
                expected: self.base_version,
                actual: committed.version,
            });
        }
        let mut working = self.working.write();
        working.version = self.base_version + 1;
        *committed = working.clone();
        self.base_version = working.version;
        self.base_mutations = working.mutations;
        tracing::debug!(
            target: "strata::storage",
            txn_id = self.txn_id,
            version = self.base_version,
            "transaction committed"
        );
        Ok(self.base_version)
    }

    /// Discard uncommitted work and re-base on the latest committed state
    pub fn revert(&mut self) {
        let snapshot = self.committed.read().clone();
        self.base_version = snapshot.version;
        self.base_mutations = snapshot.mutations;
        *self.working.write() = snapshot;
        tracing::debug!(
            target: "strata::storage",
            txn_id = self.txn_id,
            version = self.base_version,
            "transaction reverted"
        );
    }
}

impl std::fmt::Debug for StoreTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreTransaction")
            .field("txn_id", &self.txn_id)
            .field("base_version", &self.base_version)
            .finish()
    }
}
