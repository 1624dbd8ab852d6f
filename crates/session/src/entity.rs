//! Session-scoped entity proxies
//!
//! A `TransientEntity` is a cheap, cloneable handle on one persisted entity
//! inside one session. It holds only a `Weak` reference to the session, so
//! proxies never keep a session alive. Properties are loaded on first read
//! and cached on the proxy; writes go through to the session transaction.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use strata_core::{EntityId, StrataError, StrataResult, Value};

use crate::adapter::TransientIteratorAdapter;
use crate::session::SessionInner;

struct EntityState {
    id: EntityId,
    kind: String,
    session: Weak<SessionInner>,
    detached: Cell<bool>,
    properties: RefCell<Option<BTreeMap<String, Value>>>,
}

/// Session-scoped proxy of a persisted entity
///
/// Equality is proxy identity: two handles are equal if they came from the
/// same cache entry.
#[derive(Clone)]
pub struct TransientEntity {
    state: Rc<EntityState>,
}

impl TransientEntity {
    pub(crate) fn new(id: EntityId, kind: String, session: Weak<SessionInner>) -> Self {
        Self {
            state: Rc::new(EntityState {
                id,
                kind,
                session,
                detached: Cell::new(false),
                properties: RefCell::new(None),
            }),
        }
    }

    /// Persisted identity
    pub fn id(&self) -> EntityId {
        self.state.id
    }

    /// Kind name
    pub fn kind(&self) -> &str {
        &self.state.kind
    }

    /// True once the session reverted or closed after handing this proxy out
    pub fn is_detached(&self) -> bool {
        self.state.detached.get()
    }

    /// True if both handles are the same proxy
    pub fn ptr_eq(&self, other: &TransientEntity) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn detach(&self) {
        self.state.detached.set(true);
        self.forget_properties();
    }

    /// Drop loaded properties; the next read goes back to the transaction
    pub(crate) fn forget_properties(&self) {
        self.state.properties.borrow_mut().take();
    }

    pub(crate) fn belongs_to(&self, session: &Weak<SessionInner>) -> bool {
        Weak::ptr_eq(&self.state.session, session)
    }

    fn session(&self, action: &str) -> StrataResult<Rc<SessionInner>> {
        let session = self
            .state
            .session
            .upgrade()
            .ok_or_else(|| StrataError::session_closed(action, "dropped"))?;
        session.ensure_open(action)?;
        if self.is_detached() {
            return Err(StrataError::invalid_state(format!(
                "entity {} was detached from its session",
                self.state.id
            )));
        }
        Ok(session)
    }

    fn check_target(&self, target: &TransientEntity) -> StrataResult<()> {
        if !target.belongs_to(&self.state.session) {
            return Err(StrataError::invalid_input(format!(
                "entity {} belongs to another session",
                target.id()
            )));
        }
        if target.is_detached() {
            return Err(StrataError::invalid_state(format!(
                "entity {} was detached from its session",
                target.id()
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Get a property value, loading the entity's properties on first use
    pub fn get_property(&self, name: &str) -> StrataResult<Option<Value>> {
        let session = self.session("read property")?;
        let mut cached = self.state.properties.borrow_mut();
        if cached.is_none() {
            *cached = Some(session.txn().properties(self.state.id)?);
        }
        Ok(cached.as_ref().and_then(|p| p.get(name).cloned()))
    }

    /// Set a property
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> StrataResult<()> {
        let session = self.session("write property")?;
        let value = value.into();
        session
            .txn_mut()
            .set_property(self.state.id, name, value.clone())?;
        if let Some(props) = self.state.properties.borrow_mut().as_mut() {
            props.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Delete a property, returning its previous value
    pub fn delete_property(&self, name: &str) -> StrataResult<Option<Value>> {
        let session = self.session("delete property")?;
        let old = session.txn_mut().delete_property(self.state.id, name)?;
        if let Some(props) = self.state.properties.borrow_mut().as_mut() {
            props.remove(name);
        }
        Ok(old)
    }

    // =========================================================================
    // Links
    // =========================================================================

    /// First target of a link, as a proxy of this session
    pub fn get_link(&self, name: &str) -> StrataResult<Option<TransientEntity>> {
        let session = self.session("read link")?;
        let db_name = session.link_db_name(&self.state.kind, name);
        let target = session.txn().get_link(self.state.id, &db_name)?;
        target.map(|id| session.resolve(id)).transpose()
    }

    /// Link-indexed iterator over the targets of a link
    pub fn get_links(&self, name: &str) -> StrataResult<TransientIteratorAdapter> {
        let session = self.session("read links")?;
        let db_name = session.link_db_name(&self.state.kind, name);
        let source = session
            .txn()
            .link_iterator(self.state.id, &[db_name.as_str()])?;
        Ok(session.adapter(source))
    }

    /// Make `target` the only target of a single-valued link; `None` clears it
    pub fn set_link(&self, name: &str, target: Option<&TransientEntity>) -> StrataResult<()> {
        let session = self.session("write link")?;
        if let Some(t) = target {
            self.check_target(t)?;
        }
        let db_name = session.link_db_name(&self.state.kind, name);
        let result = session
            .txn_mut()
            .set_link(self.state.id, &db_name, target.map(TransientEntity::id));
        result
    }

    /// Add a target to a multi-valued link; false if it was already linked
    pub fn add_link(&self, name: &str, target: &TransientEntity) -> StrataResult<bool> {
        let session = self.session("write link")?;
        self.check_target(target)?;
        let db_name = session.link_db_name(&self.state.kind, name);
        let added = session.txn_mut().add_link(self.state.id, &db_name, target.id());
        added
    }

    /// Remove one target of a link; false if it was not linked
    pub fn delete_link(&self, name: &str, target: &TransientEntity) -> StrataResult<bool> {
        let session = self.session("write link")?;
        let db_name = session.link_db_name(&self.state.kind, name);
        let deleted = session
            .txn_mut()
            .delete_link(self.state.id, &db_name, target.id());
        deleted
    }

    /// Targets of a link by persisted name, without materializing proxies
    pub(crate) fn db_link_targets(&self, db_name: &str) -> StrataResult<Vec<EntityId>> {
        let session = self.session("read links")?;
        let targets = session.txn().get_links(self.state.id, db_name)?;
        Ok(targets)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Delete the entity and every link pointing at it; false if already gone
    pub fn delete(&self) -> StrataResult<bool> {
        let session = self.session("delete entity")?;
        let deleted = session.txn_mut().delete_entity(self.state.id);
        self.forget_properties();
        if deleted {
            tracing::trace!(target: "strata::session", id = %self.state.id, "entity deleted");
        }
        Ok(deleted)
    }
}

impl PartialEq for TransientEntity {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for TransientEntity {}

impl fmt::Debug for TransientEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientEntity")
            .field("id", &self.state.id)
            .field("kind", &self.state.kind)
            .field("detached", &self.state.detached.get())
            .finish()
    }
}

impl fmt::Display for TransientEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.state.kind, self.state.id)
    }
}
