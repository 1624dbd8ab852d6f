//! Transient sessions
//!
//! A `TransientSession` bounds one unit of work: it owns a store transaction
//! and the identity cache of the proxies handed out during that work.
//!
//! ## Lifecycle
//!
//! ```text
//! begin_session() → Open
//!   flush()   → commit working changes, stay Open
//!   revert()  → discard uncommitted changes, stay Open, old proxies detached
//!   commit()  → flush, then Committed (cache cleared)
//!   abort()   → Aborted (cache cleared)
//!   drop      → Aborted if still Open
//! ```
//!
//! Sessions are single-threaded (`!Send`): the cache lives in a `RefCell`
//! behind an `Rc`, and proxies point back with `Weak`.

use parking_lot::RwLock;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use strata_core::{EntityId, PersistentIterator, SessionId, StrataError, StrataResult, Value};
use strata_storage::StoreTransaction;

use crate::adapter::TransientIteratorAdapter;
use crate::cache::SessionEntityCache;
use crate::config::TransientStoreConfig;
use crate::entity::TransientEntity;
use crate::model::ModelRegistry;
use crate::query::{LazyResultSequence, Predicate, Query};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting operations
    Open,
    /// Closed by a successful commit
    Committed,
    /// Closed by abort, failed commit or drop
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Open => write!(f, "Open"),
            SessionState::Committed => write!(f, "Committed"),
            SessionState::Aborted => write!(f, "Aborted"),
        }
    }
}

pub(crate) struct SessionInner {
    id: SessionId,
    state: Cell<SessionState>,
    txn: RefCell<StoreTransaction>,
    cache: RefCell<SessionEntityCache>,
    model: Arc<RwLock<ModelRegistry>>,
    config: TransientStoreConfig,
}

impl SessionInner {
    pub(crate) fn ensure_open(&self, action: &str) -> StrataResult<()> {
        match self.state.get() {
            SessionState::Open => Ok(()),
            state => Err(StrataError::session_closed(action, state.to_string())),
        }
    }

    pub(crate) fn txn(&self) -> Ref<'_, StoreTransaction> {
        self.txn.borrow()
    }

    pub(crate) fn txn_mut(&self) -> RefMut<'_, StoreTransaction> {
        self.txn.borrow_mut()
    }

    pub(crate) fn config(&self) -> &TransientStoreConfig {
        &self.config
    }

    pub(crate) fn link_db_name(&self, kind: &str, link: &str) -> String {
        self.model.read().link_db_name(kind, link)
    }

    /// Session proxy for `id`, created on first sight
    pub(crate) fn resolve(self: &Rc<Self>, id: EntityId) -> StrataResult<TransientEntity> {
        self.ensure_open("resolve entity")?;
        let owner = Rc::downgrade(self);
        self.cache.borrow_mut().resolve(id, |id| {
            let kind = self.txn().kind_name(id).ok_or_else(|| {
                StrataError::invalid_input(format!("Entity id {} has an unknown type", id))
            })?;
            Ok(TransientEntity::new(id, kind, owner))
        })
    }

    /// Drop stale state of the cached proxy of an entity removed by a cursor
    pub(crate) fn forget_removed(&self, id: EntityId) {
        if let Some(entity) = self.cache.borrow().get(id) {
            entity.forget_properties();
        }
        tracing::trace!(target: "strata::session", %id, "entity removed through iterator");
    }

    pub(crate) fn adapter(self: &Rc<Self>, source: PersistentIterator) -> TransientIteratorAdapter {
        TransientIteratorAdapter::new(
            source,
            Rc::downgrade(self),
            self.config.warn_on_implicit_release,
        )
    }

    fn flush(&self) -> StrataResult<u64> {
        let version = self.txn.borrow_mut().commit()?;
        let txn = self.txn.borrow();
        let evicted = self.cache.borrow_mut().retain(|id| txn.exists(id));
        tracing::debug!(
            target: "strata::session",
            session_id = %self.id,
            version,
            evicted,
            "session flushed"
        );
        Ok(version)
    }

    fn close(&self, state: SessionState) {
        self.cache.borrow_mut().clear();
        self.state.set(state);
    }
}

/// A unit of work against a `TransientEntityStore`
///
/// Obtained from `TransientEntityStore::begin_session()` or inside
/// `transactional`. Dropping an open session aborts it.
pub struct TransientSession {
    inner: Rc<SessionInner>,
}

impl TransientSession {
    pub(crate) fn open(
        txn: StoreTransaction,
        model: Arc<RwLock<ModelRegistry>>,
        config: TransientStoreConfig,
    ) -> Self {
        let id = SessionId::new();
        tracing::debug!(
            target: "strata::session",
            session_id = %id,
            base_version = txn.base_version(),
            "session opened"
        );
        Self {
            inner: Rc::new(SessionInner {
                id,
                state: Cell::new(SessionState::Open),
                txn: RefCell::new(txn),
                cache: RefCell::new(SessionEntityCache::new()),
                model,
                config,
            }),
        }
    }

    /// Session id
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.inner.state.get()
    }

    /// True while the session accepts operations
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// True after a successful commit
    pub fn is_committed(&self) -> bool {
        self.state() == SessionState::Committed
    }

    /// True after abort, a failed commit or drop
    pub fn is_aborted(&self) -> bool {
        self.state() == SessionState::Aborted
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Create an entity of `kind` and return its proxy
    pub fn new_entity(&self, kind: &str) -> StrataResult<TransientEntity> {
        self.inner.ensure_open("create entity")?;
        let id = self.inner.txn_mut().new_entity(kind)?;
        self.inner.resolve(id)
    }

    /// Proxy for `id`, or `None` if no such entity exists in this session
    pub fn get_entity(&self, id: EntityId) -> StrataResult<Option<TransientEntity>> {
        self.inner.ensure_open("get entity")?;
        if !self.inner.txn().exists(id) {
            return Ok(None);
        }
        self.inner.resolve(id).map(Some)
    }

    /// Proxy for `id`, created if needed, whether or not the entity exists
    pub fn resolve(&self, id: EntityId) -> StrataResult<TransientEntity> {
        self.inner.resolve(id)
    }

    /// Parse the textual form of an entity id (`"<typeId>-<localId>"`)
    pub fn to_entity_id(&self, representation: &str) -> StrataResult<EntityId> {
        self.inner.ensure_open("parse entity id")?;
        self.inner.txn().to_entity_id(representation)
    }

    /// Kind names known to this session
    pub fn entity_types(&self) -> StrataResult<Vec<String>> {
        self.inner.ensure_open("list entity types")?;
        Ok(self.inner.txn().entity_types())
    }

    /// True if the entity behind `entity` no longer exists in this session
    pub fn is_removed(&self, entity: &TransientEntity) -> StrataResult<bool> {
        self.inner.ensure_open("check entity")?;
        Ok(!self.inner.txn().exists(entity.id()))
    }

    /// Number of proxies in the identity cache
    pub fn cached_entities(&self) -> usize {
        self.inner.cache.borrow().len()
    }

    // =========================================================================
    // Iterators and queries
    // =========================================================================

    /// Iterator over every entity of `kind`
    pub fn get_all(&self, kind: &str) -> StrataResult<TransientIteratorAdapter> {
        self.inner.ensure_open("iterate")?;
        let source = self.inner.txn().get_all(kind);
        Ok(self.inner.adapter(source))
    }

    /// Iterator over entities of `kind` with `property = value`
    pub fn find(
        &self,
        kind: &str,
        property: &str,
        value: impl Into<Value>,
    ) -> StrataResult<TransientIteratorAdapter> {
        self.inner.ensure_open("iterate")?;
        let source = self.inner.txn().find(kind, property, &value.into());
        Ok(self.inner.adapter(source))
    }

    /// Iterator over entities of `kind` having at least one `link`
    pub fn find_with_links(&self, kind: &str, link: &str) -> StrataResult<TransientIteratorAdapter> {
        self.inner.ensure_open("iterate")?;
        let db_name = self.inner.link_db_name(kind, link);
        let source = self.inner.txn().find_with_links(kind, &db_name);
        Ok(self.inner.adapter(source))
    }

    /// Every entity of `kind`, lazily
    pub fn all(&self, kind: &str) -> StrataResult<LazyResultSequence> {
        let entity_type = self.inner.model.read().entity_type(kind);
        Query::all(entity_type).evaluate(self)
    }

    /// Entities of `kind` matching `predicate`, lazily
    pub fn query(&self, kind: &str, predicate: Predicate) -> StrataResult<LazyResultSequence> {
        let entity_type = self.inner.model.read().entity_type(kind);
        Query::new(entity_type, predicate).evaluate(self)
    }

    pub(crate) fn inner(&self) -> &Rc<SessionInner> {
        &self.inner
    }

    // =========================================================================
    // Termination
    // =========================================================================

    /// Commit changes so far and keep the session open
    ///
    /// Entities deleted in this session leave the identity cache.
    ///
    /// # Errors
    ///
    /// `Conflict` if another session committed first; the session stays open
    /// with its changes, ready for `revert()` or `abort()`.
    pub fn flush(&self) -> StrataResult<()> {
        self.inner.ensure_open("flush")?;
        self.inner.flush().map(|_| ())
    }

    /// Discard uncommitted changes and keep the session open
    ///
    /// Proxies handed out before the revert are detached.
    pub fn revert(&self) -> StrataResult<()> {
        self.inner.ensure_open("revert")?;
        self.inner.txn_mut().revert();
        let detached = self.inner.cache.borrow_mut().detach_all();
        tracing::debug!(
            target: "strata::session",
            session_id = %self.inner.id,
            detached,
            "session reverted"
        );
        Ok(())
    }

    /// Flush and close
    ///
    /// # Errors
    ///
    /// A failed flush aborts the session and returns the flush error.
    pub fn commit(&self) -> StrataResult<()> {
        self.inner.ensure_open("commit")?;
        if let Err(e) = self.inner.flush() {
            self.inner.close(SessionState::Aborted);
            tracing::debug!(
                target: "strata::session",
                session_id = %self.inner.id,
                error = %e,
                "session aborted by failed commit"
            );
            return Err(e);
        }
        self.inner.close(SessionState::Committed);
        tracing::debug!(target: "strata::session", session_id = %self.inner.id, "session committed");
        Ok(())
    }

    /// Discard uncommitted changes and close
    pub fn abort(&self) -> StrataResult<()> {
        self.inner.ensure_open("abort")?;
        self.inner.close(SessionState::Aborted);
        tracing::debug!(target: "strata::session", session_id = %self.inner.id, "session aborted");
        Ok(())
    }
}

impl Drop for TransientSession {
    fn drop(&mut self) {
        if self.is_open() {
            if self.inner.config().warn_on_implicit_release {
                tracing::warn!(
                    target: "strata::session",
                    session_id = %self.inner.id,
                    "session dropped while open, aborting"
                );
            }
            self.inner.close(SessionState::Aborted);
        }
    }
}

impl fmt::Debug for TransientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientSession")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("cached_entities", &self.cached_entities())
            .finish()
    }
}
