//! Cursor-backed entity iterators
//!
//! Every iterator handed out by a transaction holds one cursor registered in
//! the store's `CursorRegistry`. Releasing it (`dispose`, or drop as a last
//! resort) unregisters it exactly once.
//!
//! # Liveness
//!
//! A cursor captures the candidate list when it is opened and checks each
//! candidate against the transaction's working state as it advances. Entities
//! deleted (or links removed) after the cursor was opened are skipped, never
//! yielded.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use strata_core::{EntityId, EntityIterator, LinkEntityIterator, StrataError, StrataResult};

use crate::data::StoreData;
use crate::record::LinkEntry;

// ============================================================================
// CursorRegistry
// ============================================================================

/// Store-wide accounting of open cursors
#[derive(Debug, Default)]
pub struct CursorRegistry {
    open: AtomicUsize,
    opened_total: AtomicU64,
    released_total: AtomicU64,
}

/// Snapshot of cursor accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorStats {
    /// Cursors currently holding a resource
    pub open: usize,
    /// Cursors ever opened
    pub opened_total: u64,
    /// Cursors ever released
    pub released_total: u64,
}

impl CursorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly opened cursor
    pub fn open(&self) {
        self.open.fetch_add(1, Ordering::SeqCst);
        self.opened_total.fetch_add(1, Ordering::SeqCst);
    }

    /// Unregister a cursor
    ///
    /// # Errors
    ///
    /// Returns a storage error if no cursor is registered, which means a
    /// cursor was released twice.
    pub fn release(&self) -> StrataResult<()> {
        self.open
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map_err(|_| StrataError::storage("cursor released with no open cursors"))?;
        self.released_total.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Number of cursors currently open
    pub fn open_count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Current accounting snapshot
    pub fn stats(&self) -> CursorStats {
        CursorStats {
            open: self.open.load(Ordering::SeqCst),
            opened_total: self.opened_total.load(Ordering::SeqCst),
            released_total: self.released_total.load(Ordering::SeqCst),
        }
    }
}

// ============================================================================
// Shared cursor state
// ============================================================================

/// Element a cursor walks over
trait CursorItem {
    fn id(&self) -> EntityId;
    fn is_live(&self, owner: Option<EntityId>, data: &StoreData) -> bool;
}

impl CursorItem for EntityId {
    fn id(&self) -> EntityId {
        *self
    }

    fn is_live(&self, _owner: Option<EntityId>, data: &StoreData) -> bool {
        data.exists(*self)
    }
}

impl CursorItem for LinkEntry {
    fn id(&self) -> EntityId {
        self.target
    }

    fn is_live(&self, owner: Option<EntityId>, data: &StoreData) -> bool {
        owner
            .and_then(|owner| data.record(owner))
            .is_some_and(|r| r.has_link(&self.name, self.target))
    }
}

struct Cursor<T: CursorItem> {
    items: Vec<T>,
    /// Index of the next candidate to examine
    position: usize,
    /// Index of the element last yielded, cleared by remove/skip
    current: Option<usize>,
    /// Index of the element last traversed, kept across remove/skip
    last: Option<usize>,
    owner: Option<EntityId>,
    data: Arc<RwLock<StoreData>>,
    registry: Arc<CursorRegistry>,
    disposed: bool,
}

impl<T: CursorItem> Cursor<T> {
    fn open(
        items: Vec<T>,
        owner: Option<EntityId>,
        data: Arc<RwLock<StoreData>>,
        registry: Arc<CursorRegistry>,
    ) -> Self {
        registry.open();
        tracing::trace!(target: "strata::storage", candidates = items.len(), "cursor opened");
        Self {
            items,
            position: 0,
            current: None,
            last: None,
            owner,
            data,
            registry,
            disposed: false,
        }
    }

    /// Index of the next live candidate at or after `position`
    fn next_live(&self) -> Option<usize> {
        if self.disposed {
            return None;
        }
        let data = self.data.read();
        (self.position..self.items.len()).find(|&i| self.items[i].is_live(self.owner, &data))
    }

    fn has_next(&self) -> bool {
        self.next_live().is_some()
    }

    fn advance(&mut self) -> Option<usize> {
        match self.next_live() {
            Some(i) => {
                self.position = i + 1;
                self.current = Some(i);
                self.last = Some(i);
                Some(i)
            }
            None => {
                self.position = self.items.len();
                self.current = None;
                None
            }
        }
    }

    fn next_id(&mut self) -> Option<EntityId> {
        self.advance().map(|i| self.items[i].id())
    }

    fn skip(&mut self, number: usize) -> bool {
        for _ in 0..number {
            if self.advance().is_none() {
                return false;
            }
        }
        self.current = None;
        true
    }

    fn take_current(&mut self) -> StrataResult<&T> {
        if self.disposed {
            return Err(StrataError::invalid_state("cursor is disposed"));
        }
        let i = self
            .current
            .take()
            .ok_or_else(|| StrataError::invalid_state("no current element to remove"))?;
        Ok(&self.items[i])
    }

    fn dispose(&mut self) -> StrataResult<bool> {
        if self.disposed {
            return Ok(false);
        }
        self.disposed = true;
        self.current = None;
        self.registry.release()?;
        tracing::trace!(target: "strata::storage", "cursor released");
        Ok(true)
    }
}

impl<T: CursorItem> Drop for Cursor<T> {
    fn drop(&mut self) {
        if !self.disposed {
            if let Err(e) = self.dispose() {
                tracing::error!(target: "strata::storage", error = %e, "cursor release failed on drop");
            }
        }
    }
}

// ============================================================================
// Plain iterator
// ============================================================================

/// Cursor over entity ids; `remove` deletes the current entity
pub struct StoreEntityIterator {
    cursor: Cursor<EntityId>,
}

impl StoreEntityIterator {
    pub(crate) fn open(
        ids: Vec<EntityId>,
        data: Arc<RwLock<StoreData>>,
        registry: Arc<CursorRegistry>,
    ) -> Self {
        Self {
            cursor: Cursor::open(ids, None, data, registry),
        }
    }
}

impl EntityIterator for StoreEntityIterator {
    fn has_next(&self) -> bool {
        self.cursor.has_next()
    }

    fn next_id(&mut self) -> Option<EntityId> {
        self.cursor.next_id()
    }

    fn remove(&mut self) -> StrataResult<()> {
        let id = *self.cursor.take_current()?;
        self.cursor.data.write().delete_entity(id);
        Ok(())
    }

    fn skip(&mut self, number: usize) -> bool {
        self.cursor.skip(number)
    }

    fn dispose(&mut self) -> StrataResult<bool> {
        self.cursor.dispose()
    }

    fn should_be_disposed(&self) -> bool {
        !self.cursor.disposed
    }
}

// ============================================================================
// Link iterator
// ============================================================================

/// Cursor over link targets of one entity; `remove` deletes the current link
pub struct StoreLinkIterator {
    cursor: Cursor<LinkEntry>,
}

impl StoreLinkIterator {
    pub(crate) fn open(
        owner: EntityId,
        links: Vec<LinkEntry>,
        data: Arc<RwLock<StoreData>>,
        registry: Arc<CursorRegistry>,
    ) -> Self {
        Self {
            cursor: Cursor::open(links, Some(owner), data, registry),
        }
    }
}

impl EntityIterator for StoreLinkIterator {
    fn has_next(&self) -> bool {
        self.cursor.has_next()
    }

    fn next_id(&mut self) -> Option<EntityId> {
        self.cursor.next_id()
    }

    fn remove(&mut self) -> StrataResult<()> {
        let owner = self
            .cursor
            .owner
            .ok_or_else(|| StrataError::internal("link cursor without owner"))?;
        let link = self.cursor.take_current()?.clone();
        self.cursor
            .data
            .write()
            .delete_link(owner, &link.name, link.target)?;
        Ok(())
    }

    fn skip(&mut self, number: usize) -> bool {
        self.cursor.skip(number)
    }

    fn dispose(&mut self) -> StrataResult<bool> {
        self.cursor.dispose()
    }

    fn should_be_disposed(&self) -> bool {
        !self.cursor.disposed
    }
}

impl LinkEntityIterator for StoreLinkIterator {
    fn current_link_name(&self) -> Option<&str> {
        let i = self.cursor.last?;
        Some(self.cursor.items[i].name.as_str())
    }
}
