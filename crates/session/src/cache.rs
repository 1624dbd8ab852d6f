//! Per-session identity cache
//!
//! Maps persisted identity to the session's proxy for it. Two `resolve` calls
//! with the same id return the same proxy (`TransientEntity::ptr_eq`) for as
//! long as the cache is open. Once cleared, the cache refuses to resolve.

use rustc_hash::FxHashMap;

use strata_core::{EntityId, StrataError, StrataResult};

use crate::entity::TransientEntity;

/// Identity map of one session
#[derive(Debug, Default)]
pub struct SessionEntityCache {
    entries: FxHashMap<EntityId, TransientEntity>,
    closed: bool,
}

impl SessionEntityCache {
    /// Empty, open cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached proxy for `id`, or a new one built by `new_entity` and inserted
    ///
    /// # Errors
    ///
    /// `SessionClosed` after `clear()`; errors from `new_entity` pass through
    /// and leave the cache unchanged.
    pub fn resolve<F>(&mut self, id: EntityId, new_entity: F) -> StrataResult<TransientEntity>
    where
        F: FnOnce(EntityId) -> StrataResult<TransientEntity>,
    {
        if self.closed {
            return Err(StrataError::session_closed(
                format!("resolve entity {}", id),
                "closed",
            ));
        }
        if let Some(entity) = self.entries.get(&id) {
            return Ok(entity.clone());
        }
        let entity = new_entity(id)?;
        tracing::trace!(target: "strata::session", %id, "identity cache miss");
        self.entries.insert(id, entity.clone());
        Ok(entity)
    }

    /// Cached proxy for `id`, without creating one
    pub fn get(&self, id: EntityId) -> Option<&TransientEntity> {
        self.entries.get(&id)
    }

    /// True if a proxy for `id` is cached
    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of cached proxies
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True once `clear()` has run
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Keep only the entries whose id satisfies `keep`; the others are
    /// detached and dropped. Returns how many went.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(EntityId) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|id, entity| {
            let kept = keep(*id);
            if !kept {
                entity.detach();
            }
            kept
        });
        before - self.entries.len()
    }

    /// Detach and drop every cached proxy; the cache stays open
    pub fn detach_all(&mut self) -> usize {
        let detached = self.entries.len();
        for (_, entity) in self.entries.drain() {
            entity.detach();
        }
        detached
    }

    /// Session teardown: detach everything and refuse further resolves
    pub fn clear(&mut self) {
        self.detach_all();
        self.closed = true;
    }
}
