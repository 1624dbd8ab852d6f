//! EntityStore: in-memory entity engine with snapshot transactions
//!
//! This module owns the committed state and hands out `StoreTransaction`s:
//! - `Arc<parking_lot::RwLock<StoreData>>` for the committed state
//! - `AtomicU64` for transaction ids
//! - a shared `CursorRegistry` accounting for every iterator handed out
//!
//! # Design Notes
//!
//! - **Whole-state snapshots**: a transaction clones the committed state at
//!   begin. Good enough for the in-memory engine, O(store) per begin.
//! - **Version per commit**: the committed version grows by one for every
//!   commit that changed something.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cursor::{CursorRegistry, CursorStats};
use crate::data::StoreData;
use crate::transaction::StoreTransaction;

/// Shared in-memory entity store
///
/// Cheap to share through `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct EntityStore {
    data: Arc<RwLock<StoreData>>,
    cursors: Arc<CursorRegistry>,
    next_txn_id: AtomicU64,
}

impl EntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(StoreData::new())),
            cursors: Arc::new(CursorRegistry::new()),
            next_txn_id: AtomicU64::new(1),
        }
    }

    /// Begin a transaction on the current committed state
    pub fn begin(&self) -> StoreTransaction {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::Relaxed);
        StoreTransaction::begin(txn_id, self.data.clone(), self.cursors.clone())
    }

    /// Current committed version
    pub fn current_version(&self) -> u64 {
        self.data.read().version
    }

    /// Number of cursors opened and not yet released
    pub fn open_cursors(&self) -> usize {
        self.cursors.open_count()
    }

    /// Cursor accounting counters
    pub fn cursor_stats(&self) -> CursorStats {
        self.cursors.stats()
    }

    /// Committed kind names in registration order
    pub fn entity_types(&self) -> Vec<String> {
        self.data.read().kinds().to_vec()
    }

    /// Number of committed entities
    pub fn entity_count(&self) -> usize {
        self.data.read().entity_count()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
