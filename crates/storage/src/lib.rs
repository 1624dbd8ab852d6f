//! Storage layer for strata
//!
//! This crate implements the in-memory entity engine sessions run on:
//! - EntityStore: committed state behind `parking_lot::RwLock`
//! - StoreTransaction: snapshot-isolated unit of work, first-committer-wins
//! - Secondary indices (property_index, link_index) for query push-down
//! - Persistent iterators with cursor accounting

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cursor;
pub mod data;
pub mod index;
pub mod record;
pub mod store;
pub mod transaction;

pub use cursor::{CursorRegistry, CursorStats, StoreEntityIterator, StoreLinkIterator};
pub use data::StoreData;
pub use index::{LinkIndex, PropertyIndex};
pub use record::{EntityRecord, LinkEntry};
pub use store::EntityStore;
pub use transaction::StoreTransaction;
