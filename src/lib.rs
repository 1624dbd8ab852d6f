//! strata-transient - session-scoped entity proxies over a link-indexed store
//!
//! Application code works inside sessions. A session hands out one proxy per
//! persisted entity, walks entities and their named links lazily, and
//! releases every storage cursor it opens exactly once.
//!
//! # Quick Start
//!
//! ```ignore
//! use strata_transient::{link, EntityType, TransientEntityStore};
//!
//! let store = TransientEntityStore::new();
//! let user = EntityType::new("User").renamed_link("supervisor", "boss");
//! store.register(user.clone());
//!
//! let supervised = store.transactional(|session| {
//!     let worker = session.new_entity("User")?;
//!     let boss = session.new_entity("User")?;
//!     worker.set_link("supervisor", Some(&boss))?;
//!     user.query(session, link("supervisor").ne_null())?.size()
//! })?;
//! assert_eq!(supervised, 1);
//! ```
//!
//! # Architecture
//!
//! - `strata-core`: ids, values, errors, the storage iterator contract
//! - `strata-storage`: in-memory entity engine with snapshot transactions
//! - `strata-session`: sessions, identity cache, iterator adapter, queries

pub use strata_session::*;

/// Storage engine types, for callers that share or inspect the engine
pub mod storage {
    pub use strata_storage::{CursorStats, EntityStore, StoreTransaction};
}

/// Storage iterator contract
pub use strata_core::{EntityIterator, LinkEntityIterator, PersistentIterator, SessionId};
