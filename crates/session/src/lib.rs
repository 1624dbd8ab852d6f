//! Session layer for strata
//!
//! Session-scoped access to the entity store:
//! - TransientEntityStore: session factory, scoped transactions with retry
//! - TransientSession: unit of work owning an identity cache
//! - SessionEntityCache: identity map, one proxy per persisted entity
//! - TransientIteratorAdapter: storage cursor → session proxies
//! - Query / LazyResultSequence: `first`, `first_or_null`, `size` with push-down
//! - EntityType / LinkDescriptor: kinds and link renaming

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod cache;
pub mod config;
pub mod entity;
pub mod model;
pub mod query;
pub mod session;
pub mod store;

pub use adapter::{Proxies, TransientIteratorAdapter};
pub use cache::SessionEntityCache;
pub use config::{TransientStoreConfig, CONFIG_FILE_NAME};
pub use entity::TransientEntity;
pub use model::{EntityType, LinkDescriptor, ModelRegistry};
pub use query::{
    link, property, Comparison, Field, LazyResultSequence, LinkField, Operand, Predicate,
    PropertyField, Query, QueryIter,
};
pub use session::{SessionState, TransientSession};
pub use store::TransientEntityStore;

pub use strata_core::{EntityId, StrataError, StrataResult, Value};
