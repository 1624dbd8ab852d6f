//! Core types and traits for the Strata transient layer
//!
//! This crate defines the foundational types shared by storage and sessions:
//! - EntityId: Persisted identity of an entity
//! - SessionId: Unique identifier for a transient session
//! - Value: Property value enum
//! - Error: StrataError / StrataResult
//! - Traits: Storage iterator contract (EntityIterator, LinkEntityIterator)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;
pub mod value;

pub use error::{StrataError, StrataResult};
pub use traits::{EntityIterator, LinkEntityIterator, PersistentIterator};
pub use types::{EntityId, SessionId};
pub use value::Value;
