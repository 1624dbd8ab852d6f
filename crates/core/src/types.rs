//! Core identity types
//!
//! This module defines the foundational types:
//! - EntityId: Persisted identity of an entity (type id + local id)
//! - SessionId: Unique identifier for a transient session

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::StrataError;

/// Persisted identity of an entity
///
/// Opaque to application code. The storage engine assigns `type_id` per entity
/// kind and `local_id` sequentially within a kind, so ids order first by kind
/// and then by creation.
///
/// The textual form is `"<type_id>-<local_id>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    type_id: u32,
    local_id: u64,
}

impl EntityId {
    /// Create an id from its parts
    pub fn new(type_id: u32, local_id: u64) -> Self {
        Self { type_id, local_id }
    }

    /// Numeric id of the entity's kind
    pub fn type_id(&self) -> u32 {
        self.type_id
    }

    /// Sequence number within the kind
    pub fn local_id(&self) -> u64 {
        self.local_id
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.type_id, self.local_id)
    }
}

impl FromStr for EntityId {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (type_part, local_part) = s
            .split_once('-')
            .ok_or_else(|| StrataError::invalid_input(format!("Invalid entity id '{}'", s)))?;
        let type_id = type_part
            .parse::<u32>()
            .map_err(|e| StrataError::invalid_input(format!("Invalid entity id '{}': {}", s, e)))?;
        let local_id = local_part
            .parse::<u64>()
            .map_err(|e| StrataError::invalid_input(format!("Invalid entity id '{}': {}", s, e)))?;
        Ok(EntityId::new(type_id, local_id))
    }
}

/// Unique identifier for a transient session
///
/// A wrapper around a UUID v4. Used to correlate log lines of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random SessionId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the raw bytes of this SessionId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
