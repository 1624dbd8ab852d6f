//! Error types for the transient layer
//!
//! This module defines the error type shared by storage, session and query code.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! End-of-sequence is never an error: iterators report it with `None`/`false`.

use thiserror::Error;

use crate::types::EntityId;

/// Result type alias for transient-layer operations
pub type StrataResult<T> = std::result::Result<T, StrataError>;

/// Error types for the transient layer
#[derive(Debug, Error)]
pub enum StrataError {
    /// A lookup that requires a result found nothing (`first()` on an empty sequence)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation is not valid in the current iterator or proxy state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The owning session is no longer open
    #[error("Session closed: cannot {action} in state [{state}]")]
    SessionClosed {
        /// What the caller attempted
        action: String,
        /// Session state at the time of the call
        state: String,
    },

    /// Commit found that the store moved past the transaction's snapshot
    #[error("Conflict: store version is {actual}, transaction began at {expected}")]
    Conflict {
        /// Version the transaction was based on
        expected: u64,
        /// Version found at commit time
        actual: u64,
    },

    /// Referenced entity does not exist in the transaction's view
    #[error("Entity {0} does not exist")]
    EntityNotFound(EntityId),

    /// Caller supplied malformed input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage engine failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal invariant violated
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StrataError {
    /// Create a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        StrataError::NotFound(what.into())
    }

    /// Create an invalid-state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        StrataError::InvalidState(msg.into())
    }

    /// Create a session-closed error
    pub fn session_closed(action: impl Into<String>, state: impl Into<String>) -> Self {
        StrataError::SessionClosed {
            action: action.into(),
            state: state.into(),
        }
    }

    /// Create an invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        StrataError::InvalidInput(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        StrataError::Storage(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        StrataError::Internal(msg.into())
    }

    /// True if the error is a commit conflict (retryable)
    pub fn is_conflict(&self) -> bool {
        matches!(self, StrataError::Conflict { .. })
    }

    /// True if the error is a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, StrataError::NotFound(_))
    }

    /// True if the error reports use of a closed session
    pub fn is_session_closed(&self) -> bool {
        matches!(self, StrataError::SessionClosed { .. })
    }

    /// True if the error reports an invalid iterator or proxy state
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, StrataError::InvalidState(_))
    }
}
