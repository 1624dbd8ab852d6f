//! Storage iterator contract
//!
//! This module defines the cursor contract a storage engine supplies to the
//! transient layer. Two capabilities exist:
//! - `EntityIterator`: a sequence of persisted identities with cursor control
//! - `LinkEntityIterator`: additionally names the link the cursor last traversed
//!
//! `PersistentIterator` carries either capability as a tagged variant so the
//! adapter can ask for the link name without downcasting.

use crate::error::StrataResult;
use crate::types::EntityId;

/// Cursor over persisted entity identities
///
/// A cursor holds an engine resource that must be released with `dispose()`.
/// Release happens at most once: the first successful call returns `true`,
/// later calls return `false`.
pub trait EntityIterator {
    /// Peek whether another element is available, without consuming it
    fn has_next(&self) -> bool;

    /// Advance and return the next identity, or `None` at end of sequence
    ///
    /// Engines whose elements are richer than ids may override this; by
    /// default it is `next_id`.
    fn next(&mut self) -> Option<EntityId> {
        self.next_id()
    }

    /// Advance and return the next raw identity, or `None` at end of sequence
    fn next_id(&mut self) -> Option<EntityId>;

    /// Remove the element (entity or link) at the current cursor position
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if no element is currently positioned.
    fn remove(&mut self) -> StrataResult<()>;

    /// Advance `number` positions without yielding elements
    ///
    /// Returns `false` if fewer than `number` elements remained; the cursor is
    /// then left exhausted.
    fn skip(&mut self, number: usize) -> bool;

    /// Release the underlying cursor resource
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the release.
    fn dispose(&mut self) -> StrataResult<bool>;

    /// Whether the cursor still holds a resource that needs explicit release
    fn should_be_disposed(&self) -> bool;
}

/// Cursor over link targets that also reports the traversed link name
pub trait LinkEntityIterator: EntityIterator {
    /// Name of the link the cursor last traversed, `None` before the first element
    fn current_link_name(&self) -> Option<&str>;
}

/// A storage cursor with its capability tag
pub enum PersistentIterator {
    /// Sequence of identities only
    Plain(Box<dyn EntityIterator>),
    /// Sequence of link targets with link names
    LinkIndexed(Box<dyn LinkEntityIterator>),
}

impl PersistentIterator {
    /// True if the cursor can name the link it traverses
    pub fn is_link_indexed(&self) -> bool {
        matches!(self, PersistentIterator::LinkIndexed(_))
    }

    /// See [`EntityIterator::has_next`]
    pub fn has_next(&self) -> bool {
        match self {
            PersistentIterator::Plain(it) => it.has_next(),
            PersistentIterator::LinkIndexed(it) => it.has_next(),
        }
    }

    /// See [`EntityIterator::next`]
    pub fn next(&mut self) -> Option<EntityId> {
        match self {
            PersistentIterator::Plain(it) => it.next(),
            PersistentIterator::LinkIndexed(it) => it.next(),
        }
    }

    /// See [`EntityIterator::next_id`]
    pub fn next_id(&mut self) -> Option<EntityId> {
        match self {
            PersistentIterator::Plain(it) => it.next_id(),
            PersistentIterator::LinkIndexed(it) => it.next_id(),
        }
    }

    /// Link name at the cursor; always `None` for `Plain` cursors
    pub fn current_link_name(&self) -> Option<&str> {
        match self {
            PersistentIterator::Plain(_) => None,
            PersistentIterator::LinkIndexed(it) => it.current_link_name(),
        }
    }

    /// See [`EntityIterator::remove`]
    pub fn remove(&mut self) -> StrataResult<()> {
        match self {
            PersistentIterator::Plain(it) => it.remove(),
            PersistentIterator::LinkIndexed(it) => it.remove(),
        }
    }

    /// See [`EntityIterator::skip`]
    pub fn skip(&mut self, number: usize) -> bool {
        match self {
            PersistentIterator::Plain(it) => it.skip(number),
            PersistentIterator::LinkIndexed(it) => it.skip(number),
        }
    }

    /// See [`EntityIterator::dispose`]
    pub fn dispose(&mut self) -> StrataResult<bool> {
        match self {
            PersistentIterator::Plain(it) => it.dispose(),
            PersistentIterator::LinkIndexed(it) => it.dispose(),
        }
    }

    /// See [`EntityIterator::should_be_disposed`]
    pub fn should_be_disposed(&self) -> bool {
        match self {
            PersistentIterator::Plain(it) => it.should_be_disposed(),
            PersistentIterator::LinkIndexed(it) => it.should_be_disposed(),
        }
    }
}

impl std::fmt::Debug for PersistentIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            PersistentIterator::Plain(_) => "Plain",
            PersistentIterator::LinkIndexed(_) => "LinkIndexed",
        };
        f.debug_struct("PersistentIterator")
            .field("variant", &variant)
            .field("should_be_disposed", &self.should_be_disposed())
            .finish()
    }
}
