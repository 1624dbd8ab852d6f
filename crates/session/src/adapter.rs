//! Iterator adapter from storage cursors to session proxies
//!
//! `TransientIteratorAdapter` wraps a `PersistentIterator` and resolves each
//! raw id through the owning session's identity cache. Only `try_next` (and
//! the `proxies()` iterator built on it) materializes proxies; `next_id`,
//! `skip` and `has_next` stay allocation-free.
//!
//! # Release
//!
//! The underlying cursor is released at most once:
//! - explicitly by `dispose()` (true on the first call, false afterwards)
//! - when `proxies()` reaches the end of the sequence
//! - on drop, as a last resort, with a warning

use std::rc::{Rc, Weak};

use strata_core::{EntityId, PersistentIterator, StrataError, StrataResult};

use crate::entity::TransientEntity;
use crate::session::SessionInner;

/// Session-bound view of a storage iterator
pub struct TransientIteratorAdapter {
    source: PersistentIterator,
    session: Weak<SessionInner>,
    warn_on_implicit_release: bool,
    current: Option<EntityId>,
}

impl TransientIteratorAdapter {
    pub(crate) fn new(
        source: PersistentIterator,
        session: Weak<SessionInner>,
        warn_on_implicit_release: bool,
    ) -> Self {
        Self {
            source,
            session,
            warn_on_implicit_release,
            current: None,
        }
    }

    fn session(&self) -> StrataResult<Rc<SessionInner>> {
        let session = self
            .session
            .upgrade()
            .ok_or_else(|| StrataError::session_closed("iterate", "dropped"))?;
        session.ensure_open("iterate")?;
        Ok(session)
    }

    /// True if another element is available; does not consume
    pub fn has_next(&self) -> bool {
        self.source.has_next()
    }

    /// Next element as a proxy of the owning session
    ///
    /// `Ok(None)` is the end of the sequence. Unlike `proxies()` this does not
    /// release the cursor at the end.
    ///
    /// # Errors
    ///
    /// `SessionClosed` if the owning session is closed or gone; nothing is
    /// consumed in that case.
    pub fn try_next(&mut self) -> StrataResult<Option<TransientEntity>> {
        let session = self.session()?;
        match self.next_id() {
            Some(id) => session.resolve(id).map(Some),
            None => Ok(None),
        }
    }

    /// Next raw id, without materializing a proxy
    pub fn next_id(&mut self) -> Option<EntityId> {
        self.current = self.source.next_id();
        self.current
    }

    /// Borrowing iterator over the remaining elements as proxies
    ///
    /// Releases the cursor once the sequence is exhausted.
    pub fn proxies(&mut self) -> Proxies<'_> {
        Proxies { adapter: self }
    }

    /// Persisted name of the link last traversed; `None` for plain iterators
    pub fn current_link_name(&self) -> Option<&str> {
        self.source.current_link_name()
    }

    /// True if the source reports link names
    pub fn is_link_indexed(&self) -> bool {
        self.source.is_link_indexed()
    }

    /// Remove the current element (entity or link instance) from the store
    ///
    /// # Errors
    ///
    /// `InvalidState` if no element is positioned: before the first `next`,
    /// after a `remove` or `skip`, after exhaustion or disposal.
    pub fn remove(&mut self) -> StrataResult<()> {
        let session = self.session()?;
        self.source.remove()?;
        if let Some(id) = self.current.take() {
            if !self.source.is_link_indexed() {
                session.forget_removed(id);
            }
        }
        Ok(())
    }

    /// Advance `number` elements without materializing proxies
    ///
    /// Returns false if fewer than `number` remained; the cursor is then
    /// exhausted.
    pub fn skip(&mut self, number: usize) -> bool {
        self.current = None;
        self.source.skip(number)
    }

    /// Release the underlying cursor; true only for the call that released it
    ///
    /// # Errors
    ///
    /// Release failures reported by the store are propagated.
    pub fn dispose(&mut self) -> StrataResult<bool> {
        self.current = None;
        self.source.dispose()
    }

    /// True while the underlying cursor still needs releasing
    pub fn should_be_disposed(&self) -> bool {
        self.source.should_be_disposed()
    }
}

/// Proxies of a `TransientIteratorAdapter`, see `proxies()`
#[derive(Debug)]
pub struct Proxies<'a> {
    adapter: &'a mut TransientIteratorAdapter,
}

impl Iterator for Proxies<'_> {
    type Item = StrataResult<TransientEntity>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.adapter.try_next() {
            Ok(Some(entity)) => Some(Ok(entity)),
            Ok(None) => match self.adapter.dispose() {
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            },
            Err(e) => Some(Err(e)),
        }
    }
}

impl Drop for TransientIteratorAdapter {
    fn drop(&mut self) {
        if !self.source.should_be_disposed() {
            return;
        }
        if self.warn_on_implicit_release {
            tracing::warn!(
                target: "strata::session",
                link_indexed = self.source.is_link_indexed(),
                "iterator dropped without dispose, releasing cursor"
            );
        }
        if let Err(e) = self.source.dispose() {
            tracing::error!(target: "strata::session", error = %e, "cursor release failed on drop");
        }
    }
}

impl std::fmt::Debug for TransientIteratorAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransientIteratorAdapter")
            .field("source", &self.source)
            .field("current", &self.current)
            .field("should_be_disposed", &self.source.should_be_disposed())
            .finish()
    }
}
