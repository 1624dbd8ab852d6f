//! TransientEntityStore: session factory and scoped transactions
//!
//! ```text
//! let store = TransientEntityStore::new();
//! store.register(EntityType::new("User").renamed_link("supervisor", "boss"));
//!
//! let count = store.transactional(|session| {
//!     let user = session.new_entity("User")?;
//!     user.set_property("login", "test")?;
//!     session.all("User")?.size()
//! })?;
//! ```

use parking_lot::RwLock;
use std::sync::Arc;

use strata_core::{StrataError, StrataResult};
use strata_storage::EntityStore;

use crate::config::TransientStoreConfig;
use crate::model::{EntityType, ModelRegistry};
use crate::session::TransientSession;

/// Entry point for session-scoped work on an `EntityStore`
#[derive(Debug)]
pub struct TransientEntityStore {
    store: Arc<EntityStore>,
    model: Arc<RwLock<ModelRegistry>>,
    config: TransientStoreConfig,
}

impl TransientEntityStore {
    /// Store over a fresh in-memory `EntityStore` with default config
    pub fn new() -> Self {
        Self::with_config(TransientStoreConfig::default())
    }

    /// Store over a fresh in-memory `EntityStore`
    pub fn with_config(config: TransientStoreConfig) -> Self {
        Self::open(Arc::new(EntityStore::new()), config)
    }

    /// Store over an existing, possibly shared, `EntityStore`
    pub fn open(store: Arc<EntityStore>, config: TransientStoreConfig) -> Self {
        Self {
            store,
            model: Arc::new(RwLock::new(ModelRegistry::new())),
            config,
        }
    }

    /// Register an entity kind, replacing a previous definition
    pub fn register(&self, entity_type: EntityType) -> Option<EntityType> {
        tracing::debug!(target: "strata::session", kind = entity_type.kind(), "entity type registered");
        self.model.write().register(entity_type)
    }

    /// Registered definition of `kind`
    pub fn entity_type(&self, kind: &str) -> Option<EntityType> {
        self.model.read().get(kind).cloned()
    }

    /// Configuration
    pub fn config(&self) -> &TransientStoreConfig {
        &self.config
    }

    /// Underlying entity store
    pub fn persistent_store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// Open a session for manual control
    ///
    /// Prefer `transactional()`, which always terminates the session.
    pub fn begin_session(&self) -> TransientSession {
        TransientSession::open(self.store.begin(), self.model.clone(), self.config.clone())
    }

    /// Run `f` in a new session; commit on `Ok`, abort on `Err`
    ///
    /// The session's identity cache is cleared on every path.
    ///
    /// # Errors
    ///
    /// The closure's error, or the commit error (e.g. `Conflict`).
    pub fn transactional<F, T>(&self, f: F) -> StrataResult<T>
    where
        F: FnOnce(&TransientSession) -> StrataResult<T>,
    {
        let session = self.begin_session();
        run_single_attempt(&session, f(&session))
    }

    /// Like `transactional`, retrying the whole unit of work on `Conflict`
    ///
    /// Makes up to `flush_retry_on_conflict` extra attempts, pausing
    /// `retry_delay_ms` between them.
    pub fn transactional_with_retry<F, T>(&self, f: F) -> StrataResult<T>
    where
        F: Fn(&TransientSession) -> StrataResult<T>,
    {
        let max_retries = self.config.flush_retry_on_conflict;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            let session = self.begin_session();
            match run_single_attempt(&session, f(&session)) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_conflict() && attempt < max_retries => {
                    tracing::debug!(
                        target: "strata::session",
                        attempt,
                        error = %e,
                        "conflict, retrying unit of work"
                    );
                    last_error = Some(e);
                    std::thread::sleep(self.config.retry_delay());
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            StrataError::internal("retry loop exited without returning a result")
        }))
    }
}

impl Default for TransientEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

fn run_single_attempt<T>(session: &TransientSession, result: StrataResult<T>) -> StrataResult<T> {
    match result {
        Ok(value) => {
            // The closure may already have committed its own work.
            if !session.is_committed() {
                session.commit()?;
            }
            Ok(value)
        }
        Err(e) => {
            // The closure may already have terminated the session.
            if session.is_open() {
                session.abort()?;
            }
            Err(e)
        }
    }
}
