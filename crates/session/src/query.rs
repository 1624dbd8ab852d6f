//! Lazy queries over one entity kind
//!
//! A `Query` pairs an `EntityType` with an optional `Predicate`. Evaluating it
//! against a session produces a `LazyResultSequence`, which opens a fresh
//! storage iterator for every terminal call (`first`, `first_or_null`,
//! `size`, `iter`) and releases it before returning.
//!
//! # Push-down
//!
//! | Predicate                     | Storage call       |
//! |-------------------------------|--------------------|
//! | `property = literal`          | `find`             |
//! | `link ne null`                | `find_with_links`  |
//! | `link = entity`               | `find_links`       |
//! | anything else                 | `get_all` + scan   |
//!
//! For `a and b` one pushable operand drives the storage call and the other
//! becomes a residual filter. Residual filters run on materialized proxies,
//! so every candidate a scan visits lands in the session's identity cache.

use std::rc::{Rc, Weak};

use strata_core::{EntityId, PersistentIterator, StrataError, StrataResult, Value};

use crate::adapter::TransientIteratorAdapter;
use crate::entity::TransientEntity;
use crate::model::EntityType;
use crate::session::{SessionInner, TransientSession};

// ============================================================================
// Predicates
// ============================================================================

/// Field a comparison looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// Property by name
    Property(String),
    /// Link by code-facing name
    Link(String),
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Equal
    Eq,
    /// Not equal
    Ne,
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Property literal
    Value(Value),
    /// Link target
    Entity(EntityId),
    /// Absence of a value or link
    Null,
}

/// Predicate expression tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `field op operand`
    Compare {
        /// Compared field
        field: Field,
        /// Operator
        op: Comparison,
        /// Compared-to operand
        operand: Operand,
    },
    /// Both hold
    And(Box<Predicate>, Box<Predicate>),
    /// Either holds
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// `self and other`
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// `self or other`
    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    fn compare(field: Field, op: Comparison, operand: Operand) -> Predicate {
        Predicate::Compare { field, op, operand }
    }

    /// Same predicate with link names replaced by persisted names
    fn with_db_links(&self, db_name: &impl Fn(&str) -> String) -> Predicate {
        match self {
            Predicate::Compare {
                field: Field::Link(name),
                op,
                operand,
            } => Predicate::compare(Field::Link(db_name(name)), *op, operand.clone()),
            Predicate::Compare { .. } => self.clone(),
            Predicate::And(a, b) => a.with_db_links(db_name).and(b.with_db_links(db_name)),
            Predicate::Or(a, b) => a.with_db_links(db_name).or(b.with_db_links(db_name)),
        }
    }

    /// Evaluate against a proxy; link names must already be persisted names
    fn matches(&self, entity: &TransientEntity) -> StrataResult<bool> {
        match self {
            Predicate::And(a, b) => Ok(a.matches(entity)? && b.matches(entity)?),
            Predicate::Or(a, b) => Ok(a.matches(entity)? || b.matches(entity)?),
            Predicate::Compare { field, op, operand } => {
                let holds = match (field, operand) {
                    (Field::Property(name), Operand::Value(v)) => {
                        entity.get_property(name)?.as_ref() == Some(v)
                    }
                    (Field::Property(name), Operand::Null) => entity.get_property(name)?.is_none(),
                    (Field::Link(name), Operand::Entity(target)) => {
                        entity.db_link_targets(name)?.contains(target)
                    }
                    (Field::Link(name), Operand::Null) => entity.db_link_targets(name)?.is_empty(),
                    (field, operand) => {
                        return Err(StrataError::invalid_input(format!(
                            "cannot compare {:?} with {:?}",
                            field, operand
                        )))
                    }
                };
                Ok(match op {
                    Comparison::Eq => holds,
                    Comparison::Ne => !holds,
                })
            }
        }
    }
}

/// Start a property comparison
pub fn property(name: impl Into<String>) -> PropertyField {
    PropertyField(name.into())
}

/// Start a link comparison
pub fn link(name: impl Into<String>) -> LinkField {
    LinkField(name.into())
}

/// Property side of a comparison under construction
#[derive(Debug, Clone)]
pub struct PropertyField(String);

#[allow(clippy::should_implement_trait)]
impl PropertyField {
    /// `property = value`
    pub fn eq(self, value: impl Into<Value>) -> Predicate {
        Predicate::compare(Field::Property(self.0), Comparison::Eq, Operand::Value(value.into()))
    }

    /// `property != value`; entities without the property match
    pub fn ne(self, value: impl Into<Value>) -> Predicate {
        Predicate::compare(Field::Property(self.0), Comparison::Ne, Operand::Value(value.into()))
    }

    /// `property is null`
    pub fn eq_null(self) -> Predicate {
        Predicate::compare(Field::Property(self.0), Comparison::Eq, Operand::Null)
    }

    /// `property is not null`
    pub fn ne_null(self) -> Predicate {
        Predicate::compare(Field::Property(self.0), Comparison::Ne, Operand::Null)
    }
}

/// Link side of a comparison under construction
#[derive(Debug, Clone)]
pub struct LinkField(String);

#[allow(clippy::should_implement_trait)]
impl LinkField {
    /// `link` contains `target`
    pub fn eq(self, target: &TransientEntity) -> Predicate {
        Predicate::compare(Field::Link(self.0), Comparison::Eq, Operand::Entity(target.id()))
    }

    /// `link` does not contain `target`
    pub fn ne(self, target: &TransientEntity) -> Predicate {
        Predicate::compare(Field::Link(self.0), Comparison::Ne, Operand::Entity(target.id()))
    }

    /// `link` is empty
    pub fn eq_null(self) -> Predicate {
        Predicate::compare(Field::Link(self.0), Comparison::Eq, Operand::Null)
    }

    /// `link` is not empty
    pub fn ne_null(self) -> Predicate {
        Predicate::compare(Field::Link(self.0), Comparison::Ne, Operand::Null)
    }
}

// ============================================================================
// Planning
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Source {
    Scan,
    Find { property: String, value: Value },
    WithLinks { link: String },
    LinksTo { link: String, target: EntityId },
}

/// Storage call answering `predicate` on its own, if any
fn push_down(predicate: &Predicate) -> Option<Source> {
    let Predicate::Compare { field, op, operand } = predicate else {
        return None;
    };
    match (field, op, operand) {
        (Field::Property(p), Comparison::Eq, Operand::Value(v)) => Some(Source::Find {
            property: p.clone(),
            value: v.clone(),
        }),
        (Field::Link(l), Comparison::Ne, Operand::Null) => Some(Source::WithLinks { link: l.clone() }),
        (Field::Link(l), Comparison::Eq, Operand::Entity(t)) => Some(Source::LinksTo {
            link: l.clone(),
            target: *t,
        }),
        _ => None,
    }
}

fn plan(predicate: Option<Predicate>) -> (Source, Option<Predicate>) {
    let Some(predicate) = predicate else {
        return (Source::Scan, None);
    };
    if let Some(source) = push_down(&predicate) {
        return (source, None);
    }
    if let Predicate::And(a, b) = &predicate {
        if let Some(source) = push_down(a) {
            return (source, Some((**b).clone()));
        }
        if let Some(source) = push_down(b) {
            return (source, Some((**a).clone()));
        }
    }
    (Source::Scan, Some(predicate))
}

// ============================================================================
// Query
// ============================================================================

/// Declarative predicate over one entity kind
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    entity_type: EntityType,
    predicate: Option<Predicate>,
}

impl Query {
    /// Every entity of the kind
    pub fn all(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            predicate: None,
        }
    }

    /// Entities of the kind matching `predicate`
    pub fn new(entity_type: EntityType, predicate: Predicate) -> Self {
        Self {
            entity_type,
            predicate: Some(predicate),
        }
    }

    /// Queried kind
    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Predicate, if any
    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    /// Bind the query to `session`
    ///
    /// Link names resolve through the query's `EntityType` first and the
    /// session's model registry second.
    pub fn evaluate(&self, session: &TransientSession) -> StrataResult<LazyResultSequence> {
        let inner = session.inner();
        inner.ensure_open("evaluate query")?;
        let kind = self.entity_type.kind();
        let db_name = |name: &str| {
            if self.entity_type.links().iter().any(|l| l.name() == name) {
                self.entity_type.link_db_name(name).to_string()
            } else {
                inner.link_db_name(kind, name)
            }
        };
        let translated = self.predicate.as_ref().map(|p| p.with_db_links(&db_name));
        let (source, residual) = plan(translated);
        tracing::debug!(
            target: "strata::query",
            kind,
            pushed_down = source != Source::Scan,
            residual = residual.is_some(),
            "query planned"
        );
        Ok(LazyResultSequence {
            session: Rc::downgrade(inner),
            kind: kind.to_string(),
            source,
            residual,
        })
    }
}

// ============================================================================
// LazyResultSequence
// ============================================================================

/// Query bound to a session, evaluated on demand
#[derive(Debug)]
pub struct LazyResultSequence {
    session: Weak<SessionInner>,
    kind: String,
    source: Source,
    residual: Option<Predicate>,
}

impl LazyResultSequence {
    /// Queried kind
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// True if storage answers the query's driving predicate by index
    pub fn is_pushed_down(&self) -> bool {
        self.source != Source::Scan
    }

    fn open(&self) -> StrataResult<TransientIteratorAdapter> {
        let session = self
            .session
            .upgrade()
            .ok_or_else(|| StrataError::session_closed("evaluate query", "dropped"))?;
        session.ensure_open("evaluate query")?;
        let source: PersistentIterator = {
            let txn = session.txn();
            match &self.source {
                Source::Scan => txn.get_all(&self.kind),
                Source::Find { property, value } => txn.find(&self.kind, property, value),
                Source::WithLinks { link } => txn.find_with_links(&self.kind, link),
                Source::LinksTo { link, target } => txn.find_links(&self.kind, *target, link),
            }
        };
        Ok(session.adapter(source))
    }

    /// Run `f` on a fresh adapter and release it on every path
    fn with_adapter<T>(
        &self,
        f: impl FnOnce(&mut TransientIteratorAdapter) -> StrataResult<T>,
    ) -> StrataResult<T> {
        let mut adapter = self.open()?;
        let result = f(&mut adapter);
        let released = adapter.dispose();
        settle(result, released)
    }

    /// First matching entity, pulling no further than the match
    pub fn first_or_null(&self) -> StrataResult<Option<TransientEntity>> {
        self.with_adapter(|adapter| next_match(adapter, self.residual.as_ref()))
    }

    /// First matching entity
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing matches.
    pub fn first(&self) -> StrataResult<TransientEntity> {
        self.first_or_null()?.ok_or_else(|| {
            StrataError::not_found(format!("no {} entity matches the query", self.kind))
        })
    }

    /// True if nothing matches
    pub fn is_empty(&self) -> StrataResult<bool> {
        Ok(self.first_or_null()?.is_none())
    }

    /// Number of matching entities
    ///
    /// Fully pushed-down and unfiltered queries count raw ids without
    /// materializing proxies.
    pub fn size(&self) -> StrataResult<usize> {
        self.with_adapter(|adapter| match &self.residual {
            None => {
                let mut count = 0;
                while adapter.next_id().is_some() {
                    count += 1;
                }
                Ok(count)
            }
            Some(residual) => {
                let mut count = 0;
                while next_match(adapter, Some(residual))?.is_some() {
                    count += 1;
                }
                Ok(count)
            }
        })
    }

    /// Iterator over matching entities
    ///
    /// The storage cursor is released when the iterator is exhausted or
    /// dropped.
    pub fn iter(&self) -> StrataResult<QueryIter> {
        Ok(QueryIter {
            adapter: self.open()?,
            residual: self.residual.clone(),
            done: false,
        })
    }
}

fn next_match(
    adapter: &mut TransientIteratorAdapter,
    residual: Option<&Predicate>,
) -> StrataResult<Option<TransientEntity>> {
    while let Some(entity) = adapter.try_next()? {
        match residual {
            Some(p) if !p.matches(&entity)? => continue,
            _ => return Ok(Some(entity)),
        }
    }
    Ok(None)
}

/// Iterator over the matches of a `LazyResultSequence`
#[derive(Debug)]
pub struct QueryIter {
    adapter: TransientIteratorAdapter,
    residual: Option<Predicate>,
    done: bool,
}

impl Iterator for QueryIter {
    type Item = StrataResult<TransientEntity>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match next_match(&mut self.adapter, self.residual.as_ref()) {
            Ok(Some(entity)) => Some(Ok(entity)),
            Ok(None) => {
                self.done = true;
                self.adapter.dispose().err().map(Err)
            }
            Err(e) => {
                self.done = true;
                if let Err(release_error) = self.adapter.dispose() {
                    log_release_failure(&release_error);
                }
                Some(Err(e))
            }
        }
    }
}

/// Outcome of a query step followed by a cursor release; the step's own
/// error wins and a release error behind it is logged
fn settle<T>(result: StrataResult<T>, released: StrataResult<bool>) -> StrataResult<T> {
    match (result, released) {
        (Ok(value), Ok(_)) => Ok(value),
        (Ok(_), Err(release_error)) => Err(release_error),
        (Err(e), Ok(_)) => Err(e),
        (Err(e), Err(release_error)) => {
            log_release_failure(&release_error);
            Err(e)
        }
    }
}

fn log_release_failure(error: &StrataError) {
    tracing::error!(
        target: "strata::query",
        error = %error,
        "cursor release failed after query error"
    );
}
