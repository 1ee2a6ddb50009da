//! Criteria: restriction accumulation, query compilation and execution.
//!
//! A [`Criteria`] collects restrictions and pagination, compiles them into a single
//! query document and hands that to a [`QueryExecutor`]. Compilation is pure: calling
//! [`create_query`](Criteria::create_query) any number of times yields the same
//! document and never touches the executor.
//!
//! Fragments are deep-merged in insertion order, so several restrictions on one field
//! combine their operators instead of replacing each other.
//!
//! # Example
//!
//! ```ignore
//! use docmap::prelude::*;
//!
//! let mut criteria = Criteria::new(&executor);
//! criteria.eq("status", "open").between("created", from, to);
//! criteria.limit(10)?.skip(20)?;
//!
//! let tickets = criteria.list_mapped(context.mapper::<Ticket>()?)?;
//! ```

use std::{fmt, sync::Arc};

use bson::{Bson, Document};
use tracing::{debug, warn};

use crate::{
    converter::ConverterRegistry,
    error::{MappingError, MappingResult},
    executor::{CursorParameter, QueryExecutor},
    mapper::Mapper,
    restriction::{DefaultRestrictionFactory, Restriction, RestrictionFactory},
};

/// Creates [`Criteria`] sharing one restriction factory and converter registry.
///
/// # Example
///
/// ```ignore
/// use docmap::criteria::CriteriaFactory;
///
/// let factory = CriteriaFactory::new().with_restriction_factory(RecordingFactory::default());
/// let criteria = factory.create(&executor);
/// ```
#[derive(Debug, Clone)]
pub struct CriteriaFactory {
    restrictions: Arc<dyn RestrictionFactory>,
    converters: Arc<ConverterRegistry>,
}

impl Default for CriteriaFactory {
    fn default() -> Self {
        Self {
            restrictions: Arc::new(DefaultRestrictionFactory),
            converters: Arc::new(ConverterRegistry::default()),
        }
    }
}

impl CriteriaFactory {
    /// Creates a factory with the default restrictions and converters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the factory used by [`Criteria::eq`] and [`Criteria::between`].
    pub fn with_restriction_factory(mut self, restrictions: impl RestrictionFactory + 'static) -> Self {
        self.restrictions = Arc::new(restrictions);
        self
    }

    /// Replaces the converters applied to restriction operands.
    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = Arc::new(converters);
        self
    }

    /// Creates an empty criteria over `executor`.
    pub fn create<'a>(&self, executor: &'a dyn QueryExecutor) -> Criteria<'a> {
        Criteria {
            executor,
            restrictions: Arc::clone(&self.restrictions),
            converters: Arc::clone(&self.converters),
            entries: Vec::new(),
            limit: None,
            skip: 0,
        }
    }
}

/// One query under construction.
///
/// Criteria are built by one caller and discarded after use; they are not meant to be
/// shared.
pub struct Criteria<'a> {
    executor: &'a dyn QueryExecutor,
    restrictions: Arc<dyn RestrictionFactory>,
    converters: Arc<ConverterRegistry>,
    entries: Vec<Box<dyn Restriction>>,
    limit: Option<i64>,
    skip: i64,
}

impl<'a> Criteria<'a> {
    /// Creates an empty criteria with the default restrictions and converters.
    pub fn new(executor: &'a dyn QueryExecutor) -> Self {
        CriteriaFactory::default().create(executor)
    }

    /// Adds a restriction. Restrictions are compiled in insertion order.
    pub fn add(&mut self, restriction: Box<dyn Restriction>) -> &mut Self {
        self.entries.push(restriction);
        self
    }

    /// Adds an equality restriction built by this criteria's factory.
    pub fn eq(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        let restriction = self.restrictions.eq(field, value.into());
        self.add(restriction)
    }

    /// Adds a `start <= field < end` restriction built by this criteria's factory.
    pub fn between(&mut self, field: &str, start: impl Into<Bson>, end: impl Into<Bson>) -> &mut Self {
        let restriction = self.restrictions.between(field, start.into(), end.into());
        self.add(restriction)
    }

    /// Caps the number of returned documents.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::InvalidLimit`] if `limit` is negative.
    pub fn limit(&mut self, limit: i64) -> MappingResult<&mut Self> {
        if limit < 0 {
            return Err(MappingError::InvalidLimit(limit));
        }

        self.limit = Some(limit);
        Ok(self)
    }

    /// Skips the first `skip` matching documents.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::InvalidSkip`] if `skip` is negative.
    pub fn skip(&mut self, skip: i64) -> MappingResult<&mut Self> {
        if skip < 0 {
            return Err(MappingError::InvalidSkip(skip));
        }

        self.skip = skip;
        Ok(self)
    }

    /// Returns the restrictions added so far, in insertion order.
    pub fn restrictions(&self) -> &[Box<dyn Restriction>] {
        &self.entries
    }

    /// Compiles every restriction into one query document.
    ///
    /// # Errors
    ///
    /// Returns an error if a restriction operand cannot be converted.
    pub fn create_query(&self) -> MappingResult<Document> {
        let mut query = Document::new();

        for restriction in &self.entries {
            merge_into(&mut query, restriction.fragment(&self.converters)?);
        }

        Ok(query)
    }

    /// Returns the pagination parameters that [`list`](Self::list) passes to the
    /// executor.
    pub fn cursor_parameter(&self) -> CursorParameter {
        CursorParameter::new(self.limit, self.skip)
    }

    /// Compiles the query and runs it, returning the executor's documents unmodified.
    ///
    /// # Errors
    ///
    /// Returns an error if compilation or the executor fails.
    pub fn list(&self) -> MappingResult<Vec<Document>> {
        self.run(self.cursor_parameter())
    }

    /// Runs the query and maps every result with `mapper`.
    ///
    /// Field issues on individual results are logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a result cannot be mapped.
    pub fn list_mapped<T: 'static>(&self, mapper: &Mapper<T>) -> MappingResult<Vec<T>> {
        self.list()?
            .iter()
            .map(|document| {
                let mapped = mapper.to_instance(document)?;

                if !mapped.is_complete() {
                    warn!(
                        entity = mapper.entity_type().name(),
                        issues = mapped.issues.len(),
                        "Mapped query result with field issues"
                    );
                }

                Ok(mapped.into_inner())
            })
            .collect()
    }

    /// Runs the query for at most one document.
    ///
    /// # Errors
    ///
    /// Returns an error if compilation or the executor fails.
    pub fn unique(&self) -> MappingResult<Option<Document>> {
        let cursor = self.cursor_parameter().with_limit(1);

        Ok(self.run(cursor)?.into_iter().next())
    }

    fn run(&self, cursor: CursorParameter) -> MappingResult<Vec<Document>> {
        let query = self.create_query()?;

        debug!(query = %query, limit = ?cursor.limit, skip = cursor.skip, "Executing criteria");

        let documents = self.executor.execute(&query, &cursor)?;

        debug!(count = documents.len(), "Criteria returned documents");

        Ok(documents)
    }
}

impl fmt::Debug for Criteria<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Criteria")
            .field("restrictions", &self.entries)
            .field("limit", &self.limit)
            .field("skip", &self.skip)
            .finish()
    }
}

/// Merges one restriction fragment into the query under construction.
///
/// Conditions on a field already present are combined in operator form, with a scalar
/// becoming `$eq`. When an operator is already set for that field the incoming
/// condition is appended to a top-level `$and`, so no condition is lost. Top-level
/// logical arrays are concatenated.
fn merge_into(query: &mut Document, fragment: Document) {
    let mut conjuncts = Vec::new();

    for (field, condition) in fragment {
        if !query.contains_key(&field) {
            query.insert(field, condition);
            continue;
        }
        let Some(current) = query.get_mut(&field) else {
            continue;
        };

        if field.starts_with('$')
            && let (Bson::Array(current), Bson::Array(incoming)) = (&mut *current, &condition)
        {
            current.extend(incoming.iter().cloned());
            continue;
        }

        let mut existing = operators(std::mem::replace(current, Bson::Null));
        let incoming = operators(condition);

        if incoming.keys().any(|op| existing.contains_key(op)) {
            *current = Bson::Document(existing);

            let mut conjunct = Document::new();
            conjunct.insert(field, Bson::Document(incoming));
            conjuncts.push(Bson::Document(conjunct));
        } else {
            for (op, operand) in incoming {
                existing.insert(op, operand);
            }
            *current = Bson::Document(existing);
        }
    }

    if conjuncts.is_empty() {
        return;
    }

    match query.get_mut("$and") {
        Some(Bson::Array(clauses)) => clauses.extend(conjuncts),
        _ => {
            query.insert("$and", Bson::Array(conjuncts));
        }
    }
}

/// Operator form of a field condition.
fn operators(condition: Bson) -> Document {
    match condition {
        Bson::Document(document)
            if !document.is_empty() && document.keys().all(|key| key.starts_with('$')) =>
        {
            document
        }
        other => {
            let mut document = Document::new();
            document.insert("$eq", other);
            document
        }
    }
}
