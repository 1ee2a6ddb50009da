//! The query execution interface consumed by [`Criteria`](crate::criteria::Criteria).
//!
//! This module defines the seam between query compilation and the document store:
//!
//! - [`QueryExecutor`]: runs a compiled query document with pagination parameters
//! - [`CursorParameter`]: the pagination envelope (limit and skip)
//! - [`ExecutorBuilder`]: factory trait for creating executor instances
//!
//! Backends live in their own crates (`docmap-memory`, `docmap-mongodb`).

use bson::Document;
use serde::{Deserialize, Serialize};

use crate::error::MappingResult;

/// Pagination parameters passed to an executor alongside a query.
///
/// `limit` is `None` when unbounded, and `Some(0)` asks for no documents. Both values
/// are non-negative once they reach an executor; [`Criteria`](crate::criteria::Criteria)
/// validates them when they are set.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorParameter {
    /// Maximum number of documents to return.
    pub limit: Option<i64>,
    /// Number of matching documents to skip.
    pub skip: i64,
}

impl CursorParameter {
    /// Creates cursor parameters.
    pub fn new(limit: Option<i64>, skip: i64) -> Self {
        Self { limit, skip }
    }

    /// An unbounded cursor starting at the first match.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Returns a copy with the limit replaced.
    pub fn with_limit(self, limit: i64) -> Self {
        Self { limit: Some(limit), ..self }
    }
}

/// Executes compiled query documents against a document store.
///
/// Implementations return the matching documents in store order, with `skip` applied
/// before `limit`.
///
/// # Example
///
/// ```ignore
/// use docmap::executor::{CursorParameter, QueryExecutor};
/// use bson::doc;
///
/// let documents = executor.execute(&doc! { "name": "Alice" }, &CursorParameter::new(Some(10), 0))?;
/// ```
pub trait QueryExecutor {
    /// Runs `query` and returns the matching documents.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::Executor`](crate::error::MappingError::Executor) if the
    /// store fails or cannot evaluate the query.
    fn execute(&self, query: &Document, cursor: &CursorParameter) -> MappingResult<Vec<Document>>;
}

/// Factory trait for creating [`QueryExecutor`] instances.
///
/// Backend crates implement this for their builder types so that connection setup can
/// fail with a typed error instead of panicking in a constructor.
pub trait ExecutorBuilder {
    /// The executor type produced by this builder.
    type Executor: QueryExecutor;

    /// Builds the executor.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::Initialization`](crate::error::MappingError::Initialization)
    /// if the backend cannot be set up.
    fn build(self) -> MappingResult<Self::Executor>;
}
