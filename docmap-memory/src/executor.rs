//! In-memory query execution.
//!
//! This module provides a simple executor that keeps documents in insertion order
//! behind a read-write lock and evaluates compiled query documents against them.

use std::sync::Arc;

use bson::Document;
use parking_lot::RwLock;
use tracing::debug;

use docmap_core::{
    error::{MappingError, MappingResult},
    executor::{CursorParameter, ExecutorBuilder, QueryExecutor},
};

use crate::evaluator::QueryEvaluator;

/// Thread-safe in-memory [`QueryExecutor`].
///
/// `InMemoryExecutor` is cloneable and uses an `Arc`-wrapped internal state. Multiple
/// clones of the same instance share the same documents.
///
/// # Performance
///
/// Queries scan every stored document (no indexing), which is fine for tests and
/// small datasets.
///
/// # Example
///
/// ```ignore
/// use docmap_memory::InMemoryExecutor;
/// use docmap::{criteria::Criteria, bson::doc};
///
/// let executor = InMemoryExecutor::new();
/// executor.insert(doc! { "name": "Alice", "age": 30 });
///
/// let mut criteria = Criteria::new(&executor);
/// criteria.eq("name", "Alice");
/// assert_eq!(criteria.list()?.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryExecutor {
    documents: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryExecutor {
    /// Creates an executor with no documents.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for an `InMemoryExecutor`, optionally seeded with documents.
    pub fn builder() -> InMemoryExecutorBuilder {
        InMemoryExecutorBuilder::default()
    }

    /// Appends a document.
    pub fn insert(&self, document: Document) {
        self.documents.write().push(document);
    }

    /// Appends documents, keeping their order.
    pub fn insert_many(&self, documents: impl IntoIterator<Item = Document>) {
        self.documents.write().extend(documents);
    }

    /// Removes every document.
    pub fn clear(&self) {
        self.documents.write().clear();
    }

    /// Returns the number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns `true` if no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Returns a snapshot of the stored documents.
    pub fn documents(&self) -> Vec<Document> {
        self.documents.read().clone()
    }
}

impl QueryExecutor for InMemoryExecutor {
    fn execute(&self, query: &Document, cursor: &CursorParameter) -> MappingResult<Vec<Document>> {
        let skip = usize::try_from(cursor.skip).map_err(|_| MappingError::InvalidSkip(cursor.skip))?;
        let limit = match cursor.limit {
            Some(limit) => usize::try_from(limit).map_err(|_| MappingError::InvalidLimit(limit))?,
            None => usize::MAX,
        };

        let documents = self.documents.read();
        let matched = QueryEvaluator::filter_documents(documents.iter(), query)?;

        debug!(
            query = %query,
            matched = matched.len(),
            skip,
            limit = ?cursor.limit,
            "Evaluated in-memory query"
        );

        Ok(matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect::<Vec<_>>())
    }
}

/// Builder for constructing [`InMemoryExecutor`] instances.
///
/// # Example
///
/// ```ignore
/// use docmap::{executor::ExecutorBuilder, memory::InMemoryExecutor, bson::doc};
///
/// let executor = InMemoryExecutor::builder()
///     .with_documents([doc! { "name": "Alice" }])
///     .build()?;
/// ```
#[derive(Default, Debug)]
pub struct InMemoryExecutorBuilder {
    documents: Vec<Document>,
}

impl InMemoryExecutorBuilder {
    /// Seeds the executor with `documents`.
    pub fn with_documents(mut self, documents: impl IntoIterator<Item = Document>) -> Self {
        self.documents.extend(documents);
        self
    }
}

impl ExecutorBuilder for InMemoryExecutorBuilder {
    type Executor = InMemoryExecutor;

    fn build(self) -> MappingResult<Self::Executor> {
        Ok(InMemoryExecutor {
            documents: Arc::new(RwLock::new(self.documents)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    fn people() -> InMemoryExecutor {
        InMemoryExecutor::builder()
            .with_documents((1..=5).map(|n| doc! { "n": n, "even": n % 2 == 0 }))
            .build()
            .unwrap()
    }

    #[test]
    fn filters_in_insertion_order() {
        let results = people()
            .execute(&doc! { "even": true }, &CursorParameter::unbounded())
            .unwrap();

        assert_eq!(results, vec![doc! { "n": 2, "even": true }, doc! { "n": 4, "even": true }]);
    }

    #[test]
    fn applies_skip_before_limit() {
        let results = people()
            .execute(&doc! {}, &CursorParameter::new(Some(2), 1))
            .unwrap();

        assert_eq!(
            results.iter().map(|d| d.get_i32("n").unwrap()).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[test]
    fn rejects_negative_cursor_values() {
        let executor = people();

        assert_eq!(
            executor.execute(&doc! {}, &CursorParameter::new(None, -1)),
            Err(MappingError::InvalidSkip(-1))
        );
        assert_eq!(
            executor.execute(&doc! {}, &CursorParameter::new(Some(-2), 0)),
            Err(MappingError::InvalidLimit(-2))
        );
    }

    #[test]
    fn zero_limit_returns_nothing() {
        let results = people()
            .execute(&doc! {}, &CursorParameter::new(Some(0), 0))
            .unwrap();

        assert!(results.is_empty());
    }

    #[test]
    fn clones_share_documents() {
        let executor = InMemoryExecutor::new();
        let clone = executor.clone();

        clone.insert(doc! { "n": 1 });
        assert_eq!(executor.len(), 1);

        executor.insert_many([doc! { "n": 2 }, doc! { "n": 3 }]);
        assert_eq!(clone.documents().len(), 3);

        clone.clear();
        assert!(executor.is_empty());
    }
}
