use bson::Document;
use mongodb::{
    options::FindOptions,
    sync::{Client, Collection as MongoCollection},
};
use tracing::debug;

use docmap_core::{
    error::{MappingError, MappingResult},
    executor::{CursorParameter, ExecutorBuilder, QueryExecutor},
};

/// [`QueryExecutor`] running queries against one MongoDB collection with the
/// synchronous driver.
#[derive(Debug, Clone)]
pub struct MongoDbExecutor {
    client: Client,
    database: String,
    collection: String,
}

impl MongoDbExecutor {
    pub fn new(client: Client, database: String, collection: String) -> Self {
        Self {
            client,
            database,
            collection,
        }
    }

    pub fn builder(dsn: &str, database: &str, collection: &str) -> MongoDbExecutorBuilder {
        MongoDbExecutorBuilder::new(dsn, database, collection)
    }

    /// The client this executor queries through.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn get_collection(&self) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&self.collection)
    }

    /// Stores documents produced by a mapper.
    pub fn insert_many(&self, documents: impl IntoIterator<Item = Document>) -> MappingResult<()> {
        let documents = documents.into_iter().collect::<Vec<_>>();

        if documents.is_empty() {
            return Ok(());
        }

        self.get_collection()
            .insert_many(documents)
            .run()
            .map_err(|e| MappingError::Executor(e.to_string()))?;

        Ok(())
    }
}

impl QueryExecutor for MongoDbExecutor {
    fn execute(&self, query: &Document, cursor: &CursorParameter) -> MappingResult<Vec<Document>> {
        let Some(options) = find_options(cursor)? else {
            debug!(collection = %self.collection, query = %query, "Skipping MongoDB find with zero limit");
            return Ok(Vec::new());
        };

        debug!(
            collection = %self.collection,
            query = %query,
            limit = ?cursor.limit,
            skip = cursor.skip,
            "Executing MongoDB find"
        );

        self.get_collection()
            .find(query.clone())
            .with_options(options)
            .run()
            .map_err(|e| MappingError::Executor(e.to_string()))?
            .map(|document| document.map_err(|e| MappingError::Executor(e.to_string())))
            .collect::<MappingResult<Vec<Document>>>()
    }
}

/// Translates cursor parameters into driver options.
///
/// Returns `None` for a zero limit: the server reads `limit: 0` as unbounded, while a
/// cursor limit of zero asks for no documents.
pub(crate) fn find_options(cursor: &CursorParameter) -> MappingResult<Option<FindOptions>> {
    let mut options = FindOptions::default();

    match cursor.limit {
        Some(0) => return Ok(None),
        Some(limit) if limit < 0 => return Err(MappingError::InvalidLimit(limit)),
        limit => options.limit = limit,
    }

    let skip = u64::try_from(cursor.skip).map_err(|_| MappingError::InvalidSkip(cursor.skip))?;
    if skip > 0 {
        options.skip = Some(skip);
    }

    Ok(Some(options))
}

/// Builder for constructing [`MongoDbExecutor`] instances.
///
/// # Example
///
/// ```ignore
/// use docmap::{executor::ExecutorBuilder, mongodb::MongoDbExecutor};
///
/// let executor = MongoDbExecutor::builder("mongodb://localhost:27017", "shop", "orders").build()?;
/// ```
pub struct MongoDbExecutorBuilder {
    dsn: String,
    database: String,
    collection: String,
}

impl MongoDbExecutorBuilder {
    pub fn new(dsn: &str, database: &str, collection: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            collection: collection.to_string(),
        }
    }
}

impl ExecutorBuilder for MongoDbExecutorBuilder {
    type Executor = MongoDbExecutor;

    fn build(self) -> MappingResult<Self::Executor> {
        Ok(MongoDbExecutor::new(
            Client::with_uri_str(&self.dsn).map_err(|e| MappingError::Initialization(e.to_string()))?,
            self.database,
            self.collection,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_cursor_sets_no_options() {
        let options = find_options(&CursorParameter::unbounded()).unwrap().unwrap();

        assert_eq!(options.limit, None);
        assert_eq!(options.skip, None);
    }

    #[test]
    fn cursor_values_become_find_options() {
        let options = find_options(&CursorParameter::new(Some(10), 3)).unwrap().unwrap();

        assert_eq!(options.limit, Some(10));
        assert_eq!(options.skip, Some(3));
    }

    #[test]
    fn zero_limit_skips_the_query() {
        assert!(find_options(&CursorParameter::new(Some(0), 0)).unwrap().is_none());
    }

    #[test]
    fn negative_cursor_values_are_rejected() {
        assert!(matches!(
            find_options(&CursorParameter::new(Some(-1), 0)),
            Err(MappingError::InvalidLimit(-1))
        ));
        assert!(matches!(
            find_options(&CursorParameter::new(None, -4)),
            Err(MappingError::InvalidSkip(-4))
        ));
    }
}
