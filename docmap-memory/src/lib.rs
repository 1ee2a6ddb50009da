//! In-memory query executor for docmap.
//!
//! This crate provides a thread-safe, in-memory implementation of the `QueryExecutor`
//! trait. It evaluates compiled query documents against stored documents and is ideal
//! for development and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes behind a read-write lock
//! - **Query evaluation** - Equality, comparison, membership, existence and logical operators
//! - **Dotted paths** - Conditions on nested documents and array elements
//! - **Pagination** - Skip and limit, applied in insertion order
//!
//! # Quick Start
//!
//! ```ignore
//! use docmap::{prelude::*, memory::InMemoryExecutor, bson::doc};
//!
//! let executor = InMemoryExecutor::new();
//! executor.insert(doc! { "name": "Alice", "age": 30 });
//!
//! let mut criteria = Criteria::new(&executor);
//! criteria.between("age", 18, 65);
//!
//! let users = criteria.list_mapped(context.mapper::<User>()?)?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_memory;

pub mod evaluator;
pub mod executor;

pub use executor::{InMemoryExecutor, InMemoryExecutorBuilder};
