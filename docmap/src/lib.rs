//! Declarative object-document mapping and criteria queries over BSON documents.
//!
//! This crate is the primary entry point for users of docmap. It re-exports the core
//! mapping and query types and provides access to the query executor backends.
//!
//! # Features
//!
//! - **Declarative mappers** - Map entity fields to document keys without reflection
//! - **Nested and polymorphic collections** - Sequences of entities, resolved through a mapper context
//! - **Tolerant population** - Malformed scalar fields are reported, not fatal
//! - **Criteria queries** - Equality and range restrictions compiled to query documents
//! - **Multiple backends** - In-memory and MongoDB executors behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmap::{prelude::*, memory::InMemoryExecutor};
//!
//! #[derive(Debug, Default)]
//! pub struct User {
//!     pub name: String,
//!     pub age: i32,
//! }
//!
//! let context = MapperContext::builder()
//!     .register(
//!         Mapper::<User>::new()
//!             .add_property(PropertyMapper::new("name", |u: &User| u.name.clone(), |u, v| u.name = v))
//!             .add_property(PropertyMapper::new("age", |u: &User| u.age, |u, v| u.age = v)),
//!     )
//!     .build()?;
//!
//! let executor = InMemoryExecutor::new();
//! executor.insert(context.to_document(&User { name: "Alice".into(), age: 30 })?);
//!
//! let mut criteria = Criteria::new(&executor);
//! criteria.between("age", 18, 65);
//!
//! let users = criteria.list_mapped(context.mapper::<User>()?)?;
//! ```
//!
//! # Polymorphic collections
//!
//! Elements of a polymorphic collection are saved with a `_type` discriminator naming
//! their runtime type, and read back with the most specific registered mapper.
//!
//! ```ignore
//! use docmap::prelude::*;
//!
//! enum Shape {
//!     Circle(Circle),
//!     Square(Square),
//! }
//!
//! impl Polymorphic for Shape {
//!     // ...
//! }
//!
//! let drawing = Mapper::<Drawing>::new().add_collection(CollectionMapper::polymorphic(
//!     "shapes",
//!     |d: &Drawing| &d.shapes,
//!     |d, v| d.shapes = v,
//! ));
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory executor for development and testing
//! - [`mongodb`] - MongoDB executor and collection provisioning (requires `mongodb` feature)

pub mod prelude;

pub use docmap_core::{
    collection, context, converter, criteria, entity, error, executor, mapper, property, restriction, value,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory executor implementations.
pub mod memory {
    pub use docmap_memory::{InMemoryExecutor, InMemoryExecutorBuilder};
}

/// MongoDB executor implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmap_mongodb::{CollectionProvisioner, MongoDbExecutor, MongoDbExecutorBuilder};
}
