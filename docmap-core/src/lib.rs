//! Declarative object-document mapping and criteria queries over BSON documents.
//!
//! This crate is the core of the docmap project and provides:
//!
//! - **Field values** ([`value`]) - Conversion of Rust field types to and from BSON
//! - **Value converters** ([`converter`]) - Symmetric per-value storage transformations
//! - **Property mappers** ([`property`]) - One field mapped to one document key
//! - **Collection mappers** ([`collection`]) - Sequences and sets of nested entities, including polymorphic ones
//! - **Entity mappers** ([`mapper`]) - Full object ⇄ document population for one entity type
//! - **Entity types** ([`entity`]) - Type descriptors and the declared subtype hierarchy
//! - **Mapper context** ([`context`]) - Registry resolving types and discriminators to mappers
//! - **Restrictions** ([`restriction`]) - Typed query predicates and their factory
//! - **Criteria** ([`criteria`]) - Query compilation and execution
//! - **Executors** ([`executor`]) - The interface to the document store
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmap_core::{context::MapperContext, mapper::Mapper, property::PropertyMapper};
//!
//! #[derive(Debug, Default)]
//! pub struct User {
//!     pub name: String,
//! }
//!
//! let context = MapperContext::builder()
//!     .register(Mapper::<User>::new().add_property(PropertyMapper::new(
//!         "name",
//!         |u: &User| u.name.clone(),
//!         |u, v| u.name = v,
//!     )))
//!     .build()?;
//!
//! let document = context.to_document(&User { name: "Alice".into() })?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_core;

pub mod collection;
pub mod context;
pub mod converter;
pub mod criteria;
pub mod entity;
pub mod error;
pub mod executor;
pub mod mapper;
pub mod property;
pub mod restriction;
pub mod value;
