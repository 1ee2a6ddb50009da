//! MongoDB backend for docmap.
//!
//! This crate provides a MongoDB-based implementation of the `QueryExecutor` trait on
//! top of the synchronous driver, and a provisioner that creates collections from
//! mapper metadata (including capped collections).
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmap = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docmap::{prelude::*, mongodb::{MongoDbExecutor, CollectionProvisioner}};
//!
//! let executor = MongoDbExecutor::builder("mongodb://localhost:27017", "shop", "orders").build()?;
//!
//! CollectionProvisioner::new(executor.client().clone(), "shop")
//!     .provision("orders", context.mapper::<Order>()?)?;
//!
//! let mut criteria = Criteria::new(&executor);
//! criteria.eq("status", "open");
//! let orders = criteria.list_mapped(context.mapper::<Order>()?)?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_mongodb;

pub mod executor;
pub mod provision;

pub use executor::{MongoDbExecutor, MongoDbExecutorBuilder};
pub use provision::CollectionProvisioner;
