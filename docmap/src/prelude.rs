//! Convenient re-exports of commonly used types from docmap.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docmap::prelude::*;
//! ```
//!
//! This provides access to:
//! - Mappers, property and collection mappers
//! - The mapper context and entity type hierarchy
//! - Converters and field values
//! - Criteria, restrictions and executors
//! - Error types

pub use docmap_core::{
    collection::{CollectionField, CollectionMapper},
    context::{MapperContext, MapperContextBuilder},
    converter::{ConverterRegistry, EpochMillisConverter, ValueConverter},
    criteria::{Criteria, CriteriaFactory},
    entity::{DISCRIMINATOR_KEY, EntityType, Polymorphic, TypeEdge},
    error::{MappingError, MappingResult},
    executor::{CursorParameter, ExecutorBuilder, QueryExecutor},
    mapper::{CappedOptions, EntityMapper, FieldIssue, Mapped, Mapper},
    property::PropertyMapper,
    restriction::{
        DefaultRestrictionFactory, Restriction, RestrictionBetween, RestrictionEq, RestrictionFactory,
        Restrictions,
    },
    value::FieldValue,
};
