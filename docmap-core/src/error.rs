//! Error types and result types for mapping and query operations.
//!
//! This module provides the error taxonomy shared by mappers, the mapper context,
//! criteria and executors. Use [`MappingResult<T>`] as the return type for fallible
//! operations.

use bson::spec::ElementType;
use thiserror::Error;

/// Represents all possible errors that can occur while mapping entities or running criteria.
///
/// Scalar property failures are normally reported as [`FieldIssue`](crate::mapper::FieldIssue)s
/// instead of surfacing here; every variant below that reaches a caller is fatal for the
/// operation that produced it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    /// The document has no value for a field that the mapped type requires.
    #[error("Missing field: {0}")]
    MissingField(String),
    /// The stored value has a different BSON type than the field expects.
    #[error("Invalid value for field {field}: expected {expected}, found {found:?}")]
    InvalidValue {
        /// The document field name.
        field: String,
        /// The expected value kind, as a human readable name.
        expected: &'static str,
        /// The BSON element type that was found.
        found: ElementType,
    },
    /// A value converter could not convert the value in either direction.
    #[error("Conversion error: {0}")]
    Conversion(String),
    /// No registered mapper can handle the given entity type or discriminator.
    #[error("No mapper registered for type {0}")]
    NoMapper(String),
    /// Two mappers were registered for the same entity type.
    #[error("Duplicate mapper registered for type {0}")]
    DuplicateMapper(String),
    /// Two distinct entity types share the same name, making discriminators ambiguous.
    #[error("Ambiguous entity type name: {0}")]
    AmbiguousTypeName(String),
    /// A type was declared as a subtype of two different parents.
    #[error("Conflicting parent types declared for {0}")]
    ConflictingParent(String),
    /// The declared type hierarchy loops back on itself.
    #[error("Type hierarchy cycle through {0}")]
    HierarchyCycle(String),
    /// A mapper needed its context but was never registered in one.
    #[error("Mapper for {0} is not attached to a mapper context")]
    Detached(String),
    /// A collection field holds something other than a sequence of documents.
    #[error("Invalid collection {field}: {reason}")]
    InvalidCollection {
        /// The document field name.
        field: String,
        /// What was wrong with the stored value.
        reason: String,
    },
    /// A negative limit was requested.
    #[error("Invalid limit: {0}")]
    InvalidLimit(i64),
    /// A negative skip was requested.
    #[error("Invalid skip: {0}")]
    InvalidSkip(i64),
    /// The query executor failed.
    #[error("Executor error: {0}")]
    Executor(String),
    /// Error during executor initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
}

impl MappingError {
    /// Builds an [`MappingError::InvalidValue`] for `field` from the offending value.
    pub fn invalid_value(field: impl Into<String>, expected: &'static str, found: &bson::Bson) -> Self {
        MappingError::InvalidValue {
            field: field.into(),
            expected,
            found: found.element_type(),
        }
    }

    /// Re-targets field-scoped errors at `field`, leaving the others untouched.
    ///
    /// Field values are decoded without knowing which document field they came from;
    /// property mappers use this to attach the field name afterwards.
    pub fn in_field(self, field: &str) -> Self {
        match self {
            MappingError::MissingField(_) => MappingError::MissingField(field.to_string()),
            MappingError::InvalidValue { expected, found, .. } => MappingError::InvalidValue {
                field: field.to_string(),
                expected,
                found,
            },
            other => other,
        }
    }
}

/// A specialized `Result` type for mapping and query operations.
pub type MappingResult<T> = Result<T, MappingError>;
