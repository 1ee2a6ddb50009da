//! Value converters applied symmetrically when values cross the storage boundary.
//!
//! A [`ValueConverter`] rewrites a BSON value on its way into a document
//! ([`to_storage`](ValueConverter::to_storage)) and back out of it
//! ([`from_storage`](ValueConverter::from_storage)). Property mappers hold an optional
//! converter for their own field; criteria look converters up by value kind in a
//! [`ConverterRegistry`]. Both paths use the same converter implementations, so a
//! timestamp written by a mapper and a timestamp used in a restriction always end up
//! with the same stored representation.

use std::{fmt::Debug, sync::Arc};

use bson::{Bson, DateTime, spec::ElementType};

use crate::error::{MappingError, MappingResult};

/// A per-field transformation applied on write and reversed on read.
pub trait ValueConverter: Send + Sync + Debug {
    /// Converts an in-memory value into its stored representation.
    fn to_storage(&self, value: Bson) -> MappingResult<Bson>;

    /// Converts a stored value back into its in-memory representation.
    fn from_storage(&self, value: Bson) -> MappingResult<Bson>;
}

/// Stores timestamps as epoch milliseconds (`Int64`).
///
/// Writing accepts `DateTime` values; reading accepts `Int64` or `Int32` milliseconds.
/// `Null` passes through in both directions so optional timestamps stay optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochMillisConverter;

impl ValueConverter for EpochMillisConverter {
    fn to_storage(&self, value: Bson) -> MappingResult<Bson> {
        match value {
            Bson::DateTime(dt) => Ok(Bson::Int64(dt.timestamp_millis())),
            Bson::Null => Ok(Bson::Null),
            other => Err(MappingError::Conversion(format!(
                "expected a datetime to store as epoch millis, found {:?}",
                other.element_type()
            ))),
        }
    }

    fn from_storage(&self, value: Bson) -> MappingResult<Bson> {
        match value {
            Bson::Int64(millis) => Ok(Bson::DateTime(DateTime::from_millis(millis))),
            Bson::Int32(millis) => Ok(Bson::DateTime(DateTime::from_millis(millis as i64))),
            Bson::Null => Ok(Bson::Null),
            other => Err(MappingError::Conversion(format!(
                "expected epoch millis, found {:?}",
                other.element_type()
            ))),
        }
    }
}

/// Converters keyed by the BSON kind of the in-memory value.
///
/// The default registry converts `DateTime` values with [`EpochMillisConverter`].
///
/// # Example
///
/// ```ignore
/// use docmap::converter::ConverterRegistry;
/// use bson::{Bson, DateTime};
///
/// let registry = ConverterRegistry::default();
/// let stored = registry.to_storage(Bson::DateTime(DateTime::from_millis(42))).unwrap();
/// assert_eq!(stored, Bson::Int64(42));
/// ```
#[derive(Debug, Clone)]
pub struct ConverterRegistry {
    converters: Vec<(ElementType, Arc<dyn ValueConverter>)>,
}

impl ConverterRegistry {
    /// Creates a registry with no converters; every value passes through unchanged.
    pub fn empty() -> Self {
        Self { converters: Vec::new() }
    }

    /// Registers `converter` for values of `kind`, replacing any previous one.
    pub fn with_converter(mut self, kind: ElementType, converter: impl ValueConverter + 'static) -> Self {
        self.converters.retain(|(k, _)| *k != kind);
        self.converters.push((kind, Arc::new(converter)));
        self
    }

    /// Returns the converter registered for `kind`, if any.
    pub fn for_kind(&self, kind: ElementType) -> Option<&Arc<dyn ValueConverter>> {
        self.converters
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, converter)| converter)
    }

    /// Converts a value into its stored representation.
    ///
    /// Arrays are converted element by element. Values of a kind without a
    /// registered converter are returned as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if the matching converter rejects the value.
    pub fn to_storage(&self, value: Bson) -> MappingResult<Bson> {
        match value {
            Bson::Array(items) => Ok(Bson::Array(
                items
                    .into_iter()
                    .map(|item| self.to_storage(item))
                    .collect::<MappingResult<Vec<_>>>()?,
            )),
            other => match self.for_kind(other.element_type()) {
                Some(converter) => converter.to_storage(other),
                None => Ok(other),
            },
        }
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::empty().with_converter(ElementType::DateTime, EpochMillisConverter)
    }
}
