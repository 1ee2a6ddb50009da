//! Conversion between Rust field types and BSON values.
//!
//! Mappers never inspect entity types at runtime. Instead every mapped field goes through
//! [`FieldValue`], which knows how to turn one Rust type into a [`Bson`] value and back.
//! Decoding errors are reported with an empty field name; the property mapper that owns
//! the field fills it in (see [`MappingError::in_field`]).

use bson::{Bson, DateTime as BsonDateTime, Document, oid::ObjectId};
use chrono::{DateTime, Utc};

use crate::error::{MappingError, MappingResult};

/// A Rust type that can be stored in a single document field.
///
/// # Example
///
/// ```ignore
/// use docmap::value::FieldValue;
/// use bson::Bson;
///
/// assert_eq!("Alice".to_string().to_bson(), Bson::String("Alice".into()));
/// assert_eq!(i64::from_bson(Bson::Int64(7)).unwrap(), 7);
/// ```
pub trait FieldValue: Sized {
    /// Encodes this value for storage.
    fn to_bson(&self) -> Bson;

    /// Decodes a stored value.
    ///
    /// `Bson::Null` is passed for absent fields, so types that cannot be null
    /// must reject it with [`MappingError::MissingField`].
    ///
    /// # Errors
    ///
    /// Returns an error if the value has the wrong BSON type.
    fn from_bson(value: Bson) -> MappingResult<Self>;
}

fn missing_or_invalid<T>(expected: &'static str, value: &Bson) -> MappingResult<T> {
    match value {
        Bson::Null => Err(MappingError::MissingField(String::new())),
        other => Err(MappingError::invalid_value("", expected, other)),
    }
}

impl FieldValue for String {
    fn to_bson(&self) -> Bson {
        Bson::String(self.clone())
    }

    fn from_bson(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::String(s) => Ok(s),
            other => missing_or_invalid("string", &other),
        }
    }
}

impl FieldValue for bool {
    fn to_bson(&self) -> Bson {
        Bson::Boolean(*self)
    }

    fn from_bson(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Boolean(b) => Ok(b),
            other => missing_or_invalid("boolean", &other),
        }
    }
}

impl FieldValue for i32 {
    fn to_bson(&self) -> Bson {
        Bson::Int32(*self)
    }

    fn from_bson(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Int32(n) => Ok(n),
            Bson::Int64(n) => i32::try_from(n).or_else(|_| missing_or_invalid("int32", &Bson::Int64(n))),
            other => missing_or_invalid("int32", &other),
        }
    }
}

impl FieldValue for i64 {
    fn to_bson(&self) -> Bson {
        Bson::Int64(*self)
    }

    fn from_bson(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Int64(n) => Ok(n),
            Bson::Int32(n) => Ok(n as i64),
            other => missing_or_invalid("int64", &other),
        }
    }
}

impl FieldValue for f64 {
    fn to_bson(&self) -> Bson {
        Bson::Double(*self)
    }

    fn from_bson(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Double(n) => Ok(n),
            Bson::Int32(n) => Ok(n as f64),
            Bson::Int64(n) => Ok(n as f64),
            other => missing_or_invalid("double", &other),
        }
    }
}

impl FieldValue for DateTime<Utc> {
    fn to_bson(&self) -> Bson {
        Bson::DateTime(BsonDateTime::from_millis(self.timestamp_millis()))
    }

    fn from_bson(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::DateTime(dt) => DateTime::from_timestamp_millis(dt.timestamp_millis()).ok_or_else(|| {
                MappingError::Conversion(format!("timestamp {} is out of range", dt.timestamp_millis()))
            }),
            other => missing_or_invalid("datetime", &other),
        }
    }
}

impl FieldValue for ObjectId {
    fn to_bson(&self) -> Bson {
        Bson::ObjectId(*self)
    }

    fn from_bson(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::ObjectId(oid) => Ok(oid),
            other => missing_or_invalid("objectId", &other),
        }
    }
}

impl FieldValue for Document {
    fn to_bson(&self) -> Bson {
        Bson::Document(self.clone())
    }

    fn from_bson(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Document(doc) => Ok(doc),
            other => missing_or_invalid("document", &other),
        }
    }
}

impl FieldValue for Bson {
    fn to_bson(&self) -> Bson {
        self.clone()
    }

    fn from_bson(value: Bson) -> MappingResult<Self> {
        Ok(value)
    }
}

impl<V: FieldValue> FieldValue for Option<V> {
    fn to_bson(&self) -> Bson {
        match self {
            Some(value) => value.to_bson(),
            None => Bson::Null,
        }
    }

    fn from_bson(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Null => Ok(None),
            other => V::from_bson(other).map(Some),
        }
    }
}

/// Scalar lists. Lists of nested entities go through a
/// [`CollectionMapper`](crate::collection::CollectionMapper) instead.
impl<V: FieldValue> FieldValue for Vec<V> {
    fn to_bson(&self) -> Bson {
        Bson::Array(self.iter().map(FieldValue::to_bson).collect())
    }

    fn from_bson(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Array(items) => items.into_iter().map(V::from_bson).collect(),
            other => missing_or_invalid("array", &other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::spec::ElementType;

    #[test]
    fn null_is_missing_for_required_values() {
        assert_eq!(String::from_bson(Bson::Null), Err(MappingError::MissingField(String::new())));
        assert_eq!(Option::<String>::from_bson(Bson::Null), Ok(None));
    }

    #[test]
    fn wrong_kind_is_invalid() {
        assert_eq!(
            bool::from_bson(Bson::String("yes".into())),
            Err(MappingError::InvalidValue {
                field: String::new(),
                expected: "boolean",
                found: ElementType::String,
            })
        );
    }

    #[test]
    fn integers_widen_but_do_not_truncate() {
        assert_eq!(i64::from_bson(Bson::Int32(12)), Ok(12));
        assert_eq!(i32::from_bson(Bson::Int64(12)), Ok(12));
        assert!(i32::from_bson(Bson::Int64(i64::MAX)).is_err());
        assert_eq!(f64::from_bson(Bson::Int32(2)), Ok(2.0));
    }

    #[test]
    fn datetime_keeps_millisecond_precision() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();

        assert_eq!(now.to_bson(), Bson::DateTime(BsonDateTime::from_millis(1_700_000_000_123)));
        assert_eq!(DateTime::<Utc>::from_bson(now.to_bson()), Ok(now));
    }

    #[test]
    fn scalar_lists() {
        let tags = vec!["a".to_string(), "b".to_string()];
        let stored = tags.to_bson();

        assert_eq!(stored, Bson::Array(vec![Bson::String("a".into()), Bson::String("b".into())]));
        assert_eq!(Vec::<String>::from_bson(stored), Ok(tags));
    }
}
