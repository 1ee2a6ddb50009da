//! Mapping of a single scalar or embedded field between an entity and a document.

use std::{fmt, sync::Arc};

use bson::{Bson, Document};

use crate::{
    converter::{EpochMillisConverter, ValueConverter},
    error::MappingResult,
    value::FieldValue,
};

type Getter<T> = Box<dyn Fn(&T) -> Bson + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, Bson) -> MappingResult<()> + Send + Sync>;

/// Maps one field of `T` to one document key, optionally through a [`ValueConverter`].
///
/// A property mapper is moved into exactly one [`Mapper`](crate::mapper::Mapper) by
/// [`add_property`](crate::mapper::Mapper::add_property) and holds no state between calls.
///
/// # Example
///
/// ```ignore
/// use docmap::property::PropertyMapper;
///
/// let name = PropertyMapper::new("name", |u: &User| u.name.clone(), |u, v| u.name = v);
/// let joined = PropertyMapper::timestamp("joined", |u: &User| u.joined, |u, v| u.joined = v);
/// ```
pub struct PropertyMapper<T> {
    name: String,
    getter: Getter<T>,
    setter: Setter<T>,
    converter: Option<Arc<dyn ValueConverter>>,
}

impl<T: 'static> PropertyMapper<T> {
    /// Creates a property mapper for document key `name`.
    ///
    /// # Arguments
    ///
    /// * `name` - The document field name
    /// * `get` - Reads the field value from an instance
    /// * `set` - Writes a decoded value onto an instance
    pub fn new<V, G, S>(name: impl Into<String>, get: G, set: S) -> Self
    where
        V: FieldValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            getter: Box::new(move |instance: &T| get(instance).to_bson()),
            setter: Box::new(move |instance: &mut T, value: Bson| {
                set(instance, V::from_bson(value)?);
                Ok(())
            }),
            converter: None,
        }
    }

    /// Creates a property mapper whose values are stored as epoch milliseconds.
    pub fn timestamp<V, G, S>(name: impl Into<String>, get: G, set: S) -> Self
    where
        V: FieldValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        Self::new(name, get, set).with_converter(EpochMillisConverter)
    }

    /// Applies `converter` to this field's values on read and write.
    pub fn with_converter(mut self, converter: impl ValueConverter + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    /// Returns the document field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads this field from `document` onto `instance`.
    ///
    /// An absent key is decoded as `Null`, so optional fields become `None` and required
    /// fields fail with [`MissingField`](crate::error::MappingError::MissingField).
    ///
    /// # Errors
    ///
    /// Returns an error if the value is missing, has the wrong type, or the converter
    /// rejects it. The instance is left unchanged in that case.
    pub fn populate_from(&self, instance: &mut T, document: &Document) -> MappingResult<()> {
        let stored = document
            .get(&self.name)
            .cloned()
            .unwrap_or(Bson::Null);
        let value = match &self.converter {
            Some(converter) => converter.from_storage(stored)?,
            None => stored,
        };

        (self.setter)(instance, value).map_err(|e| e.in_field(&self.name))
    }

    /// Writes this field from `instance` into `document`.
    ///
    /// # Errors
    ///
    /// Returns an error if the converter rejects the value.
    pub fn save_to(&self, instance: &T, document: &mut Document) -> MappingResult<()> {
        let value = (self.getter)(instance);
        let value = match &self.converter {
            Some(converter) => converter.to_storage(value)?,
            None => value,
        };

        document.insert(self.name.clone(), value);

        Ok(())
    }
}

impl<T> fmt::Debug for PropertyMapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMapper")
            .field("name", &self.name)
            .field("converter", &self.converter)
            .finish()
    }
}
