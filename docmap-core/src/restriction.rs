//! Typed query predicates and their compilation to query-document fragments.
//!
//! A [`Restriction`] compiles to one fragment keyed by its field:
//!
//! - [`RestrictionEq`]: `{ field: value }`
//! - [`RestrictionBetween`]: `{ field: { "$gte": start, "$lt": end } }`
//!
//! Operands are converted with the [`ConverterRegistry`] before being written, through
//! the same path for every restriction kind, so a timestamp compares as the same
//! epoch-millisecond integer that property mappers store.
//!
//! Restrictions are normally built through a [`RestrictionFactory`]. Swapping the
//! factory on a [`CriteriaFactory`](crate::criteria::CriteriaFactory) substitutes every
//! restriction the resulting criteria create.

use std::fmt;

use bson::{Bson, Document, doc};

use crate::{converter::ConverterRegistry, error::MappingResult};

/// A single query predicate on one field.
pub trait Restriction: fmt::Debug {
    /// The document field the predicate applies to.
    fn field(&self) -> &str;

    /// Compiles the predicate into a query-document fragment.
    ///
    /// # Errors
    ///
    /// Returns an error if an operand cannot be converted.
    fn fragment(&self, converters: &ConverterRegistry) -> MappingResult<Document>;
}

fn stored(converters: &ConverterRegistry, value: &Bson) -> MappingResult<Bson> {
    converters.to_storage(value.clone())
}

/// Equality on a field.
#[derive(Debug, Clone, PartialEq)]
pub struct RestrictionEq {
    field: String,
    value: Bson,
}

impl RestrictionEq {
    /// Creates an equality restriction. `value` is converted when the fragment is built.
    pub fn new(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// The operand as given, before conversion.
    pub fn value(&self) -> &Bson {
        &self.value
    }
}

impl Restriction for RestrictionEq {
    fn field(&self) -> &str {
        &self.field
    }

    fn fragment(&self, converters: &ConverterRegistry) -> MappingResult<Document> {
        let mut fragment = Document::new();
        fragment.insert(self.field.clone(), stored(converters, &self.value)?);

        Ok(fragment)
    }
}

/// Half-open range on a field: `start <= value < end`.
#[derive(Debug, Clone, PartialEq)]
pub struct RestrictionBetween {
    field: String,
    start: Bson,
    end: Bson,
}

impl RestrictionBetween {
    /// Creates a half-open range restriction, `start` inclusive and `end` exclusive.
    pub fn new(field: impl Into<String>, start: impl Into<Bson>, end: impl Into<Bson>) -> Self {
        Self {
            field: field.into(),
            start: start.into(),
            end: end.into(),
        }
    }

    /// Inclusive lower bound, before conversion.
    pub fn start(&self) -> &Bson {
        &self.start
    }

    /// Exclusive upper bound, before conversion.
    pub fn end(&self) -> &Bson {
        &self.end
    }
}

impl Restriction for RestrictionBetween {
    fn field(&self) -> &str {
        &self.field
    }

    fn fragment(&self, converters: &ConverterRegistry) -> MappingResult<Document> {
        let mut fragment = Document::new();
        fragment.insert(
            self.field.clone(),
            doc! {
                "$gte": stored(converters, &self.start)?,
                "$lt": stored(converters, &self.end)?,
            },
        );

        Ok(fragment)
    }
}

/// Construction point for restrictions.
///
/// Implement this to substitute test doubles or alternative encodings without
/// changing [`Criteria`](crate::criteria::Criteria).
pub trait RestrictionFactory: fmt::Debug + Send + Sync {
    /// Creates an equality restriction.
    fn eq(&self, field: &str, value: Bson) -> Box<dyn Restriction>;

    /// Creates a half-open range restriction.
    fn between(&self, field: &str, start: Bson, end: Bson) -> Box<dyn Restriction>;
}

/// Creates [`RestrictionEq`] and [`RestrictionBetween`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRestrictionFactory;

impl RestrictionFactory for DefaultRestrictionFactory {
    fn eq(&self, field: &str, value: Bson) -> Box<dyn Restriction> {
        Box::new(RestrictionEq::new(field, value))
    }

    fn between(&self, field: &str, start: Bson, end: Bson) -> Box<dyn Restriction> {
        Box::new(RestrictionBetween::new(field, start, end))
    }
}

/// Shorthands that build restrictions with [`DefaultRestrictionFactory`].
///
/// # Example
///
/// ```ignore
/// use docmap::restriction::Restrictions;
///
/// criteria
///     .add(Restrictions::eq("status", "open"))
///     .add(Restrictions::between("created", from, to));
/// ```
pub struct Restrictions;

impl Restrictions {
    /// Equality on `field`.
    pub fn eq(field: &str, value: impl Into<Bson>) -> Box<dyn Restriction> {
        DefaultRestrictionFactory.eq(field, value.into())
    }

    /// `start <= field < end`.
    pub fn between(field: &str, start: impl Into<Bson>, end: impl Into<Bson>) -> Box<dyn Restriction> {
        DefaultRestrictionFactory.between(field, start.into(), end.into())
    }
}
