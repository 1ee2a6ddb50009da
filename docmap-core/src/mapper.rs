//! Entity mappers: full object ⇄ document population for one entity type.
//!
//! A [`Mapper<T>`] aggregates [`PropertyMapper`]s and collection mappers for `T`, plus
//! optional populate/save hooks for derived fields. Population always runs in the same
//! order: properties, then collections, then the populate hook. Saving mirrors it.
//!
//! Property failures are tolerated: each failing property is logged and reported as a
//! [`FieldIssue`] on the returned [`Mapped`] value while the remaining properties are
//! still populated. Collection, hook and save failures are returned as errors.
//!
//! # Example
//!
//! ```ignore
//! use docmap::prelude::*;
//!
//! #[derive(Debug, Default)]
//! pub struct User {
//!     pub name: String,
//!     pub age: i32,
//! }
//!
//! let mapper = Mapper::<User>::new()
//!     .add_property(PropertyMapper::new("name", |u: &User| u.name.clone(), |u, v| u.name = v))
//!     .add_property(PropertyMapper::new("age", |u: &User| u.age, |u, v| u.age = v));
//!
//! let document = mapper.to_document(&User { name: "Alice".into(), age: 30 })?;
//! let user = mapper.to_instance(&document)?.into_inner();
//! ```

use std::{
    any::Any,
    fmt,
    sync::{Arc, OnceLock, Weak},
};

use bson::Document;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::{
    collection::CollectionField,
    context::MapperContext,
    entity::{EntityType, TypeEdge},
    error::{MappingError, MappingResult},
    property::PropertyMapper,
};

/// A field that could not be populated, identified by its dotted path.
///
/// Paths into collection elements include the element index, e.g. `lines.2.price`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    /// Dotted path of the field within the top-level document.
    pub path: String,
    /// Why the field could not be populated.
    pub error: MappingError,
}

impl FieldIssue {
    /// Creates an issue for `path`.
    pub fn new(path: impl Into<String>, error: MappingError) -> Self {
        Self { path: path.into(), error }
    }

    /// Prefixes the path with `prefix`, for issues raised inside nested documents.
    pub fn nested(self, prefix: &str) -> Self {
        Self {
            path: format!("{}.{}", prefix, self.path),
            error: self.error,
        }
    }
}

/// The result of populating an entity: the value plus any tolerated field issues.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapped<T> {
    /// The populated entity.
    pub value: T,
    /// Fields that could not be populated and kept their instantiated value.
    pub issues: Vec<FieldIssue>,
}

impl<T> Mapped<T> {
    /// Wraps a fully populated value.
    pub fn complete(value: T) -> Self {
        Self { value, issues: Vec::new() }
    }

    /// Returns `true` if every field was populated.
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }

    /// Discards the issues and returns the value.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Transforms the value, keeping the issues.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Mapped<U> {
        Mapped {
            value: f(self.value),
            issues: self.issues,
        }
    }
}

/// Capped-collection settings, consumed by whatever provisions the storage collection.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CappedOptions {
    /// Maximum size of the collection in bytes.
    pub size: i64,
    /// Maximum number of documents in the collection.
    pub max: i64,
}

/// Object-safe view of a [`Mapper`], used by the [`MapperContext`] for lookups and
/// polymorphic dispatch.
///
/// Instances cross this interface as `dyn Any`; the implementation downcasts to its own
/// entity type.
pub trait EntityMapper: Send + Sync {
    /// The entity type this mapper populates.
    fn entity_type(&self) -> EntityType;

    /// The declared parent of the entity type, if any.
    fn parent(&self) -> Option<TypeEdge>;

    /// Returns `true` if `entity_type` is this mapper's type or one of its subtypes.
    fn can_map(&self, entity_type: &EntityType) -> bool;

    /// Capped-collection settings, if the entity is stored in a capped collection.
    fn capped(&self) -> Option<CappedOptions>;

    /// Builds a new instance from `document`, boxed as `dyn Any`.
    fn instance_from(&self, document: &Document) -> MappingResult<Mapped<Box<dyn Any>>>;

    /// Serializes `instance`, which must be of this mapper's entity type.
    fn document_from(&self, instance: &dyn Any) -> MappingResult<Document>;

    /// Attaches the context that owns this mapper. Only the first call has an effect.
    fn attach(&self, context: Weak<MapperContext>);

    /// Returns `self` as `Any`, for typed access from the context.
    fn as_any(&self) -> &dyn Any;
}

type Instantiator<T> = Box<dyn Fn() -> T + Send + Sync>;
type PopulateHook<T> = Box<dyn Fn(&mut T, &Document) -> MappingResult<()> + Send + Sync>;
type SaveHook<T> = Box<dyn Fn(&T, &mut Document) -> MappingResult<()> + Send + Sync>;

/// Declarative mapper between entities of type `T` and documents.
///
/// Configure it with the consuming builder methods, then register it in a
/// [`MapperContext`]. After registration it is only reachable by shared reference.
pub struct Mapper<T: 'static> {
    entity_type: EntityType,
    instantiator: Instantiator<T>,
    properties: Vec<PropertyMapper<T>>,
    collections: Vec<Box<dyn CollectionField<T>>>,
    populate_hook: Option<PopulateHook<T>>,
    save_hook: Option<SaveHook<T>>,
    parent: Option<TypeEdge>,
    capped: bool,
    capped_size: i64,
    capped_max: i64,
    context: OnceLock<Weak<MapperContext>>,
}

impl<T: Default + 'static> Mapper<T> {
    /// Creates a mapper that instantiates blank entities with [`Default`].
    pub fn new() -> Self {
        Self::with_instantiator(T::default)
    }
}

impl<T: Default + 'static> Default for Mapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Mapper<T> {
    /// Creates a mapper that instantiates blank entities with `instantiator`.
    ///
    /// Use this for entity types without a meaningful [`Default`].
    pub fn with_instantiator(instantiator: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            entity_type: EntityType::of::<T>(),
            instantiator: Box::new(instantiator),
            properties: Vec::new(),
            collections: Vec::new(),
            populate_hook: None,
            save_hook: None,
            parent: None,
            capped: false,
            capped_size: 0,
            capped_max: 0,
            context: OnceLock::new(),
        }
    }

    /// Adds a property. Properties are populated and saved in insertion order.
    pub fn add_property(mut self, property: PropertyMapper<T>) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds a collection. Collections are populated and saved in insertion order,
    /// after all properties.
    pub fn add_collection(mut self, collection: impl CollectionField<T> + 'static) -> Self {
        self.collections.push(Box::new(collection));
        self
    }

    /// Sets the capped-collection metadata.
    ///
    /// # Arguments
    ///
    /// * `capped` - Whether the entity's collection is capped
    /// * `size` - Maximum collection size in bytes
    /// * `max` - Maximum number of documents
    pub fn set_capped(mut self, capped: bool, size: i64, max: i64) -> Self {
        self.capped = capped;
        self.capped_size = size;
        self.capped_max = max;
        self
    }

    /// Declares `T` as a subtype of `P`.
    ///
    /// Mappers for `P` can then save `T` instances (through `T: AsRef<P>`), and documents
    /// whose discriminator names `T` fall back to the `P` mapper when `T` has none.
    pub fn extends<P: 'static>(mut self) -> Self
    where
        T: AsRef<P>,
    {
        self.parent = Some(TypeEdge::of::<T, P>());
        self
    }

    /// Sets a hook that runs after properties and collections are populated.
    pub fn on_populate(
        mut self,
        hook: impl Fn(&mut T, &Document) -> MappingResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.populate_hook = Some(Box::new(hook));
        self
    }

    /// Sets a hook that runs after properties and collections are saved.
    pub fn on_save(
        mut self,
        hook: impl Fn(&T, &mut Document) -> MappingResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.save_hook = Some(Box::new(hook));
        self
    }

    /// Returns the entity type this mapper populates.
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Returns `true` if the entity's collection is capped.
    pub fn is_capped(&self) -> bool {
        self.capped
    }

    /// Returns the capped collection size in bytes.
    pub fn capped_size(&self) -> i64 {
        self.capped_size
    }

    /// Returns the capped collection document limit.
    pub fn capped_max(&self) -> i64 {
        self.capped_max
    }

    /// Returns the context this mapper is registered in.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::Detached`] if the mapper was never registered, or its
    /// context has been dropped.
    pub fn context(&self) -> MappingResult<Arc<MapperContext>> {
        self.context
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| MappingError::Detached(self.entity_type.name().to_string()))
    }

    /// Builds a new entity from `document`.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be populated, if the populate hook fails,
    /// or if the mapper has collections but no context. Property failures are reported
    /// in [`Mapped::issues`] instead.
    pub fn to_instance(&self, document: &Document) -> MappingResult<Mapped<T>> {
        let mut instance = (self.instantiator)();
        let issues = self.populate(&mut instance, document)?;

        Ok(Mapped { value: instance, issues })
    }

    /// Populates an existing `instance` from `document`.
    ///
    /// # Errors
    ///
    /// Same as [`to_instance`](Self::to_instance).
    pub fn populate(&self, instance: &mut T, document: &Document) -> MappingResult<Vec<FieldIssue>> {
        let mut issues = self.populate_properties(instance, document);
        issues.extend(self.populate_collections(instance, document)?);

        if let Some(hook) = &self.populate_hook {
            hook(instance, document)?;
        }

        Ok(issues)
    }

    fn populate_properties(&self, instance: &mut T, document: &Document) -> Vec<FieldIssue> {
        let mut issues = Vec::new();

        for property in &self.properties {
            if let Err(error) = property.populate_from(instance, document) {
                warn!(
                    entity = self.entity_type.name(),
                    field = property.name(),
                    %error,
                    "Can't populate property"
                );
                issues.push(FieldIssue::new(property.name(), error));
            }
        }

        issues
    }

    fn populate_collections(&self, instance: &mut T, document: &Document) -> MappingResult<Vec<FieldIssue>> {
        if self.collections.is_empty() {
            return Ok(Vec::new());
        }

        let context = self.context()?;
        let mut issues = Vec::new();

        for collection in &self.collections {
            issues.extend(collection.populate_from(instance, document, &context)?);
        }

        Ok(issues)
    }

    /// Serializes `instance` into a new document.
    ///
    /// # Errors
    ///
    /// Returns an error if any property converter, collection or the save hook fails.
    pub fn to_document(&self, instance: &T) -> MappingResult<Document> {
        let mut document = Document::new();
        self.save(instance, &mut document)?;

        trace!(entity = self.entity_type.name(), document = %document, "Saved entity");

        Ok(document)
    }

    /// Writes `instance` into an existing `document`.
    ///
    /// # Errors
    ///
    /// Same as [`to_document`](Self::to_document).
    pub fn save(&self, instance: &T, document: &mut Document) -> MappingResult<()> {
        for property in &self.properties {
            property.save_to(instance, document)?;
        }

        if !self.collections.is_empty() {
            let context = self.context()?;

            for collection in &self.collections {
                collection.save_to(instance, document, &context)?;
            }
        }

        if let Some(hook) = &self.save_hook {
            hook(instance, document)?;
        }

        Ok(())
    }

    /// Returns `true` if `entity_type` is `T` or a declared subtype of `T`.
    ///
    /// Subtype relations are only known once the mapper is registered; a detached
    /// mapper only recognizes its own type.
    pub fn can_map(&self, entity_type: &EntityType) -> bool {
        if *entity_type == self.entity_type {
            return true;
        }

        self.context()
            .map(|context| context.is_assignable(entity_type, &self.entity_type))
            .unwrap_or(false)
    }

    /// Returns the capped-collection settings, if the collection is capped.
    pub fn capped(&self) -> Option<CappedOptions> {
        self.capped.then_some(CappedOptions {
            size: self.capped_size,
            max: self.capped_max,
        })
    }
}

impl<T: 'static> EntityMapper for Mapper<T> {
    fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    fn parent(&self) -> Option<TypeEdge> {
        self.parent
    }

    fn can_map(&self, entity_type: &EntityType) -> bool {
        Mapper::can_map(self, entity_type)
    }

    fn capped(&self) -> Option<CappedOptions> {
        Mapper::capped(self)
    }

    fn instance_from(&self, document: &Document) -> MappingResult<Mapped<Box<dyn Any>>> {
        Ok(self
            .to_instance(document)?
            .map(|value| Box::new(value) as Box<dyn Any>))
    }

    fn document_from(&self, instance: &dyn Any) -> MappingResult<Document> {
        match instance.downcast_ref::<T>() {
            Some(instance) => self.to_document(instance),
            None => Err(MappingError::NoMapper(format!(
                "instance passed to the {} mapper",
                self.entity_type
            ))),
        }
    }

    fn attach(&self, context: Weak<MapperContext>) {
        if self.context.set(context).is_err() {
            warn!(entity = self.entity_type.name(), "Mapper already attached to a context");
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: 'static> fmt::Debug for Mapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("entity_type", &self.entity_type)
            .field("properties", &self.properties)
            .field(
                "collections",
                &self
                    .collections
                    .iter()
                    .map(|c| c.name())
                    .collect::<Vec<_>>(),
            )
            .field("capped", &self.capped())
            .finish()
    }
}
