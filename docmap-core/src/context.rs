//! The registry of entity mappers and the declared entity type hierarchy.
//!
//! A [`MapperContext`] is assembled once with [`MapperContextBuilder`] and is immutable
//! afterwards. Every registered [`Mapper`] keeps a weak back-reference to the context so
//! it can resolve the mappers of nested collection elements.
//!
//! # Example
//!
//! ```ignore
//! use docmap::prelude::*;
//!
//! let context = MapperContext::builder()
//!     .register(Mapper::<Animal>::new().add_property(name))
//!     .register(Mapper::<Dog>::new().extends::<Animal>().add_property(breed))
//!     .subtype::<Puppy, Dog>()
//!     .build()?;
//!
//! // Puppies have no mapper of their own and resolve to the Dog mapper.
//! let mapper = context.resolve_name("Puppy")?;
//! ```

use std::{
    any::{Any, TypeId},
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use bson::Document;
use tracing::debug;

use crate::{
    entity::{EntityType, TypeEdge},
    error::{MappingError, MappingResult},
    mapper::{EntityMapper, Mapped, Mapper},
};

/// Resolves entity types, type names and runtime instances to their mappers.
pub struct MapperContext {
    mappers: Vec<Arc<dyn EntityMapper>>,
    by_type: HashMap<TypeId, usize>,
    types: HashMap<TypeId, EntityType>,
    by_name: HashMap<&'static str, EntityType>,
    parents: HashMap<TypeId, TypeEdge>,
}

impl MapperContext {
    /// Creates a builder for a new context.
    pub fn builder() -> MapperContextBuilder {
        MapperContextBuilder::default()
    }

    /// Returns the typed mapper registered for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::NoMapper`] if no mapper is registered for exactly `T`.
    pub fn mapper<T: 'static>(&self) -> MappingResult<&Mapper<T>> {
        let entity_type = EntityType::of::<T>();

        self.mapper_for(&entity_type)
            .and_then(|mapper| mapper.as_any().downcast_ref::<Mapper<T>>())
            .ok_or_else(|| MappingError::NoMapper(entity_type.name().to_string()))
    }

    /// Returns the mapper registered for exactly `entity_type`.
    pub fn mapper_for(&self, entity_type: &EntityType) -> Option<&Arc<dyn EntityMapper>> {
        self.by_type
            .get(&entity_type.id())
            .map(|&index| &self.mappers[index])
    }

    /// Returns the mapper registered for exactly the type called `name`.
    pub fn mapper_named(&self, name: &str) -> Option<&Arc<dyn EntityMapper>> {
        self.by_name
            .get(name)
            .and_then(|entity_type| self.mapper_for(entity_type))
    }

    /// Returns the most specific mapper able to map `entity_type`: its own mapper, or
    /// else the mapper of its nearest registered ancestor.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::NoMapper`] if neither the type nor any ancestor has a
    /// mapper.
    pub fn resolve(&self, entity_type: &EntityType) -> MappingResult<&Arc<dyn EntityMapper>> {
        let mut current = *entity_type;

        loop {
            if let Some(mapper) = self.mapper_for(&current) {
                return Ok(mapper);
            }

            match self.parents.get(&current.id()) {
                Some(edge) => current = edge.parent(),
                None => return Err(MappingError::NoMapper(entity_type.name().to_string())),
            }
        }
    }

    /// Like [`resolve`](Self::resolve), for a type known only by name, such as a stored
    /// discriminator.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::NoMapper`] if the name is unknown or unresolvable.
    pub fn resolve_name(&self, name: &str) -> MappingResult<&Arc<dyn EntityMapper>> {
        let entity_type = self
            .by_name
            .get(name)
            .ok_or_else(|| MappingError::NoMapper(name.to_string()))?;

        self.resolve(entity_type)
    }

    /// Resolves the most specific mapper for a runtime `instance`, returning it together
    /// with the instance viewed as that mapper's entity type.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::NoMapper`] if no mapper applies to the instance's type or
    /// any of its ancestors.
    pub fn resolve_instance<'v>(
        &self,
        instance: &'v dyn Any,
    ) -> MappingResult<(&Arc<dyn EntityMapper>, &'v dyn Any)> {
        let unresolved = || {
            MappingError::NoMapper(
                self.entity_type_of(instance)
                    .map(|entity_type| entity_type.name())
                    .unwrap_or("unregistered type")
                    .to_string(),
            )
        };

        let mut current = instance;

        loop {
            let id = current.type_id();

            if let Some(&index) = self.by_type.get(&id) {
                return Ok((&self.mappers[index], current));
            }

            let edge = self.parents.get(&id).ok_or_else(unresolved)?;
            current = edge.upcast(current).ok_or_else(unresolved)?;
        }
    }

    /// Returns `true` if `from` is `to` or one of its declared subtypes.
    pub fn is_assignable(&self, from: &EntityType, to: &EntityType) -> bool {
        let mut current = *from;

        loop {
            if current == *to {
                return true;
            }

            match self.parents.get(&current.id()) {
                Some(edge) => current = edge.parent(),
                None => return false,
            }
        }
    }

    /// Returns the declared parent of `entity_type`.
    pub fn parent_of(&self, entity_type: &EntityType) -> Option<EntityType> {
        self.parents.get(&entity_type.id()).map(TypeEdge::parent)
    }

    /// Returns the descriptor of `instance`'s type, if the context knows it.
    pub fn entity_type_of(&self, instance: &dyn Any) -> Option<EntityType> {
        self.types.get(&instance.type_id()).copied()
    }

    /// Returns every registered mapper, in registration order.
    pub fn mappers(&self) -> &[Arc<dyn EntityMapper>] {
        &self.mappers
    }

    /// Builds a `T` from `document` with the mapper registered for `T`.
    pub fn to_instance<T: 'static>(&self, document: &Document) -> MappingResult<Mapped<T>> {
        self.mapper::<T>()?.to_instance(document)
    }

    /// Serializes `instance` with the mapper registered for `T`.
    pub fn to_document<T: 'static>(&self, instance: &T) -> MappingResult<Document> {
        self.mapper::<T>()?.to_document(instance)
    }
}

impl fmt::Debug for MapperContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperContext")
            .field(
                "mappers",
                &self
                    .mappers
                    .iter()
                    .map(|mapper| mapper.entity_type())
                    .collect::<Vec<_>>(),
            )
            .field("parents", &self.parents.values().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`MapperContext`].
///
/// Mappers and subtype declarations can be added in any order; the whole configuration
/// is validated by [`build`](Self::build).
#[derive(Default)]
pub struct MapperContextBuilder {
    mappers: Vec<Arc<dyn EntityMapper>>,
    edges: Vec<TypeEdge>,
}

impl MapperContextBuilder {
    /// Registers `mapper`. Subtype relations declared with
    /// [`Mapper::extends`] are picked up from it.
    pub fn register<T: 'static>(mut self, mapper: Mapper<T>) -> Self {
        self.mappers.push(Arc::new(mapper));
        self
    }

    /// Declares `S` as a subtype of `P` without registering a mapper for `S`.
    ///
    /// Instances and discriminators of `S` then resolve to the mapper of `P`, or of
    /// `P`'s nearest registered ancestor.
    pub fn subtype<S, P>(mut self) -> Self
    where
        S: AsRef<P> + 'static,
        P: 'static,
    {
        self.edges.push(TypeEdge::of::<S, P>());
        self
    }

    /// Validates the configuration and builds the context.
    ///
    /// # Errors
    ///
    /// - [`MappingError::DuplicateMapper`] if two mappers share an entity type
    /// - [`MappingError::AmbiguousTypeName`] if two entity types share a name
    /// - [`MappingError::ConflictingParent`] if a type is given two different parents
    /// - [`MappingError::HierarchyCycle`] if the hierarchy loops
    pub fn build(self) -> MappingResult<Arc<MapperContext>> {
        let mut index = HierarchyIndex::default();
        let mut by_type = HashMap::new();

        for (position, mapper) in self.mappers.iter().enumerate() {
            let entity_type = mapper.entity_type();

            if by_type.insert(entity_type.id(), position).is_some() {
                return Err(MappingError::DuplicateMapper(entity_type.name().to_string()));
            }

            index.know(entity_type)?;

            if let Some(edge) = mapper.parent() {
                index.declare(edge)?;
            }
        }

        for edge in self.edges {
            index.declare(edge)?;
        }

        index.check_acyclic()?;

        debug!(
            mappers = self.mappers.len(),
            subtypes = index.parents.len(),
            "Built mapper context"
        );

        let mappers = self.mappers;

        Ok(Arc::new_cyclic(|context| {
            for mapper in &mappers {
                mapper.attach(context.clone());
            }

            MapperContext {
                mappers,
                by_type,
                types: index.types,
                by_name: index.by_name,
                parents: index.parents,
            }
        }))
    }
}

#[derive(Default)]
struct HierarchyIndex {
    types: HashMap<TypeId, EntityType>,
    by_name: HashMap<&'static str, EntityType>,
    parents: HashMap<TypeId, TypeEdge>,
}

impl HierarchyIndex {
    fn know(&mut self, entity_type: EntityType) -> MappingResult<()> {
        match self.by_name.get(entity_type.name()) {
            Some(known) if *known != entity_type => {
                return Err(MappingError::AmbiguousTypeName(entity_type.name().to_string()));
            }
            Some(_) => {}
            None => {
                self.by_name.insert(entity_type.name(), entity_type);
            }
        }

        self.types.insert(entity_type.id(), entity_type);

        Ok(())
    }

    fn declare(&mut self, edge: TypeEdge) -> MappingResult<()> {
        self.know(edge.child())?;
        self.know(edge.parent())?;

        match self.parents.get(&edge.child().id()) {
            Some(known) if known.parent() != edge.parent() => {
                Err(MappingError::ConflictingParent(edge.child().name().to_string()))
            }
            Some(_) => Ok(()),
            None => {
                self.parents.insert(edge.child().id(), edge);
                Ok(())
            }
        }
    }

    fn check_acyclic(&self) -> MappingResult<()> {
        for edge in self.parents.values() {
            let mut seen = HashSet::from([edge.child().id()]);
            let mut current = edge.parent();

            while let Some(next) = self.parents.get(&current.id()) {
                if !seen.insert(current.id()) {
                    return Err(MappingError::HierarchyCycle(current.name().to_string()));
                }
                current = next.parent();
            }
        }

        Ok(())
    }
}
