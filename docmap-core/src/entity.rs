//! Entity type descriptors and the explicit type hierarchy used for polymorphic mapping.
//!
//! Rust has no runtime class hierarchy, so "is-a" relations between entity types are
//! declared up front as [`TypeEdge`]s and resolved by the
//! [`MapperContext`](crate::context::MapperContext). A subtype embeds its parent and
//! exposes it through [`AsRef`], which is how a parent mapper reads the parent's fields
//! out of a subtype instance.

use std::{
    any::{Any, TypeId, type_name},
    fmt,
    hash::{Hash, Hasher},
};

/// Key under which polymorphic collection elements store their entity type name.
pub const DISCRIMINATOR_KEY: &str = "_type";

/// Runtime descriptor of an entity type: its [`TypeId`] plus a stable short name.
///
/// The name is the last path segment of the Rust type name with generic arguments
/// removed (`my_app::model::Circle` becomes `Circle`). It is what polymorphic
/// collections write as their discriminator.
#[derive(Clone, Copy)]
pub struct EntityType {
    id: TypeId,
    name: &'static str,
}

impl EntityType {
    /// Returns the descriptor for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        let full = type_name::<T>();
        let base = full.split('<').next().unwrap_or(full);
        let name = base.rsplit("::").next().unwrap_or(base);

        Self { id: TypeId::of::<T>(), name }
    }

    /// The Rust type id.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The short type name, used as the discriminator value.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityType {}

impl Hash for EntityType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Projects a subtype instance onto its parent type.
pub type Upcast = fn(&dyn Any) -> Option<&dyn Any>;

/// One declared "is-a" relation: `child` is a subtype of `parent`.
#[derive(Clone, Copy)]
pub struct TypeEdge {
    child: EntityType,
    parent: EntityType,
    upcast: Upcast,
}

impl TypeEdge {
    /// Declares `S` as a subtype of `P`.
    pub fn of<S, P>() -> Self
    where
        S: AsRef<P> + 'static,
        P: 'static,
    {
        Self {
            child: EntityType::of::<S>(),
            parent: EntityType::of::<P>(),
            upcast: upcast::<S, P>,
        }
    }

    /// The subtype.
    pub fn child(&self) -> EntityType {
        self.child
    }

    /// The parent type.
    pub fn parent(&self) -> EntityType {
        self.parent
    }

    /// Views a `child` instance as its `parent`; `None` if `value` is not a `child`.
    pub fn upcast<'v>(&self, value: &'v dyn Any) -> Option<&'v dyn Any> {
        (self.upcast)(value)
    }
}

impl fmt::Debug for TypeEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.child, self.parent)
    }
}

fn upcast<S, P>(value: &dyn Any) -> Option<&dyn Any>
where
    S: AsRef<P> + 'static,
    P: 'static,
{
    value
        .downcast_ref::<S>()
        .map(|child| AsRef::<P>::as_ref(child) as &dyn Any)
}

/// A closed family of entity types stored together in one collection field.
///
/// Implemented by the element type of a polymorphic collection, typically an enum with
/// one variant per concrete entity type.
///
/// # Example
///
/// ```ignore
/// use std::any::Any;
/// use docmap::entity::Polymorphic;
///
/// enum Shape {
///     Circle(Circle),
///     Square(Square),
/// }
///
/// impl Polymorphic for Shape {
///     fn as_entity(&self) -> &dyn Any {
///         match self {
///             Shape::Circle(circle) => circle,
///             Shape::Square(square) => square,
///         }
///     }
///
///     fn from_entity(entity: Box<dyn Any>) -> Result<Self, Box<dyn Any>> {
///         let entity = match entity.downcast::<Circle>() {
///             Ok(circle) => return Ok(Shape::Circle(*circle)),
///             Err(entity) => entity,
///         };
///         entity.downcast::<Square>().map(|square| Shape::Square(*square))
///     }
/// }
/// ```
pub trait Polymorphic: Sized + 'static {
    /// Borrows the concrete entity held by this value.
    fn as_entity(&self) -> &dyn Any;

    /// Wraps an entity produced by a mapper, handing it back if it is not a member of
    /// this family.
    fn from_entity(entity: Box<dyn Any>) -> Result<Self, Box<dyn Any>>;
}
