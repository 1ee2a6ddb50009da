//! Mapping of fields that hold sequences or sets of nested entities.
//!
//! A [`CollectionMapper`] stores each element as a nested document produced by the
//! element's own [`Mapper`](crate::mapper::Mapper), looked up in the
//! [`MapperContext`] the owning mapper is registered in. Element order is preserved in
//! both directions.
//!
//! Two flavours exist:
//!
//! - [`CollectionMapper::new`] for a concrete element type `E`, mapped by the `E` mapper.
//! - [`CollectionMapper::polymorphic`] for an element family implementing
//!   [`Polymorphic`]. Each element is mapped by the most specific mapper registered for
//!   its runtime type, and the element document records that type under
//!   [`DISCRIMINATOR_KEY`].

use std::{any::Any, marker::PhantomData};

use bson::{Bson, Document};

use crate::{
    context::MapperContext,
    entity::{DISCRIMINATOR_KEY, EntityType, Polymorphic},
    error::{MappingError, MappingResult},
    mapper::FieldIssue,
};

/// A collection field of `T`, type-erased over its element and container types so one
/// mapper can hold collections of different element types.
pub trait CollectionField<T>: Send + Sync {
    /// Returns the document field name.
    fn name(&self) -> &str;

    /// Reads the collection from `document` onto `instance`.
    ///
    /// Returns the field issues reported by nested mappers, with paths prefixed by
    /// `name.index`.
    fn populate_from(
        &self,
        instance: &mut T,
        document: &Document,
        context: &MapperContext,
    ) -> MappingResult<Vec<FieldIssue>>;

    /// Writes the collection from `instance` into `document`.
    fn save_to(&self, instance: &T, document: &mut Document, context: &MapperContext) -> MappingResult<()>;
}

type Getter<T, C> = Box<dyn Fn(&T) -> &C + Send + Sync>;
type Setter<T, C> = Box<dyn Fn(&mut T, C) + Send + Sync>;

/// Maps a container field `C` of `T` whose elements `E` are entities.
///
/// `C` can be any container that is built from an iterator and iterable by reference:
/// `Vec`, `VecDeque`, `BTreeSet`, `HashSet`, ...
///
/// # Example
///
/// ```ignore
/// use docmap::collection::CollectionMapper;
///
/// let lines = CollectionMapper::new("lines", |o: &Order| &o.lines, |o, v| o.lines = v);
/// let shapes = CollectionMapper::polymorphic("shapes", |d: &Drawing| &d.shapes, |d, v| d.shapes = v);
/// ```
pub struct CollectionMapper<T, E, C> {
    name: String,
    getter: Getter<T, C>,
    setter: Setter<T, C>,
    as_entity: fn(&E) -> &dyn Any,
    from_entity: fn(Box<dyn Any>) -> Result<E, Box<dyn Any>>,
    polymorphic: bool,
    _element: PhantomData<fn() -> E>,
}

fn direct_entity<E: Any>(element: &E) -> &dyn Any {
    element
}

fn direct_from_entity<E: Any>(entity: Box<dyn Any>) -> Result<E, Box<dyn Any>> {
    entity.downcast::<E>().map(|element| *element)
}

impl<T, E, C> CollectionMapper<T, E, C>
where
    T: 'static,
    E: 'static,
    C: FromIterator<E> + 'static,
    for<'a> &'a C: IntoIterator<Item = &'a E>,
{
    /// Creates a collection mapper whose elements are all of type `E`.
    ///
    /// # Arguments
    ///
    /// * `name` - The document field name
    /// * `get` - Borrows the container from an instance
    /// * `set` - Stores a populated container on an instance
    pub fn new<G, S>(name: impl Into<String>, get: G, set: S) -> Self
    where
        G: Fn(&T) -> &C + Send + Sync + 'static,
        S: Fn(&mut T, C) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            getter: Box::new(get),
            setter: Box::new(set),
            as_entity: direct_entity::<E>,
            from_entity: direct_from_entity::<E>,
            polymorphic: false,
            _element: PhantomData,
        }
    }

    /// Returns the document field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn invalid(&self, reason: String) -> MappingError {
        MappingError::InvalidCollection {
            field: self.name.clone(),
            reason,
        }
    }

    fn stored_elements<'d>(&self, document: &'d Document) -> MappingResult<&'d [Bson]> {
        match document.get(&self.name) {
            None | Some(Bson::Null) => Ok(&[]),
            Some(Bson::Array(items)) => Ok(items.as_slice()),
            Some(other) => Err(self.invalid(format!(
                "expected an array, found {:?}",
                other.element_type()
            ))),
        }
    }
}

impl<T, E, C> CollectionMapper<T, E, C>
where
    T: 'static,
    E: Polymorphic,
    C: FromIterator<E> + 'static,
    for<'a> &'a C: IntoIterator<Item = &'a E>,
{
    /// Creates a collection mapper whose elements belong to the family `E`.
    ///
    /// Every saved element carries a discriminator naming its runtime type.
    pub fn polymorphic<G, S>(name: impl Into<String>, get: G, set: S) -> Self
    where
        G: Fn(&T) -> &C + Send + Sync + 'static,
        S: Fn(&mut T, C) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            getter: Box::new(get),
            setter: Box::new(set),
            as_entity: E::as_entity,
            from_entity: E::from_entity,
            polymorphic: true,
            _element: PhantomData,
        }
    }
}

impl<T, E, C> CollectionField<T> for CollectionMapper<T, E, C>
where
    T: 'static,
    E: 'static,
    C: FromIterator<E> + 'static,
    for<'a> &'a C: IntoIterator<Item = &'a E>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn populate_from(
        &self,
        instance: &mut T,
        document: &Document,
        context: &MapperContext,
    ) -> MappingResult<Vec<FieldIssue>> {
        let stored = self.stored_elements(document)?;
        let mut elements = Vec::with_capacity(stored.len());
        let mut issues = Vec::new();

        for (index, item) in stored.iter().enumerate() {
            let nested = item.as_document().ok_or_else(|| {
                self.invalid(format!(
                    "element {} is not a document, found {:?}",
                    index,
                    item.element_type()
                ))
            })?;

            let mapper = match nested.get(DISCRIMINATOR_KEY) {
                Some(Bson::String(type_name)) => context.resolve_name(type_name)?,
                Some(other) => {
                    return Err(self.invalid(format!(
                        "element {} has a non-string discriminator {:?}",
                        index,
                        other.element_type()
                    )));
                }
                None => context.resolve(&EntityType::of::<E>())?,
            };

            let mapped = mapper.instance_from(nested)?;
            let prefix = format!("{}.{}", self.name, index);
            issues.extend(mapped.issues.into_iter().map(|issue| issue.nested(&prefix)));

            let element = (self.from_entity)(mapped.value).map_err(|_| {
                self.invalid(format!(
                    "element {} of type {} is not a {}",
                    index,
                    mapper.entity_type(),
                    EntityType::of::<E>()
                ))
            })?;
            elements.push(element);
        }

        (self.setter)(instance, elements.into_iter().collect());

        Ok(issues)
    }

    fn save_to(&self, instance: &T, document: &mut Document, context: &MapperContext) -> MappingResult<()> {
        let mut items = Vec::new();

        for element in (self.getter)(instance) {
            let entity = (self.as_entity)(element);
            let (mapper, projected) = context.resolve_instance(entity)?;
            let saved = mapper.document_from(projected)?;

            if self.polymorphic {
                let runtime = context
                    .entity_type_of(entity)
                    .unwrap_or_else(|| mapper.entity_type());
                if saved.contains_key(DISCRIMINATOR_KEY) {
                    return Err(self.invalid(format!(
                        "{} saves its own {} field",
                        runtime.name(),
                        DISCRIMINATOR_KEY
                    )));
                }

                let mut tagged = Document::new();
                tagged.insert(DISCRIMINATOR_KEY, runtime.name());
                for (key, value) in saved {
                    tagged.insert(key, value);
                }
                items.push(Bson::Document(tagged));
            } else {
                items.push(Bson::Document(saved));
            }
        }

        document.insert(self.name.clone(), Bson::Array(items));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mapper::Mapper, property::PropertyMapper};
    use bson::{doc, spec::ElementType};
    use pretty_assertions::assert_eq;
    use std::{collections::BTreeSet, sync::Arc};

    #[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord)]
    struct Line {
        sku: String,
        qty: i32,
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Order {
        id: String,
        lines: Vec<Line>,
        archived: BTreeSet<Line>,
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Circle {
        radius: f64,
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Square {
        side: f64,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Shape {
        Circle(Circle),
        Square(Square),
    }

    impl Polymorphic for Shape {
        fn as_entity(&self) -> &dyn Any {
            match self {
                Shape::Circle(circle) => circle,
                Shape::Square(square) => square,
            }
        }

        fn from_entity(entity: Box<dyn Any>) -> Result<Self, Box<dyn Any>> {
            let entity = match entity.downcast::<Circle>() {
                Ok(circle) => return Ok(Shape::Circle(*circle)),
                Err(entity) => entity,
            };
            entity.downcast::<Square>().map(|square| Shape::Square(*square))
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Drawing {
        shapes: Vec<Shape>,
    }

    fn line_mapper() -> Mapper<Line> {
        Mapper::<Line>::new()
            .add_property(PropertyMapper::new("sku", |l: &Line| l.sku.clone(), |l, v| l.sku = v))
            .add_property(PropertyMapper::new("qty", |l: &Line| l.qty, |l, v| l.qty = v))
    }

    fn order_mapper() -> Mapper<Order> {
        Mapper::<Order>::new()
            .add_property(PropertyMapper::new("id", |o: &Order| o.id.clone(), |o, v| o.id = v))
            .add_collection(CollectionMapper::new("lines", |o: &Order| &o.lines, |o, v| o.lines = v))
            .add_collection(CollectionMapper::new(
                "archived",
                |o: &Order| &o.archived,
                |o, v| o.archived = v,
            ))
    }

    fn drawing_mapper() -> Mapper<Drawing> {
        Mapper::<Drawing>::new().add_collection(CollectionMapper::polymorphic(
            "shapes",
            |d: &Drawing| &d.shapes,
            |d, v| d.shapes = v,
        ))
    }

    fn context() -> Arc<MapperContext> {
        MapperContext::builder()
            .register(line_mapper())
            .register(order_mapper())
            .register(Mapper::<Circle>::new().add_property(PropertyMapper::new(
                "radius",
                |c: &Circle| c.radius,
                |c, v| c.radius = v,
            )))
            .register(Mapper::<Square>::new().add_property(PropertyMapper::new(
                "side",
                |s: &Square| s.side,
                |s, v| s.side = v,
            )))
            .register(drawing_mapper())
            .build()
            .unwrap()
    }

    fn line(sku: &str, qty: i32) -> Line {
        Line { sku: sku.to_string(), qty }
    }

    #[test]
    fn nested_collections_round_trip_in_order() {
        let context = context();
        let order = Order {
            id: "o-1".to_string(),
            lines: vec![line("b", 2), line("a", 1)],
            archived: BTreeSet::from([line("z", 9)]),
        };

        let document = context.to_document(&order).unwrap();

        assert_eq!(
            document,
            doc! {
                "id": "o-1",
                "lines": [{ "sku": "b", "qty": 2 }, { "sku": "a", "qty": 1 }],
                "archived": [{ "sku": "z", "qty": 9 }],
            }
        );
        assert_eq!(context.to_instance::<Order>(&document).unwrap().into_inner(), order);
    }

    #[test]
    fn absent_or_null_collection_is_empty() {
        let context = context();

        let absent = context.to_instance::<Order>(&doc! { "id": "o-2" }).unwrap();
        assert!(absent.is_complete());
        assert!(absent.value.lines.is_empty());

        let null = context
            .to_instance::<Order>(&doc! { "id": "o-3", "lines": null, "archived": [] })
            .unwrap();
        assert!(null.value.lines.is_empty());
        assert!(null.value.archived.is_empty());
    }

    #[test]
    fn malformed_collections_are_structural_errors() {
        let context = context();

        assert!(matches!(
            context.to_instance::<Order>(&doc! { "id": "o", "lines": 4 }),
            Err(MappingError::InvalidCollection { field, .. }) if field == "lines"
        ));
        assert!(matches!(
            context.to_instance::<Order>(&doc! { "id": "o", "lines": [{ "sku": "a", "qty": 1 }, "b"] }),
            Err(MappingError::InvalidCollection { field, .. }) if field == "lines"
        ));
    }

    #[test]
    fn nested_issues_carry_element_path() {
        let context = context();
        let document = doc! {
            "id": "o-4",
            "lines": [{ "sku": "a", "qty": 1 }, { "sku": "b", "qty": "many" }],
        };

        let mapped = context.to_instance::<Order>(&document).unwrap();

        assert_eq!(mapped.value.lines, vec![line("a", 1), line("b", 0)]);
        assert_eq!(
            mapped.issues,
            vec![FieldIssue::new(
                "lines.1.qty",
                MappingError::InvalidValue {
                    field: "qty".to_string(),
                    expected: "int32",
                    found: ElementType::String,
                }
            )]
        );
    }

    #[test]
    fn polymorphic_elements_record_runtime_type() {
        let context = context();
        let drawing = Drawing {
            shapes: vec![
                Shape::Circle(Circle { radius: 1.5 }),
                Shape::Square(Square { side: 2.0 }),
            ],
        };

        let document = context.to_document(&drawing).unwrap();

        assert_eq!(
            document,
            doc! {
                "shapes": [
                    { "_type": "Circle", "radius": 1.5 },
                    { "_type": "Square", "side": 2.0 },
                ],
            }
        );
        assert_eq!(context.to_instance::<Drawing>(&document).unwrap().into_inner(), drawing);
    }

    #[test]
    fn unknown_discriminator_is_structural_error() {
        let context = context();
        let document = doc! { "shapes": [{ "_type": "Hexagon", "side": 1.0 }] };

        assert_eq!(
            context.to_instance::<Drawing>(&document).unwrap_err(),
            MappingError::NoMapper("Hexagon".to_string())
        );
    }

    #[test]
    fn unregistered_owner_is_detached() {
        let order = Order { id: "o-5".to_string(), ..Order::default() };

        assert_eq!(
            order_mapper().to_document(&order).unwrap_err(),
            MappingError::Detached("Order".to_string())
        );
    }

    #[test]
    fn element_field_cannot_shadow_discriminator() {
        let context = MapperContext::builder()
            .register(
                Mapper::<Circle>::new()
                    .add_property(PropertyMapper::new("radius", |c: &Circle| c.radius, |c, v| c.radius = v))
                    .add_property(PropertyMapper::new(
                        DISCRIMINATOR_KEY,
                        |_: &Circle| "round".to_string(),
                        |_, _: String| {},
                    )),
            )
            .register(drawing_mapper())
            .build()
            .unwrap();
        let drawing = Drawing { shapes: vec![Shape::Circle(Circle { radius: 1.0 })] };

        assert!(matches!(
            context.to_document(&drawing),
            Err(MappingError::InvalidCollection { field, .. }) if field == "shapes"
        ));
    }
}
