mod common;

use docmap::{
    bson::{Bson, doc, spec::ElementType},
    prelude::*,
};
use pretty_assertions::assert_eq;

use common::{Attachment, Comment, Link, Post, blog, sample_post};

#[test]
fn post_round_trips_through_document() {
    let context = blog();
    let post = sample_post();

    let document = context.to_document(&post).unwrap();
    let restored = context.to_instance::<Post>(&document).unwrap();

    assert!(restored.is_complete());
    assert_eq!(restored.into_inner(), post);
}

#[test]
fn post_document_layout() {
    let context = blog();
    let document = context.to_document(&sample_post()).unwrap();

    assert_eq!(document.get_i64("published").unwrap(), 1_700_000_000_000);
    assert_eq!(
        document.get_array("comments").unwrap()[0],
        Bson::Document(doc! { "author": "ana", "body": "Nice", "at": 1_700_000_100_000_i64 })
    );
    assert_eq!(
        document.get_array("attachments").unwrap().clone(),
        vec![
            Bson::Document(doc! { "_type": "Image", "url": "https://img.example/cover.png", "width": 800 }),
            Bson::Document(doc! { "_type": "Link", "href": "https://docs.example" }),
        ]
    );
    assert_eq!(
        document.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["_id", "title", "views", "published", "tags", "comments", "attachments"]
    );
}

#[test]
fn scalar_failures_are_reported_with_paths() {
    let context = blog();
    let document = doc! {
        "title": "Draft",
        "views": "lots",
        "comments": [{ "author": "ana", "body": 7 }],
    };

    let mapped = context.to_instance::<Post>(&document).unwrap();

    assert_eq!(mapped.value.title, "Draft");
    assert_eq!(mapped.value.views, 0);
    assert_eq!(mapped.value.comments, vec![Comment { author: "ana".to_string(), ..Comment::default() }]);
    assert_eq!(mapped.value.summary, "Draft (1 comments)");
    assert_eq!(
        mapped
            .issues
            .iter()
            .map(|issue| issue.path.as_str())
            .collect::<Vec<_>>(),
        vec!["views", "tags", "comments.0.body"]
    );
    assert_eq!(
        mapped.issues[2].error,
        MappingError::InvalidValue {
            field: "body".to_string(),
            expected: "string",
            found: ElementType::Int32,
        }
    );
}

#[test]
fn absent_collections_populate_empty() {
    let context = blog();

    let mapped = context
        .to_instance::<Post>(&doc! { "title": "Bare", "views": 1_i64, "tags": [] })
        .unwrap();

    assert!(mapped.is_complete());
    assert!(mapped.value.comments.is_empty());
    assert!(mapped.value.attachments.is_empty());
}

#[test]
fn broken_collection_fails_the_whole_entity() {
    let context = blog();

    let result = context.to_instance::<Post>(&doc! { "title": "x", "comments": { "author": "ana" } });

    assert!(matches!(
        result,
        Err(MappingError::InvalidCollection { field, .. }) if field == "comments"
    ));
}

#[test]
fn subtype_discriminator_resolves_to_registered_ancestor() {
    let context = blog();
    let document = doc! {
        "title": "Embeds",
        "views": 0_i64,
        "tags": [],
        "attachments": [{ "_type": "Embed", "href": "https://video.example" }],
    };

    let post = context.to_instance::<Post>(&document).unwrap().into_inner();

    assert_eq!(
        post.attachments,
        vec![Attachment::Link(Link { href: "https://video.example".to_string() })]
    );
    assert!(
        context
            .mapper::<Link>()
            .unwrap()
            .can_map(&EntityType::of::<common::Embed>())
    );
}

#[test]
fn capped_metadata_is_exposed_for_provisioning() {
    let context = blog();

    let capped = context
        .mappers()
        .iter()
        .filter_map(|mapper| mapper.capped().map(|options| (mapper.entity_type().name(), options)))
        .collect::<Vec<_>>();

    assert_eq!(capped, vec![("Post", CappedOptions { size: 1_048_576, max: 1_000 })]);
}
