#![allow(dead_code)]

use std::{any::Any, sync::Arc};

use chrono::{DateTime, Utc};
use docmap::{bson::oid::ObjectId, prelude::*};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Image {
    pub url: String,
    pub width: i32,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Link {
    pub href: String,
}

/// A link rendered inline; stored and read back through the `Link` mapper.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Embed {
    pub link: Link,
}

impl AsRef<Link> for Embed {
    fn as_ref(&self) -> &Link {
        &self.link
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attachment {
    Image(Image),
    Link(Link),
}

impl Polymorphic for Attachment {
    fn as_entity(&self) -> &dyn Any {
        match self {
            Attachment::Image(image) => image,
            Attachment::Link(link) => link,
        }
    }

    fn from_entity(entity: Box<dyn Any>) -> Result<Self, Box<dyn Any>> {
        let entity = match entity.downcast::<Image>() {
            Ok(image) => return Ok(Attachment::Image(*image)),
            Err(entity) => entity,
        };
        entity.downcast::<Link>().map(|link| Attachment::Link(*link))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Post {
    pub id: Option<ObjectId>,
    pub title: String,
    pub views: i64,
    pub published: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub comments: Vec<Comment>,
    pub attachments: Vec<Attachment>,
    pub summary: String,
}

pub fn at(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap()
}

fn comment_mapper() -> Mapper<Comment> {
    Mapper::<Comment>::new()
        .add_property(PropertyMapper::new("author", |c: &Comment| c.author.clone(), |c, v| c.author = v))
        .add_property(PropertyMapper::new("body", |c: &Comment| c.body.clone(), |c, v| c.body = v))
        .add_property(PropertyMapper::timestamp("at", |c: &Comment| c.at, |c, v| c.at = v))
}

fn post_mapper() -> Mapper<Post> {
    Mapper::<Post>::new()
        .add_property(PropertyMapper::new("_id", |p: &Post| p.id, |p, v| p.id = v))
        .add_property(PropertyMapper::new("title", |p: &Post| p.title.clone(), |p, v| p.title = v))
        .add_property(PropertyMapper::new("views", |p: &Post| p.views, |p, v| p.views = v))
        .add_property(PropertyMapper::timestamp(
            "published",
            |p: &Post| p.published,
            |p, v| p.published = v,
        ))
        .add_property(PropertyMapper::new("tags", |p: &Post| p.tags.clone(), |p, v| p.tags = v))
        .add_collection(CollectionMapper::new(
            "comments",
            |p: &Post| &p.comments,
            |p, v| p.comments = v,
        ))
        .add_collection(CollectionMapper::polymorphic(
            "attachments",
            |p: &Post| &p.attachments,
            |p, v| p.attachments = v,
        ))
        .on_populate(|p, _| {
            p.summary = format!("{} ({} comments)", p.title, p.comments.len());
            Ok(())
        })
        .set_capped(true, 1_048_576, 1_000)
}

pub fn blog() -> Arc<MapperContext> {
    MapperContext::builder()
        .register(comment_mapper())
        .register(post_mapper())
        .register(
            Mapper::<Image>::new()
                .add_property(PropertyMapper::new("url", |i: &Image| i.url.clone(), |i, v| i.url = v))
                .add_property(PropertyMapper::new("width", |i: &Image| i.width, |i, v| i.width = v)),
        )
        .register(
            Mapper::<Link>::new()
                .add_property(PropertyMapper::new("href", |l: &Link| l.href.clone(), |l, v| l.href = v)),
        )
        .subtype::<Embed, Link>()
        .build()
        .unwrap()
}

pub fn sample_post() -> Post {
    let title = "Mapping documents".to_string();

    Post {
        id: Some(ObjectId::parse_str("65f0c0ffee0000000000beef").unwrap()),
        summary: format!("{} (2 comments)", title),
        title,
        views: 120,
        published: Some(at(1_700_000_000_000)),
        tags: vec!["rust".to_string(), "bson".to_string()],
        comments: vec![
            Comment {
                author: "ana".to_string(),
                body: "Nice".to_string(),
                at: Some(at(1_700_000_100_000)),
            },
            Comment {
                author: "ben".to_string(),
                body: "Thanks".to_string(),
                at: None,
            },
        ],
        attachments: vec![
            Attachment::Image(Image {
                url: "https://img.example/cover.png".to_string(),
                width: 800,
            }),
            Attachment::Link(Link {
                href: "https://docs.example".to_string(),
            }),
        ],
    }
}
