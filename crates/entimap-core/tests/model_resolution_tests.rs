//! Model Resolution Tests
//!
//! Lazy field resolution through every source strategy.
//!
//! ## Scenarios Covered
//!
//! 1. Reads resolve once per refresh cycle
//! 2. Read-only fields reject writes once non-empty
//! 3. Refresh rebinds the record and clears state
//! 4. Fields without a source fall back to the side store
//! 5. Alias, accessor, computed, relation and hook behaviour
//! 6. Array projection, with and without recursion
//! 7. Terms list the posts assigned to them

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::setup;
use entimap_core::catalog::{CATEGORY, COMMENT, POST, PRODUCT};
use entimap_core::host::Record;
use entimap_core::repository::{EntityConfig, EntityRepository, MetaBinding};
use entimap_core::{
    EntimapError, FieldDescriptor, FieldType, Lookup, ModelKind, ModelSchema, Relation,
    Repository, Source, Value,
};
use std::rc::Rc;

const GALLERY: ModelKind = ModelKind::new("gallery");

fn gallery_schema() -> ModelSchema {
    ModelSchema::builder(GALLERY)
        .field(FieldDescriptor::new("id", FieldType::Int).object("ID"))
        .field(FieldDescriptor::new("title", FieldType::String).object("post_title"))
        .field(FieldDescriptor::new("headline", FieldType::String).alias("title"))
        .field(FieldDescriptor::new("image_ids", FieldType::Array).object("image_ids"))
        .field(FieldDescriptor::new("images", FieldType::Array))
        .field(FieldDescriptor::new("mood", FieldType::String))
        .field(
            FieldDescriptor::new("locked", FieldType::String)
                .object("locked")
                .readonly()
                .default("sealed"),
        )
        .field(FieldDescriptor::new("settings", FieldType::Object).object("settings"))
        .field(FieldDescriptor::new("rating", FieldType::Int).object("meta.rating"))
        .relation(
            "images",
            Relation::Ids {
                target: POST,
                source_key: "image_ids".to_string(),
            },
        )
        .build()
        .unwrap()
}

fn register_gallery(fx: &common::Fixture) -> Rc<dyn Repository> {
    let repository = EntityRepository::new(
        gallery_schema(),
        EntityConfig::new("gallery", "post").meta(MetaBinding::SideStore("post".to_string())),
        fx.manager.host(),
    )
    .unwrap();
    fx.manager.register_repository(repository)
}

fn seed_gallery(fx: &common::Fixture, image_ids: &str) -> Value {
    let mut meta = std::collections::BTreeMap::new();
    meta.insert("rating".to_string(), Value::Int(4));
    fx.posts().seed(
        Record::new()
            .with("post_title", "Holiday")
            .with("post_type", "gallery")
            .with("image_ids", image_ids)
            .with("settings", "{not json")
            .with("meta", Value::Object(meta)),
    )
}

#[test]
fn test_meta_field_resolves_once_per_refresh_cycle() {
    let fx = setup();
    let id = fx.seed_post("Hello", "hello");
    fx.host.meta.seed("post", &id, "_thumbnail_id", 42);
    let mut post = fx.load_post(&id);

    let reads_before = fx.host.meta.reads();
    assert_eq!(post.get("featured_image_id").unwrap(), Value::Int(42));
    assert_eq!(post.get("featured_image_id").unwrap(), Value::Int(42));
    assert_eq!(fx.host.meta.reads() - reads_before, 1);

    post.refresh(None);
    post.get("featured_image_id").unwrap();
    assert_eq!(fx.host.meta.reads() - reads_before, 2);
}

#[test]
fn test_readonly_field_rejects_write_after_read() {
    let fx = setup();
    let id = fx.seed_post("Hello", "hello");
    let mut post = fx.load_post(&id);

    assert_eq!(post.get("date").unwrap(), Value::from("2024-03-01 09:30:00"));
    let err = post.set("date", "2030-01-01 00:00:00").unwrap_err();
    assert_eq!(
        err,
        EntimapError::ReadOnlyViolation {
            model: "post".to_string(),
            field: "date".to_string(),
        }
    );
    // The rejected write left the cache alone.
    assert_eq!(post.get("date").unwrap(), Value::from("2024-03-01 09:30:00"));
}

#[test]
fn test_readonly_field_with_empty_default_accepts_first_write() {
    let fx = setup();
    let mut post = fx.repo(POST).create(&[]).unwrap();
    post.set("date", "2024-05-05 10:00:00").unwrap();
    assert_eq!(post.get("date").unwrap(), Value::from("2024-05-05 10:00:00"));
    assert!(post.set("date", "2024-06-06 10:00:00").is_err());
}

#[test]
fn test_readonly_field_with_non_empty_default_rejects_before_read() {
    let fx = setup();
    let repository = register_gallery(&fx);
    let id = seed_gallery(&fx, "[]");
    let mut gallery = repository.get(Lookup::Id(id)).unwrap().unwrap();

    let err = gallery.set("locked", "open").unwrap_err();
    assert!(matches!(err, EntimapError::ReadOnlyViolation { .. }));
}

#[test]
fn test_refresh_rereads_from_new_record() {
    let fx = setup();
    let id = fx.seed_post("Before", "before");
    let mut post = fx.load_post(&id);
    assert_eq!(post.get("title").unwrap(), Value::from("Before"));
    post.set("slug", "edited").unwrap();

    let replacement = Record::new()
        .with("ID", id.clone())
        .with("post_title", "After")
        .with("post_name", "after")
        .into_ref();
    post.refresh(Some(replacement));

    assert_eq!(post.cached("title"), None);
    assert!(post.changed_fields().next().is_none());
    assert_eq!(post.get("title").unwrap(), Value::from("After"));
    assert_eq!(post.get("slug").unwrap(), Value::from("after"));
}

#[test]
fn test_unsourced_field_falls_back_to_meta_by_name() {
    let fx = setup();
    let repository = register_gallery(&fx);
    let id = seed_gallery(&fx, "[]");
    fx.host.meta.seed("post", &id, "mood", "calm");

    let mut gallery = repository.get(Lookup::Id(id)).unwrap().unwrap();

    assert_eq!(
        gallery.schema().source("mood"),
        Some(&Source::Meta {
            key: None,
            single: true
        })
    );
    assert_eq!(gallery.get("mood").unwrap(), Value::from("calm"));
}

#[test]
fn test_alias_reads_and_writes_target_value() {
    let fx = setup();
    let repository = register_gallery(&fx);
    let id = seed_gallery(&fx, "[]");
    let mut gallery = repository.get(Lookup::Id(id)).unwrap().unwrap();

    assert_eq!(gallery.get("headline").unwrap(), Value::from("Holiday"));
}

#[test]
fn test_dotted_object_path_and_malformed_json() {
    let fx = setup();
    let repository = register_gallery(&fx);
    let id = seed_gallery(&fx, "[]");
    let mut gallery = repository.get(Lookup::Id(id)).unwrap().unwrap();

    assert_eq!(gallery.get("rating").unwrap(), Value::Int(4));
    // Unparseable JSON is a soft failure: the field falls back to its default.
    assert_eq!(
        gallery.get("settings").unwrap(),
        Value::Object(Default::default())
    );
}

#[test]
fn test_ids_relation_resolves_listed_entities_in_order() {
    let fx = setup();
    let repository = register_gallery(&fx);
    let first = fx.seed_post("First", "first");
    let second = fx.seed_post("Second", "second");
    let id = seed_gallery(&fx, &format!("[{second},{first}]"));
    let mut gallery = repository.get(Lookup::Id(id)).unwrap().unwrap();

    let mut images = gallery.get("images").unwrap().into_models();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].get("title").unwrap(), Value::from("Second"));
    assert_eq!(images[1].get("title").unwrap(), Value::from("First"));
}

#[test]
fn test_accessor_field_writes_through_to_record() {
    let fx = setup();
    let products = fx.store("product");
    let id = products.seed(Record::new().with_data("name", "Mug").with_data("price", 9.5));
    let mut product = fx.repo(PRODUCT).get(Lookup::Id(id)).unwrap().unwrap();

    assert_eq!(product.get("price").unwrap(), Value::Float(9.5));
    product.set("price", "12.25").unwrap();

    let record = product.record().unwrap().borrow_mut().call("get_price", &[]);
    assert_eq!(record, Some(Value::Float(12.25)));
}

#[test]
fn test_computed_field_uses_getter() {
    let fx = setup();
    let id = fx.seed_post("Hello", "hello");
    let mut post = fx.load_post(&id);
    assert_eq!(post.get("permalink").unwrap(), Value::String(format!("/?p={id}")));

    let mut draft = fx.repo(POST).create(&[]).unwrap();
    assert_eq!(draft.get("permalink").unwrap(), Value::from(""));
}

#[test]
fn test_set_hook_transforms_incoming_value() {
    let fx = setup();
    let mut post = fx.repo(POST).create(&[]).unwrap();
    post.set("slug", "My First Post!").unwrap();
    assert_eq!(post.get("slug").unwrap(), Value::from("my-first-post"));
}

#[test]
fn test_after_set_hook_clears_stale_parent() {
    let fx = setup();
    let first = fx.seed_post("First parent", "first-parent");
    let second = fx.seed_post("Second parent", "second-parent");
    let child = fx.seed_post_with_parent("Child", "child", first.as_int().unwrap());
    let mut post = fx.load_post(&child);

    let mut parent = post.get("parent").unwrap().into_model().unwrap();
    assert_eq!(parent.get("title").unwrap(), Value::from("First parent"));

    post.set("parent_id", second).unwrap();
    let mut parent = post.get("parent").unwrap().into_model().unwrap();
    assert_eq!(parent.get("title").unwrap(), Value::from("Second parent"));
}

#[test]
fn test_many_to_one_with_empty_key_is_null() {
    let fx = setup();
    let id = fx.seed_post("Orphan", "orphan");
    let mut post = fx.load_post(&id);
    assert_eq!(post.get("parent").unwrap(), Value::Null);
    assert_eq!(post.get("author").unwrap(), Value::Null);
}

#[test]
fn test_top_level_parent_walks_chain_and_survives_cycles() {
    let fx = setup();
    let root = fx.seed_post("Root", "root");
    let middle = fx.seed_post_with_parent("Middle", "middle", root.as_int().unwrap());
    let leaf = fx.seed_post_with_parent("Leaf", "leaf", middle.as_int().unwrap());
    let mut post = fx.load_post(&leaf);
    let mut top = post.get("top_level_parent").unwrap().into_model().unwrap();
    assert_eq!(top.get("id").unwrap(), root);

    // Two posts pointing at each other.
    let posts = fx.posts();
    let a = posts.seed(
        Record::new()
            .with("ID", 100)
            .with("post_type", "post")
            .with("post_parent", 101),
    );
    posts.seed(
        Record::new()
            .with("ID", 101)
            .with("post_type", "post")
            .with("post_parent", 100),
    );
    let mut looped = fx.load_post(&a);
    let mut top = looped.get("top_level_parent").unwrap().into_model().unwrap();
    assert_eq!(top.get("id").unwrap(), Value::Int(101));
}

#[test]
fn test_terms_relation_reads_assigned_terms() {
    let fx = setup();
    let id = fx.seed_post("Tagged", "tagged");
    let news = fx.seed_term("category", "News", "news");
    let sport = fx.seed_term("category", "Sport", "sport");
    fx.host.terms.seed(&id, "category", vec![news, sport]);
    let mut post = fx.load_post(&id);

    let mut names = Vec::new();
    for mut term in post.get("categories").unwrap().into_models() {
        assert_eq!(term.kind(), CATEGORY);
        names.push(term.get("name").unwrap());
        assert_eq!(term.get("taxonomy").unwrap(), Value::from("category"));
    }
    assert_eq!(names, vec![Value::from("News"), Value::from("Sport")]);
}

#[test]
fn test_term_lists_the_posts_carrying_it() {
    let fx = setup();
    let first = fx.seed_post("First", "first");
    let second = fx.seed_post("Second", "second");
    let other = fx.seed_post("Other", "other");
    let news = fx.seed_term("category", "News", "news");
    let sport = fx.seed_term("category", "Sport", "sport");
    let empty = fx.seed_term("category", "Empty", "empty");
    fx.host.terms.seed(&first, "category", vec![news.clone()]);
    fx.host.terms.seed(&second, "category", vec![sport, news.clone()]);
    fx.host.terms.seed(&other, "post_tag", vec![news.clone()]);

    let mut term = fx.repo(CATEGORY).get(Lookup::Id(news)).unwrap().unwrap();
    let mut titles: Vec<Value> = term
        .get("posts")
        .unwrap()
        .into_models()
        .iter_mut()
        .map(|post| post.get("title").unwrap())
        .collect();
    titles.sort_by_key(Value::to_text);
    assert_eq!(titles, vec![Value::from("First"), Value::from("Second")]);

    let mut unused = fx.repo(CATEGORY).get(Lookup::Id(empty)).unwrap().unwrap();
    assert_eq!(unused.get("posts").unwrap(), Value::Array(Vec::new()));
}

#[test]
fn test_undeclared_field_is_an_error() {
    let fx = setup();
    let id = fx.seed_post("Hello", "hello");
    let mut post = fx.load_post(&id);

    let err = post.get("nope").unwrap_err();
    assert_eq!(
        err,
        EntimapError::PropertyNotDefined {
            model: "post".to_string(),
            field: "nope".to_string(),
        }
    );
    assert!(post.set("nope", 1).is_err());
    assert!(!post.contains("nope"));
    assert!(post.contains("title"));
}

#[test]
fn test_to_array_projects_requested_fields() {
    let fx = setup();
    let id = fx.seed_post("Hello", "hello");
    let mut post = fx.load_post(&id);

    let projected = post.to_array(&["id", "title"], &[]).unwrap();
    assert_eq!(projected.len(), 2);
    assert_eq!(projected.get("title"), Some(&Value::from("Hello")));
}

#[test]
fn test_to_array_recurses_into_marked_relations() {
    let fx = setup();
    let post_id = fx.seed_post("Commented", "commented");
    let comment_id = fx.store("comment").seed(
        Record::new()
            .with("comment_post_ID", post_id.clone())
            .with("comment_content", "Nice")
            .with("comment_parent", 0)
            .with("user_id", 0),
    );
    let mut comment = fx
        .repo(COMMENT)
        .get(Lookup::Id(comment_id))
        .unwrap()
        .unwrap();

    let flat = comment.to_array(&["post"], &[]).unwrap();
    assert!(matches!(flat.get("post"), Some(Value::Model(_))));

    let nested = comment.to_array(&["content", "post"], &["post"]).unwrap();
    let post = nested.get("post").and_then(Value::as_object).unwrap();
    assert_eq!(post.get("title"), Some(&Value::from("Commented")));
    assert_eq!(nested.get("content"), Some(&Value::from("Nice")));
}

#[test]
fn test_to_array_recursion_reaches_every_level() {
    let fx = setup();
    let root = fx.seed_post("Root", "root");
    let middle = fx.seed_post_with_parent("Middle", "middle", root.as_int().unwrap());
    let leaf = fx.seed_post_with_parent("Leaf", "leaf", middle.as_int().unwrap());
    let mut post = fx.load_post(&leaf);

    let projected = post.to_array(&["title", "parent"], &["parent"]).unwrap();
    let parent = projected.get("parent").and_then(Value::as_object).unwrap();
    assert_eq!(parent.get("title"), Some(&Value::from("Middle")));
    let grandparent = parent.get("parent").and_then(Value::as_object).unwrap();
    assert_eq!(grandparent.get("title"), Some(&Value::from("Root")));
    assert_eq!(grandparent.get("parent"), Some(&Value::Null));
}

#[test]
fn test_iteration_and_json_cover_all_fields() {
    let fx = setup();
    let id = fx.seed_post("Hello", "hello");
    let mut post = fx.load_post(&id);
    let field_count = post.schema().fields().len();

    assert_eq!(post.iter().unwrap().count(), field_count);
    let json = post.to_json().unwrap();
    assert_eq!(json["title"], serde_json::json!("Hello"));
    assert_eq!(json["status"], serde_json::json!("publish"));
}

#[test]
fn test_unset_forces_single_field_reresolution() {
    let fx = setup();
    let id = fx.seed_post("Hello", "hello");
    let mut post = fx.load_post(&id);
    post.get("title").unwrap();
    post.get("slug").unwrap();

    post.unset("title");
    assert_eq!(post.cached("title"), None);
    assert!(post.cached("slug").is_some());
}
