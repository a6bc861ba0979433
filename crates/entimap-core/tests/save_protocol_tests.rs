//! Save Protocol Tests
//!
//! One primary write per save, relation persistence afterwards, refresh last.
//!
//! ## Scenarios Covered
//!
//! 1. New entity: one insert with every writable field, then a reload
//! 2. Loaded entity: one update with changed fields only, then relations
//! 3. Failed writes surface as CouldNotPersist and leave the model alone
//! 4. Children cascade with the parent key rebound
//! 5. Side-store meta is written after the primary record exists
//! 6. A meta write the host rejects is logged without failing the save

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::setup;
use entimap_core::catalog::{content_schema, CATEGORY, ORDER, ORDER_ITEM, POST};
use entimap_core::host::memory::HostCall;
use entimap_core::host::HostError;
use entimap_core::logging_facility::test_capture::init_test_capture;
use entimap_core::repository::{EntityConfig, EntityRepository, MetaBinding};
use entimap_core::{EntimapError, Lookup, Value};

fn position(calls: &[HostCall], predicate: impl Fn(&HostCall) -> bool) -> usize {
    calls.iter().position(predicate).expect("call should be journaled")
}

#[test]
fn test_new_entity_is_inserted_once_then_reloaded() {
    let fx = setup();
    let repository = fx.repo(POST);
    let mut post = repository
        .create(&[("title", "Fresh".into()), ("slug", "Fresh Post".into())])
        .unwrap();
    fx.host.journal().clear();

    repository.save(&mut post).unwrap();

    let calls = fx.host.journal().calls();
    let inserts: Vec<&HostCall> = calls.iter().filter(|c| c.is_primary_write()).collect();
    assert_eq!(inserts.len(), 1);
    let HostCall::Insert { family, payload } = inserts[0] else {
        panic!("expected an insert, got {:?}", inserts[0]);
    };
    assert_eq!(family, "post");
    let keys: Vec<&str> = payload.fields.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            "post_author",
            "post_content",
            "post_excerpt",
            "post_name",
            "post_parent",
            "post_status",
            "post_title",
            "post_type",
        ]
    );
    assert_eq!(payload.field("post_title"), Some(&Value::from("Fresh")));
    assert_eq!(payload.field("post_name"), Some(&Value::from("fresh-post")));
    assert_eq!(payload.field("post_status"), Some(&Value::from("draft")));
    assert_eq!(payload.field("post_type"), Some(&Value::from("post")));
    assert!(payload.meta.is_empty());

    // The reload follows the write and exposes the generated key.
    let insert_at = position(&calls, HostCall::is_primary_write);
    let reload_at = position(&calls, |c| matches!(c, HostCall::Fetch { .. }));
    assert!(insert_at < reload_at);
    assert_eq!(post.cached("title"), None);
    assert!(post.changed_fields().next().is_none());
    let id = post.get("id").unwrap();
    assert_eq!(id, Value::Int(1));
    assert_eq!(post.get("title").unwrap(), Value::from("Fresh"));
    assert!(fx.posts().record(&id).is_some());
}

#[test]
fn test_loaded_entity_updates_changed_fields_then_persists_relation() {
    let fx = setup();
    let id = fx.seed_post("Old title", "old-title");
    let news = fx.seed_term("category", "News", "news");
    let category = fx
        .repo(CATEGORY)
        .get(Lookup::Id(news.clone()))
        .unwrap()
        .unwrap();
    let mut post = fx.load_post(&id);
    fx.host.journal().clear();

    post.set("title", "New title").unwrap();
    post.set("categories", vec![category]).unwrap();
    fx.repo(POST).save(&mut post).unwrap();

    let calls = fx.host.journal().calls();
    let updates: Vec<&HostCall> = calls.iter().filter(|c| c.is_primary_write()).collect();
    assert_eq!(updates.len(), 1);
    let HostCall::Update {
        id: updated,
        payload,
        ..
    } = updates[0]
    else {
        panic!("expected an update, got {:?}", updates[0]);
    };
    assert_eq!(updated, &id);
    assert_eq!(payload.fields.len(), 1);
    assert_eq!(payload.field("post_title"), Some(&Value::from("New title")));
    assert!(payload.meta.is_empty());

    let assignments: Vec<&HostCall> = calls
        .iter()
        .filter(|c| matches!(c, HostCall::SetTerms { .. }))
        .collect();
    assert_eq!(assignments.len(), 1);
    assert_eq!(
        assignments[0],
        &HostCall::SetTerms {
            taxonomy: "category".to_string(),
            object_id: id.clone(),
            term_ids: vec![news],
        }
    );
    let update_at = position(&calls, HostCall::is_primary_write);
    let persist_at = position(&calls, |c| matches!(c, HostCall::SetTerms { .. }));
    assert!(update_at < persist_at);

    let mut categories = post.get("categories").unwrap().into_models();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].get("name").unwrap(), Value::from("News"));
    assert_eq!(
        fx.posts().record(&id).unwrap().props().get("post_title"),
        Some(&Value::from("New title"))
    );
}

#[test]
fn test_unchanged_relations_are_not_persisted() {
    let fx = setup();
    let id = fx.seed_post("Title", "title");
    let mut post = fx.load_post(&id);
    post.get("categories").unwrap();
    fx.host.journal().clear();

    post.set("excerpt", "Short").unwrap();
    fx.repo(POST).save(&mut post).unwrap();

    assert_eq!(
        fx.host
            .journal()
            .count(|c| matches!(c, HostCall::SetTerms { .. })),
        0
    );
}

#[test]
fn test_failed_insert_raises_could_not_persist_and_keeps_model() {
    let fx = setup();
    let repository = fx.repo(POST);
    let mut post = repository.create(&[("title", "Doomed".into())]).unwrap();
    fx.posts()
        .fail_next(HostError::new("db_insert_error", "disk full"));

    let err = repository.save(&mut post).unwrap_err();

    match &err {
        EntimapError::CouldNotPersist { model, detail } => {
            assert_eq!(model, "post");
            assert!(detail.contains("disk full"), "detail was {detail}");
        }
        other => panic!("expected CouldNotPersist, got {other:?}"),
    }
    assert_eq!(post.get("id").unwrap(), Value::Int(0));
    assert_eq!(post.get("title").unwrap(), Value::from("Doomed"));
    assert!(post.is_changed("title"));
    assert!(post.record().is_none());
    assert!(fx.posts().records().is_empty());
}

#[test]
fn test_failed_update_leaves_stored_record_unchanged() {
    let fx = setup();
    let id = fx.seed_post("Stable", "stable");
    let mut post = fx.load_post(&id);
    post.set("title", "Unstable").unwrap();
    fx.posts().fail_next(HostError::new("db_update_error", "locked"));

    assert!(matches!(
        fx.repo(POST).save(&mut post),
        Err(EntimapError::CouldNotPersist { .. })
    ));
    assert_eq!(post.get("title").unwrap(), Value::from("Unstable"));
    assert_eq!(
        fx.posts().record(&id).unwrap().props().get("post_title"),
        Some(&Value::from("Stable"))
    );
}

#[test]
fn test_children_are_saved_with_parent_key_after_parent() {
    let fx = setup();
    let orders = fx.repo(ORDER);
    let items = fx.repo(ORDER_ITEM);
    let mut order = orders
        .create(&[
            ("total", Value::from(30.0)),
            ("customer_note", "Leave at the door".into()),
        ])
        .unwrap();
    let mug = items
        .create(&[("name", "Mug".into()), ("quantity", 2.into())])
        .unwrap();
    let shipping = items
        .create(&[("name", "Courier".into()), ("item_type", "shipping".into())])
        .unwrap();
    order.set("items", vec![mug, shipping]).unwrap();
    fx.host.journal().clear();

    orders.save(&mut order).unwrap();

    let order_id = order.get("id").unwrap();
    assert!(!order_id.is_empty());
    let stored = fx.store("order_item").records();
    assert_eq!(stored.len(), 2);
    for item in &stored {
        assert_eq!(item.data().get("order_id"), Some(&order_id));
    }

    let calls = fx.host.journal().calls();
    let family_of = |call: &HostCall| match call {
        HostCall::Insert { family, .. } => Some(family.clone()),
        _ => None,
    };
    let families: Vec<String> = calls.iter().filter_map(family_of).collect();
    assert_eq!(families, vec!["order", "order_item", "order_item"]);

    let mut reloaded = order.get("items").unwrap().into_models();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded[0].get("quantity").unwrap(), Value::Int(2));
    assert_eq!(
        reloaded[1].get("item_type").unwrap(),
        Value::from("shipping")
    );
    assert_eq!(
        order.get("customer_note").unwrap(),
        Value::from("Leave at the door")
    );
}

#[test]
fn test_side_store_meta_is_written_after_insert() {
    let fx = setup();
    let repository = fx.repo(POST);
    let mut post = repository.create(&[("title", "Pictured".into())]).unwrap();
    post.set("featured_image_id", 7).unwrap();
    fx.host.journal().clear();

    repository.save(&mut post).unwrap();

    let calls = fx.host.journal().calls();
    let HostCall::Insert { payload, .. } = &calls[0] else {
        panic!("expected the insert first, got {:?}", calls[0]);
    };
    assert!(payload.meta.is_empty());
    let meta_at = position(&calls, |c| matches!(c, HostCall::MetaSet { .. }));
    assert!(meta_at > 0);

    let id = post.get("id").unwrap();
    assert_eq!(
        fx.host.meta.value("post", &id, "_thumbnail_id"),
        Some(Value::Int(7))
    );
    assert_eq!(post.get("featured_image_id").unwrap(), Value::Int(7));
}

#[test]
fn test_rejected_meta_write_is_logged_and_save_completes() {
    let capture = init_test_capture();
    let fx = setup();
    fx.host.meta.reject_key("_thumbnail_id");
    let repository = fx.repo(POST);
    let mut post = repository.create(&[("title", "Unpictured".into())]).unwrap();
    post.set("featured_image_id", 7).unwrap();
    fx.host.journal().clear();

    repository.save(&mut post).unwrap();

    let id = post.get("id").unwrap();
    assert_eq!(fx.host.meta.value("post", &id, "_thumbnail_id"), None);
    assert_eq!(
        fx.host
            .journal()
            .count(|c| matches!(c, HostCall::MetaSet { .. })),
        0
    );
    let warnings = capture.count_events(|e| {
        e.level == tracing::Level::WARN
            && e.field("key") == Some("_thumbnail_id")
            && e.field("repository") == Some("post")
    });
    assert_eq!(warnings, 1);
}

#[test]
fn test_meta_of_loaded_entity_writes_through_immediately() {
    let fx = setup();
    let id = fx.seed_post("Pictured", "pictured");
    let mut post = fx.load_post(&id);
    fx.host.journal().clear();

    post.set("featured_image_id", 9).unwrap();

    assert_eq!(
        fx.host.meta.value("post", &id, "_thumbnail_id"),
        Some(Value::Int(9))
    );
    assert_eq!(
        fx.host
            .journal()
            .count(|c| matches!(c, HostCall::MetaSet { .. })),
        1
    );
}

#[test]
fn test_save_without_refresh_keeps_cached_values() {
    let fx = setup();
    let repository = EntityRepository::new(
        content_schema(POST).unwrap(),
        EntityConfig::new("post", "post")
            .meta(MetaBinding::SideStore("post".to_string()))
            .scoped("post_type", "post_type", "post")
            .refresh_after_save(false),
        fx.manager.host(),
    )
    .unwrap();
    let repository = fx.manager.register_repository(repository);
    let mut post = repository.create(&[("title", "Cached".into())]).unwrap();
    fx.host.journal().clear();

    repository.save(&mut post).unwrap();

    assert_eq!(
        fx.host
            .journal()
            .count(|c| matches!(c, HostCall::Fetch { .. })),
        0
    );
    assert_eq!(post.cached("title"), Some(&Value::from("Cached")));
    assert_eq!(post.get("id").unwrap(), Value::Int(1));
}

#[test]
fn test_unsaved_terms_cannot_be_assigned() {
    let fx = setup();
    let id = fx.seed_post("Title", "title");
    let draft_term = fx
        .repo(CATEGORY)
        .create(&[("name", "Draft".into())])
        .unwrap();
    let mut post = fx.load_post(&id);
    fx.host.journal().clear();

    post.set("categories", vec![draft_term]).unwrap();
    let err = fx.repo(POST).save(&mut post).unwrap_err();

    assert_eq!(
        err,
        EntimapError::MissingPrimaryKey {
            model: "category".to_string(),
            column: "id".to_string(),
        }
    );
    assert_eq!(
        fx.host
            .journal()
            .count(|c| matches!(c, HostCall::SetTerms { .. })),
        0
    );

    let mut unsaved = fx.repo(POST).create(&[("title", "Unsaved".into())]).unwrap();
    let err = fx
        .repo(POST)
        .assign_terms(&mut unsaved, &mut [])
        .unwrap_err();
    assert!(matches!(err, EntimapError::MissingPrimaryKey { ref model, .. } if model == "post"));
}
