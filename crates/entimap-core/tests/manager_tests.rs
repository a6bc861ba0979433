//! Manager Registry Tests
//!
//! ## Scenarios Covered
//!
//! 1. Lookup by model kind fails fast when nothing is registered
//! 2. Named builders are instantiated lazily and memoized
//! 3. Repositories need a manager before they can hydrate models
//! 4. Identity storage hits, flushes and the blank storage factory

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::setup;
use entimap_core::catalog::{self, order_item_repository, ORDER_ITEM, POST};
use entimap_core::host::memory::{HostCall, MemoryHost};
use entimap_core::host::Record;
use entimap_core::repository::FindArgs;
use entimap_core::storage::BlankStorageFactory;
use entimap_core::{EntimapError, Lookup, Manager, ModelKind, Repository, Value};
use std::rc::Rc;

fn fetches(host: &MemoryHost) -> usize {
    host.journal()
        .count(|c| matches!(c, HostCall::Fetch { .. }))
}

#[test]
fn test_unregistered_model_kind_fails_fast() {
    let fx = setup();
    let err = fx
        .manager
        .get_model_repository(ModelKind::new("invoice"))
        .err()
        .unwrap();
    assert_eq!(
        err,
        EntimapError::RepositoryNotRegistered {
            model: "invoice".to_string()
        }
    );
}

#[test]
fn test_default_catalog_registers_every_model() {
    let fx = setup();
    let kinds: Vec<&str> = fx
        .manager
        .registered_models()
        .iter()
        .map(ModelKind::as_str)
        .collect();
    assert_eq!(
        kinds,
        vec![
            "category",
            "comment",
            "order",
            "order_item",
            "page",
            "post",
            "post_tag",
            "product",
            "product_cat",
            "site",
            "user",
        ]
    );
}

#[test]
fn test_named_builder_is_lazy_and_memoized() {
    let fx = setup();
    let first = fx.manager.get_repository("order_item_fee").unwrap();
    let second = fx.manager.get_repository("order_item_fee").unwrap();

    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(first.name(), "order_item_fee");
    assert_eq!(first.kind(), ORDER_ITEM);
    // The base repository keeps serving the model kind.
    assert_eq!(
        fx.manager.get_model_repository(ORDER_ITEM).unwrap().name(),
        "order_item"
    );
}

#[test]
fn test_unknown_repository_name_is_not_registered() {
    let fx = setup();
    assert!(matches!(
        fx.manager.get_repository("order_item_coupon"),
        Err(EntimapError::RepositoryNotRegistered { .. })
    ));
}

#[test]
fn test_subtype_repository_scopes_create_and_find() {
    let fx = setup();
    let fees = fx.manager.get_repository("order_item_fee").unwrap();
    let lines = fx.manager.get_repository("order_item_line").unwrap();

    let mut fee = fees.create(&[("name", "Gift wrap".into())]).unwrap();
    assert_eq!(fee.get("item_type").unwrap(), Value::from("fee"));
    fees.save(&mut fee).unwrap();
    let mut line = lines.create(&[("name", "Mug".into())]).unwrap();
    lines.save(&mut line).unwrap();

    let found = fees.find_all().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(
        fx.store("order_item").records()[0].data().get("type"),
        Some(&Value::from("fee"))
    );
    let mut all = fx.repo(ORDER_ITEM).find_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].get("item_type").unwrap(), Value::from("line_item"));
}

#[test]
fn test_builder_registered_for_unbound_kind_binds_it() {
    let host = MemoryHost::new();
    let manager = Manager::new(host.host());
    manager.register_builder("order_item_shipping", |manager| {
        let repository: Box<dyn Repository> = Box::new(order_item_repository(
            manager,
            Some(("order_item_shipping", "shipping")),
        )?);
        Ok(repository)
    });
    assert!(manager.get_model_repository(ORDER_ITEM).is_err());

    manager.get_repository("order_item_shipping").unwrap();
    assert_eq!(
        manager.get_model_repository(ORDER_ITEM).unwrap().name(),
        "order_item_shipping"
    );
}

#[test]
fn test_unattached_repository_is_not_initialized() {
    let host = MemoryHost::new();
    let manager = Manager::new(host.host());
    let repository = order_item_repository(&manager, None).unwrap();
    let id = host.store("order_item").unwrap().seed(Record::new());

    let err = repository.get(Lookup::Id(id)).unwrap_err();
    assert_eq!(
        err,
        EntimapError::RepositoryNotInitialized {
            repository: "order_item".to_string()
        }
    );
}

#[test]
fn test_identity_storage_serves_repeat_lookups() {
    let fx = setup();
    let id = fx.seed_post("Cached", "cached");
    let repository = fx.repo(POST);

    repository.get(Lookup::Id(id.clone())).unwrap().unwrap();
    repository.get(Lookup::Id(id.clone())).unwrap().unwrap();
    let mut by_slug = repository.get(Lookup::from("cached")).unwrap().unwrap();
    assert_eq!(by_slug.get("id").unwrap(), id);
    assert_eq!(fetches(&fx.host), 1);

    fx.manager.flush_storage();
    repository.get(Lookup::Id(id)).unwrap().unwrap();
    assert_eq!(fetches(&fx.host), 2);
}

#[test]
fn test_hydrated_query_results_are_cached_by_id() {
    let fx = setup();
    let id = fx.seed_post("Listed", "listed");
    let repository = fx.repo(POST);

    assert_eq!(repository.find(&FindArgs::new()).unwrap().len(), 1);
    repository.get(Lookup::Id(id)).unwrap().unwrap();
    assert_eq!(fetches(&fx.host), 0);
}

#[test]
fn test_blank_storage_factory_never_caches() {
    let host = MemoryHost::new();
    let manager = Manager::with_storage_factory(host.host(), BlankStorageFactory);
    catalog::register_defaults(&manager).unwrap();
    let id = host.store("post").unwrap().seed(
        Record::new()
            .with("post_type", "post")
            .with("post_title", "Uncached"),
    );
    let repository = manager.get_model_repository(POST).unwrap();

    repository.get(Lookup::Id(id.clone())).unwrap().unwrap();
    repository.get(Lookup::Id(id)).unwrap().unwrap();
    assert_eq!(fetches(&host), 2);
}

#[test]
fn test_registration_replaces_previous_binding() {
    let fx = setup();
    let replacement = order_item_repository(&fx.manager, Some(("order_item_line", "line_item")))
        .unwrap();
    fx.manager.register_repository(replacement);
    assert_eq!(
        fx.manager.get_model_repository(ORDER_ITEM).unwrap().name(),
        "order_item_line"
    );
}
