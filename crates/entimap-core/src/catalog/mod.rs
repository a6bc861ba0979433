//! Default entity models and their repositories.
//!
//! Each submodule declares the schema of one entity group and the
//! [`EntityConfig`] its repository runs with. [`register_defaults`] wires
//! all of them into a manager.

mod comment;
mod commerce;
mod content;
mod site;
mod taxonomy;
mod user;

pub use commerce::{order_item_repository, order_item_schema, order_schema, product_schema};
pub use comment::comment_schema;
pub use content::{content_schema, sanitize_slug, STICKY_OPTION};
pub use site::site_schema;
pub use taxonomy::term_schema;
pub use user::user_schema;

use crate::errors::Result;
use crate::manager::Manager;
use crate::repository::{EntityConfig, EntityRepository, MetaBinding, Repository};
use crate::schema::{ModelKind, ModelSchema};

pub const POST: ModelKind = ModelKind::new("post");
pub const PAGE: ModelKind = ModelKind::new("page");
pub const CATEGORY: ModelKind = ModelKind::new("category");
pub const POST_TAG: ModelKind = ModelKind::new("post_tag");
pub const PRODUCT_CAT: ModelKind = ModelKind::new("product_cat");
pub const USER: ModelKind = ModelKind::new("user");
pub const COMMENT: ModelKind = ModelKind::new("comment");
pub const SITE: ModelKind = ModelKind::new("site");
pub const ORDER: ModelKind = ModelKind::new("order");
pub const ORDER_ITEM: ModelKind = ModelKind::new("order_item");
pub const PRODUCT: ModelKind = ModelKind::new("product");

/// Storage family of host entities sharing one id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Family {
    pub name: &'static str,
    pub id_property: &'static str,
    pub slug_property: Option<&'static str>,
    /// Fields live behind accessor methods rather than public properties
    pub accessor_backed: bool,
}

pub const FAMILIES: &[Family] = &[
    Family {
        name: "post",
        id_property: "ID",
        slug_property: Some("post_name"),
        accessor_backed: false,
    },
    Family {
        name: "term",
        id_property: "term_id",
        slug_property: Some("slug"),
        accessor_backed: false,
    },
    Family {
        name: "user",
        id_property: "ID",
        slug_property: Some("user_nicename"),
        accessor_backed: false,
    },
    Family {
        name: "comment",
        id_property: "comment_ID",
        slug_property: None,
        accessor_backed: false,
    },
    Family {
        name: "site",
        id_property: "blog_id",
        slug_property: None,
        accessor_backed: false,
    },
    Family {
        name: "order",
        id_property: "id",
        slug_property: None,
        accessor_backed: true,
    },
    Family {
        name: "order_item",
        id_property: "id",
        slug_property: None,
        accessor_backed: true,
    },
    Family {
        name: "product",
        id_property: "id",
        slug_property: Some("slug"),
        accessor_backed: true,
    },
];

/// Order item subtypes served by lazily built repositories.
pub const ORDER_ITEM_TYPES: &[(&str, &str)] = &[
    ("order_item_line", "line_item"),
    ("order_item_fee", "fee"),
    ("order_item_shipping", "shipping"),
];

fn register(manager: &Manager, schema: ModelSchema, config: EntityConfig) -> Result<()> {
    let repository = EntityRepository::new(schema, config, manager.host())?;
    manager.register_repository(repository);
    Ok(())
}

/// Register a repository for every catalog model, plus builders for the
/// order item subtypes.
///
/// # Errors
///
/// `HostFailure` when the manager's host lacks a store for one of the
/// catalog families.
pub fn register_defaults(manager: &Manager) -> Result<()> {
    for (kind, post_type) in [(POST, "post"), (PAGE, "page")] {
        register(
            manager,
            content_schema(kind)?,
            EntityConfig::new(kind.as_str(), "post")
                .meta(MetaBinding::SideStore("post".to_string()))
                .scoped("post_type", "post_type", post_type),
        )?;
    }
    for kind in [CATEGORY, POST_TAG, PRODUCT_CAT] {
        register(
            manager,
            term_schema(kind)?,
            EntityConfig::new(kind.as_str(), "term")
                .meta(MetaBinding::SideStore("term".to_string()))
                .scoped("taxonomy", "taxonomy", kind.as_str())
                .taxonomy(kind.as_str()),
        )?;
    }
    register(
        manager,
        user_schema()?,
        EntityConfig::new("user", "user").meta(MetaBinding::SideStore("user".to_string())),
    )?;
    register(
        manager,
        comment_schema()?,
        EntityConfig::new("comment", "comment")
            .meta(MetaBinding::SideStore("comment".to_string())),
    )?;
    register(
        manager,
        site_schema()?,
        EntityConfig::new("site", "site").meta(MetaBinding::SideStore("blog".to_string())),
    )?;
    register(
        manager,
        order_schema()?,
        EntityConfig::new("order", "order").meta(MetaBinding::Record),
    )?;
    manager.register_repository(order_item_repository(manager, None)?);
    for &(name, item_type) in ORDER_ITEM_TYPES {
        manager.register_builder(name, move |manager| {
            let repository: Box<dyn Repository> =
                Box::new(order_item_repository(manager, Some((name, item_type)))?);
            Ok(repository)
        });
    }
    register(
        manager,
        product_schema()?,
        EntityConfig::new("product", "product").meta(MetaBinding::Record),
    )?;
    tracing::debug!(models = manager.registered_models().len(), "catalog registered");
    Ok(())
}
