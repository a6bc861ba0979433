//! Store entities. Their state sits behind accessor methods and their meta
//! inside the record.

use super::content::sanitize_slug;
use super::{ORDER, ORDER_ITEM, PRODUCT, PRODUCT_CAT, USER};
use crate::errors::Result;
use crate::manager::Manager;
use crate::model::Model;
use crate::repository::{EntityConfig, EntityRepository, MetaBinding};
use crate::schema::{FieldDescriptor, FieldType, ModelSchema};
use crate::source::Relation;
use crate::value::Value;

fn set_slug(_model: &mut Model, value: Value) -> Result<Value> {
    Ok(Value::String(sanitize_slug(&value.to_text())))
}

fn many_to_one(name: &str, target: crate::schema::ModelKind, key: &str) -> FieldDescriptor {
    FieldDescriptor::new(name, FieldType::Model(target))
        .nullable()
        .relation(Relation::ManyToOne {
            target,
            foreign_key: key.to_string(),
        })
}

/// # Errors
///
/// Never for the declarations below; the builder validates them.
pub fn order_schema() -> Result<ModelSchema> {
    ModelSchema::builder(ORDER)
        .field(FieldDescriptor::new("id", FieldType::Int).accessor("id"))
        .field(
            FieldDescriptor::new("status", FieldType::String)
                .accessor("status")
                .default("pending"),
        )
        .field(
            FieldDescriptor::new("currency", FieldType::String)
                .accessor("currency")
                .default("USD"),
        )
        .field(FieldDescriptor::new("total", FieldType::Float).accessor("total"))
        .field(FieldDescriptor::new("customer_id", FieldType::Int).accessor("customer_id"))
        .field(many_to_one("customer", USER, "customer_id"))
        .field(
            FieldDescriptor::new("date_created", FieldType::String)
                .accessor("date_created")
                .readonly(),
        )
        .field(FieldDescriptor::new("customer_note", FieldType::String).meta("_customer_note"))
        .field(
            FieldDescriptor::new("items", FieldType::Array).relation(Relation::Children {
                target: Some(ORDER_ITEM),
                parent_key: "order_id".to_string(),
            }),
        )
        .build()
}

/// # Errors
///
/// Never for the declarations below; the builder validates them.
pub fn order_item_schema() -> Result<ModelSchema> {
    ModelSchema::builder(ORDER_ITEM)
        .field(FieldDescriptor::new("id", FieldType::Int).accessor("id"))
        .field(FieldDescriptor::new("order_id", FieldType::Int).accessor("order_id"))
        .field(many_to_one("order", ORDER, "order_id"))
        .field(FieldDescriptor::new("name", FieldType::String).accessor("name"))
        .field(
            FieldDescriptor::new("item_type", FieldType::String)
                .accessor("type")
                .default("line_item"),
        )
        .field(
            FieldDescriptor::new("quantity", FieldType::Int)
                .accessor("quantity")
                .default(1),
        )
        .field(FieldDescriptor::new("total", FieldType::Float).accessor("total"))
        .field(FieldDescriptor::new("product_id", FieldType::Int).accessor("product_id"))
        .field(many_to_one("product", PRODUCT, "product_id"))
        .build()
}

/// Repository for order items, optionally restricted to one subtype given
/// as `(repository name, item type)`.
///
/// # Errors
///
/// `HostFailure` when the host has no order item store.
pub fn order_item_repository(
    manager: &Manager,
    subtype: Option<(&str, &str)>,
) -> Result<EntityRepository> {
    let config = match subtype {
        Some((name, item_type)) => {
            EntityConfig::new(name, "order_item").scoped("type", "item_type", item_type)
        }
        None => EntityConfig::new(ORDER_ITEM.as_str(), "order_item"),
    };
    EntityRepository::new(
        order_item_schema()?,
        config.meta(MetaBinding::Record),
        manager.host(),
    )
}

/// # Errors
///
/// Never for the declarations below; the builder validates them.
pub fn product_schema() -> Result<ModelSchema> {
    ModelSchema::builder(PRODUCT)
        .field(FieldDescriptor::new("id", FieldType::Int).accessor("id"))
        .field(FieldDescriptor::new("name", FieldType::String).accessor("name"))
        .field(
            FieldDescriptor::new("slug", FieldType::String)
                .accessor("slug")
                .on_set(set_slug),
        )
        .field(FieldDescriptor::new("sku", FieldType::String).accessor("sku"))
        .field(FieldDescriptor::new("description", FieldType::String).accessor("description"))
        .field(FieldDescriptor::new("price", FieldType::Float).accessor("price"))
        .field(FieldDescriptor::new("regular_price", FieldType::Float).accessor("regular_price"))
        .field(
            FieldDescriptor::new("status", FieldType::String)
                .accessor("status")
                .default("publish"),
        )
        .field(
            FieldDescriptor::new("stock_quantity", FieldType::Int)
                .accessor("stock_quantity")
                .nullable(),
        )
        .field(
            FieldDescriptor::new("categories", FieldType::Array)
                .relation(Relation::Terms { target: PRODUCT_CAT }),
        )
        .build()
}
