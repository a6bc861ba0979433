//! Terms of a taxonomy: categories, tags, product categories.

use super::{POST, PRODUCT, PRODUCT_CAT};
use crate::errors::Result;
use crate::schema::{FieldDescriptor, FieldType, ModelKind, ModelSchema};
use crate::source::Relation;

/// Product categories list `products`; every other taxonomy lists `posts`.
///
/// # Errors
///
/// Never for the declarations below; the builder validates them.
pub fn term_schema(kind: ModelKind) -> Result<ModelSchema> {
    let (objects, target) = if kind == PRODUCT_CAT {
        ("products", PRODUCT)
    } else {
        ("posts", POST)
    };
    ModelSchema::builder(kind)
        .field(FieldDescriptor::new("id", FieldType::Int).object("term_id"))
        .field(FieldDescriptor::new("name", FieldType::String).object("name"))
        .field(FieldDescriptor::new("slug", FieldType::String).object("slug"))
        .field(FieldDescriptor::new("taxonomy", FieldType::String).object("taxonomy"))
        .field(FieldDescriptor::new("description", FieldType::String).object("description"))
        .field(FieldDescriptor::new("parent_id", FieldType::Int).object("parent"))
        .field(FieldDescriptor::new("parent", FieldType::Model(kind)).nullable())
        .field(FieldDescriptor::new("children", FieldType::Array))
        .field(FieldDescriptor::new(objects, FieldType::Array))
        .field(
            FieldDescriptor::new("count", FieldType::Int)
                .object("count")
                .readonly(),
        )
        .relation(
            "parent",
            Relation::ManyToOne {
                target: kind,
                foreign_key: "parent_id".to_string(),
            },
        )
        .relation(
            "children",
            Relation::Children {
                target: None,
                parent_key: "parent_id".to_string(),
            },
        )
        .relation(objects, Relation::TermObjects { target })
        .build()
}
