//! Network sites.

use super::SITE;
use crate::errors::Result;
use crate::schema::{FieldDescriptor, FieldType, ModelSchema};

/// # Errors
///
/// Never for the declarations below; the builder validates them.
pub fn site_schema() -> Result<ModelSchema> {
    ModelSchema::builder(SITE)
        .field(FieldDescriptor::new("id", FieldType::Int).object("blog_id"))
        .field(FieldDescriptor::new("network_id", FieldType::Int).object("site_id"))
        .field(FieldDescriptor::new("domain", FieldType::String).object("domain"))
        .field(FieldDescriptor::new("path", FieldType::String).object("path").default("/"))
        .field(FieldDescriptor::new("public", FieldType::Bool).object("public").default(true))
        .field(
            FieldDescriptor::new("registered", FieldType::String)
                .object("registered")
                .readonly(),
        )
        .field(FieldDescriptor::new("name", FieldType::String).meta("blogname"))
        .build()
}
