//! Site users.

use super::USER;
use crate::errors::Result;
use crate::model::Model;
use crate::schema::{FieldDescriptor, FieldType, ModelSchema};
use crate::value::Value;

fn full_name(model: &mut Model) -> Result<Value> {
    let first = model.get("first_name")?.to_text();
    let last = model.get("last_name")?.to_text();
    let joined = format!("{first} {last}");
    Ok(Value::String(joined.trim().to_string()))
}

/// # Errors
///
/// Never for the declarations below; the builder validates them.
pub fn user_schema() -> Result<ModelSchema> {
    ModelSchema::builder(USER)
        .field(FieldDescriptor::new("id", FieldType::Int).object("ID"))
        .field(FieldDescriptor::new("login", FieldType::String).object("user_login"))
        .field(FieldDescriptor::new("slug", FieldType::String).object("user_nicename"))
        .field(FieldDescriptor::new("email", FieldType::String).object("user_email"))
        .field(FieldDescriptor::new("url", FieldType::String).object("user_url"))
        .field(FieldDescriptor::new("display_name", FieldType::String).object("display_name"))
        .field(
            FieldDescriptor::new("registered", FieldType::String)
                .object("user_registered")
                .readonly(),
        )
        .field(FieldDescriptor::new("first_name", FieldType::String).meta("first_name"))
        .field(FieldDescriptor::new("last_name", FieldType::String).meta("last_name"))
        .field(FieldDescriptor::new("description", FieldType::String).meta("description"))
        .field(FieldDescriptor::new("full_name", FieldType::String).computed(full_name))
        .build()
}
