//! Posts and pages.

use super::{CATEGORY, PAGE, POST_TAG, USER};
use crate::errors::Result;
use crate::model::Model;
use crate::schema::{FieldDescriptor, FieldType, ModelKind, ModelSchema};
use crate::source::Relation;
use crate::value::Value;

/// Option listing the ids of sticky posts.
pub const STICKY_OPTION: &str = "sticky_posts";

/// Lowercase, ASCII alphanumerics and single dashes.
pub fn sanitize_slug(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn set_slug(_model: &mut Model, value: Value) -> Result<Value> {
    Ok(Value::String(sanitize_slug(&value.to_text())))
}

fn permalink(model: &mut Model) -> Result<Value> {
    let id = model.get("id")?;
    if id.is_empty() {
        return Ok(Value::Null);
    }
    let base = if model.kind() == PAGE { "page_id" } else { "p" };
    Ok(Value::String(format!("/?{base}={id}")))
}

// A new parent id invalidates the resolved parent chain.
fn parent_changed(model: &mut Model) -> Result<()> {
    model.unset("parent");
    model.unset("top_level_parent");
    Ok(())
}

fn sticky_ids(model: &Model) -> Vec<Value> {
    model
        .manager()
        .host()
        .options()
        .get_option(STICKY_OPTION)
        .and_then(|raw| Value::parse_json(&raw))
        .and_then(|ids| ids.as_array().map(<[Value]>::to_vec))
        .unwrap_or_default()
}

fn is_sticky(model: &mut Model) -> Result<Value> {
    let id = model.get("id")?;
    Ok(Value::Bool(
        !id.is_empty() && sticky_ids(model).iter().any(|s| s.loose_eq(&id)),
    ))
}

fn persist_sticky(model: &mut Model, value: Value) -> Result<()> {
    let id = model.get("id")?;
    let mut ids: Vec<Value> = sticky_ids(model)
        .into_iter()
        .filter(|s| !s.loose_eq(&id))
        .collect();
    if value.as_bool().unwrap_or(false) {
        ids.push(id);
    }
    let encoded = Value::Array(ids).to_json().to_string();
    model
        .manager()
        .host()
        .options()
        .update_option(STICKY_OPTION, &encoded);
    Ok(())
}

/// Schema shared by posts and pages. Parent relations point at the same kind.
///
/// # Errors
///
/// Never for the declarations below; the builder validates them.
pub fn content_schema(kind: ModelKind) -> Result<ModelSchema> {
    let mut builder = ModelSchema::builder(kind)
        .field(FieldDescriptor::new("id", FieldType::Int).object("ID"))
        .field(FieldDescriptor::new("title", FieldType::String).object("post_title"))
        .field(
            FieldDescriptor::new("slug", FieldType::String)
                .object("post_name")
                .on_set(set_slug),
        )
        .field(FieldDescriptor::new("content", FieldType::String).object("post_content"))
        .field(FieldDescriptor::new("excerpt", FieldType::String).object("post_excerpt"))
        .field(
            FieldDescriptor::new("status", FieldType::String)
                .object("post_status")
                .default("draft"),
        )
        .field(FieldDescriptor::new("post_type", FieldType::String).object("post_type"))
        .field(
            FieldDescriptor::new("date", FieldType::String)
                .object("post_date")
                .readonly(),
        )
        .field(FieldDescriptor::new("author_id", FieldType::Int).object("post_author"))
        .field(
            FieldDescriptor::new("author", FieldType::Model(USER))
                .nullable()
                .relation(Relation::ManyToOne {
                    target: USER,
                    foreign_key: "author_id".to_string(),
                }),
        )
        .field(
            FieldDescriptor::new("parent_id", FieldType::Int)
                .object("post_parent")
                .after_set(parent_changed),
        )
        .field(
            FieldDescriptor::new("parent", FieldType::Model(kind))
                .nullable()
                .relation(Relation::ManyToOne {
                    target: kind,
                    foreign_key: "parent_id".to_string(),
                }),
        )
        .field(
            FieldDescriptor::new("top_level_parent", FieldType::Model(kind))
                .nullable()
                .relation(Relation::TopLevelParent {
                    parent_key: "parent_id".to_string(),
                }),
        )
        .field(
            FieldDescriptor::new("children", FieldType::Array).relation(Relation::Children {
                target: None,
                parent_key: "parent_id".to_string(),
            }),
        )
        .field(FieldDescriptor::new("permalink", FieldType::String).computed(permalink))
        .field(FieldDescriptor::new("featured_image_id", FieldType::Int).meta("_thumbnail_id"))
        .field(
            FieldDescriptor::new("sticky", FieldType::Bool)
                .computed(is_sticky)
                .on_persist(persist_sticky),
        );
    if kind != PAGE {
        builder = builder
            .field(
                FieldDescriptor::new("categories", FieldType::Array)
                    .relation(Relation::Terms { target: CATEGORY }),
            )
            .field(
                FieldDescriptor::new("tags", FieldType::Array)
                    .relation(Relation::Terms { target: POST_TAG }),
            );
    }
    builder.build()
}
