//! Comments on content.

use super::{COMMENT, POST, USER};
use crate::errors::Result;
use crate::schema::{FieldDescriptor, FieldType, ModelSchema};
use crate::source::Relation;

/// # Errors
///
/// Never for the declarations below; the builder validates them.
pub fn comment_schema() -> Result<ModelSchema> {
    ModelSchema::builder(COMMENT)
        .field(FieldDescriptor::new("id", FieldType::Int).object("comment_ID"))
        .field(FieldDescriptor::new("post_id", FieldType::Int).object("comment_post_ID"))
        .field(
            FieldDescriptor::new("post", FieldType::Model(POST))
                .nullable()
                .relation(Relation::ManyToOne {
                    target: POST,
                    foreign_key: "post_id".to_string(),
                }),
        )
        .field(FieldDescriptor::new("author", FieldType::String).object("comment_author"))
        .field(
            FieldDescriptor::new("author_email", FieldType::String)
                .object("comment_author_email"),
        )
        .field(FieldDescriptor::new("content", FieldType::String).object("comment_content"))
        .field(
            FieldDescriptor::new("date", FieldType::String)
                .object("comment_date")
                .readonly(),
        )
        .field(
            FieldDescriptor::new("approved", FieldType::String)
                .object("comment_approved")
                .default("0"),
        )
        .field(FieldDescriptor::new("parent_id", FieldType::Int).object("comment_parent"))
        .field(
            FieldDescriptor::new("parent", FieldType::Model(COMMENT))
                .nullable()
                .relation(Relation::ManyToOne {
                    target: COMMENT,
                    foreign_key: "parent_id".to_string(),
                }),
        )
        .field(FieldDescriptor::new("user_id", FieldType::Int).object("user_id"))
        .field(
            FieldDescriptor::new("user", FieldType::Model(USER))
                .nullable()
                .relation(Relation::ManyToOne {
                    target: USER,
                    foreign_key: "user_id".to_string(),
                }),
        )
        .field(FieldDescriptor::new("rating", FieldType::Int).meta("rating"))
        .build()
}
