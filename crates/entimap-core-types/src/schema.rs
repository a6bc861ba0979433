//! Canonical field keys and event names for structured logging.

// Operation envelope
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Mapping context
pub const FIELD_MODEL: &str = "model";
pub const FIELD_FIELD: &str = "field";
pub const FIELD_REPOSITORY: &str = "repository";
pub const FIELD_FAMILY: &str = "family";
pub const FIELD_TABLE: &str = "table";
pub const FIELD_SCHEMA_VERSION: &str = "schema_version";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
