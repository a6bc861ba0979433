#![allow(clippy::unwrap_used, clippy::expect_used)]

use entimap_core::errors::{EntimapError, ExError, ExErrorKind};
use entimap_core::schema::ColumnDescriptor;

#[test]
fn test_read_only_violation_carries_model_and_field() {
    let err = EntimapError::ReadOnlyViolation {
        model: "post".to_string(),
        field: "date".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::ReadOnlyViolation);
    assert_eq!(ex_err.code(), "ERR_READ_ONLY_VIOLATION");
    assert_eq!(ex_err.model(), Some("post"));
    assert_eq!(ex_err.field(), Some("date"));
    assert!(ex_err.message().contains("read-only"));
}

#[test]
fn test_unregistered_repository_is_its_own_kind() {
    let err = EntimapError::RepositoryNotRegistered {
        model: "invoice".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::RepositoryNotRegistered);
    assert_eq!(ex_err.code(), "ERR_REPOSITORY_NOT_REGISTERED");
    assert_eq!(ex_err.model(), Some("invoice"));
    assert!(ex_err.message().contains("invoice"));
}

#[test]
fn test_persist_failure_keeps_host_detail() {
    let err = EntimapError::CouldNotPersist {
        model: "order".to_string(),
        detail: "db_insert_error: disk full".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::CouldNotPersist);
    assert_eq!(ex_err.op(), Some("save"));
    assert!(ex_err.message().contains("disk full"));
}

#[test]
fn test_both_primary_key_errors_share_a_kind() {
    let count: ExError = EntimapError::PrimaryKey {
        model: "ledger".to_string(),
        found: 2,
    }
    .into();
    let missing: ExError = EntimapError::MissingPrimaryKey {
        model: "ledger".to_string(),
        column: "id".to_string(),
    }
    .into();

    assert_eq!(count.kind(), ExErrorKind::PrimaryKey);
    assert_eq!(missing.kind(), ExErrorKind::PrimaryKey);
    assert_eq!(missing.field(), Some("id"));
    assert!(count.message().contains("found 2"));
}

#[test]
fn test_sql_errors_map_to_sql_kind() {
    let ex_err: ExError = EntimapError::sql("BETWEEN needs exactly two values").into();
    assert_eq!(ex_err.kind(), ExErrorKind::Sql);
    assert_eq!(ex_err.code(), "ERR_SQL");
}

#[test]
fn test_host_failure_is_external() {
    let ex_err: ExError = EntimapError::HostFailure {
        operation: "post.query".to_string(),
        detail: "timeout".to_string(),
    }
    .into();
    assert_eq!(ex_err.kind(), ExErrorKind::ExternalService);
    assert_eq!(ex_err.op(), Some("post.query"));
}

#[test]
fn test_not_implemented_names_the_method() {
    let ex_err: ExError = EntimapError::not_implemented("user", "assign_terms").into();
    assert_eq!(ex_err.kind(), ExErrorKind::NotImplemented);
    assert_eq!(ex_err.op(), Some("assign_terms"));
    assert_eq!(ex_err.model(), Some("user"));
}

#[test]
fn test_json_errors_become_serialization_errors() {
    let err = ColumnDescriptor::from_json("{oops").unwrap_err();
    assert!(matches!(err, EntimapError::Serialization { .. }));
    let ex_err: ExError = err.into();
    assert_eq!(ex_err.code(), "ERR_SERIALIZATION");
}

#[test]
fn test_source_chain_is_exposed() {
    let cause = ExError::new(ExErrorKind::ExternalService).with_message("socket closed");
    let err = ExError::new(ExErrorKind::CouldNotPersist)
        .with_model("post")
        .with_source(cause);

    let source = err.source_error().unwrap();
    assert_eq!(source.kind(), ExErrorKind::ExternalService);
    assert!(std::error::Error::source(&err).is_some());
}
