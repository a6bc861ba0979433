//! Operation boundary macros.
//!
//! Repository and table operations log a start event and then exactly one
//! end or error event. Every event carries `component`, `op` and `event`;
//! the closing event adds `duration_ms`. Error events also carry the model
//! and field taken from the classified error, when it names them. Callers
//! usually add `repository` or `table` fields.

/// Log the start of an operation
///
/// ```
/// # use entimap_core::log_op_start;
/// log_op_start!("repository_save");
/// log_op_start!("repository_save", repository = "post");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = entimap_core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = entimap_core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// ```
/// # use entimap_core::log_op_end;
/// log_op_end!("table_migrate", duration_ms = 3, table = "wp_tickets");
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = entimap_core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = entimap_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log a failed operation, classifying `err` through [`crate::errors::ExError`]
///
/// `err_model` and `err_field` are recorded only when the error names them.
///
/// ```
/// # use entimap_core::{log_op_error, errors::EntimapError};
/// let err = EntimapError::ReadOnlyViolation {
///     model: "post".to_string(),
///     field: "date".to_string(),
/// };
/// log_op_error!("repository_save", err, duration_ms = 10, repository = "post");
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = entimap_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            err_model = ex_err.model(),
            err_field = ex_err.field(),
            error = %ex_err,
            $($($field)*)?
        );
    }};
}

/// Run `$body`, a `Result<_, EntimapError>` expression, as operation `$op`
///
/// Logs the start, then the end or the error with the elapsed time, and
/// evaluates to the result unchanged. Extra fields go on every event.
///
/// ```
/// # use entimap_core::{log_op, errors::Result};
/// let deleted: Result<bool> = log_op!("repository_delete", Ok(true), repository = "post");
/// assert!(deleted.unwrap());
/// ```
#[macro_export]
macro_rules! log_op {
    ($op:expr, $body:expr $(, $($field:tt)*)?) => {{
        $crate::log_op_start!($op $(, $($field)*)?);
        let started = ::std::time::Instant::now();
        let result: ::std::result::Result<_, $crate::errors::EntimapError> = $body;
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                $crate::log_op_end!($op, duration_ms = duration_ms $(, $($field)*)?);
            }
            Err(err) => {
                $crate::log_op_error!($op, err.clone(), duration_ms = duration_ms $(, $($field)*)?);
            }
        }
        result
    }};
}
