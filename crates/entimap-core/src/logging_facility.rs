//! Structured logging facility
//!
//! - Single initialization point via `init(profile)`
//! - Operation boundary macros (`log_op!` and the `log_op_start!`, `log_op_end!`, `log_op_error!` events it emits)
//! - Test capture mode for deterministic assertions
//!
//! Only operation boundaries (save, delete, migrate) log at `info`/`error`.
//! Field resolution, SQL compilation and host calls log at `debug`/`trace`.
//!
//! ```rust
//! use entimap_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
