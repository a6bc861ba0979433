//! Types shared by the entimap crates.
//!
//! Holds the canonical field keys and event names used for structured
//! logging, so the model engine and the SQL store report operations with
//! the same vocabulary.

pub mod schema;
