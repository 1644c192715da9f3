//! Snowflake identifiers, fixed-layout binary record helpers, and the
//! declarative JSON field-descriptor runtime shared by the gateway and
//! REST crates.
//!
//! This crate carries no networking or concurrency of its own — it is the
//! leaf data-shape layer the rest of the workspace builds on.

mod binary;
mod descriptor;
mod snowflake;

pub use binary::{BinaryError, ByteOrder, FieldSpec, FieldWidth, RecordLayout, read_uint};
pub use descriptor::{Described, FieldDescriptor};
pub use snowflake::{
    SNOWFLAKE_MAXIMUM_BIT_LENGTH, SNOWFLAKE_MINIMUM_BIT_LENGTH, Snowflake,
};

/// Errors produced by this crate's constructors and descriptor runtime.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum ModelError {
    /// A domain invariant was violated, e.g. a snowflake outside its
    /// valid bit-length range.
    #[error("{0}")]
    BadValue(String),
}
