//! Core types and traits for recmap
//!
//! This crate defines the foundational types shared by every backend:
//! - Schema: ordered field descriptors plus record-level options
//! - Value: unified value enum for every field kind
//! - Record: the reflection seam (`DynamicRecord` is the table-driven impl)
//! - Scalar codec: field value <-> string, keyed by field kind
//! - Wire codec: single-pass binary encode, entry walk and merge-decode
//! - CallContext: caller deadline / cancellation, passed through untouched
//! - RecordBackend: the CRUD contract every store adapter implements
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod record;
pub mod scalar;
pub mod schema;
pub mod traits;
pub mod value;
pub mod wire;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use context::CallContext;
pub use error::{ConflictKind, Error, Result};
pub use record::{DynamicRecord, Record};
pub use scalar::{default_scalar_string, format_scalar, parse_scalar};
pub use schema::{
    Cardinality, FieldDescriptor, FieldKind, Schema, SchemaBuilder, SchemaError,
    PRIMARY_KEY_OPTION,
};
pub use traits::RecordBackend;
pub use value::Value;
pub use wire::{WireEntry, WireError, WireType};
