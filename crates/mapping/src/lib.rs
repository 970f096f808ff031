//! Schema-driven field mapping shared by every recmap store
//!
//! - classify: primary key, blob and increment field sets per record type
//! - filter: normalization of requested field names
//! - partial: record <-> field-value map over a single encode
//! - cache: lazily built per-type metadata, one build per type

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod classify;
pub mod filter;
pub mod partial;

pub use cache::MetadataCache;
pub use classify::{classify, is_blob_field, FieldSets};
pub use filter::field_filter;
pub use partial::{from_field_map, to_field_map, FieldValue, FieldValueMap};
