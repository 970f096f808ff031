//! recmap - schema-driven record persistence
//!
//! Maps schema-described records onto a relational table store or a
//! key-value hash store without per-type code. One full binary encode per
//! write is re-partitioned into per-field values; per-type command templates
//! are built once and shared.
//!
//! # Quick Start
//!
//! ```ignore
//! use recmap::{CallContext, RecordStore, StoreConfig};
//!
//! let store = RecordStore::open(&StoreConfig::default())?;
//! let ctx = CallContext::background();
//! store.insert(&ctx, &account)?;
//! store.increase(&ctx, &account, &["coins"])?;
//! store.get(&ctx, &mut account, &[])?;
//! ```
//!
//! # Architecture
//!
//! All operations go through [`RecordStore`], which delegates to the
//! configured [`RecordBackend`]. The adapters live in `recmap-sql` and
//! `recmap-hash`; the partial codec and metadata cache in `recmap-mapping`.

// Re-export the public API from recmap-api
pub use recmap_api::*;
