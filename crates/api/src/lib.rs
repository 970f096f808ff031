//! Public API layer for recmap
//!
//! [`RecordStore`] offers get / insert / update / replace / delete / increase
//! of single records by primary key, over either adapter:
//!
//! - **sql**: one table per record type, atomicity from affected-row checks
//! - **hash**: one hash per record, atomicity from conditional scripts
//!
//! Both give the same caller-visible semantics except for the error an
//! update of a missing record reports (`AffectedZero` vs `Conflict(NotExist)`).
//!
//! ## Quick Start
//!
//! ```ignore
//! use recmap_api::{CallContext, RecordStore, StoreConfig};
//!
//! let store = RecordStore::open(&StoreConfig::from_file("recmap.toml".as_ref())?)?;
//! store.insert(&CallContext::background(), &account)?;
//! store.increase(&CallContext::background(), &account, &["coins"])?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod store;

pub use config::{
    BackendKind, ConfigError, HashClientKind, HashConfig, SqlConfig, StoreConfig, CONFIG_FILE_NAME,
};
pub use store::{DeleteMode, RecordStore};

// Re-export the types callers need alongside the facade
pub use recmap_core::{
    CallContext, ConflictKind, DynamicRecord, Error, FieldKind, Record, RecordBackend, Result,
    Schema, SchemaBuilder, Value,
};
pub use recmap_hash::{HashClient, HashStore, MemoryHashClient};
#[cfg(feature = "redis")]
pub use recmap_hash::{RedisHashClient, RedisOptions};
pub use recmap_mapping::MetadataCache;
pub use recmap_sql::{SqlDialect, SqlExecutor, SqlStore, SqliteExecutor};
