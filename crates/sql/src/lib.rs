//! Relational store adapter for recmap
//!
//! Records map onto one table per type: the short type name is the table,
//! every field is a column, and the primary key option is the table's
//! PRIMARY KEY. Scalar columns hold scalar strings bound as text; blob
//! columns hold encoded wire entries.
//!
//! - command: parameterized statements
//! - meta: per-type statement templates
//! - ddl: CREATE / DROP / existence statements per dialect
//! - executor: the store seam, with a SQLite implementation in `sqlite`
//! - store: `SqlStore`, the `RecordBackend` implementation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod ddl;
pub mod executor;
pub mod meta;
pub mod sqlite;
pub mod store;

pub use command::{SqlCommand, SqlParam};
pub use ddl::{SqlDialect, TableInfo};
pub use executor::{SqlCell, SqlExecutor, SqlRow};
pub use meta::SqlMeta;
pub use sqlite::SqliteExecutor;
pub use store::SqlStore;
