//! Core traits for store abstraction
//!
//! This module defines the [`RecordBackend`] trait that lets the CRUD facade
//! swap the relational store for the key-value store without changing its
//! callers.
//!
//! Thread safety: all methods must be safe to call concurrently from
//! multiple threads (requires Send + Sync). Backends hold no per-call state.

use crate::context::CallContext;
use crate::error::Result;
use crate::record::Record;

/// One store the CRUD facade can dispatch to
pub trait RecordBackend: Send + Sync {
    /// Short backend name for logs ("sql", "hash")
    fn backend_name(&self) -> &'static str;

    /// Fill `record` from the row or hash addressed by its primary key
    ///
    /// An empty `fields` list reads every column. Names may be dotted
    /// (`"item.slot"`); only the top-level segment is used.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when nothing is stored under the key, and
    /// `Validation` when every requested name is unknown.
    fn get(&self, ctx: &CallContext, record: &mut dyn Record, fields: &[&str]) -> Result<()>;

    /// Fill many records in one round trip
    ///
    /// # Errors
    ///
    /// Neither bundled backend supports this and both return
    /// `NotImplemented`.
    fn batch_get(&self, ctx: &CallContext, records: &mut [&mut dyn Record]) -> Result<()>;

    /// Store a new record
    ///
    /// # Errors
    ///
    /// Returns `Conflict(AlreadyExists)` when the key is taken.
    fn insert(&self, ctx: &CallContext, record: &dyn Record) -> Result<()>;

    /// Overwrite columns of an existing record
    ///
    /// An empty `fields` list writes every column.
    ///
    /// # Errors
    ///
    /// Returns `AffectedZero` (relational) or `Conflict(NotExist)` (key-value)
    /// when no record is stored under the key.
    fn update(&self, ctx: &CallContext, record: &dyn Record, fields: &[&str]) -> Result<()>;

    /// Store a record whether or not it exists
    ///
    /// # Errors
    ///
    /// Returns an error if the store call fails.
    fn replace(&self, ctx: &CallContext, record: &dyn Record) -> Result<()>;

    /// Remove the record addressed by the primary key
    ///
    /// Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the store call fails.
    fn delete(&self, ctx: &CallContext, record: &dyn Record) -> Result<()>;

    /// Add one to each named integer column
    ///
    /// # Errors
    ///
    /// Returns `Validation` before touching the store when `fields` is
    /// empty or names a column that cannot be incremented.
    fn increase(&self, ctx: &CallContext, record: &dyn Record, fields: &[&str]) -> Result<()>;
}
