//! Backend-agnostic CRUD facade
//!
//! Every facade call is exactly one backend call, except
//! [`RecordStore::delete`] with [`DeleteMode::ReturnPrior`], which reads the
//! record before removing it.

use crate::config::{BackendKind, ConfigError, HashClientKind, StoreConfig};
use recmap_core::{CallContext, Record, RecordBackend, Result};
use recmap_hash::{HashStore, MemoryHashClient};
use recmap_sql::{SqlStore, SqliteExecutor};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// What [`RecordStore::delete`] does with the record being removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Remove without reading
    #[default]
    Discard,
    /// Read the stored record into the caller's record first, best effort
    ReturnPrior,
}

/// Single-record CRUD keyed by primary key, over either adapter
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn RecordBackend>,
}

impl RecordStore {
    /// Facade over `backend`
    pub fn new(backend: impl RecordBackend + 'static) -> Self {
        Self::from_backend(Arc::new(backend))
    }

    /// Facade over a shared backend
    pub fn from_backend(backend: Arc<dyn RecordBackend>) -> Self {
        RecordStore { backend }
    }

    /// Open the store a configuration describes
    ///
    /// # Errors
    ///
    /// Invalid settings, the Redis client in a build without the `redis`
    /// feature, and connection failures.
    pub fn open(config: &StoreConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let store = match config.backend_kind()? {
            BackendKind::Sql => {
                let executor = if config.sql.is_in_memory() {
                    SqliteExecutor::open_in_memory()?
                } else {
                    SqliteExecutor::open(&config.sql.datasource)?
                };
                Self::new(SqlStore::new(executor).create_tables(config.sql.create_tables))
            }
            BackendKind::Hash => match config.hash.client_kind()? {
                HashClientKind::Memory => Self::new(HashStore::new(MemoryHashClient::new())),
                HashClientKind::Redis => Self::new(HashStore::new(redis_client(config)?)),
            },
        };
        info!(
            target: "recmap::api",
            backend = store.backend_name(),
            "opened record store"
        );
        Ok(store)
    }

    /// Load a config file and open the store it describes
    pub fn open_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        Self::open(&StoreConfig::from_file(path)?)
    }

    /// Name of the active backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// The active backend
    pub fn backend(&self) -> &Arc<dyn RecordBackend> {
        &self.backend
    }

    /// Fill `record` from the stored record with the same key
    ///
    /// An empty `fields` reads every field.
    pub fn get(&self, ctx: &CallContext, record: &mut dyn Record, fields: &[&str]) -> Result<()> {
        self.backend.get(ctx, record, fields)
    }

    /// Not supported by either adapter
    pub fn batch_get(&self, ctx: &CallContext, records: &mut [&mut dyn Record]) -> Result<()> {
        self.backend.batch_get(ctx, records)
    }

    /// Store a new record; an existing key is a conflict
    pub fn insert(&self, ctx: &CallContext, record: &dyn Record) -> Result<()> {
        self.backend.insert(ctx, record)
    }

    /// Overwrite fields of an existing record
    ///
    /// An empty `fields` writes every field.
    pub fn update(&self, ctx: &CallContext, record: &dyn Record, fields: &[&str]) -> Result<()> {
        self.backend.update(ctx, record, fields)
    }

    /// Store the record whether or not the key exists
    pub fn replace(&self, ctx: &CallContext, record: &dyn Record) -> Result<()> {
        self.backend.replace(ctx, record)
    }

    /// Remove the record with `record`'s key
    ///
    /// Returns whether the prior record was read into `record`, which only
    /// [`DeleteMode::ReturnPrior`] attempts. A failed read is logged and the
    /// delete still runs.
    pub fn delete(&self, ctx: &CallContext, record: &mut dyn Record, mode: DeleteMode) -> Result<bool> {
        let mut loaded = false;
        if mode == DeleteMode::ReturnPrior {
            match self.backend.get(ctx, record, &[]) {
                Ok(()) => loaded = true,
                Err(e) => warn!(
                    target: "recmap::api",
                    record = record.schema().full_name(),
                    error = %e,
                    "pre-delete read failed"
                ),
            }
        }
        self.backend.delete(ctx, record)?;
        Ok(loaded)
    }

    /// Add 1 to each named integer field
    pub fn increase(&self, ctx: &CallContext, record: &dyn Record, fields: &[&str]) -> Result<()> {
        self.backend.increase(ctx, record, fields)
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

#[cfg(feature = "redis")]
fn redis_client(config: &StoreConfig) -> std::result::Result<recmap_hash::RedisHashClient, ConfigError> {
    let options = recmap_hash::RedisOptions {
        addr: config.hash.addr.clone(),
        password: config.hash.password.clone(),
        conn_timeout: config.hash.conn_timeout(),
        pool_size: config.hash.pool_size,
    };
    Ok(recmap_hash::RedisHashClient::connect(&options)?)
}

#[cfg(not(feature = "redis"))]
fn redis_client(_config: &StoreConfig) -> std::result::Result<MemoryHashClient, ConfigError> {
    Err(ConfigError::Unsupported(
        "the redis hash client needs the \"redis\" feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use recmap_core::testing::{account, account_key};

    fn ctx() -> CallContext {
        CallContext::background()
    }

    #[test]
    fn test_open_default_is_sql() {
        let store = RecordStore::open(&StoreConfig::default()).unwrap();
        assert_eq!(store.backend_name(), "sql");
        store.insert(&ctx(), &account(1, "a", 1)).unwrap();
    }

    #[test]
    fn test_open_hash_memory() {
        let config = StoreConfig::from_str("backend = \"hash\"").unwrap();
        let store = RecordStore::open(&config).unwrap();
        assert_eq!(store.backend_name(), "hash");
    }

    #[test]
    fn test_open_file_rejects_unknown_sql_setting() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(crate::CONFIG_FILE_NAME);
        std::fs::write(&path, "[sql]\ndialect = \"mysql\"\n").unwrap();
        assert!(matches!(
            RecordStore::open_file(&path).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[cfg(not(feature = "redis"))]
    #[test]
    fn test_open_redis_without_feature() {
        let config = StoreConfig::from_str("backend = \"hash\"\n[hash]\nclient = \"redis\"").unwrap();
        assert!(matches!(
            RecordStore::open(&config).unwrap_err(),
            ConfigError::Unsupported(_)
        ));
    }

    #[test]
    fn test_delete_discard_does_not_read() {
        let store = RecordStore::open(&StoreConfig::default()).unwrap();
        store.insert(&ctx(), &account(2, "b", 5)).unwrap();
        let mut rec = account_key(2);
        assert!(!store.delete(&ctx(), &mut rec, DeleteMode::Discard).unwrap());
        assert!(!rec.is_set("name"));
    }

    #[test]
    fn test_delete_return_prior_tolerates_missing() {
        let store = RecordStore::open(&StoreConfig::default()).unwrap();
        let mut rec = account_key(3);
        assert!(!store.delete(&ctx(), &mut rec, DeleteMode::ReturnPrior).unwrap());
    }
}
