//! Relational [`RecordBackend`]

use crate::command::SqlCommand;
use crate::executor::SqlExecutor;
use crate::meta::SqlMeta;
use recmap_core::{CallContext, Error, Record, RecordBackend, Result, Schema};
use recmap_mapping::{from_field_map, to_field_map, MetadataCache};
use std::sync::Arc;
use tracing::{debug, info};

/// Record store over a relational executor
///
/// Update requires the row to exist (affected rows >= 1); replace is an
/// unconditional upsert; insert on an existing key is
/// `Conflict(AlreadyExists)`.
pub struct SqlStore {
    executor: Arc<dyn SqlExecutor>,
    cache: Arc<MetadataCache<SqlMeta>>,
    create_tables: bool,
}

impl SqlStore {
    /// Store over `executor` with a private metadata cache
    pub fn new(executor: impl SqlExecutor + 'static) -> Self {
        Self::with_cache(Arc::new(executor), Arc::new(MetadataCache::new()))
    }

    /// Store sharing an executor and metadata cache
    pub fn with_cache(executor: Arc<dyn SqlExecutor>, cache: Arc<MetadataCache<SqlMeta>>) -> Self {
        SqlStore {
            executor,
            cache,
            create_tables: false,
        }
    }

    /// Create each type's table, if missing, the first time the type is used
    pub fn create_tables(mut self, enabled: bool) -> Self {
        self.create_tables = enabled;
        self
    }

    /// Metadata cache in use
    pub fn cache(&self) -> &Arc<MetadataCache<SqlMeta>> {
        &self.cache
    }

    fn meta(&self, ctx: &CallContext, schema: &Arc<Schema>) -> Result<Arc<SqlMeta>> {
        self.cache.get_or_build(schema, |s| {
            let meta = SqlMeta::build(s, self.executor.dialect())?;
            if self.create_tables {
                self.executor
                    .execute(ctx, &SqlCommand::new(meta.table_info().create_sql()))?;
                info!(target: "recmap::sql", table = meta.table(), "ensured table");
            }
            Ok(meta)
        })
    }

    /// Create the table for `schema` if it does not exist
    pub fn create_table(&self, ctx: &CallContext, schema: &Arc<Schema>) -> Result<()> {
        let meta = self.meta(ctx, schema)?;
        self.executor
            .execute(ctx, &SqlCommand::new(meta.table_info().create_sql()))?;
        info!(target: "recmap::sql", table = meta.table(), "created table");
        Ok(())
    }

    /// Drop the table for `schema` if it exists
    pub fn drop_table(&self, ctx: &CallContext, schema: &Arc<Schema>) -> Result<()> {
        let meta = self.meta(ctx, schema)?;
        self.executor
            .execute(ctx, &SqlCommand::new(meta.table_info().drop_sql()))?;
        info!(target: "recmap::sql", table = meta.table(), "dropped table");
        Ok(())
    }

    /// Whether the table for `schema` exists
    pub fn table_exists(&self, ctx: &CallContext, schema: &Arc<Schema>) -> Result<bool> {
        let meta = self.meta(ctx, schema)?;
        Ok(self
            .executor
            .query_row(ctx, &meta.table_info().exists_command())?
            .is_some())
    }
}

impl std::fmt::Debug for SqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlStore")
            .field("dialect", &self.executor.dialect())
            .field("cache", &self.cache)
            .field("create_tables", &self.create_tables)
            .finish()
    }
}

impl RecordBackend for SqlStore {
    fn backend_name(&self) -> &'static str {
        "sql"
    }

    fn get(&self, ctx: &CallContext, record: &mut dyn Record, fields: &[&str]) -> Result<()> {
        let meta = self.meta(ctx, record.schema())?;
        let cmd = meta.select(record, fields)?;
        let row = self
            .executor
            .query_row(ctx, &cmd)?
            .ok_or_else(|| Error::not_found(meta.describe_key(record)))?;
        from_field_map(record, &row.into_field_map())
    }

    fn batch_get(&self, _ctx: &CallContext, _records: &mut [&mut dyn Record]) -> Result<()> {
        Err(Error::NotImplemented("batch get on the relational store"))
    }

    fn insert(&self, ctx: &CallContext, record: &dyn Record) -> Result<()> {
        let meta = self.meta(ctx, record.schema())?;
        let cmd = meta.insert(&to_field_map(record, &[])?)?;
        match self.executor.execute(ctx, &cmd) {
            Ok(_) => Ok(()),
            Err(Error::Conflict { kind, .. }) => Err(Error::conflict(kind, meta.describe_key(record))),
            Err(e) => Err(e),
        }
    }

    fn update(&self, ctx: &CallContext, record: &dyn Record, fields: &[&str]) -> Result<()> {
        let meta = self.meta(ctx, record.schema())?;
        let cmd = meta.update(record, &to_field_map(record, fields)?)?;
        if self.executor.execute(ctx, &cmd)? == 0 {
            debug!(
                target: "recmap::sql",
                key = %meta.describe_key(record),
                "update matched no row"
            );
            return Err(Error::AffectedZero {
                table: meta.table().to_string(),
            });
        }
        Ok(())
    }

    fn replace(&self, ctx: &CallContext, record: &dyn Record) -> Result<()> {
        let meta = self.meta(ctx, record.schema())?;
        let cmd = meta.replace(&to_field_map(record, &[])?)?;
        self.executor.execute(ctx, &cmd)?;
        Ok(())
    }

    fn delete(&self, ctx: &CallContext, record: &dyn Record) -> Result<()> {
        let meta = self.meta(ctx, record.schema())?;
        self.executor.execute(ctx, &meta.delete(record)?)?;
        Ok(())
    }

    fn increase(&self, ctx: &CallContext, record: &dyn Record, fields: &[&str]) -> Result<()> {
        let meta = self.meta(ctx, record.schema())?;
        let cmd = meta.increase(record, fields)?;
        if self.executor.execute(ctx, &cmd)? > 0 {
            return Ok(());
        }
        // A missing row is not an error; a present one hit a column maximum
        if self.executor.query_row(ctx, &meta.exists(record)?)?.is_some() {
            return Err(Error::backend(format!(
                "{} increment would overflow",
                meta.describe_key(record)
            )));
        }
        Ok(())
    }
}
