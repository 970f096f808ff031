//! Key-value [`RecordBackend`]

use crate::client::HashClient;
use crate::command::{HashCommand, HashReply};
use crate::meta::HashMeta;
use recmap_core::{CallContext, Error, Record, RecordBackend, Result, Schema};
use recmap_mapping::{from_field_map, to_field_map, MetadataCache};
use std::sync::Arc;
use tracing::debug;

/// Record store over a hash client
///
/// Each record is one hash at `<TypeName>:{key values}`, one hash field per
/// record field. Insert and update are conditional on key existence and
/// atomic on the server; replace and delete are unconditional.
pub struct HashStore {
    client: Arc<dyn HashClient>,
    cache: Arc<MetadataCache<HashMeta>>,
}

impl HashStore {
    /// Store over `client` with a private metadata cache
    pub fn new(client: impl HashClient + 'static) -> Self {
        Self::with_cache(Arc::new(client), Arc::new(MetadataCache::new()))
    }

    /// Store sharing a client and metadata cache
    pub fn with_cache(client: Arc<dyn HashClient>, cache: Arc<MetadataCache<HashMeta>>) -> Self {
        HashStore { client, cache }
    }

    /// Metadata cache in use
    pub fn cache(&self) -> &Arc<MetadataCache<HashMeta>> {
        &self.cache
    }

    fn meta(&self, schema: &Arc<Schema>) -> Result<Arc<HashMeta>> {
        self.cache.get_or_build(schema, |s| HashMeta::build(s))
    }

    fn run(&self, ctx: &CallContext, cmd: &HashCommand) -> Result<HashReply> {
        let reply = self.client.execute(ctx, cmd)?;
        debug!(
            target: "recmap::hash",
            client = self.client.client_name(),
            command = cmd.name(),
            key = cmd.key(),
            "hash command done"
        );
        Ok(reply)
    }

    fn conditional(&self, ctx: &CallContext, cmd: &HashCommand) -> Result<()> {
        match self.run(ctx, cmd)? {
            HashReply::Ok => Ok(()),
            HashReply::Rejected(kind) => Err(Error::conflict(kind, cmd.key())),
            other => Err(unexpected(cmd, &other)),
        }
    }
}

fn unexpected(cmd: &HashCommand, reply: &HashReply) -> Error {
    Error::backend(format!("unexpected reply to {}: {:?}", cmd.name(), reply))
}

impl std::fmt::Debug for HashStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashStore")
            .field("client", &self.client.client_name())
            .field("cache", &self.cache)
            .finish()
    }
}

impl RecordBackend for HashStore {
    fn backend_name(&self) -> &'static str {
        "hash"
    }

    fn get(&self, ctx: &CallContext, record: &mut dyn Record, fields: &[&str]) -> Result<()> {
        let meta = self.meta(record.schema())?;
        let cmd = meta.get(record, fields)?;
        let pairs = match (&cmd, self.run(ctx, &cmd)?) {
            (HashCommand::GetAll { .. }, HashReply::Fields(pairs)) => pairs,
            (HashCommand::GetFields { fields, .. }, HashReply::Values(values)) => fields
                .iter()
                .cloned()
                .zip(values)
                .filter_map(|(name, value)| value.map(|v| (name, v)))
                .collect(),
            (_, other) => return Err(unexpected(&cmd, &other)),
        };
        if pairs.is_empty() {
            return Err(Error::not_found(cmd.key()));
        }
        from_field_map(record, &meta.field_map(pairs)?)
    }

    fn batch_get(&self, _ctx: &CallContext, _records: &mut [&mut dyn Record]) -> Result<()> {
        Err(Error::NotImplemented("batch get on the hash store"))
    }

    fn insert(&self, ctx: &CallContext, record: &dyn Record) -> Result<()> {
        let meta = self.meta(record.schema())?;
        let cmd = meta.insert(record, &to_field_map(record, &[])?)?;
        self.conditional(ctx, &cmd)
    }

    fn update(&self, ctx: &CallContext, record: &dyn Record, fields: &[&str]) -> Result<()> {
        let meta = self.meta(record.schema())?;
        let cmd = meta.update(record, &to_field_map(record, fields)?)?;
        self.conditional(ctx, &cmd)
    }

    fn replace(&self, ctx: &CallContext, record: &dyn Record) -> Result<()> {
        let meta = self.meta(record.schema())?;
        let cmd = meta.replace(record, &to_field_map(record, &[])?)?;
        match self.run(ctx, &cmd)? {
            HashReply::Ok => Ok(()),
            other => Err(unexpected(&cmd, &other)),
        }
    }

    fn delete(&self, ctx: &CallContext, record: &dyn Record) -> Result<()> {
        let meta = self.meta(record.schema())?;
        let cmd = meta.delete(record)?;
        match self.run(ctx, &cmd)? {
            HashReply::Deleted(_) => Ok(()),
            other => Err(unexpected(&cmd, &other)),
        }
    }

    fn increase(&self, ctx: &CallContext, record: &dyn Record, fields: &[&str]) -> Result<()> {
        let meta = self.meta(record.schema())?;
        let cmd = meta.increase(record, fields)?;
        match self.run(ctx, &cmd)? {
            HashReply::Integers(_) => Ok(()),
            other => Err(unexpected(&cmd, &other)),
        }
    }
}
