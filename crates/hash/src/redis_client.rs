//! Redis hash store
//!
//! Synchronous connections from a fixed-size [`ConnectionPool`]. Conditional
//! writes run as Lua scripts through `EVALSHA`, increment batches as one
//! pipeline.

use crate::client::HashClient;
use crate::command::{
    HashCommand, HashReply, KeyGuard, Script, INSERT_SCRIPT, SCRIPT_OK, UPDATE_SCRIPT,
};
use crate::pool::ConnectionPool;
use bytes::Bytes;
use recmap_core::{CallContext, Error, Result};
use redis::{Connection, IntoConnectionInfo, RedisError};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

/// Default number of pooled connections
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Connection settings for [`RedisHashClient`]
#[derive(Debug, Clone)]
pub struct RedisOptions {
    /// `host:port` or a full `redis://` URL
    pub addr: String,
    /// AUTH password
    pub password: Option<String>,
    /// Connect timeout
    pub conn_timeout: Option<Duration>,
    /// Connections opened at connect time, at least 1
    pub pool_size: usize,
}

impl Default for RedisOptions {
    fn default() -> Self {
        RedisOptions {
            addr: String::new(),
            password: None,
            conn_timeout: None,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// [`HashClient`] over a Redis server
pub struct RedisHashClient {
    pool: ConnectionPool<Connection>,
    insert: redis::Script,
    update: redis::Script,
}

fn driver(what: &str, err: RedisError) -> Error {
    Error::backend_with(format!("redis {}", what), err)
}

impl RedisHashClient {
    /// Open `options.pool_size` connections to the server
    pub fn connect(options: &RedisOptions) -> Result<Self> {
        if options.pool_size == 0 {
            return Err(Error::Validation("redis pool_size must be at least 1".to_string()));
        }
        let url = if options.addr.contains("://") {
            options.addr.clone()
        } else {
            format!("redis://{}/", options.addr)
        };
        let mut info = url
            .as_str()
            .into_connection_info()
            .map_err(|e| driver("address", e))?;
        if let Some(password) = &options.password {
            info.redis.password = Some(password.clone());
        }
        let client = redis::Client::open(info).map_err(|e| driver("client", e))?;
        let pool = ConnectionPool::open(options.pool_size, || {
            match options.conn_timeout {
                Some(timeout) => client.get_connection_with_timeout(timeout),
                None => client.get_connection(),
            }
            .map_err(|e| driver("connect", e))
        })?;
        info!(
            target: "recmap::hash",
            addr = %options.addr,
            pool_size = pool.size(),
            "connected to redis"
        );
        Ok(RedisHashClient {
            pool,
            insert: redis::Script::new(INSERT_SCRIPT.text),
            update: redis::Script::new(UPDATE_SCRIPT.text),
        })
    }

    fn script(&self, script: &Script) -> &redis::Script {
        match script.guard {
            KeyGuard::MustBeAbsent => &self.insert,
            KeyGuard::MustExist => &self.update,
        }
    }
}

impl std::fmt::Debug for RedisHashClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisHashClient")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Bound socket reads and writes by the context's remaining time
fn apply_deadline(conn: &mut Connection, ctx: &CallContext) -> Result<()> {
    let timeout = ctx
        .remaining()
        .map(|left| left.max(Duration::from_millis(1)));
    conn.set_read_timeout(timeout)
        .and_then(|_| conn.set_write_timeout(timeout))
        .map_err(|e| driver("timeout", e))
}

fn conditional_reply(script: &Script, reply: &str) -> Result<HashReply> {
    if reply == SCRIPT_OK {
        Ok(HashReply::Ok)
    } else if reply == script.reject.as_str() {
        Ok(HashReply::Rejected(script.reject))
    } else {
        Err(Error::backend(format!("{} script replied {}", script.name, reply)))
    }
}

impl HashClient for RedisHashClient {
    fn client_name(&self) -> &'static str {
        "redis"
    }

    fn execute(&self, ctx: &CallContext, cmd: &HashCommand) -> Result<HashReply> {
        ctx.check()?;
        let mut guard = self.pool.get();
        let conn: &mut Connection = &mut guard;
        apply_deadline(conn, ctx)?;
        match cmd {
            HashCommand::GetAll { key } => {
                let hash: BTreeMap<String, Vec<u8>> = redis::cmd("HGETALL")
                    .arg(key)
                    .query(conn)
                    .map_err(|e| driver("HGETALL", e))?;
                Ok(HashReply::Fields(
                    hash.into_iter().map(|(k, v)| (k, Bytes::from(v))).collect(),
                ))
            }
            HashCommand::GetFields { key, fields } => {
                let values: Vec<Option<Vec<u8>>> = redis::cmd("HMGET")
                    .arg(key)
                    .arg(fields)
                    .query(conn)
                    .map_err(|e| driver("HMGET", e))?;
                Ok(HashReply::Values(
                    values.into_iter().map(|v| v.map(Bytes::from)).collect(),
                ))
            }
            HashCommand::SetFields { key, entries } => {
                let mut hset = redis::cmd("HSET");
                hset.arg(key);
                for (name, value) in entries {
                    hset.arg(name).arg(value.as_ref());
                }
                let _: i64 = hset.query(conn).map_err(|e| driver("HSET", e))?;
                Ok(HashReply::Ok)
            }
            HashCommand::ConditionalSet {
                key,
                script,
                entries,
            } => {
                let mut invocation = self.script(script).prepare_invoke();
                invocation.key(key);
                for (name, value) in entries {
                    invocation.arg(name).arg(value.as_ref());
                }
                let reply: String = invocation
                    .invoke(conn)
                    .map_err(|e| driver(script.name, e))?;
                conditional_reply(script, &reply)
            }
            HashCommand::Delete { key } => {
                let removed: i64 = redis::cmd("DEL")
                    .arg(key)
                    .query(conn)
                    .map_err(|e| driver("DEL", e))?;
                Ok(HashReply::Deleted(removed > 0))
            }
            HashCommand::Increment { key, field, by } => {
                let value: i64 = redis::cmd("HINCRBY")
                    .arg(key)
                    .arg(field)
                    .arg(*by)
                    .query(conn)
                    .map_err(|e| driver("HINCRBY", e))?;
                Ok(HashReply::Integers(vec![value]))
            }
            HashCommand::IncrementBatch { key, fields, by } => {
                let mut pipe = redis::pipe();
                for field in fields {
                    pipe.cmd("HINCRBY").arg(key).arg(field).arg(*by);
                }
                let values: Vec<i64> = pipe.query(conn).map_err(|e| driver("pipeline", e))?;
                Ok(HashReply::Integers(values))
            }
        }
    }
}
