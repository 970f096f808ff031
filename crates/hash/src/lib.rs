//! Key-value hash store adapter for recmap
//!
//! A record is one hash keyed `<TypeName>:{v1-v2}` from its primary key
//! values. Hash fields are record field names; values are scalar strings or
//! encoded wire entries for blob fields.
//!
//! Insert and update atomicity comes from conditional scripts that check key
//! existence and write in one server-side step:
//!
//! | operation | key present               | key missing          |
//! |-----------|---------------------------|----------------------|
//! | insert    | `Conflict(AlreadyExists)` | write all fields     |
//! | update    | write given fields        | `Conflict(NotExist)` |
//! | replace   | write all fields          | write all fields     |
//!
//! The `redis` feature enables [`RedisHashClient`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod command;
pub mod memory;
pub mod meta;
pub mod pool;
#[cfg(feature = "redis")]
pub mod redis_client;
pub mod store;

pub use client::HashClient;
pub use command::{HashCommand, HashReply, KeyGuard, Script, INSERT_SCRIPT, UPDATE_SCRIPT};
pub use memory::MemoryHashClient;
pub use meta::HashMeta;
pub use pool::ConnectionPool;
#[cfg(feature = "redis")]
pub use redis_client::{RedisHashClient, RedisOptions};
pub use store::HashStore;
