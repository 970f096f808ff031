//! Hash store commands and conditional scripts

use bytes::Bytes;
use recmap_core::ConflictKind;
use recmap_mapping::{FieldValue, FieldValueMap};

/// Key condition a conditional write checks before writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGuard {
    /// Write only when the key is absent
    MustBeAbsent,
    /// Write only when the key exists
    MustExist,
}

/// Server-side script that checks a key and writes a hash atomically
///
/// The script replies `OK` after writing, or the rejection marker
/// ([`ConflictKind::as_str`]) without writing anything.
#[derive(Debug, PartialEq, Eq)]
pub struct Script {
    /// Name for logs
    pub name: &'static str,
    /// Lua source, `KEYS[1]` is the key and `ARGV` the field/value pairs
    pub text: &'static str,
    /// Condition the script enforces
    pub guard: KeyGuard,
    /// Rejection returned when the condition fails
    pub reject: ConflictKind,
}

impl Script {
    /// Whether a key in the given state passes the guard
    pub fn admits(&self, key_exists: bool) -> bool {
        match self.guard {
            KeyGuard::MustBeAbsent => !key_exists,
            KeyGuard::MustExist => key_exists,
        }
    }
}

/// Reply marker for an accepted conditional write
pub const SCRIPT_OK: &str = "OK";

/// Insert: reject an existing key
pub static INSERT_SCRIPT: Script = Script {
    name: "insert",
    text: r#"
local k = KEYS[1]
if redis.call('exists', k) == 1 then
    return 'AlreadyExists'
end
redis.call('hset', k, unpack(ARGV))
return 'OK'
"#,
    guard: KeyGuard::MustBeAbsent,
    reject: ConflictKind::AlreadyExists,
};

/// Update: reject a missing key
pub static UPDATE_SCRIPT: Script = Script {
    name: "update",
    text: r#"
local k = KEYS[1]
if redis.call('exists', k) ~= 1 then
    return 'NotExist'
end
redis.call('hset', k, unpack(ARGV))
return 'OK'
"#,
    guard: KeyGuard::MustExist,
    reject: ConflictKind::NotExist,
};

/// Field/value pairs in map order
pub fn entries_of(map: &FieldValueMap) -> Vec<(String, Bytes)> {
    map.iter()
        .map(|(name, value)| {
            let bytes = match value {
                FieldValue::Scalar(s) => Bytes::from(s.clone()),
                FieldValue::Blob(b) => b.clone(),
            };
            (name.clone(), bytes)
        })
        .collect()
}

/// One call against a hash store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashCommand {
    /// Every field of the hash (`HGETALL`)
    GetAll {
        /// Hash key
        key: String,
    },
    /// Named fields of the hash (`HMGET`)
    GetFields {
        /// Hash key
        key: String,
        /// Field names, reply values come back in this order
        fields: Vec<String>,
    },
    /// Unconditional write (`HSET`)
    SetFields {
        /// Hash key
        key: String,
        /// Field/value pairs
        entries: Vec<(String, Bytes)>,
    },
    /// Write guarded by a key-existence script (`EVALSHA`)
    ConditionalSet {
        /// Hash key
        key: String,
        /// Guarding script
        script: &'static Script,
        /// Field/value pairs
        entries: Vec<(String, Bytes)>,
    },
    /// Remove the key (`DEL`)
    Delete {
        /// Hash key
        key: String,
    },
    /// Add to one integer field (`HINCRBY`)
    Increment {
        /// Hash key
        key: String,
        /// Field name
        field: String,
        /// Step
        by: i64,
    },
    /// Add to several integer fields in one pipelined round trip
    IncrementBatch {
        /// Hash key
        key: String,
        /// Field names
        fields: Vec<String>,
        /// Step applied to each field
        by: i64,
    },
}

impl HashCommand {
    /// Key the command targets
    pub fn key(&self) -> &str {
        match self {
            HashCommand::GetAll { key }
            | HashCommand::GetFields { key, .. }
            | HashCommand::SetFields { key, .. }
            | HashCommand::ConditionalSet { key, .. }
            | HashCommand::Delete { key }
            | HashCommand::Increment { key, .. }
            | HashCommand::IncrementBatch { key, .. } => key,
        }
    }

    /// Short command name for logs
    pub fn name(&self) -> &'static str {
        match self {
            HashCommand::GetAll { .. } => "get_all",
            HashCommand::GetFields { .. } => "get_fields",
            HashCommand::SetFields { .. } => "set_fields",
            HashCommand::ConditionalSet { script, .. } => script.name,
            HashCommand::Delete { .. } => "delete",
            HashCommand::Increment { .. } => "increment",
            HashCommand::IncrementBatch { .. } => "increment_batch",
        }
    }
}

/// Reply to a [`HashCommand`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashReply {
    /// Write accepted
    Ok,
    /// Field/value pairs of [`HashCommand::GetAll`]; empty when the key is missing
    Fields(Vec<(String, Bytes)>),
    /// Values of [`HashCommand::GetFields`] in request order
    Values(Vec<Option<Bytes>>),
    /// Conditional write refused
    Rejected(ConflictKind),
    /// New field values after increments
    Integers(Vec<i64>),
    /// Whether [`HashCommand::Delete`] removed a key
    Deleted(bool),
}
