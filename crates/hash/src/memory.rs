//! In-memory hash store
//!
//! Keys live in a `DashMap`. Every command holds the key's shard lock for its
//! whole duration, which makes conditional writes and increment batches atomic
//! per key.

use crate::client::HashClient;
use crate::command::{HashCommand, HashReply};
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use recmap_core::{CallContext, Error, Result};
use std::collections::BTreeMap;

type Hash = BTreeMap<String, Bytes>;

/// [`HashClient`] over process memory
#[derive(Debug, Default)]
pub struct MemoryHashClient {
    keys: DashMap<String, Hash>,
}

impl MemoryHashClient {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when no key is stored
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether `key` holds a hash
    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    /// Copy of the hash at `key`
    pub fn snapshot(&self, key: &str) -> Option<BTreeMap<String, Bytes>> {
        self.keys.get(key).map(|h| h.value().clone())
    }
}

fn write(hash: &mut Hash, entries: &[(String, Bytes)]) {
    for (name, value) in entries {
        hash.insert(name.clone(), value.clone());
    }
}

fn increment(key: &str, hash: &mut Hash, field: &str, by: i64) -> Result<i64> {
    let current = match hash.get(field) {
        None => 0,
        Some(raw) => std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| {
                Error::backend(format!("{} field {} is not an integer", key, field))
            })?,
    };
    let next = current
        .checked_add(by)
        .ok_or_else(|| Error::backend(format!("{} field {} would overflow", key, field)))?;
    hash.insert(field.to_string(), Bytes::from(next.to_string()));
    Ok(next)
}

impl HashClient for MemoryHashClient {
    fn client_name(&self) -> &'static str {
        "memory"
    }

    fn execute(&self, ctx: &CallContext, cmd: &HashCommand) -> Result<HashReply> {
        ctx.check()?;
        match cmd {
            HashCommand::GetAll { key } => Ok(HashReply::Fields(
                self.keys
                    .get(key)
                    .map(|h| h.value().iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                    .unwrap_or_default(),
            )),
            HashCommand::GetFields { key, fields } => {
                let hash = self.keys.get(key);
                Ok(HashReply::Values(
                    fields
                        .iter()
                        .map(|f| hash.as_ref().and_then(|h| h.value().get(f).cloned()))
                        .collect(),
                ))
            }
            HashCommand::SetFields { key, entries } => {
                if entries.is_empty() {
                    return Err(Error::backend(format!("{}: write with no fields", key)));
                }
                write(&mut self.keys.entry(key.clone()).or_default(), entries);
                Ok(HashReply::Ok)
            }
            HashCommand::ConditionalSet {
                key,
                script,
                entries,
            } => {
                if entries.is_empty() {
                    return Err(Error::backend(format!("{}: write with no fields", key)));
                }
                match self.keys.entry(key.clone()) {
                    Entry::Occupied(mut slot) => {
                        if !script.admits(true) {
                            return Ok(HashReply::Rejected(script.reject));
                        }
                        write(slot.get_mut(), entries);
                    }
                    Entry::Vacant(slot) => {
                        if !script.admits(false) {
                            return Ok(HashReply::Rejected(script.reject));
                        }
                        let mut hash = Hash::new();
                        write(&mut hash, entries);
                        slot.insert(hash);
                    }
                }
                Ok(HashReply::Ok)
            }
            HashCommand::Delete { key } => Ok(HashReply::Deleted(self.keys.remove(key).is_some())),
            HashCommand::Increment { key, field, by } => {
                let mut hash = self.keys.entry(key.clone()).or_default();
                Ok(HashReply::Integers(vec![increment(key, &mut hash, field, *by)?]))
            }
            HashCommand::IncrementBatch { key, fields, by } => {
                let mut hash = self.keys.entry(key.clone()).or_default();
                let values = fields
                    .iter()
                    .map(|f| increment(key, &mut hash, f, *by))
                    .collect::<Result<Vec<_>>>()?;
                Ok(HashReply::Integers(values))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{INSERT_SCRIPT, UPDATE_SCRIPT};
    use recmap_core::ConflictKind;

    fn ctx() -> CallContext {
        CallContext::background()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, Bytes)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), Bytes::copy_from_slice(v.as_bytes())))
            .collect()
    }

    fn conditional(key: &str, insert: bool, items: &[(&str, &str)]) -> HashCommand {
        HashCommand::ConditionalSet {
            key: key.into(),
            script: if insert { &INSERT_SCRIPT } else { &UPDATE_SCRIPT },
            entries: pairs(items),
        }
    }

    #[test]
    fn test_insert_script_semantics() {
        let client = MemoryHashClient::new();
        let first = client.execute(&ctx(), &conditional("k", true, &[("a", "1")])).unwrap();
        assert_eq!(first, HashReply::Ok);
        let second = client.execute(&ctx(), &conditional("k", true, &[("a", "2")])).unwrap();
        assert_eq!(second, HashReply::Rejected(ConflictKind::AlreadyExists));
        assert_eq!(client.snapshot("k").unwrap()["a"], Bytes::from_static(b"1"));
    }

    #[test]
    fn test_update_script_never_creates() {
        let client = MemoryHashClient::new();
        let reply = client.execute(&ctx(), &conditional("k", false, &[("a", "1")])).unwrap();
        assert_eq!(reply, HashReply::Rejected(ConflictKind::NotExist));
        assert!(client.is_empty());
    }

    #[test]
    fn test_update_merges_fields() {
        let client = MemoryHashClient::new();
        client
            .execute(&ctx(), &conditional("k", true, &[("a", "1"), ("b", "2")]))
            .unwrap();
        client.execute(&ctx(), &conditional("k", false, &[("b", "3")])).unwrap();
        let hash = client.snapshot("k").unwrap();
        assert_eq!(hash["a"], Bytes::from_static(b"1"));
        assert_eq!(hash["b"], Bytes::from_static(b"3"));
    }

    #[test]
    fn test_get_fields_reports_missing_as_none() {
        let client = MemoryHashClient::new();
        client
            .execute(&ctx(), &HashCommand::SetFields { key: "k".into(), entries: pairs(&[("a", "1")]) })
            .unwrap();
        let reply = client
            .execute(
                &ctx(),
                &HashCommand::GetFields { key: "k".into(), fields: vec!["a".into(), "zz".into()] },
            )
            .unwrap();
        assert_eq!(reply, HashReply::Values(vec![Some(Bytes::from_static(b"1")), None]));

        let missing = client.execute(&ctx(), &HashCommand::GetAll { key: "nope".into() }).unwrap();
        assert_eq!(missing, HashReply::Fields(vec![]));
    }

    #[test]
    fn test_increments() {
        let client = MemoryHashClient::new();
        let one = HashCommand::Increment { key: "k".into(), field: "n".into(), by: 1 };
        assert_eq!(client.execute(&ctx(), &one).unwrap(), HashReply::Integers(vec![1]));
        assert_eq!(client.execute(&ctx(), &one).unwrap(), HashReply::Integers(vec![2]));

        let batch = HashCommand::IncrementBatch {
            key: "k".into(),
            fields: vec!["n".into(), "m".into()],
            by: 1,
        };
        assert_eq!(client.execute(&ctx(), &batch).unwrap(), HashReply::Integers(vec![3, 1]));
    }

    #[test]
    fn test_increment_non_integer_fails() {
        let client = MemoryHashClient::new();
        client
            .execute(&ctx(), &HashCommand::SetFields { key: "k".into(), entries: pairs(&[("n", "abc")]) })
            .unwrap();
        let err = client
            .execute(&ctx(), &HashCommand::Increment { key: "k".into(), field: "n".into(), by: 1 })
            .unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
    }

    #[test]
    fn test_delete() {
        let client = MemoryHashClient::new();
        client
            .execute(&ctx(), &HashCommand::SetFields { key: "k".into(), entries: pairs(&[("a", "1")]) })
            .unwrap();
        let del = HashCommand::Delete { key: "k".into() };
        assert_eq!(client.execute(&ctx(), &del).unwrap(), HashReply::Deleted(true));
        assert_eq!(client.execute(&ctx(), &del).unwrap(), HashReply::Deleted(false));
    }

    #[test]
    fn test_cancelled_context_refused() {
        let client = MemoryHashClient::new();
        let ctx = CallContext::background();
        ctx.cancel();
        assert!(client.execute(&ctx, &HashCommand::GetAll { key: "k".into() }).is_err());
    }
}
