//! Per-type hash metadata and key builder

use crate::command::{entries_of, HashCommand, INSERT_SCRIPT, UPDATE_SCRIPT};
use bytes::Bytes;
use recmap_core::{Error, Record, Result, Schema};
use recmap_mapping::{classify, field_filter, FieldSets, FieldValue, FieldValueMap};

/// Compiled command builders for one record type
#[derive(Debug, Clone)]
pub struct HashMeta {
    sets: FieldSets,
    prefix: String,
}

impl HashMeta {
    /// Build metadata for `schema`
    ///
    /// # Errors
    ///
    /// Fails when the schema has no usable primary key.
    pub fn build(schema: &Schema) -> Result<Self> {
        let sets = classify(schema)?;
        let prefix = schema.name().to_string();
        Ok(HashMeta { sets, prefix })
    }

    /// Derived field sets
    pub fn sets(&self) -> &FieldSets {
        &self.sets
    }

    /// `<TypeName>:{v1-v2-...}` from the record's key values in declared order
    pub fn key(&self, record: &dyn Record) -> Result<String> {
        let values = self.sets.key_values(record)?;
        Ok(format!("{}:{{{}}}", self.prefix, values.join("-")))
    }

    /// Read every field, or only the known requested ones
    pub fn get(&self, record: &dyn Record, fields: &[&str]) -> Result<HashCommand> {
        let key = self.key(record)?;
        Ok(match field_filter(record.schema(), fields)? {
            None => HashCommand::GetAll { key },
            Some(filter) => HashCommand::GetFields {
                key,
                fields: filter.into_iter().collect(),
            },
        })
    }

    /// Insert guarded by [`INSERT_SCRIPT`]
    pub fn insert(&self, record: &dyn Record, map: &FieldValueMap) -> Result<HashCommand> {
        Ok(HashCommand::ConditionalSet {
            key: self.key(record)?,
            script: &INSERT_SCRIPT,
            entries: self.non_empty(map)?,
        })
    }

    /// Update guarded by [`UPDATE_SCRIPT`]
    pub fn update(&self, record: &dyn Record, map: &FieldValueMap) -> Result<HashCommand> {
        Ok(HashCommand::ConditionalSet {
            key: self.key(record)?,
            script: &UPDATE_SCRIPT,
            entries: self.non_empty(map)?,
        })
    }

    /// Unconditional write
    pub fn replace(&self, record: &dyn Record, map: &FieldValueMap) -> Result<HashCommand> {
        Ok(HashCommand::SetFields {
            key: self.key(record)?,
            entries: self.non_empty(map)?,
        })
    }

    /// Remove the record's hash
    pub fn delete(&self, record: &dyn Record) -> Result<HashCommand> {
        Ok(HashCommand::Delete {
            key: self.key(record)?,
        })
    }

    /// One increment for a single field, a pipelined batch for several
    ///
    /// Every name is validated before anything is built; duplicates count once.
    pub fn increase(&self, record: &dyn Record, fields: &[&str]) -> Result<HashCommand> {
        let mut fields: Vec<String> = self
            .sets
            .check_increase(fields)?
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut seen = std::collections::HashSet::new();
        fields.retain(|f| seen.insert(f.clone()));
        let key = self.key(record)?;
        Ok(if fields.len() == 1 {
            HashCommand::Increment {
                key,
                field: fields.remove(0),
                by: 1,
            }
        } else {
            HashCommand::IncrementBatch { key, fields, by: 1 }
        })
    }

    /// Turn stored pairs back into a field-value map
    ///
    /// Scalar fields must hold UTF-8 text.
    pub fn field_map<I>(&self, pairs: I) -> Result<FieldValueMap>
    where
        I: IntoIterator<Item = (String, Bytes)>,
    {
        let mut map = FieldValueMap::new();
        for (name, bytes) in pairs {
            let value = if self.sets.is_blob(&name) {
                FieldValue::Blob(bytes)
            } else {
                let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                    Error::Unmarshal(format!("field {} is not valid UTF-8", name))
                })?;
                FieldValue::Scalar(text)
            };
            map.insert(name, value);
        }
        Ok(map)
    }

    fn non_empty(&self, map: &FieldValueMap) -> Result<Vec<(String, Bytes)>> {
        if map.is_empty() {
            return Err(Error::Validation(format!(
                "nothing to write into {}",
                self.prefix
            )));
        }
        Ok(entries_of(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recmap_core::testing::{account, account_key, sample_player};
    use recmap_mapping::to_field_map;

    fn meta_for(record: &dyn Record) -> HashMeta {
        HashMeta::build(record.schema()).unwrap()
    }

    #[test]
    fn test_key_format() {
        let rec = account_key(100);
        assert_eq!(meta_for(&rec).key(&rec).unwrap(), "Account:{100}");

        let player = sample_player();
        assert_eq!(meta_for(&player).key(&player).unwrap(), "Player:{42-7}");
    }

    #[test]
    fn test_get_without_filter_reads_all() {
        let rec = account_key(1);
        let cmd = meta_for(&rec).get(&rec, &[]).unwrap();
        assert_eq!(cmd, HashCommand::GetAll { key: "Account:{1}".into() });
    }

    #[test]
    fn test_get_with_filter_normalizes() {
        let player = sample_player();
        let cmd = meta_for(&player)
            .get(&player, &["main_item.slot", "name", "nope"])
            .unwrap();
        assert_eq!(
            cmd,
            HashCommand::GetFields {
                key: "Player:{42-7}".into(),
                fields: vec!["main_item".into(), "name".into()],
            }
        );
    }

    #[test]
    fn test_insert_and_update_pick_scripts() {
        let rec = account(100, "test", 0);
        let meta = meta_for(&rec);
        let map = to_field_map(&rec, &[]).unwrap();

        let HashCommand::ConditionalSet { script, entries, .. } = meta.insert(&rec, &map).unwrap()
        else {
            panic!("insert should be conditional");
        };
        assert!(std::ptr::eq(script, &INSERT_SCRIPT));
        assert_eq!(entries.len(), 3);

        let HashCommand::ConditionalSet { script, .. } = meta.update(&rec, &map).unwrap() else {
            panic!("update should be conditional");
        };
        assert!(std::ptr::eq(script, &UPDATE_SCRIPT));
    }

    #[test]
    fn test_increase_single_and_batch() {
        let player = sample_player();
        let meta = meta_for(&player);
        assert_eq!(
            meta.increase(&player, &["level", "level"]).unwrap(),
            HashCommand::Increment {
                key: "Player:{42-7}".into(),
                field: "level".into(),
                by: 1,
            }
        );
        let HashCommand::IncrementBatch { fields, by, .. } =
            meta.increase(&player, &["level", "gold"]).unwrap()
        else {
            panic!("two fields should batch");
        };
        assert_eq!(fields, vec!["level".to_string(), "gold".to_string()]);
        assert_eq!(by, 1);
    }

    #[test]
    fn test_increase_rejects_ineligible() {
        let player = sample_player();
        let meta = meta_for(&player);
        for fields in [&["id"][..], &["name"][..], &["level", "online"][..], &[][..]] {
            assert!(meta.increase(&player, fields).unwrap_err().is_validation());
        }
    }

    #[test]
    fn test_field_map_splits_by_class() {
        let player = sample_player();
        let meta = meta_for(&player);
        let map = meta
            .field_map(vec![
                ("name".to_string(), Bytes::from_static(b"rust-lord")),
                ("tags".to_string(), Bytes::from_static(&[0x6a, 0x01, 0x61])),
            ])
            .unwrap();
        assert_eq!(map["name"], FieldValue::Scalar("rust-lord".into()));
        assert!(matches!(map["tags"], FieldValue::Blob(_)));

        let err = meta
            .field_map(vec![("name".to_string(), Bytes::from_static(&[0xff, 0xfe]))])
            .unwrap_err();
        assert!(matches!(err, Error::Unmarshal(_)));
    }
}
