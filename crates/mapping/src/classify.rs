//! Field classification
//!
//! Derives, from a schema alone, the three field sets every store needs:
//!
//! - primary key: ordered names from the `primary_key` option
//! - blob: repeated fields, or bytes / message / group kinds; carried as
//!   encoded bytes, never as scalar strings
//! - increment: singular integer fields outside the primary key

use recmap_core::{
    format_scalar, Error, FieldDescriptor, Record, Result, Schema, SchemaError, Value,
};
use std::collections::BTreeSet;

/// Whether a field is carried as raw encoded bytes
pub fn is_blob_field(fd: &FieldDescriptor) -> bool {
    fd.is_repeated() || fd.kind().is_blob_kind()
}

/// Derived field sets for one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSets {
    type_name: String,
    primary_keys: Vec<String>,
    blob_fields: BTreeSet<String>,
    increment_fields: BTreeSet<String>,
}

/// Classify the fields of `schema`
///
/// # Errors
///
/// Fails when no primary key is declared, or when a key entry is unknown,
/// listed twice, or blob-eligible.
pub fn classify(schema: &Schema) -> std::result::Result<FieldSets, SchemaError> {
    let names = schema.primary_key_names();
    if names.is_empty() {
        return Err(SchemaError::MissingPrimaryKey {
            type_name: schema.full_name().to_string(),
        });
    }

    let mut primary_keys: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let fd = schema
            .field_by_name(name)
            .ok_or_else(|| SchemaError::UnknownPrimaryKeyField {
                type_name: schema.full_name().to_string(),
                field: name.to_string(),
            })?;
        if is_blob_field(fd) {
            return Err(SchemaError::UnsupportedPrimaryKeyField {
                type_name: schema.full_name().to_string(),
                field: name.to_string(),
            });
        }
        if primary_keys.iter().any(|k| k == name) {
            return Err(SchemaError::DuplicatePrimaryKeyField {
                type_name: schema.full_name().to_string(),
                field: name.to_string(),
            });
        }
        primary_keys.push(name.to_string());
    }

    let blob_fields = schema
        .fields()
        .iter()
        .filter(|fd| is_blob_field(fd))
        .map(|fd| fd.name().to_string())
        .collect();

    let increment_fields = schema
        .fields()
        .iter()
        .filter(|fd| fd.kind().is_integer() && !fd.is_repeated())
        .filter(|fd| !primary_keys.iter().any(|k| k == fd.name()))
        .map(|fd| fd.name().to_string())
        .collect();

    Ok(FieldSets {
        type_name: schema.name().to_string(),
        primary_keys,
        blob_fields,
        increment_fields,
    })
}

impl FieldSets {
    /// Short type name the sets were derived for
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Primary key names in declared order
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    /// Blob-eligible field names
    pub fn blob_fields(&self) -> &BTreeSet<String> {
        &self.blob_fields
    }

    /// Increment-eligible field names
    pub fn increment_fields(&self) -> &BTreeSet<String> {
        &self.increment_fields
    }

    /// Whether `name` is part of the primary key
    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_keys.iter().any(|k| k == name)
    }

    /// Whether `name` is carried as encoded bytes
    pub fn is_blob(&self, name: &str) -> bool {
        self.blob_fields.contains(name)
    }

    /// Whether `name` may be incremented
    pub fn is_increment(&self, name: &str) -> bool {
        self.increment_fields.contains(name)
    }

    /// Validate an increase request
    ///
    /// Runs before any store command is built, so a rejected request never
    /// reaches the store.
    pub fn check_increase<'a>(&self, fields: &[&'a str]) -> Result<Vec<&'a str>> {
        if fields.is_empty() {
            return Err(Error::Validation(format!(
                "increase on {} needs at least one field",
                self.type_name
            )));
        }
        for name in fields {
            if !self.is_increment(name) {
                let reason = if self.is_primary_key(name) {
                    "is a primary key field"
                } else {
                    "is not a singular integer field"
                };
                return Err(Error::Validation(format!(
                    "cannot increase {}.{}: {}",
                    self.type_name, name, reason
                )));
            }
        }
        Ok(fields.to_vec())
    }

    /// Primary key values of `record` as scalar strings, in declared order
    ///
    /// Unset key fields contribute their zero value.
    pub fn key_values(&self, record: &dyn Record) -> Result<Vec<String>> {
        let schema = record.schema();
        self.primary_keys
            .iter()
            .map(|name| {
                let fd = schema.field_by_name(name).ok_or_else(|| {
                    Error::Validation(format!(
                        "record {} has no key field {}",
                        schema.full_name(),
                        name
                    ))
                })?;
                match record.field(fd.number()) {
                    Some(value) => format_scalar(fd.kind(), &value),
                    None => format_scalar(fd.kind(), &Value::default_for(fd)),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recmap_core::testing::{account, account_schema, player_schema, sample_player};
    use recmap_core::{FieldKind, SchemaBuilder};

    #[test]
    fn test_account_sets() {
        let sets = classify(&account_schema()).unwrap();
        assert_eq!(sets.primary_keys(), ["id".to_string()]);
        assert!(sets.blob_fields().is_empty());
        assert_eq!(
            sets.increment_fields().iter().collect::<Vec<_>>(),
            vec!["coins"]
        );
        assert_eq!(sets.type_name(), "Account");
    }

    #[test]
    fn test_player_sets() {
        let sets = classify(&player_schema()).unwrap();
        assert_eq!(sets.primary_keys(), ["id".to_string(), "zone".to_string()]);

        for blob in ["avatar", "tags", "history", "main_item", "items", "stats"] {
            assert!(sets.is_blob(blob), "{blob} should be blob");
        }
        assert!(!sets.is_blob("name"));

        for inc in ["level", "exp", "gold", "luck", "crc", "seq", "offset", "stamp"] {
            assert!(sets.is_increment(inc), "{inc} should be increment");
        }
        for not_inc in ["id", "zone", "name", "online", "role", "ratio", "score", "history"] {
            assert!(!sets.is_increment(not_inc), "{not_inc} should not be increment");
        }
    }

    #[test]
    fn test_missing_primary_key() {
        let schema = SchemaBuilder::new("t.NoKey")
            .field("a", 1, FieldKind::Int32)
            .build()
            .unwrap();
        assert!(matches!(
            classify(&schema),
            Err(SchemaError::MissingPrimaryKey { .. })
        ));
    }

    #[test]
    fn test_bad_primary_key_fields() {
        let unknown = SchemaBuilder::new("t.K")
            .field("a", 1, FieldKind::Int32)
            .primary_key("b")
            .build()
            .unwrap();
        assert!(matches!(
            classify(&unknown),
            Err(SchemaError::UnknownPrimaryKeyField { .. })
        ));

        let blob = SchemaBuilder::new("t.K")
            .field("a", 1, FieldKind::Bytes)
            .primary_key("a")
            .build()
            .unwrap();
        assert!(matches!(
            classify(&blob),
            Err(SchemaError::UnsupportedPrimaryKeyField { .. })
        ));

        let twice = SchemaBuilder::new("t.K")
            .field("a", 1, FieldKind::Int32)
            .primary_key("a,a")
            .build()
            .unwrap();
        assert!(matches!(
            classify(&twice),
            Err(SchemaError::DuplicatePrimaryKeyField { .. })
        ));
    }

    #[test]
    fn test_check_increase() {
        let sets = classify(&account_schema()).unwrap();
        assert_eq!(sets.check_increase(&["coins"]).unwrap(), vec!["coins"]);

        let err = sets.check_increase(&["id"]).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("primary key"));

        assert!(sets.check_increase(&["name"]).unwrap_err().is_validation());
        assert!(sets.check_increase(&["coins", "missing"]).is_err());
        assert!(sets.check_increase(&[]).is_err());
    }

    #[test]
    fn test_key_values_in_declared_order() {
        let sets = classify(&player_schema()).unwrap();
        assert_eq!(sets.key_values(&sample_player()).unwrap(), vec!["42", "7"]);

        let account_sets = classify(&account_schema()).unwrap();
        let rec = account(0, "x", 1);
        assert_eq!(account_sets.key_values(&rec).unwrap(), vec!["0"]);
    }
}
