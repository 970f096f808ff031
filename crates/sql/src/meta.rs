//! Per-type statement templates
//!
//! Everything that depends only on the schema (table name, key clause,
//! whole-row select and delete, DDL) is rendered once when the metadata is
//! built. Per call, only the column lists and parameters are assembled.

use crate::command::{quote, SqlCommand, SqlParam};
use crate::ddl::{SqlDialect, TableInfo};
use recmap_core::{Error, FieldKind, Record, Result, Schema};
use recmap_mapping::{classify, field_filter, FieldSets, FieldValueMap};
use std::collections::HashMap;

/// Compiled statements for one record type
#[derive(Debug, Clone)]
pub struct SqlMeta {
    sets: FieldSets,
    table: String,
    quoted_table: String,
    key_clause: String,
    select_all: String,
    exists: String,
    delete: String,
    columns: Vec<String>,
    kinds: HashMap<String, FieldKind>,
    dialect: SqlDialect,
    table_info: TableInfo,
}

impl SqlMeta {
    /// Compile the templates for `schema`
    ///
    /// # Errors
    ///
    /// Fails when the schema has no usable primary key.
    pub fn build(schema: &Schema, dialect: SqlDialect) -> Result<Self> {
        let sets = classify(schema)?;
        let table = schema.name().to_string();
        let quoted_table = quote(&table);
        let key_clause = sets
            .primary_keys()
            .iter()
            .map(|k| format!("{}=?", quote(k)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let select_all = format!("SELECT * FROM {} WHERE {}", quoted_table, key_clause);
        let exists = format!("SELECT 1 FROM {} WHERE {}", quoted_table, key_clause);
        let delete = format!("DELETE FROM {} WHERE {}", quoted_table, key_clause);
        let columns = schema.fields().iter().map(|f| f.name().to_string()).collect();
        let kinds = schema
            .fields()
            .iter()
            .map(|f| (f.name().to_string(), f.kind()))
            .collect();
        let table_info = TableInfo::new(schema, &sets, dialect);
        Ok(SqlMeta {
            sets,
            table,
            quoted_table,
            key_clause,
            select_all,
            exists,
            delete,
            columns,
            kinds,
            dialect,
            table_info,
        })
    }

    /// Derived field sets
    pub fn sets(&self) -> &FieldSets {
        &self.sets
    }

    /// Table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// DDL for this type
    pub fn table_info(&self) -> &TableInfo {
        &self.table_info
    }

    /// Human-readable key, for errors and logs
    pub fn describe_key(&self, record: &dyn Record) -> String {
        match self.sets.key_values(record) {
            Ok(values) => format!("{}:{{{}}}", self.table, values.join("-")),
            Err(_) => self.table.clone(),
        }
    }

    fn kind(&self, name: &str) -> Result<FieldKind> {
        self.kinds.get(name).copied().ok_or_else(|| {
            Error::Validation(format!("{} has no column {}", self.table, name))
        })
    }

    fn key_params(&self, record: &dyn Record) -> Result<Vec<SqlParam>> {
        self.sets
            .primary_keys()
            .iter()
            .zip(self.sets.key_values(record)?)
            .map(|(name, value)| SqlParam::scalar(self.kind(name)?, &value))
            .collect()
    }

    /// `SELECT` of the requested columns, or every column, by key
    pub fn select(&self, record: &dyn Record, fields: &[&str]) -> Result<SqlCommand> {
        let params = self.key_params(record)?;
        let Some(filter) = field_filter(record.schema(), fields)? else {
            return Ok(SqlCommand::with_params(self.select_all.clone(), params));
        };
        let columns: Vec<String> = self
            .columns
            .iter()
            .filter(|c| filter.contains(c.as_str()))
            .map(|c| quote(c))
            .collect();
        let text = format!(
            "SELECT {} FROM {} WHERE {}",
            columns.join(", "),
            self.quoted_table,
            self.key_clause
        );
        Ok(SqlCommand::with_params(text, params))
    }

    /// `INSERT` of every column in `map`
    pub fn insert(&self, map: &FieldValueMap) -> Result<SqlCommand> {
        self.write_all("INSERT INTO", map)
    }

    /// `REPLACE` (upsert) of every column in `map`
    pub fn replace(&self, map: &FieldValueMap) -> Result<SqlCommand> {
        self.write_all("REPLACE INTO", map)
    }

    fn write_all(&self, verb: &str, map: &FieldValueMap) -> Result<SqlCommand> {
        if map.is_empty() {
            return Err(Error::Validation(format!(
                "nothing to write into {}",
                self.table
            )));
        }
        let mut columns = Vec::with_capacity(map.len());
        let mut params = Vec::with_capacity(map.len());
        for (name, value) in map {
            columns.push(quote(name));
            params.push(SqlParam::field(self.kind(name)?, value)?);
        }
        let placeholders = vec!["?"; columns.len()].join(", ");
        let text = format!(
            "{} {} ({}) VALUES ({})",
            verb,
            self.quoted_table,
            columns.join(", "),
            placeholders
        );
        Ok(SqlCommand::with_params(text, params))
    }

    /// `UPDATE` of the non-key columns in `map`, by the record's key
    ///
    /// # Errors
    ///
    /// `Validation` when `map` holds only key columns.
    pub fn update(&self, record: &dyn Record, map: &FieldValueMap) -> Result<SqlCommand> {
        let mut assignments = Vec::with_capacity(map.len());
        let mut params = Vec::with_capacity(map.len() + self.sets.primary_keys().len());
        for (name, value) in map {
            if self.sets.is_primary_key(name) {
                continue;
            }
            assignments.push(format!("{}=?", quote(name)));
            params.push(SqlParam::field(self.kind(name)?, value)?);
        }
        if assignments.is_empty() {
            return Err(Error::Validation(format!(
                "update on {} has no non-key column to set",
                self.table
            )));
        }
        params.extend(self.key_params(record)?);
        let text = format!(
            "UPDATE {} SET {} WHERE {}",
            self.quoted_table,
            assignments.join(", "),
            self.key_clause
        );
        Ok(SqlCommand::with_params(text, params))
    }

    /// `UPDATE .. SET col=col+1` for each requested column, by key
    ///
    /// Every name is validated before anything is built. Each column is
    /// guarded by its kind's maximum, so an increment that would overflow
    /// matches no row instead of widening the stored value.
    pub fn increase(&self, record: &dyn Record, fields: &[&str]) -> Result<SqlCommand> {
        let fields = self.sets.check_increase(fields)?;
        let mut assignments: Vec<String> = Vec::with_capacity(fields.len());
        let mut guards: Vec<String> = Vec::with_capacity(fields.len());
        for name in fields {
            let col = quote(name);
            let fragment = format!("{}={}+1", col, col);
            if assignments.contains(&fragment) {
                continue;
            }
            assignments.push(fragment);
            guards.push(self.increment_guard(&col, self.kind(name)?)?);
        }
        let text = format!(
            "UPDATE {} SET {} WHERE {} AND {}",
            self.quoted_table,
            assignments.join(", "),
            self.key_clause,
            guards.join(" AND ")
        );
        Ok(SqlCommand::with_params(text, self.key_params(record)?))
    }

    fn increment_guard(&self, col: &str, kind: FieldKind) -> Result<String> {
        let guard = match kind {
            FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => {
                format!("{}<{}", col, i32::MAX)
            }
            FieldKind::Uint32 | FieldKind::Fixed32 => format!("{}<{}", col, u32::MAX),
            FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => {
                format!("{}<{}", col, i64::MAX)
            }
            // SQLite keeps these as text and its integer arithmetic is signed
            FieldKind::Uint64 | FieldKind::Fixed64 => match self.dialect {
                SqlDialect::Sqlite => format!("CAST({} AS INTEGER)<{}", col, i64::MAX),
                SqlDialect::MySql => format!("{}<{}", col, u64::MAX),
            },
            other => {
                return Err(Error::Validation(format!(
                    "cannot increase {} column {}",
                    other, col
                )))
            }
        };
        Ok(guard)
    }

    /// `SELECT 1` by key, to tell a missing row from a guarded one
    pub fn exists(&self, record: &dyn Record) -> Result<SqlCommand> {
        Ok(SqlCommand::with_params(
            self.exists.clone(),
            self.key_params(record)?,
        ))
    }

    /// `DELETE` by key
    pub fn delete(&self, record: &dyn Record) -> Result<SqlCommand> {
        Ok(SqlCommand::with_params(
            self.delete.clone(),
            self.key_params(record)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recmap_core::testing::{account, account_schema, player_schema, sample_player};
    use recmap_mapping::{to_field_map, FieldValue};

    fn account_meta() -> SqlMeta {
        SqlMeta::build(&account_schema(), SqlDialect::Sqlite).unwrap()
    }

    fn text(s: &str) -> SqlParam {
        SqlParam::Text(s.to_string())
    }

    fn int(n: i64) -> SqlParam {
        SqlParam::Integer(n)
    }

    #[test]
    fn test_select_all_by_key() {
        let cmd = account_meta().select(&account(100, "t", 0), &[]).unwrap();
        assert_eq!(cmd.text, "SELECT * FROM `Account` WHERE `id`=?");
        assert_eq!(cmd.params, vec![text("100")]);
    }

    #[test]
    fn test_select_columns_in_schema_order() {
        let cmd = account_meta()
            .select(&account(1, "t", 0), &["coins", "name", "bogus"])
            .unwrap();
        assert_eq!(cmd.text, "SELECT `name`, `coins` FROM `Account` WHERE `id`=?");
    }

    #[test]
    fn test_composite_key_joined_with_and() {
        let meta = SqlMeta::build(&player_schema(), SqlDialect::Sqlite).unwrap();
        let cmd = meta.delete(&sample_player()).unwrap();
        assert_eq!(cmd.text, "DELETE FROM `Player` WHERE `id`=? AND `zone`=?");
        assert_eq!(cmd.params, vec![text("42"), int(7)]);
    }

    #[test]
    fn test_insert_and_replace_share_order() {
        let meta = account_meta();
        let map = to_field_map(&account(100, "test", 0), &[]).unwrap();
        let insert = meta.insert(&map).unwrap();
        assert_eq!(
            insert.text,
            "INSERT INTO `Account` (`coins`, `id`, `name`) VALUES (?, ?, ?)"
        );
        assert_eq!(insert.params, vec![int(0), text("100"), text("test")]);

        let replace = meta.replace(&map).unwrap();
        assert!(replace.text.starts_with("REPLACE INTO `Account` (`coins`, `id`, `name`)"));
        assert_eq!(replace.params, insert.params);
    }

    #[test]
    fn test_update_excludes_key_columns() {
        let meta = account_meta();
        let rec = account(100, "test", 5);
        let map = to_field_map(&rec, &["id", "coins"]).unwrap();
        let cmd = meta.update(&rec, &map).unwrap();
        assert_eq!(cmd.text, "UPDATE `Account` SET `coins`=? WHERE `id`=?");
        assert_eq!(cmd.params, vec![int(5), text("100")]);
    }

    #[test]
    fn test_update_with_only_keys_rejected() {
        let meta = account_meta();
        let rec = account(100, "test", 5);
        let map = to_field_map(&rec, &["id"]).unwrap();
        assert!(meta.update(&rec, &map).unwrap_err().is_validation());
    }

    #[test]
    fn test_increase_fragments() {
        let meta = SqlMeta::build(&player_schema(), SqlDialect::Sqlite).unwrap();
        let cmd = meta
            .increase(&sample_player(), &["level", "exp", "level"])
            .unwrap();
        assert_eq!(
            cmd.text,
            "UPDATE `Player` SET `level`=`level`+1, `exp`=`exp`+1 \
             WHERE `id`=? AND `zone`=? AND `level`<2147483647 AND `exp`<9223372036854775807"
        );
        assert_eq!(cmd.params, vec![text("42"), int(7)]);
    }

    #[test]
    fn test_increase_guards_unsigned_columns_by_dialect() {
        let rec = sample_player();
        let sqlite = SqlMeta::build(&player_schema(), SqlDialect::Sqlite).unwrap();
        let cmd = sqlite.increase(&rec, &["seq", "crc"]).unwrap();
        assert!(cmd
            .text
            .ends_with("AND CAST(`seq` AS INTEGER)<9223372036854775807 AND `crc`<4294967295"));

        let mysql = SqlMeta::build(&player_schema(), SqlDialect::MySql).unwrap();
        let cmd = mysql.increase(&rec, &["seq"]).unwrap();
        assert!(cmd.text.ends_with("AND `seq`<18446744073709551615"));
    }

    #[test]
    fn test_float_columns_bound_as_reals() {
        let meta = SqlMeta::build(&player_schema(), SqlDialect::Sqlite).unwrap();
        let map = to_field_map(&sample_player(), &["ratio", "score"]).unwrap();
        let cmd = meta.update(&sample_player(), &map).unwrap();
        assert_eq!(&cmd.params[..2], &[SqlParam::Real(0.25), SqlParam::Real(1234.5)]);
    }

    #[test]
    fn test_increase_gating() {
        let meta = account_meta();
        let rec = account(100, "test", 0);
        assert!(meta.increase(&rec, &["id"]).unwrap_err().is_validation());
        assert!(meta.increase(&rec, &["name"]).unwrap_err().is_validation());
        assert!(meta.increase(&rec, &[]).unwrap_err().is_validation());
    }

    #[test]
    fn test_blob_columns_bound_as_blobs() {
        let meta = SqlMeta::build(&player_schema(), SqlDialect::Sqlite).unwrap();
        let map = to_field_map(&sample_player(), &["items"]).unwrap();
        let cmd = meta.update(&sample_player(), &map).unwrap();
        let FieldValue::Blob(expected) = &map["items"] else {
            panic!("items should be a blob");
        };
        assert_eq!(cmd.params[0], SqlParam::Blob(expected.clone()));
    }

    #[test]
    fn test_describe_key() {
        let meta = SqlMeta::build(&player_schema(), SqlDialect::Sqlite).unwrap();
        assert_eq!(meta.describe_key(&sample_player()), "Player:{42-7}");
    }

    #[test]
    fn test_build_requires_primary_key() {
        let schema = recmap_core::SchemaBuilder::new("t.Loose")
            .field("a", 1, recmap_core::FieldKind::Int32)
            .build()
            .unwrap();
        assert!(SqlMeta::build(&schema, SqlDialect::Sqlite).unwrap_err().is_validation());
    }
}
