//! Table DDL
//!
//! Column types follow the field kind:
//!
//! | kind                              | column                              |
//! |-----------------------------------|-------------------------------------|
//! | bool                              | `tinyint NOT NULL DEFAULT 0`        |
//! | enum, int32, sint32, sfixed32     | `int NOT NULL DEFAULT 0`            |
//! | uint32, fixed32                   | `int UNSIGNED NOT NULL DEFAULT 0`   |
//! | int64, sint64, sfixed64           | `bigint NOT NULL DEFAULT 0`         |
//! | uint64, fixed64                   | `bigint UNSIGNED NOT NULL DEFAULT 0`|
//! | float / double                    | `float` / `double NOT NULL DEFAULT 0`|
//! | string                            | `text`                              |
//! | bytes, message, group, repeated   | `blob`                              |
//!
//! String primary key columns are `varchar(255) NOT NULL`. SQLite integers
//! are signed 64-bit, so the SQLite dialect keeps uint64 / fixed64 columns as
//! text to hold the full range.

use crate::command::{quote, SqlCommand, SqlParam};
use recmap_core::{FieldDescriptor, FieldKind, Schema};
use recmap_mapping::{is_blob_field, FieldSets};

/// SQL flavor used for DDL text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    /// SQLite (bundled executor)
    #[default]
    Sqlite,
    /// MySQL / InnoDB
    MySql,
}

impl SqlDialect {
    /// Lowercase dialect name
    pub fn as_str(self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "sqlite",
            SqlDialect::MySql => "mysql",
        }
    }
}

/// Everything needed to render one table's DDL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    table_name: String,
    full_name: String,
    primary_keys: Vec<String>,
    columns: Vec<String>,
    dialect: SqlDialect,
}

impl TableInfo {
    /// Table layout for `schema` in `dialect`
    pub fn new(schema: &Schema, sets: &FieldSets, dialect: SqlDialect) -> Self {
        let columns = schema
            .fields()
            .iter()
            .map(|fd| column_sql(fd, sets.is_primary_key(fd.name()), dialect))
            .collect();
        TableInfo {
            table_name: schema.name().to_string(),
            full_name: schema.full_name().to_string(),
            primary_keys: sets.primary_keys().to_vec(),
            columns,
            dialect,
        }
    }

    /// Column definitions in schema declaration order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `CREATE TABLE IF NOT EXISTS` statement
    pub fn create_sql(&self) -> String {
        let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (\n", quote(&self.table_name));
        for column in &self.columns {
            sql.push_str("    ");
            sql.push_str(column);
            sql.push_str(",\n");
        }
        let keys: Vec<String> = self.primary_keys.iter().map(|k| quote(k)).collect();
        sql.push_str(&format!("    PRIMARY KEY ({})\n)", keys.join(", ")));
        if self.dialect == SqlDialect::MySql {
            sql.push_str(&format!(
                " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COMMENT='{}'",
                self.full_name
            ));
        }
        sql
    }

    /// `DROP TABLE IF EXISTS` statement
    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", quote(&self.table_name))
    }

    /// Query returning one row when the table exists
    pub fn exists_command(&self) -> SqlCommand {
        let text = match self.dialect {
            SqlDialect::Sqlite => "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            SqlDialect::MySql => {
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?"
            }
        };
        SqlCommand::with_params(text, vec![SqlParam::Text(self.table_name.clone())])
    }
}

fn column_sql(fd: &FieldDescriptor, is_key: bool, dialect: SqlDialect) -> String {
    let name = quote(fd.name());
    if is_blob_field(fd) {
        return format!("{} blob", name);
    }
    if is_key && fd.kind() == FieldKind::String {
        return format!("{} varchar(255) NOT NULL", name);
    }
    let ty = match fd.kind() {
        FieldKind::Bool => "tinyint NOT NULL DEFAULT 0",
        FieldKind::Enum | FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => {
            "int NOT NULL DEFAULT 0"
        }
        FieldKind::Uint32 | FieldKind::Fixed32 => "int UNSIGNED NOT NULL DEFAULT 0",
        FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => "bigint NOT NULL DEFAULT 0",
        FieldKind::Uint64 | FieldKind::Fixed64 => match dialect {
            SqlDialect::MySql => "bigint UNSIGNED NOT NULL DEFAULT 0",
            SqlDialect::Sqlite => "text NOT NULL DEFAULT '0'",
        },
        FieldKind::Float => "float NOT NULL DEFAULT 0",
        FieldKind::Double => "double NOT NULL DEFAULT 0",
        FieldKind::String => "text",
        FieldKind::Bytes | FieldKind::Message | FieldKind::Group => "blob",
    };
    format!("{} {}", name, ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recmap_core::testing::{account_schema, player_schema};
    use recmap_core::SchemaBuilder;
    use recmap_mapping::classify;

    fn info(schema: &Schema, dialect: SqlDialect) -> TableInfo {
        TableInfo::new(schema, &classify(schema).unwrap(), dialect)
    }

    #[test]
    fn test_mysql_account_table() {
        let sql = info(&account_schema(), SqlDialect::MySql).create_sql();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS `Account` (\n\
             \x20   `id` bigint UNSIGNED NOT NULL DEFAULT 0,\n\
             \x20   `name` text,\n\
             \x20   `coins` bigint NOT NULL DEFAULT 0,\n\
             \x20   PRIMARY KEY (`id`)\n\
             ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COMMENT='game.Account'"
        );
    }

    #[test]
    fn test_sqlite_omits_table_options() {
        let sql = info(&account_schema(), SqlDialect::Sqlite).create_sql();
        assert!(sql.ends_with("PRIMARY KEY (`id`)\n)"));
        assert!(sql.contains("`id` text NOT NULL DEFAULT '0'"));
    }

    #[test]
    fn test_player_column_types() {
        let table = info(&player_schema(), SqlDialect::MySql);
        let columns = table.columns();
        let find = |name: &str| {
            columns
                .iter()
                .find(|c| c.starts_with(&format!("`{}` ", name)))
                .cloned()
                .unwrap()
        };
        assert_eq!(find("online"), "`online` tinyint NOT NULL DEFAULT 0");
        assert_eq!(find("role"), "`role` int NOT NULL DEFAULT 0");
        assert_eq!(find("zone"), "`zone` int UNSIGNED NOT NULL DEFAULT 0");
        assert_eq!(find("ratio"), "`ratio` float NOT NULL DEFAULT 0");
        assert_eq!(find("score"), "`score` double NOT NULL DEFAULT 0");
        assert_eq!(find("avatar"), "`avatar` blob");
        assert_eq!(find("history"), "`history` blob");
        assert_eq!(find("stats"), "`stats` blob");
        assert!(table.create_sql().contains("PRIMARY KEY (`id`, `zone`)"));
    }

    #[test]
    fn test_string_key_is_varchar() {
        let schema = SchemaBuilder::new("t.User")
            .field("email", 1, FieldKind::String)
            .field("bio", 2, FieldKind::String)
            .primary_key("email")
            .build()
            .unwrap();
        let table = info(&schema, SqlDialect::Sqlite);
        assert_eq!(table.columns()[0], "`email` varchar(255) NOT NULL");
        assert_eq!(table.columns()[1], "`bio` text");
    }

    #[test]
    fn test_drop_and_exists() {
        let table = info(&account_schema(), SqlDialect::Sqlite);
        assert_eq!(table.drop_sql(), "DROP TABLE IF EXISTS `Account`");
        let cmd = table.exists_command();
        assert!(cmd.text.contains("sqlite_master"));
        assert_eq!(cmd.params, vec![SqlParam::Text("Account".into())]);

        let mysql = info(&account_schema(), SqlDialect::MySql).exists_command();
        assert!(mysql.text.contains("information_schema.tables"));
    }
}
