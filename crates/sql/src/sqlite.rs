//! SQLite executor
//!
//! One connection serialized behind a mutex. Statements are prepared through
//! the connection's statement cache.

use crate::command::{SqlCommand, SqlParam};
use crate::ddl::SqlDialect;
use crate::executor::{SqlCell, SqlExecutor, SqlRow};
use parking_lot::Mutex;
use recmap_core::{CallContext, ConflictKind, Error, Result};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{ffi, params_from_iter, Connection, ErrorCode};
use std::path::Path;
use tracing::info;

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::Integer(n) => ToSqlOutput::Borrowed(ValueRef::Integer(*n)),
            SqlParam::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlParam::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlParam::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// [`SqlExecutor`] over a `rusqlite` connection
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| Error::backend_with(format!("open sqlite {}", path.display()), e))?;
        info!(target: "recmap::sql", path = %path.display(), "opened sqlite database");
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::backend_with("open sqlite in memory", e))?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: Connection) -> Self {
        SqliteExecutor {
            conn: Mutex::new(conn),
        }
    }
}

impl std::fmt::Debug for SqliteExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteExecutor").finish_non_exhaustive()
    }
}

/// Map a driver error; key and unique constraint failures become conflicts
fn map_error(cmd: &SqlCommand, err: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        if failure.code == ErrorCode::ConstraintViolation
            && (failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE)
        {
            return Error::conflict(ConflictKind::AlreadyExists, cmd.text.clone());
        }
    }
    Error::backend_with(format!("sqlite: {}", cmd.text), err)
}

fn cell(value: ValueRef<'_>) -> Result<SqlCell> {
    Ok(match value {
        ValueRef::Null => SqlCell::Null,
        ValueRef::Integer(n) => SqlCell::Integer(n),
        ValueRef::Real(f) => SqlCell::Real(f),
        ValueRef::Text(t) => SqlCell::Text(
            std::str::from_utf8(t)
                .map_err(|_| Error::Unmarshal("text column is not valid UTF-8".to_string()))?
                .to_string(),
        ),
        ValueRef::Blob(b) => SqlCell::Blob(b.to_vec()),
    })
}

impl SqlExecutor for SqliteExecutor {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn query_row(&self, ctx: &CallContext, cmd: &SqlCommand) -> Result<Option<SqlRow>> {
        ctx.check()?;
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&cmd.text).map_err(|e| map_error(cmd, e))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt
            .query(params_from_iter(cmd.params.iter()))
            .map_err(|e| map_error(cmd, e))?;
        let Some(row) = rows.next().map_err(|e| map_error(cmd, e))? else {
            return Ok(None);
        };
        let mut out = SqlRow::new();
        for (i, name) in names.into_iter().enumerate() {
            let value = row.get_ref(i).map_err(|e| map_error(cmd, e))?;
            out.push(name, cell(value)?);
        }
        Ok(Some(out))
    }

    fn execute(&self, ctx: &CallContext, cmd: &SqlCommand) -> Result<usize> {
        ctx.check()?;
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&cmd.text).map_err(|e| map_error(cmd, e))?;
        stmt.execute(params_from_iter(cmd.params.iter()))
            .map_err(|e| map_error(cmd, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec() -> SqliteExecutor {
        let exec = SqliteExecutor::open_in_memory().unwrap();
        let ctx = CallContext::background();
        exec.execute(
            &ctx,
            &SqlCommand::new("CREATE TABLE t (k text PRIMARY KEY, v blob)"),
        )
        .unwrap();
        exec
    }

    #[test]
    fn test_execute_and_query() {
        let exec = exec();
        let ctx = CallContext::background();
        let insert = SqlCommand::with_params(
            "INSERT INTO t (k, v) VALUES (?, ?)",
            vec![SqlParam::Text("a".into()), SqlParam::Blob(vec![1u8, 2].into())],
        );
        assert_eq!(exec.execute(&ctx, &insert).unwrap(), 1);

        let select = SqlCommand::with_params(
            "SELECT k, v FROM t WHERE k = ?",
            vec![SqlParam::Text("a".into())],
        );
        let row = exec.query_row(&ctx, &select).unwrap().unwrap();
        assert_eq!(
            row.columns(),
            &[
                ("k".to_string(), SqlCell::Text("a".into())),
                ("v".to_string(), SqlCell::Blob(vec![1, 2])),
            ]
        );

        let missing = SqlCommand::with_params(
            "SELECT k FROM t WHERE k = ?",
            vec![SqlParam::Text("zz".into())],
        );
        assert!(exec.query_row(&ctx, &missing).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_key_is_conflict() {
        let exec = exec();
        let ctx = CallContext::background();
        let insert = SqlCommand::with_params(
            "INSERT INTO t (k) VALUES (?)",
            vec![SqlParam::Text("a".into())],
        );
        exec.execute(&ctx, &insert).unwrap();
        let err = exec.execute(&ctx, &insert).unwrap_err();
        assert!(err.is_conflict(Some(ConflictKind::AlreadyExists)));
    }

    #[test]
    fn test_bad_sql_is_backend_error() {
        let exec = exec();
        let err = exec
            .execute(&CallContext::background(), &SqlCommand::new("NOT SQL"))
            .unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
    }

    #[test]
    fn test_cancelled_context_refused() {
        let exec = exec();
        let ctx = CallContext::background();
        ctx.cancel();
        let err = exec
            .execute(&ctx, &SqlCommand::new("SELECT 1"))
            .unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
    }
}
