//! Relational store seam

use crate::command::SqlCommand;
use crate::ddl::SqlDialect;
use bytes::Bytes;
use recmap_core::{CallContext, Result};
use recmap_mapping::{FieldValue, FieldValueMap};

/// One column value of a result row
#[derive(Debug, Clone, PartialEq)]
pub enum SqlCell {
    /// SQL NULL
    Null,
    /// Integer column
    Integer(i64),
    /// Floating point column
    Real(f64),
    /// Text column
    Text(String),
    /// Blob column
    Blob(Vec<u8>),
}

/// One result row as (column name, value) pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    columns: Vec<(String, SqlCell)>,
}

impl SqlRow {
    /// Empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column
    pub fn push(&mut self, name: impl Into<String>, cell: SqlCell) {
        self.columns.push((name.into(), cell));
    }

    /// Columns in result order
    pub fn columns(&self) -> &[(String, SqlCell)] {
        &self.columns
    }

    /// Convert to a field-value map; NULL columns are left out
    pub fn into_field_map(self) -> FieldValueMap {
        self.columns
            .into_iter()
            .filter_map(|(name, cell)| {
                let value = match cell {
                    SqlCell::Null => return None,
                    SqlCell::Integer(n) => FieldValue::Scalar(n.to_string()),
                    SqlCell::Real(f) => FieldValue::Scalar(f.to_string()),
                    SqlCell::Text(s) => FieldValue::Scalar(s),
                    SqlCell::Blob(b) => FieldValue::Blob(Bytes::from(b)),
                };
                Some((name, value))
            })
            .collect()
    }
}

/// Executes parameterized statements against a relational store
///
/// Implementations own connection handling and thread-safety. They receive
/// the caller's context unchanged.
pub trait SqlExecutor: Send + Sync {
    /// Dialect the store speaks
    fn dialect(&self) -> SqlDialect;

    /// Run a query and return its first row, if any
    fn query_row(&self, ctx: &CallContext, cmd: &SqlCommand) -> Result<Option<SqlRow>>;

    /// Run a statement and return the affected row count
    fn execute(&self, ctx: &CallContext, cmd: &SqlCommand) -> Result<usize>;
}
