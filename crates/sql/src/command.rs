//! Parameterized SQL statements

use bytes::Bytes;
use recmap_core::{parse_scalar, Error, FieldKind, Result, Value};
use recmap_mapping::FieldValue;
use std::fmt;

/// One bound parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// Integer column value
    Integer(i64),
    /// Floating point column value, bound exactly
    Real(f64),
    /// Scalar string
    Text(String),
    /// Encoded blob column
    Blob(Bytes),
}

impl SqlParam {
    /// Parameter for a scalar string of `kind`
    ///
    /// Integer and floating point kinds bind as typed values so the store
    /// never parses the decimal text itself. uint64 / fixed64 stay text,
    /// since their range exceeds a signed column value.
    pub fn scalar(kind: FieldKind, s: &str) -> Result<Self> {
        if !(kind.is_numeric() || matches!(kind, FieldKind::Bool | FieldKind::Enum))
            || matches!(kind, FieldKind::Uint64 | FieldKind::Fixed64)
        {
            return Ok(SqlParam::Text(s.to_string()));
        }
        Ok(match parse_scalar(kind, s)? {
            Value::Bool(b) => SqlParam::Integer(i64::from(b)),
            Value::I32(n) | Value::Enum(n) => SqlParam::Integer(i64::from(n)),
            Value::I64(n) => SqlParam::Integer(n),
            Value::U32(n) => SqlParam::Integer(i64::from(n)),
            Value::F32(f) => SqlParam::Real(f64::from(f)),
            Value::F64(f) => SqlParam::Real(f),
            other => {
                return Err(Error::Marshal(format!(
                    "{} value cannot be bound as {}",
                    other.type_name(),
                    kind
                )))
            }
        })
    }

    /// Parameter for one field-map value of `kind`
    pub fn field(kind: FieldKind, value: &FieldValue) -> Result<Self> {
        match value {
            FieldValue::Scalar(s) => Self::scalar(kind, s),
            FieldValue::Blob(b) => Ok(SqlParam::Blob(b.clone())),
        }
    }
}

/// Statement text with `?` placeholders and its parameters in order
#[derive(Debug, Clone, PartialEq)]
pub struct SqlCommand {
    /// Statement text
    pub text: String,
    /// Parameters, one per placeholder
    pub params: Vec<SqlParam>,
}

impl SqlCommand {
    /// Statement without parameters
    pub fn new(text: impl Into<String>) -> Self {
        SqlCommand {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// Statement with parameters
    pub fn with_params(text: impl Into<String>, params: Vec<SqlParam>) -> Self {
        SqlCommand {
            text: text.into(),
            params,
        }
    }
}

impl fmt::Display for SqlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} params]", self.text, self.params.len())
    }
}

/// Backtick-quote an identifier
///
/// Schema names are validated identifiers, so no escaping is needed.
pub(crate) fn quote(ident: &str) -> String {
    format!("`{}`", ident)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_scalars_bind_typed() {
        let bind = |kind, s| SqlParam::scalar(kind, s).unwrap();
        assert_eq!(bind(FieldKind::Bool, "1"), SqlParam::Integer(1));
        assert_eq!(bind(FieldKind::Sint32, "-12"), SqlParam::Integer(-12));
        assert_eq!(bind(FieldKind::Fixed32, "4294967295"), SqlParam::Integer(4_294_967_295));
        assert_eq!(bind(FieldKind::Double, "1e300"), SqlParam::Real(1e300));
        assert_eq!(bind(FieldKind::Float, "0.1"), SqlParam::Real(f64::from(0.1f32)));
    }

    #[test]
    fn test_text_kinds_stay_text() {
        assert_eq!(
            SqlParam::scalar(FieldKind::Uint64, "18446744073709551615").unwrap(),
            SqlParam::Text("18446744073709551615".into())
        );
        assert_eq!(
            SqlParam::scalar(FieldKind::String, "12").unwrap(),
            SqlParam::Text("12".into())
        );
    }

    #[test]
    fn test_unparseable_number_rejected() {
        assert!(SqlParam::scalar(FieldKind::Int64, "abc").is_err());
    }
}
