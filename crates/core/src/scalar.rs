//! Scalar codec: field value <-> string, keyed by field kind
//!
//! Scalar strings are what the relational store binds as column parameters
//! and what the hash store keeps as field values, so the format must be
//! stable and parseable by both stores:
//!
//! - bool: `"1"` / `"0"` (parsing also accepts `"true"`, `"false"` and `""`)
//! - integers and enums: decimal
//! - float / double: shortest round-trip decimal
//! - string: verbatim

use crate::error::{Error, Result};
use crate::schema::FieldKind;
use crate::value::Value;

/// Render a scalar value as its stored string
pub fn format_scalar(kind: FieldKind, value: &Value) -> Result<String> {
    if !value.matches_kind(kind) {
        return Err(Error::Marshal(format!(
            "{} value cannot be stored as {}",
            value.type_name(),
            kind
        )));
    }
    let s = match value {
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::I32(n) | Value::Enum(n) => n.to_string(),
        Value::I64(n) => n.to_string(),
        Value::U32(n) => n.to_string(),
        Value::U64(n) => n.to_string(),
        Value::F32(f) => f.to_string(),
        Value::F64(f) => f.to_string(),
        Value::String(s) => s.clone(),
        Value::Bytes(_) | Value::Message(_) | Value::List(_) => {
            return Err(Error::Marshal(format!(
                "{} is not a scalar kind",
                kind
            )))
        }
    };
    Ok(s)
}

/// Stored string of the zero value of a scalar kind
pub fn default_scalar_string(kind: FieldKind) -> Result<String> {
    match Value::scalar_default(kind) {
        Some(Value::Bytes(_)) | None => Err(Error::Marshal(format!(
            "{} is not a scalar kind",
            kind
        ))),
        Some(v) => format_scalar(kind, &v),
    }
}

/// Parse a stored string back into a value of `kind`
pub fn parse_scalar(kind: FieldKind, s: &str) -> Result<Value> {
    let parsed = match kind {
        FieldKind::String => Some(Value::String(s.to_string())),
        FieldKind::Bool => match s {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" | "" => Some(Value::Bool(false)),
            _ => None,
        },
        FieldKind::Enum => s.parse().ok().map(Value::Enum),
        FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => {
            s.parse().ok().map(Value::I32)
        }
        FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => {
            s.parse().ok().map(Value::I64)
        }
        FieldKind::Uint32 | FieldKind::Fixed32 => s.parse().ok().map(Value::U32),
        FieldKind::Uint64 | FieldKind::Fixed64 => s.parse().ok().map(Value::U64),
        FieldKind::Float => s.parse::<f64>().ok().map(|f| Value::F32(f as f32)),
        FieldKind::Double => s.parse().ok().map(Value::F64),
        FieldKind::Bytes | FieldKind::Message | FieldKind::Group => {
            return Err(Error::Unmarshal(format!("{} is not a scalar kind", kind)))
        }
    };
    parsed.ok_or_else(|| Error::Unmarshal(format!("invalid {} value '{}'", kind, s)))
}
