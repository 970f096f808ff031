//! Unified field value

use crate::record::DynamicRecord;
use crate::schema::{FieldDescriptor, FieldKind};

/// Value of one record field
///
/// Integer variants are keyed by width and signedness, not by wire
/// encoding: `Int32`, `Sint32` and `Sfixed32` fields all hold `I32`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Signed 32-bit
    I32(i32),
    /// Signed 64-bit
    I64(i64),
    /// Unsigned 32-bit
    U32(u32),
    /// Unsigned 64-bit
    U64(u64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// Enum number
    Enum(i32),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Nested record
    Message(Box<DynamicRecord>),
    /// Elements of a repeated field
    List(Vec<Value>),
}

impl Value {
    /// Zero value for a singular field of the given descriptor
    pub fn default_for(field: &FieldDescriptor) -> Value {
        match field.kind() {
            FieldKind::Message | FieldKind::Group => match field.message_type() {
                Some(schema) => Value::Message(Box::new(DynamicRecord::new(schema.clone()))),
                None => Value::List(Vec::new()),
            },
            kind => Value::scalar_default(kind).unwrap_or(Value::List(Vec::new())),
        }
    }

    /// Zero value for a scalar kind, `None` for message kinds
    pub fn scalar_default(kind: FieldKind) -> Option<Value> {
        let v = match kind {
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Enum => Value::Enum(0),
            FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => Value::I32(0),
            FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => Value::I64(0),
            FieldKind::Uint32 | FieldKind::Fixed32 => Value::U32(0),
            FieldKind::Uint64 | FieldKind::Fixed64 => Value::U64(0),
            FieldKind::Float => Value::F32(0.0),
            FieldKind::Double => Value::F64(0.0),
            FieldKind::String => Value::String(String::new()),
            FieldKind::Bytes => Value::Bytes(Vec::new()),
            FieldKind::Message | FieldKind::Group => return None,
        };
        Some(v)
    }

    /// Whether this is the zero value of a scalar, or an empty list
    ///
    /// Messages are never default: presence of a nested record is explicit.
    pub fn is_default(&self) -> bool {
        match self {
            Value::Bool(b) => !*b,
            Value::I32(n) | Value::Enum(n) => *n == 0,
            Value::I64(n) => *n == 0,
            Value::U32(n) => *n == 0,
            Value::U64(n) => *n == 0,
            Value::F32(f) => *f == 0.0 && f.is_sign_positive(),
            Value::F64(f) => *f == 0.0 && f.is_sign_positive(),
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Message(_) => false,
        }
    }

    /// Whether this value can be stored in a singular field of `kind`
    pub fn matches_kind(&self, kind: FieldKind) -> bool {
        matches!(
            (self, kind),
            (Value::Bool(_), FieldKind::Bool)
                | (Value::Enum(_), FieldKind::Enum)
                | (
                    Value::I32(_),
                    FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32
                )
                | (
                    Value::I64(_),
                    FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64
                )
                | (Value::U32(_), FieldKind::Uint32 | FieldKind::Fixed32)
                | (Value::U64(_), FieldKind::Uint64 | FieldKind::Fixed64)
                | (Value::F32(_), FieldKind::Float)
                | (Value::F64(_), FieldKind::Double)
                | (Value::String(_), FieldKind::String)
                | (Value::Bytes(_), FieldKind::Bytes)
                | (Value::Message(_), FieldKind::Message | FieldKind::Group)
        )
    }

    /// Convert to the variant `kind` expects when no precision is lost
    ///
    /// Lets callers write `record.set("coins", 5)` for an `int64` field.
    pub fn coerce_to(self, kind: FieldKind) -> Option<Value> {
        if self.matches_kind(kind) {
            return Some(self);
        }
        let wide: i128 = match &self {
            Value::I32(n) | Value::Enum(n) => i128::from(*n),
            Value::I64(n) => i128::from(*n),
            Value::U32(n) => i128::from(*n),
            Value::U64(n) => i128::from(*n),
            Value::F32(f) if kind == FieldKind::Double => return Some(Value::F64(f64::from(*f))),
            _ => return None,
        };
        match kind {
            FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => {
                i32::try_from(wide).ok().map(Value::I32)
            }
            FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => {
                i64::try_from(wide).ok().map(Value::I64)
            }
            FieldKind::Uint32 | FieldKind::Fixed32 => u32::try_from(wide).ok().map(Value::U32),
            FieldKind::Uint64 | FieldKind::Fixed64 => u64::try_from(wide).ok().map(Value::U64),
            FieldKind::Enum => i32::try_from(wide).ok().map(Value::Enum),
            _ => None,
        }
    }

    /// Variant name, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::I32(_) => "I32",
            Value::I64(_) => "I64",
            Value::U32(_) => "U32",
            Value::U64(_) => "U64",
            Value::F32(_) => "F32",
            Value::F64(_) => "F64",
            Value::Enum(_) => "Enum",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Message(_) => "Message",
            Value::List(_) => "List",
        }
    }

    /// Borrow as a string if this is a `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the nested record if this is a `Message`
    pub fn as_message(&self) -> Option<&DynamicRecord> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow the elements if this is a `List`
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<DynamicRecord> for Value {
    fn from(v: DynamicRecord) -> Self {
        Value::Message(Box::new(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}
