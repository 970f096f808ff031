//! Record schemas
//!
//! A [`Schema`] is the explicit description of one record type: an ordered
//! list of field descriptors (name, stable number, kind, cardinality) plus
//! record-level options. The primary key is declared through the
//! [`PRIMARY_KEY_OPTION`] option as a comma-separated list of field names.
//!
//! Schemas are immutable once built and shared through `Arc`.
//!
//! ```
//! use recmap_core::{FieldKind, SchemaBuilder};
//!
//! let account = SchemaBuilder::new("game.Account")
//!     .field("id", 1, FieldKind::Uint64)
//!     .field("name", 2, FieldKind::String)
//!     .field("coins", 3, FieldKind::Int64)
//!     .primary_key("id")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(account.name(), "Account");
//! assert_eq!(account.primary_key_names(), vec!["id"]);
//! ```

use crate::wire::WireType;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Record option holding the comma-separated primary key field names
pub const PRIMARY_KEY_OPTION: &str = "primary_key";

/// Largest field number the wire format can carry
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Field value kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Boolean
    Bool,
    /// Enumeration, carried as its i32 number
    Enum,
    /// Signed 32-bit, varint
    Int32,
    /// Signed 32-bit, zigzag varint
    Sint32,
    /// Signed 32-bit, fixed width
    Sfixed32,
    /// Signed 64-bit, varint
    Int64,
    /// Signed 64-bit, zigzag varint
    Sint64,
    /// Signed 64-bit, fixed width
    Sfixed64,
    /// Unsigned 32-bit, varint
    Uint32,
    /// Unsigned 32-bit, fixed width
    Fixed32,
    /// Unsigned 64-bit, varint
    Uint64,
    /// Unsigned 64-bit, fixed width
    Fixed64,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// UTF-8 string
    String,
    /// Raw bytes
    Bytes,
    /// Nested record, length delimited
    Message,
    /// Nested record, start/end group delimited
    Group,
}

impl FieldKind {
    /// Integer kinds of any width or encoding
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            FieldKind::Int32
                | FieldKind::Sint32
                | FieldKind::Sfixed32
                | FieldKind::Int64
                | FieldKind::Sint64
                | FieldKind::Sfixed64
                | FieldKind::Uint32
                | FieldKind::Fixed32
                | FieldKind::Uint64
                | FieldKind::Fixed64
        )
    }

    /// Integer or floating point kinds
    pub fn is_numeric(self) -> bool {
        self.is_integer() || matches!(self, FieldKind::Float | FieldKind::Double)
    }

    /// Kinds that are always carried as encoded bytes, never as a scalar string
    pub fn is_blob_kind(self) -> bool {
        matches!(self, FieldKind::Bytes | FieldKind::Message | FieldKind::Group)
    }

    /// Kinds whose repeated form is packed into one length-delimited entry
    pub fn is_packable(self) -> bool {
        self.is_numeric() || matches!(self, FieldKind::Bool | FieldKind::Enum)
    }

    /// Kinds that hold a nested record
    pub fn is_message(self) -> bool {
        matches!(self, FieldKind::Message | FieldKind::Group)
    }

    /// Wire type of one singular value of this kind
    pub fn wire_type(self) -> WireType {
        match self {
            FieldKind::Bool
            | FieldKind::Enum
            | FieldKind::Int32
            | FieldKind::Sint32
            | FieldKind::Int64
            | FieldKind::Sint64
            | FieldKind::Uint32
            | FieldKind::Uint64 => WireType::Varint,
            FieldKind::Sfixed32 | FieldKind::Fixed32 | FieldKind::Float => WireType::Fixed32,
            FieldKind::Sfixed64 | FieldKind::Fixed64 | FieldKind::Double => WireType::Fixed64,
            FieldKind::String | FieldKind::Bytes | FieldKind::Message => WireType::Len,
            FieldKind::Group => WireType::StartGroup,
        }
    }

    /// Lowercase kind name
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::Enum => "enum",
            FieldKind::Int32 => "int32",
            FieldKind::Sint32 => "sint32",
            FieldKind::Sfixed32 => "sfixed32",
            FieldKind::Int64 => "int64",
            FieldKind::Sint64 => "sint64",
            FieldKind::Sfixed64 => "sfixed64",
            FieldKind::Uint32 => "uint32",
            FieldKind::Fixed32 => "fixed32",
            FieldKind::Uint64 => "uint64",
            FieldKind::Fixed64 => "fixed64",
            FieldKind::Float => "float",
            FieldKind::Double => "double",
            FieldKind::String => "string",
            FieldKind::Bytes => "bytes",
            FieldKind::Message => "message",
            FieldKind::Group => "group",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Singular or repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// At most one value
    Singular,
    /// Zero or more values
    Repeated,
}

/// One field of a record type
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    number: u32,
    kind: FieldKind,
    cardinality: Cardinality,
    message_type: Option<Arc<Schema>>,
}

impl FieldDescriptor {
    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stable field number
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Field kind
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Field cardinality
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Whether the field is repeated
    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    /// Schema of the nested record for message and group fields
    pub fn message_type(&self) -> Option<&Arc<Schema>> {
        self.message_type.as_ref()
    }
}

/// Schema construction and classification errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Type or field name is not a plain identifier
    #[error("invalid name '{name}'")]
    InvalidName {
        /// Offending name
        name: String,
    },

    /// Field number outside 1..=MAX_FIELD_NUMBER
    #[error("field {field} has invalid number {number}")]
    InvalidFieldNumber {
        /// Field name
        field: String,
        /// Offending number
        number: u32,
    },

    /// Two fields share a name
    #[error("duplicate field name '{field}' in {type_name}")]
    DuplicateFieldName {
        /// Record type
        type_name: String,
        /// Field name
        field: String,
    },

    /// Two fields share a number
    #[error("duplicate field number {number} in {type_name}")]
    DuplicateFieldNumber {
        /// Record type
        type_name: String,
        /// Field number
        number: u32,
    },

    /// Message or group field declared without its nested schema
    #[error("field {field} in {type_name} needs a message type")]
    MissingMessageType {
        /// Record type
        type_name: String,
        /// Field name
        field: String,
    },

    /// No primary key option on the record type
    #[error("no primary key declared for {type_name}")]
    MissingPrimaryKey {
        /// Record type
        type_name: String,
    },

    /// Primary key names a field the record does not have
    #[error("primary key field '{field}' not found in {type_name}")]
    UnknownPrimaryKeyField {
        /// Record type
        type_name: String,
        /// Field name
        field: String,
    },

    /// Primary key names a field that cannot be rendered as a scalar string
    #[error("primary key field '{field}' in {type_name} must be a singular scalar")]
    UnsupportedPrimaryKeyField {
        /// Record type
        type_name: String,
        /// Field name
        field: String,
    },

    /// Primary key lists a field twice
    #[error("primary key field '{field}' listed twice in {type_name}")]
    DuplicatePrimaryKeyField {
        /// Record type
        type_name: String,
        /// Field name
        field: String,
    },
}

/// Ordered field list and options for one record type
#[derive(Debug, PartialEq)]
pub struct Schema {
    name: String,
    full_name: String,
    fields: Vec<FieldDescriptor>,
    by_number: Vec<usize>,
    name_index: HashMap<String, usize>,
    number_index: HashMap<u32, usize>,
    options: BTreeMap<String, String>,
}

impl Schema {
    /// Short type name (last segment of the full name)
    ///
    /// Used as the table name and as the hash key prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package-qualified type name
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Fields in ascending field-number order
    pub fn fields_by_number(&self) -> impl Iterator<Item = &FieldDescriptor> + '_ {
        self.by_number.iter().map(move |&i| &self.fields[i])
    }

    /// Look up a field by name
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.name_index.get(name).map(|&i| &self.fields[i])
    }

    /// Look up a field by number
    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.number_index.get(&number).map(|&i| &self.fields[i])
    }

    /// Record-level option value
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Declared primary key names, in declaration order
    ///
    /// Empty when the record carries no primary key option. Whitespace
    /// around names is ignored.
    pub fn primary_key_names(&self) -> Vec<&str> {
        self.option(PRIMARY_KEY_OPTION)
            .map(|keys| {
                keys.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for [`Schema`]
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    full_name: String,
    fields: Vec<FieldDescriptor>,
    options: BTreeMap<String, String>,
}

impl SchemaBuilder {
    /// Start a schema for the given package-qualified type name
    pub fn new(full_name: impl Into<String>) -> Self {
        SchemaBuilder {
            full_name: full_name.into(),
            fields: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    fn push(
        mut self,
        name: impl Into<String>,
        number: u32,
        kind: FieldKind,
        cardinality: Cardinality,
        message_type: Option<Arc<Schema>>,
    ) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            number,
            kind,
            cardinality,
            message_type,
        });
        self
    }

    /// Add a singular field
    pub fn field(self, name: impl Into<String>, number: u32, kind: FieldKind) -> Self {
        self.push(name, number, kind, Cardinality::Singular, None)
    }

    /// Add a repeated field
    pub fn repeated(self, name: impl Into<String>, number: u32, kind: FieldKind) -> Self {
        self.push(name, number, kind, Cardinality::Repeated, None)
    }

    /// Add a singular nested message field
    pub fn message(self, name: impl Into<String>, number: u32, schema: Arc<Schema>) -> Self {
        self.push(name, number, FieldKind::Message, Cardinality::Singular, Some(schema))
    }

    /// Add a repeated nested message field
    pub fn repeated_message(
        self,
        name: impl Into<String>,
        number: u32,
        schema: Arc<Schema>,
    ) -> Self {
        self.push(name, number, FieldKind::Message, Cardinality::Repeated, Some(schema))
    }

    /// Add a singular group field
    pub fn group(self, name: impl Into<String>, number: u32, schema: Arc<Schema>) -> Self {
        self.push(name, number, FieldKind::Group, Cardinality::Singular, Some(schema))
    }

    /// Declare the primary key as comma-separated field names
    pub fn primary_key(self, keys: &str) -> Self {
        self.option(PRIMARY_KEY_OPTION, keys)
    }

    /// Set a record-level option
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Validate and freeze the schema
    ///
    /// The primary key is not validated here; records without one are legal
    /// schemas but are rejected when bound to a store.
    pub fn build(self) -> Result<Arc<Schema>, SchemaError> {
        if self.full_name.is_empty() || !self.full_name.split('.').all(is_identifier) {
            return Err(SchemaError::InvalidName {
                name: self.full_name,
            });
        }
        let name = self
            .full_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.full_name)
            .to_string();

        let mut name_index = HashMap::with_capacity(self.fields.len());
        let mut number_index = HashMap::with_capacity(self.fields.len());
        for (i, fd) in self.fields.iter().enumerate() {
            if !is_identifier(&fd.name) {
                return Err(SchemaError::InvalidName {
                    name: fd.name.clone(),
                });
            }
            if fd.number == 0 || fd.number > MAX_FIELD_NUMBER {
                return Err(SchemaError::InvalidFieldNumber {
                    field: fd.name.clone(),
                    number: fd.number,
                });
            }
            if fd.kind.is_message() && fd.message_type.is_none() {
                return Err(SchemaError::MissingMessageType {
                    type_name: self.full_name.clone(),
                    field: fd.name.clone(),
                });
            }
            if name_index.insert(fd.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateFieldName {
                    type_name: self.full_name.clone(),
                    field: fd.name.clone(),
                });
            }
            if number_index.insert(fd.number, i).is_some() {
                return Err(SchemaError::DuplicateFieldNumber {
                    type_name: self.full_name.clone(),
                    number: fd.number,
                });
            }
        }

        let mut by_number: Vec<usize> = (0..self.fields.len()).collect();
        by_number.sort_by_key(|&i| self.fields[i].number);

        Ok(Arc::new(Schema {
            name,
            full_name: self.full_name,
            fields: self.fields,
            by_number,
            name_index,
            number_index,
            options: self.options,
        }))
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Arc<Schema> {
        SchemaBuilder::new("game.Account")
            .field("id", 1, FieldKind::Uint64)
            .field("coins", 3, FieldKind::Int64)
            .field("name", 2, FieldKind::String)
            .primary_key("id")
            .build()
            .unwrap()
    }

    #[test]
    fn test_names() {
        let schema = account();
        assert_eq!(schema.name(), "Account");
        assert_eq!(schema.full_name(), "game.Account");
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_lookup_by_name_and_number() {
        let schema = account();
        assert_eq!(schema.field_by_name("coins").unwrap().number(), 3);
        assert_eq!(schema.field_by_number(2).unwrap().name(), "name");
        assert!(schema.field_by_name("missing").is_none());
        assert!(schema.field_by_number(9).is_none());
    }

    #[test]
    fn test_declaration_and_number_order() {
        let schema = account();
        let declared: Vec<_> = schema.fields().iter().map(|f| f.name()).collect();
        assert_eq!(declared, vec!["id", "coins", "name"]);
        let numbered: Vec<_> = schema.fields_by_number().map(|f| f.name()).collect();
        assert_eq!(numbered, vec!["id", "name", "coins"]);
    }

    #[test]
    fn test_primary_key_names_trimmed() {
        let schema = SchemaBuilder::new("Pair")
            .field("zone", 1, FieldKind::Uint32)
            .field("id", 2, FieldKind::Uint64)
            .primary_key(" zone , id ")
            .build()
            .unwrap();
        assert_eq!(schema.primary_key_names(), vec!["zone", "id"]);
    }

    #[test]
    fn test_no_primary_key_is_empty() {
        let schema = SchemaBuilder::new("Loose")
            .field("a", 1, FieldKind::Bool)
            .build()
            .unwrap();
        assert!(schema.primary_key_names().is_empty());
    }

    #[test]
    fn test_duplicate_number_rejected() {
        let err = SchemaBuilder::new("Bad")
            .field("a", 1, FieldKind::Bool)
            .field("b", 1, FieldKind::Bool)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateFieldNumber { number: 1, .. }));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = SchemaBuilder::new("Bad")
            .field("a", 1, FieldKind::Bool)
            .field("a", 2, FieldKind::Bool)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateFieldName { .. }));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let zero = SchemaBuilder::new("Bad").field("a", 0, FieldKind::Bool).build();
        assert!(matches!(zero, Err(SchemaError::InvalidFieldNumber { number: 0, .. })));

        let huge = SchemaBuilder::new("Bad")
            .field("a", MAX_FIELD_NUMBER + 1, FieldKind::Bool)
            .build();
        assert!(matches!(huge, Err(SchemaError::InvalidFieldNumber { .. })));
    }

    #[test]
    fn test_invalid_identifiers_rejected() {
        assert!(SchemaBuilder::new("").build().is_err());
        assert!(SchemaBuilder::new("game..Account").build().is_err());
        let err = SchemaBuilder::new("Bad")
            .field("drop table", 1, FieldKind::Bool)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidName { .. }));
    }

    #[test]
    fn test_message_field_needs_type() {
        let err = SchemaBuilder::new("Bad")
            .field("inner", 1, FieldKind::Message)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingMessageType { .. }));
    }

    #[test]
    fn test_kind_predicates() {
        assert!(FieldKind::Sfixed64.is_integer());
        assert!(!FieldKind::Bool.is_integer());
        assert!(FieldKind::Double.is_numeric());
        assert!(!FieldKind::Enum.is_numeric());
        assert!(FieldKind::Group.is_blob_kind());
        assert!(!FieldKind::String.is_blob_kind());
        assert!(FieldKind::Enum.is_packable());
        assert!(!FieldKind::String.is_packable());
        assert_eq!(FieldKind::Float.wire_type(), WireType::Fixed32);
        assert_eq!(FieldKind::Sint64.wire_type(), WireType::Varint);
        assert_eq!(FieldKind::Group.wire_type(), WireType::StartGroup);
    }
}
