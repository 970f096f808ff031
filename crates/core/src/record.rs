//! Record reflection seam
//!
//! Every store adapter works against the [`Record`] trait instead of concrete
//! types. [`DynamicRecord`] implements it from a [`Schema`] table; generated
//! per-type code can implement it directly.
//!
//! ## Presence
//!
//! Singular scalar fields use implicit presence: assigning the zero value
//! clears the field, so an unset field and a zero field are the same record.
//! Nested messages have explicit presence. An empty list clears a repeated
//! field.

use crate::error::{Error, Result};
use crate::schema::{FieldDescriptor, Schema};
use crate::value::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A schema-described record
pub trait Record: Send {
    /// Schema of this record type
    fn schema(&self) -> &Arc<Schema>;

    /// Current value of a field; `None` when unset
    fn field(&self, number: u32) -> Option<Cow<'_, Value>>;

    /// Assign a field, validating the value against the descriptor
    fn set_field(&mut self, number: u32, value: Value) -> Result<()>;

    /// Reset a field to unset
    fn clear_field(&mut self, number: u32);

    /// Short type name
    fn type_name(&self) -> &str {
        self.schema().name()
    }
}

/// Table-driven record backed by a [`Schema`]
#[derive(Debug, Clone)]
pub struct DynamicRecord {
    schema: Arc<Schema>,
    values: BTreeMap<u32, Value>,
}

impl DynamicRecord {
    /// Empty record of the given type
    pub fn new(schema: Arc<Schema>) -> Self {
        DynamicRecord {
            schema,
            values: BTreeMap::new(),
        }
    }

    /// Schema of this record
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Value of a field by name; `None` when unset or unknown
    pub fn get(&self, name: &str) -> Option<&Value> {
        let fd = self.schema.field_by_name(name)?;
        self.values.get(&fd.number())
    }

    /// Value of a field by name, falling back to its zero value
    pub fn get_or_default(&self, name: &str) -> Option<Value> {
        let fd = self.schema.field_by_name(name)?;
        Some(
            self.values
                .get(&fd.number())
                .cloned()
                .unwrap_or_else(|| empty_value(fd)),
        )
    }

    /// Assign a field by name
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let number = self.number_of(name)?;
        self.set_field(number, value.into())
    }

    /// Builder-style [`set`](Self::set)
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Reset a field by name; unknown names are ignored
    pub fn clear(&mut self, name: &str) {
        if let Some(fd) = self.schema.field_by_name(name) {
            self.values.remove(&fd.number());
        }
    }

    /// Whether a field currently holds a non-default value
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set fields in ascending field-number order
    pub fn iter(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> + '_ {
        self.values.iter().filter_map(move |(number, value)| {
            self.schema.field_by_number(*number).map(|fd| (fd, value))
        })
    }

    /// Number of set fields
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no field is set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn number_of(&self, name: &str) -> Result<u32> {
        self.schema
            .field_by_name(name)
            .map(FieldDescriptor::number)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown field '{}' in {}",
                    name,
                    self.schema.full_name()
                ))
            })
    }
}

impl PartialEq for DynamicRecord {
    fn eq(&self, other: &Self) -> bool {
        self.schema.full_name() == other.schema.full_name() && self.values == other.values
    }
}

impl Record for DynamicRecord {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn field(&self, number: u32) -> Option<Cow<'_, Value>> {
        self.values.get(&number).map(Cow::Borrowed)
    }

    fn set_field(&mut self, number: u32, value: Value) -> Result<()> {
        let fd = self.schema.field_by_number(number).ok_or_else(|| {
            Error::Validation(format!(
                "unknown field number {} in {}",
                number,
                self.schema.full_name()
            ))
        })?;
        match normalize(fd, value)? {
            Some(value) => {
                self.values.insert(number, value);
            }
            None => {
                self.values.remove(&number);
            }
        }
        Ok(())
    }

    fn clear_field(&mut self, number: u32) {
        self.values.remove(&number);
    }
}

fn empty_value(fd: &FieldDescriptor) -> Value {
    if fd.is_repeated() {
        Value::List(Vec::new())
    } else {
        Value::default_for(fd)
    }
}

/// Validate `value` for `fd`; `None` means the assignment clears the field
fn normalize(fd: &FieldDescriptor, value: Value) -> Result<Option<Value>> {
    if fd.is_repeated() {
        let items = match value {
            Value::List(items) => items,
            other => {
                return Err(Error::Validation(format!(
                    "field {} is repeated, got {}",
                    fd.name(),
                    other.type_name()
                )))
            }
        };
        let items = items
            .into_iter()
            .map(|item| normalize_element(fd, item))
            .collect::<Result<Vec<_>>>()?;
        return Ok(if items.is_empty() {
            None
        } else {
            Some(Value::List(items))
        });
    }
    let value = normalize_element(fd, value)?;
    Ok(if value.is_default() { None } else { Some(value) })
}

fn normalize_element(fd: &FieldDescriptor, value: Value) -> Result<Value> {
    let found = value.type_name();
    let value = value.coerce_to(fd.kind()).ok_or_else(|| {
        Error::Validation(format!(
            "field {} expects {}, got {}",
            fd.name(),
            fd.kind(),
            found
        ))
    })?;
    if let (Value::Message(inner), Some(expected)) = (&value, fd.message_type()) {
        if inner.schema().full_name() != expected.full_name() {
            return Err(Error::Validation(format!(
                "field {} expects {}, got {}",
                fd.name(),
                expected.full_name(),
                inner.schema().full_name()
            )));
        }
    }
    Ok(value)
}
