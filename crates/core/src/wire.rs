//! Protobuf-compatible wire codec
//!
//! Records are encoded in ascending field-number order. Singular scalars
//! holding their zero value are omitted; nested messages are always
//! written when present. Repeated numeric, bool and enum fields are packed
//! into one length-delimited entry; repeated strings, bytes and messages
//! get one entry per element. Groups are delimited by start/end tags.
//!
//! Decoding merges into an existing record: singular scalars take the last
//! value seen, singular messages merge recursively, and repeated fields
//! append. Both packed and unpacked repeated numerics are accepted.
//! Unknown field numbers are skipped.
//!
//! [`consume_field`] walks one top-level entry without decoding it; the
//! partial codec uses it to slice blob fields out of an encoding.

use crate::error::{Error, Result};
use crate::record::{DynamicRecord, Record};
use crate::schema::{FieldDescriptor, FieldKind, MAX_FIELD_NUMBER};
use crate::value::Value;
use byteorder::{ByteOrder, LittleEndian};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// Nested message and group depth limit, for both directions
const MAX_DEPTH: usize = 64;

type WireResult<T> = std::result::Result<T, WireError>;

/// Wire type carried in the low three bits of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// Base-128 varint
    Varint,
    /// Eight little-endian bytes
    Fixed64,
    /// Varint length followed by that many bytes
    Len,
    /// Group start marker
    StartGroup,
    /// Group end marker
    EndGroup,
    /// Four little-endian bytes
    Fixed32,
}

impl WireType {
    /// Parse the low three tag bits
    pub fn from_bits(bits: u8) -> WireResult<Self> {
        match bits {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::Fixed32),
            other => Err(WireError::InvalidWireType(other)),
        }
    }

    /// Low three tag bits for this wire type
    pub fn bits(self) -> u8 {
        match self {
            WireType::Varint => 0,
            WireType::Fixed64 => 1,
            WireType::Len => 2,
            WireType::StartGroup => 3,
            WireType::EndGroup => 4,
            WireType::Fixed32 => 5,
        }
    }
}

/// Malformed encoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Input ended inside a tag, varint or payload
    #[error("encoding truncated")]
    Truncated,

    /// Varint ran past ten bytes
    #[error("varint overflows 64 bits")]
    VarintOverflow,

    /// Tag carried wire type 6 or 7
    #[error("invalid wire type {0}")]
    InvalidWireType(u8),

    /// Tag carried field number 0 or one above the maximum
    #[error("invalid field number {0}")]
    InvalidFieldNumber(u64),

    /// End-group tag with no matching start
    #[error("unexpected end of group {0}")]
    UnexpectedEndGroup(u32),

    /// Start-group tag with no matching end
    #[error("group {0} is not terminated")]
    UnterminatedGroup(u32),

    /// Known field arrived with the wrong wire type
    #[error("field {field} expects wire type {expected:?}, found {found:?}")]
    WireTypeMismatch {
        /// Field name
        field: String,
        /// Wire type the field kind uses
        expected: WireType,
        /// Wire type in the encoding
        found: WireType,
    },

    /// String field payload is not UTF-8
    #[error("field {0} is not valid UTF-8")]
    InvalidUtf8(String),

    /// Nesting exceeded the depth limit
    #[error("message nesting too deep")]
    TooDeep,
}

/// One top-level entry located by [`consume_field`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireEntry {
    /// Field number from the tag
    pub number: u32,
    /// Wire type from the tag
    pub wire_type: WireType,
    /// Total entry length in bytes, tag included
    pub len: usize,
}

// ============================================================================
// Primitives
// ============================================================================

/// Append `value` as a base-128 varint
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Decode a varint, returning the value and the bytes consumed
pub fn decode_varint(buf: &[u8]) -> WireResult<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().take(10).enumerate() {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    if buf.len() >= 10 {
        Err(WireError::VarintOverflow)
    } else {
        Err(WireError::Truncated)
    }
}

/// Zigzag-map a signed 32-bit value
pub fn zigzag_encode_32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Inverse of [`zigzag_encode_32`]
pub fn zigzag_decode_32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Zigzag-map a signed 64-bit value
pub fn zigzag_encode_64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag_encode_64`]
pub fn zigzag_decode_64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Append a field tag
pub fn encode_tag(number: u32, wire_type: WireType, buf: &mut Vec<u8>) {
    encode_varint((u64::from(number) << 3) | u64::from(wire_type.bits()), buf);
}

/// Decode a field tag into (number, wire type, bytes consumed)
pub fn decode_tag(buf: &[u8]) -> WireResult<(u32, WireType, usize)> {
    let (key, used) = decode_varint(buf)?;
    let wire_type = WireType::from_bits((key & 0x7) as u8)?;
    let number = key >> 3;
    if number == 0 || number > u64::from(MAX_FIELD_NUMBER) {
        return Err(WireError::InvalidFieldNumber(number));
    }
    Ok((number as u32, wire_type, used))
}

/// Locate the first entry of `buf` without decoding its payload
pub fn consume_field(buf: &[u8]) -> WireResult<WireEntry> {
    consume_at_depth(buf, 0)
}

fn consume_at_depth(buf: &[u8], depth: usize) -> WireResult<WireEntry> {
    let (number, wire_type, tag_len) = decode_tag(buf)?;
    let rest = &buf[tag_len..];
    let body = match wire_type {
        WireType::Varint => decode_varint(rest)?.1,
        WireType::Fixed64 => fixed_width(rest, 8)?,
        WireType::Fixed32 => fixed_width(rest, 4)?,
        WireType::Len => len_delimited(rest)?.1,
        WireType::StartGroup => group_extent(rest, number, depth + 1)?.1,
        WireType::EndGroup => return Err(WireError::UnexpectedEndGroup(number)),
    };
    Ok(WireEntry {
        number,
        wire_type,
        len: tag_len + body,
    })
}

fn fixed_width(buf: &[u8], width: usize) -> WireResult<usize> {
    if buf.len() < width {
        Err(WireError::Truncated)
    } else {
        Ok(width)
    }
}

/// Payload of a length-delimited value and the bytes consumed
fn len_delimited(buf: &[u8]) -> WireResult<(&[u8], usize)> {
    let (len, used) = decode_varint(buf)?;
    let len = usize::try_from(len).map_err(|_| WireError::Truncated)?;
    let end = used.checked_add(len).ok_or(WireError::Truncated)?;
    let payload = buf.get(used..end).ok_or(WireError::Truncated)?;
    Ok((payload, end))
}

/// Body length and total length of a group starting after its start tag
fn group_extent(buf: &[u8], number: u32, depth: usize) -> WireResult<(usize, usize)> {
    if depth >= MAX_DEPTH {
        return Err(WireError::TooDeep);
    }
    let mut pos = 0;
    while pos < buf.len() {
        let (inner, wire_type, tag_len) = decode_tag(&buf[pos..])?;
        if wire_type == WireType::EndGroup {
            if inner != number {
                return Err(WireError::UnexpectedEndGroup(inner));
            }
            return Ok((pos, pos + tag_len));
        }
        pos += consume_at_depth(&buf[pos..], depth)?.len;
    }
    Err(WireError::UnterminatedGroup(number))
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode a whole record
pub fn encode_record(record: &dyn Record) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_into(record, &mut buf, 0)?;
    Ok(buf)
}

fn encode_into(record: &dyn Record, buf: &mut Vec<u8>, depth: usize) -> Result<()> {
    if depth >= MAX_DEPTH {
        return Err(Error::Marshal("message nesting too deep".to_string()));
    }
    for fd in record.schema().fields_by_number() {
        if let Some(value) = record.field(fd.number()) {
            encode_field(fd, &value, buf, depth)?;
        }
    }
    Ok(())
}

fn encode_field(fd: &FieldDescriptor, value: &Value, buf: &mut Vec<u8>, depth: usize) -> Result<()> {
    if !fd.is_repeated() {
        if !fd.kind().is_message() && value.is_default() {
            return Ok(());
        }
        return encode_element(fd, value, buf, depth);
    }

    let items = value.as_list().ok_or_else(|| {
        Error::Marshal(format!(
            "field {} is repeated, got {}",
            fd.name(),
            value.type_name()
        ))
    })?;
    if items.is_empty() {
        return Ok(());
    }
    if fd.kind().is_packable() {
        let mut packed = Vec::new();
        for item in items {
            encode_scalar(fd, item, &mut packed)?;
        }
        encode_tag(fd.number(), WireType::Len, buf);
        put_len(buf, &packed);
    } else {
        for item in items {
            encode_element(fd, item, buf, depth)?;
        }
    }
    Ok(())
}

fn encode_element(fd: &FieldDescriptor, value: &Value, buf: &mut Vec<u8>, depth: usize) -> Result<()> {
    match fd.kind() {
        FieldKind::Message => {
            let mut body = Vec::new();
            encode_into(message_of(fd, value)?, &mut body, depth + 1)?;
            encode_tag(fd.number(), WireType::Len, buf);
            put_len(buf, &body);
        }
        FieldKind::Group => {
            encode_tag(fd.number(), WireType::StartGroup, buf);
            encode_into(message_of(fd, value)?, buf, depth + 1)?;
            encode_tag(fd.number(), WireType::EndGroup, buf);
        }
        kind => {
            encode_tag(fd.number(), kind.wire_type(), buf);
            encode_scalar(fd, value, buf)?;
        }
    }
    Ok(())
}

fn message_of<'a>(fd: &FieldDescriptor, value: &'a Value) -> Result<&'a DynamicRecord> {
    value.as_message().ok_or_else(|| {
        Error::Marshal(format!(
            "field {} expects a message, got {}",
            fd.name(),
            value.type_name()
        ))
    })
}

fn encode_scalar(fd: &FieldDescriptor, value: &Value, buf: &mut Vec<u8>) -> Result<()> {
    let mut fixed = [0u8; 8];
    match (fd.kind(), value) {
        (FieldKind::Bool, Value::Bool(b)) => encode_varint(u64::from(*b), buf),
        (FieldKind::Enum, Value::Enum(n)) | (FieldKind::Int32, Value::I32(n)) => {
            encode_varint(i64::from(*n) as u64, buf)
        }
        (FieldKind::Sint32, Value::I32(n)) => encode_varint(u64::from(zigzag_encode_32(*n)), buf),
        (FieldKind::Int64, Value::I64(n)) => encode_varint(*n as u64, buf),
        (FieldKind::Sint64, Value::I64(n)) => encode_varint(zigzag_encode_64(*n), buf),
        (FieldKind::Uint32, Value::U32(n)) => encode_varint(u64::from(*n), buf),
        (FieldKind::Uint64, Value::U64(n)) => encode_varint(*n, buf),
        (FieldKind::Sfixed32, Value::I32(n)) => {
            LittleEndian::write_i32(&mut fixed[..4], *n);
            buf.extend_from_slice(&fixed[..4]);
        }
        (FieldKind::Fixed32, Value::U32(n)) => {
            LittleEndian::write_u32(&mut fixed[..4], *n);
            buf.extend_from_slice(&fixed[..4]);
        }
        (FieldKind::Float, Value::F32(f)) => {
            LittleEndian::write_f32(&mut fixed[..4], *f);
            buf.extend_from_slice(&fixed[..4]);
        }
        (FieldKind::Sfixed64, Value::I64(n)) => {
            LittleEndian::write_i64(&mut fixed, *n);
            buf.extend_from_slice(&fixed);
        }
        (FieldKind::Fixed64, Value::U64(n)) => {
            LittleEndian::write_u64(&mut fixed, *n);
            buf.extend_from_slice(&fixed);
        }
        (FieldKind::Double, Value::F64(f)) => {
            LittleEndian::write_f64(&mut fixed, *f);
            buf.extend_from_slice(&fixed);
        }
        (FieldKind::String, Value::String(s)) => put_len(buf, s.as_bytes()),
        (FieldKind::Bytes, Value::Bytes(b)) => put_len(buf, b),
        (kind, other) => {
            return Err(Error::Marshal(format!(
                "field {} expects {}, got {}",
                fd.name(),
                kind,
                other.type_name()
            )))
        }
    }
    Ok(())
}

fn put_len(buf: &mut Vec<u8>, payload: &[u8]) {
    encode_varint(payload.len() as u64, buf);
    buf.extend_from_slice(payload);
}

// ============================================================================
// Decoding
// ============================================================================

/// Merge an encoding into `record`
pub fn merge_decode(record: &mut dyn Record, buf: &[u8]) -> Result<()> {
    merge_at_depth(record, buf, 0)
}

fn merge_at_depth(record: &mut dyn Record, buf: &[u8], depth: usize) -> Result<()> {
    if depth >= MAX_DEPTH {
        return Err(WireError::TooDeep.into());
    }
    let schema = Arc::clone(record.schema());
    let mut appended: BTreeMap<u32, Vec<Value>> = BTreeMap::new();
    let mut pos = 0;

    while pos < buf.len() {
        let rest = &buf[pos..];
        let (number, wire_type, tag_len) = decode_tag(rest)?;
        let Some(fd) = schema.field_by_number(number) else {
            let entry = consume_at_depth(rest, depth)?;
            trace!(
                target: "recmap::wire",
                record = schema.full_name(),
                field = number,
                "skipping unknown field"
            );
            pos += entry.len;
            continue;
        };
        let body = &rest[tag_len..];

        let used = if fd.is_repeated() {
            let list = appended.entry(number).or_default();
            if wire_type == WireType::Len && fd.kind().is_packable() {
                let (payload, used) = len_delimited(body)?;
                let mut at = 0;
                while at < payload.len() {
                    let (value, n) = decode_scalar(fd, &payload[at..])?;
                    list.push(value);
                    at += n;
                }
                used
            } else {
                check_wire_type(fd, wire_type)?;
                let (value, used) = decode_element(fd, body, None, depth)?;
                list.push(value);
                used
            }
        } else {
            check_wire_type(fd, wire_type)?;
            let existing = if fd.kind().is_message() {
                record.field(number).map(Cow::into_owned)
            } else {
                None
            };
            let (value, used) = decode_element(fd, body, existing, depth)?;
            record.set_field(number, value)?;
            used
        };
        pos += tag_len + used;
    }

    for (number, mut items) in appended {
        let mut list = match record.field(number).map(Cow::into_owned) {
            Some(Value::List(prev)) => prev,
            _ => Vec::new(),
        };
        list.append(&mut items);
        record.set_field(number, Value::List(list))?;
    }
    Ok(())
}

fn check_wire_type(fd: &FieldDescriptor, found: WireType) -> WireResult<()> {
    let expected = fd.kind().wire_type();
    if expected == found {
        Ok(())
    } else {
        Err(WireError::WireTypeMismatch {
            field: fd.name().to_string(),
            expected,
            found,
        })
    }
}

fn decode_element(
    fd: &FieldDescriptor,
    body: &[u8],
    existing: Option<Value>,
    depth: usize,
) -> Result<(Value, usize)> {
    match fd.kind() {
        FieldKind::Message => {
            let (payload, used) = len_delimited(body)?;
            let mut inner = nested_record(fd, existing)?;
            merge_at_depth(&mut inner, payload, depth + 1)?;
            Ok((Value::Message(Box::new(inner)), used))
        }
        FieldKind::Group => {
            let (body_len, used) = group_extent(body, fd.number(), depth + 1)?;
            let mut inner = nested_record(fd, existing)?;
            merge_at_depth(&mut inner, &body[..body_len], depth + 1)?;
            Ok((Value::Message(Box::new(inner)), used))
        }
        _ => Ok(decode_scalar(fd, body)?),
    }
}

fn nested_record(fd: &FieldDescriptor, existing: Option<Value>) -> Result<DynamicRecord> {
    if let Some(Value::Message(inner)) = existing {
        return Ok(*inner);
    }
    let schema = fd.message_type().ok_or_else(|| {
        Error::Unmarshal(format!("field {} has no message type", fd.name()))
    })?;
    Ok(DynamicRecord::new(Arc::clone(schema)))
}

fn decode_scalar(fd: &FieldDescriptor, buf: &[u8]) -> WireResult<(Value, usize)> {
    let kind = fd.kind();
    match kind.wire_type() {
        WireType::Varint => {
            let (raw, used) = decode_varint(buf)?;
            let value = match kind {
                FieldKind::Bool => Value::Bool(raw != 0),
                FieldKind::Enum => Value::Enum(raw as i32),
                FieldKind::Int32 => Value::I32(raw as i32),
                FieldKind::Sint32 => Value::I32(zigzag_decode_32(raw as u32)),
                FieldKind::Int64 => Value::I64(raw as i64),
                FieldKind::Sint64 => Value::I64(zigzag_decode_64(raw)),
                FieldKind::Uint32 => Value::U32(raw as u32),
                _ => Value::U64(raw),
            };
            Ok((value, used))
        }
        WireType::Fixed32 => {
            let bytes = buf.get(..4).ok_or(WireError::Truncated)?;
            let value = match kind {
                FieldKind::Float => Value::F32(LittleEndian::read_f32(bytes)),
                FieldKind::Sfixed32 => Value::I32(LittleEndian::read_i32(bytes)),
                _ => Value::U32(LittleEndian::read_u32(bytes)),
            };
            Ok((value, 4))
        }
        WireType::Fixed64 => {
            let bytes = buf.get(..8).ok_or(WireError::Truncated)?;
            let value = match kind {
                FieldKind::Double => Value::F64(LittleEndian::read_f64(bytes)),
                FieldKind::Sfixed64 => Value::I64(LittleEndian::read_i64(bytes)),
                _ => Value::U64(LittleEndian::read_u64(bytes)),
            };
            Ok((value, 8))
        }
        WireType::Len => {
            let (payload, used) = len_delimited(buf)?;
            let value = if kind == FieldKind::String {
                let s = std::str::from_utf8(payload)
                    .map_err(|_| WireError::InvalidUtf8(fd.name().to_string()))?;
                Value::String(s.to_string())
            } else {
                Value::Bytes(payload.to_vec())
            };
            Ok((value, used))
        }
        found @ (WireType::StartGroup | WireType::EndGroup) => Err(WireError::WireTypeMismatch {
            field: fd.name().to_string(),
            expected: WireType::Len,
            found,
        }),
    }
}
