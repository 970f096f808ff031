//! Partial codec: record <-> field-value map
//!
//! [`to_field_map`] encodes the record once and walks the encoding entry by
//! entry. Blob fields keep their encoded entries as [`Bytes`] slices of that
//! single buffer; every other field is carried as its scalar string.
//!
//! [`from_field_map`] is the inverse merge: scalar entries are parsed and
//! assigned field by field, blob entries are concatenated in ascending
//! field-number order and merge-decoded in one call.

use crate::classify::is_blob_field;
use crate::filter::field_filter;
use bytes::{Bytes, BytesMut};
use recmap_core::wire::{consume_field, encode_record, merge_decode};
use recmap_core::{
    default_scalar_string, format_scalar, parse_scalar, Error, Record, Result,
};
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;
use tracing::trace;

/// One stored field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Scalar string, see [`recmap_core::scalar`]
    Scalar(String),
    /// Encoded wire entries of one blob field
    Blob(Bytes),
}

impl FieldValue {
    /// Raw bytes of either variant
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FieldValue::Scalar(s) => s.as_bytes(),
            FieldValue::Blob(b) => b,
        }
    }
}

/// Field name -> value, name-ordered
pub type FieldValueMap = BTreeMap<String, FieldValue>;

/// Map `record` to field values, restricted to `requested` when non-empty
///
/// Requested fields holding their zero value are absent from the encoding
/// but still get an entry (the default scalar string, or an empty blob), so
/// writers store the zero instead of skipping the column.
///
/// # Errors
///
/// `Validation` when `requested` names no known field, `Marshal` when a
/// value cannot be rendered.
pub fn to_field_map(record: &dyn Record, requested: &[&str]) -> Result<FieldValueMap> {
    let schema = Arc::clone(record.schema());
    let filter = field_filter(&schema, requested)?;
    let wanted = |name: &str| filter.as_ref().map_or(true, |f| f.contains(name));

    let mut map = FieldValueMap::new();
    for fd in schema.fields_by_number() {
        if is_blob_field(fd) || !wanted(fd.name()) {
            continue;
        }
        let s = match record.field(fd.number()) {
            Some(value) => format_scalar(fd.kind(), &value)?,
            None => default_scalar_string(fd.kind())?,
        };
        map.insert(fd.name().to_string(), FieldValue::Scalar(s));
    }

    let encoded = Bytes::from(encode_record(record)?);
    let mut ranges: BTreeMap<u32, Vec<Range<usize>>> = BTreeMap::new();
    let mut pos = 0;
    while pos < encoded.len() {
        let entry = consume_field(&encoded[pos..])?;
        let range = pos..pos + entry.len;
        pos = range.end;

        let Some(fd) = schema.field_by_number(entry.number) else {
            continue;
        };
        if !is_blob_field(fd) || !wanted(fd.name()) {
            continue;
        }
        let spans = ranges.entry(entry.number).or_default();
        match spans.last_mut() {
            Some(last) if last.end == range.start => last.end = range.end,
            _ => spans.push(range),
        }
    }

    for fd in schema.fields_by_number() {
        if !is_blob_field(fd) || !wanted(fd.name()) {
            continue;
        }
        let blob = match ranges.get(&fd.number()).map(Vec::as_slice) {
            None | Some([]) => Bytes::new(),
            Some([single]) => encoded.slice(single.clone()),
            Some(spans) => {
                let mut joined = BytesMut::new();
                for span in spans {
                    joined.extend_from_slice(&encoded[span.clone()]);
                }
                joined.freeze()
            }
        };
        map.insert(fd.name().to_string(), FieldValue::Blob(blob));
    }
    Ok(map)
}

/// Merge stored field values into `record`
///
/// Names starting with `_` are reserved columns and ignored; unknown names
/// are skipped. Fields of `record` absent from `map` are left untouched.
///
/// # Errors
///
/// `Unmarshal` when a scalar does not parse for its field kind or the blob
/// encoding is malformed.
pub fn from_field_map(record: &mut dyn Record, map: &FieldValueMap) -> Result<()> {
    let schema = Arc::clone(record.schema());
    let mut blobs: BTreeMap<u32, &[u8]> = BTreeMap::new();

    for (name, value) in map {
        if name.starts_with('_') {
            continue;
        }
        let Some(fd) = schema.field_by_name(name) else {
            trace!(
                target: "recmap::mapping",
                record = schema.full_name(),
                field = name.as_str(),
                "skipping unknown column"
            );
            continue;
        };
        if is_blob_field(fd) {
            blobs.insert(fd.number(), value.as_bytes());
            continue;
        }
        let text = std::str::from_utf8(value.as_bytes()).map_err(|_| {
            Error::Unmarshal(format!("column {} is not valid UTF-8", name))
        })?;
        let parsed = parse_scalar(fd.kind(), text)?;
        record.set_field(fd.number(), parsed)?;
    }

    if blobs.is_empty() {
        return Ok(());
    }
    let mut buf = BytesMut::with_capacity(blobs.values().map(|b| b.len()).sum());
    for bytes in blobs.values() {
        buf.extend_from_slice(bytes);
    }
    merge_decode(record, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recmap_core::testing::{account, account_schema, player_schema, sample_player};
    use recmap_core::{DynamicRecord, Value};

    fn scalar(s: &str) -> FieldValue {
        FieldValue::Scalar(s.to_string())
    }

    #[test]
    fn test_account_full_map() {
        let map = to_field_map(&account(100, "test", 0), &[]).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["id"], scalar("100"));
        assert_eq!(map["name"], scalar("test"));
        assert_eq!(map["coins"], scalar("0"));
    }

    #[test]
    fn test_filter_restricts_entries() {
        let map = to_field_map(&sample_player(), &["name", "items.slot", "bogus"]).unwrap();
        let names: Vec<_> = map.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["items", "name"]);
        assert!(matches!(map["items"], FieldValue::Blob(ref b) if !b.is_empty()));
    }

    #[test]
    fn test_default_fields_filled() {
        let rec = DynamicRecord::new(player_schema());
        let map = to_field_map(&rec, &[]).unwrap();
        assert_eq!(map.len(), player_schema().len());
        assert_eq!(map["online"], scalar("0"));
        assert_eq!(map["tags"], FieldValue::Blob(Bytes::new()));
    }

    #[test]
    fn test_blob_is_encoded_entries() {
        let player = sample_player();
        let map = to_field_map(&player, &["tags"]).unwrap();
        let FieldValue::Blob(bytes) = &map["tags"] else {
            panic!("tags should be a blob");
        };
        // field 13, wire type 2: each element is its own entry
        assert_eq!(bytes[0], (13 << 3) | 2);
        assert_eq!(&bytes[..5], &[0x6a, 3, b'p', b'v', b'p']);
    }

    #[test]
    fn test_roundtrip_every_kind() {
        let player = sample_player();
        let map = to_field_map(&player, &[]).unwrap();
        let mut back = DynamicRecord::new(player_schema());
        from_field_map(&mut back, &map).unwrap();
        assert_eq!(back, player);
    }

    #[test]
    fn test_merge_leaves_other_fields() {
        let mut rec = account(5, "keep", 0);
        let mut map = FieldValueMap::new();
        map.insert("coins".into(), scalar("9"));
        from_field_map(&mut rec, &map).unwrap();
        assert_eq!(rec.get("name").and_then(Value::as_str), Some("keep"));
        assert_eq!(rec.get("coins"), Some(&Value::I64(9)));
    }

    #[test]
    fn test_reserved_and_unknown_columns_skipped() {
        let mut rec = DynamicRecord::new(account_schema());
        let mut map = FieldValueMap::new();
        map.insert("_version".into(), scalar("garbage"));
        map.insert("legacy".into(), scalar("x"));
        map.insert("id".into(), scalar("3"));
        from_field_map(&mut rec, &map).unwrap();
        assert_eq!(rec.get("id"), Some(&Value::U64(3)));
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn test_scalar_accepted_as_bytes() {
        let mut rec = DynamicRecord::new(account_schema());
        let mut map = FieldValueMap::new();
        map.insert("coins".into(), FieldValue::Blob(Bytes::from_static(b"-4")));
        from_field_map(&mut rec, &map).unwrap();
        assert_eq!(rec.get("coins"), Some(&Value::I64(-4)));
    }

    #[test]
    fn test_bad_scalar_is_unmarshal() {
        let mut rec = DynamicRecord::new(account_schema());
        let mut map = FieldValueMap::new();
        map.insert("coins".into(), scalar("lots"));
        let err = from_field_map(&mut rec, &map).unwrap_err();
        assert!(matches!(err, Error::Unmarshal(_)));
    }

    #[test]
    fn test_blobs_merge_in_number_order() {
        let player = sample_player();
        let items = to_field_map(&player, &["items"]).unwrap();
        let main = to_field_map(&player, &["main_item"]).unwrap();
        let mut map = FieldValueMap::new();
        map.extend(items);
        map.extend(main);

        let mut back = DynamicRecord::new(player_schema());
        from_field_map(&mut back, &map).unwrap();
        assert_eq!(back.get("items"), player.get("items"));
        assert_eq!(back.get("main_item"), player.get("main_item"));
    }
}
