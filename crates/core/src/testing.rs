//! Shared record fixtures for tests across the workspace
//!
//! Enabled inside this crate's own tests and, for other crates, through the
//! `testing` feature.

use crate::record::DynamicRecord;
use crate::schema::{FieldKind, Schema, SchemaBuilder};
use crate::value::Value;
use std::sync::Arc;

/// `game.Account { id: uint64 = 1, name: string = 2, coins: int64 = 3 }`, keyed by `id`
pub fn account_schema() -> Arc<Schema> {
    SchemaBuilder::new("game.Account")
        .field("id", 1, FieldKind::Uint64)
        .field("name", 2, FieldKind::String)
        .field("coins", 3, FieldKind::Int64)
        .primary_key("id")
        .build()
        .expect("account fixture schema")
}

/// Account record with the given values
pub fn account(id: u64, name: &str, coins: i64) -> DynamicRecord {
    let mut record = DynamicRecord::new(account_schema());
    record.set("id", id).expect("id");
    record.set("name", name).expect("name");
    record.set("coins", coins).expect("coins");
    record
}

/// Account record with only the key set
pub fn account_key(id: u64) -> DynamicRecord {
    let mut record = DynamicRecord::new(account_schema());
    record.set("id", id).expect("id");
    record
}

/// `game.Item`, nested inside players
pub fn item_schema() -> Arc<Schema> {
    SchemaBuilder::new("game.Item")
        .field("slot", 1, FieldKind::Uint32)
        .field("count", 2, FieldKind::Int32)
        .field("label", 3, FieldKind::String)
        .build()
        .expect("item fixture schema")
}

/// `game.Player.Stats`, carried as a group
pub fn stats_schema() -> Arc<Schema> {
    SchemaBuilder::new("game.Player.Stats")
        .field("wins", 1, FieldKind::Uint32)
        .field("losses", 2, FieldKind::Uint32)
        .build()
        .expect("stats fixture schema")
}

/// A record type using every field kind, keyed by `id,zone`
pub fn player_schema() -> Arc<Schema> {
    SchemaBuilder::new("game.Player")
        .field("id", 1, FieldKind::Uint64)
        .field("zone", 2, FieldKind::Uint32)
        .field("name", 3, FieldKind::String)
        .field("level", 4, FieldKind::Int32)
        .field("exp", 5, FieldKind::Int64)
        .field("gold", 6, FieldKind::Sint64)
        .field("luck", 7, FieldKind::Sint32)
        .field("online", 8, FieldKind::Bool)
        .field("role", 9, FieldKind::Enum)
        .field("ratio", 10, FieldKind::Float)
        .field("score", 11, FieldKind::Double)
        .field("avatar", 12, FieldKind::Bytes)
        .repeated("tags", 13, FieldKind::String)
        .repeated("history", 14, FieldKind::Int64)
        .message("main_item", 15, item_schema())
        .repeated_message("items", 16, item_schema())
        .group("stats", 17, stats_schema())
        .field("crc", 18, FieldKind::Fixed32)
        .field("seq", 19, FieldKind::Fixed64)
        .field("offset", 20, FieldKind::Sfixed32)
        .field("stamp", 21, FieldKind::Sfixed64)
        .primary_key("id,zone")
        .build()
        .expect("player fixture schema")
}

/// Item record with the given values
pub fn item(slot: u32, count: i32, label: &str) -> DynamicRecord {
    let mut record = DynamicRecord::new(item_schema());
    record.set("slot", slot).expect("slot");
    record.set("count", count).expect("count");
    record.set("label", label).expect("label");
    record
}

/// Player with every field set to a non-default value
pub fn sample_player() -> DynamicRecord {
    let mut stats = DynamicRecord::new(stats_schema());
    stats.set("wins", 12u32).expect("wins");
    stats.set("losses", 3u32).expect("losses");

    let mut p = DynamicRecord::new(player_schema());
    p.set("id", 42u64).expect("id");
    p.set("zone", 7u32).expect("zone");
    p.set("name", "rust-lord").expect("name");
    p.set("level", -3).expect("level");
    p.set("exp", 9_000_000_000i64).expect("exp");
    p.set("gold", -77i64).expect("gold");
    p.set("luck", -1).expect("luck");
    p.set("online", true).expect("online");
    p.set("role", Value::Enum(2)).expect("role");
    p.set("ratio", 0.25f32).expect("ratio");
    p.set("score", 1234.5f64).expect("score");
    p.set("avatar", vec![0u8, 1, 2, 254, 255]).expect("avatar");
    p.set("tags", vec![Value::from("pvp"), Value::from("guild")])
        .expect("tags");
    p.set("history", vec![Value::I64(1), Value::I64(-2), Value::I64(300)])
        .expect("history");
    p.set("main_item", item(1, 5, "sword")).expect("main_item");
    p.set(
        "items",
        vec![Value::from(item(2, 1, "shield")), Value::from(item(3, 20, "arrow"))],
    )
    .expect("items");
    p.set("stats", stats).expect("stats");
    p.set("crc", 0xdead_beefu32).expect("crc");
    p.set("seq", u64::MAX).expect("seq");
    p.set("offset", -5).expect("offset");
    p.set("stamp", i64::MIN).expect("stamp");
    p
}
