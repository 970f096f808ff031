//! Facade conformance across both adapters
//!
//! Every scenario runs against the relational store and the hash store
//! through `RecordStore`, and checks the caller-visible semantics agree:
//! 1. Insert / get / increase roundtrip
//! 2. Duplicate insert is Conflict(AlreadyExists)
//! 3. Update of a missing record fails and creates nothing
//! 4. Delete with ReturnPrior hands back the removed record
//! 5. Increase validation, filtered reads and BatchGet
//! 6. Opening from a config file

use recmap::{
    CallContext, ConflictKind, DeleteMode, DynamicRecord, Error, Record, RecordStore, StoreConfig,
    Value, CONFIG_FILE_NAME,
};
use recmap_core::testing::{account, account_key, player_schema, sample_player};
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn ctx() -> CallContext {
    CallContext::background()
}

fn stores() -> Vec<RecordStore> {
    ["backend = \"sql\"", "backend = \"hash\""]
        .iter()
        .map(|text| RecordStore::open(&StoreConfig::from_str(text).unwrap()).unwrap())
        .collect()
}

fn fetch(store: &RecordStore, id: u64) -> recmap::Result<DynamicRecord> {
    let mut rec = account_key(id);
    store.get(&ctx(), &mut rec, &[])?;
    Ok(rec)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_insert_increase_get() {
    for store in stores() {
        store.insert(&ctx(), &account(100, "test", 0)).unwrap();
        store.increase(&ctx(), &account_key(100), &["coins"]).unwrap();
        store.increase(&ctx(), &account_key(100), &["coins"]).unwrap();
        let rec = fetch(&store, 100).unwrap();
        assert_eq!(rec.get("coins"), Some(&Value::I64(2)), "{}", store.backend_name());
        assert_eq!(rec.get("name").and_then(Value::as_str), Some("test"));
    }
}

#[test]
fn test_duplicate_insert() {
    for store in stores() {
        store.insert(&ctx(), &account(100, "test", 0)).unwrap();
        let err = store.insert(&ctx(), &account(100, "test", 0)).unwrap_err();
        assert!(
            err.is_conflict(Some(ConflictKind::AlreadyExists)),
            "{}: {}",
            store.backend_name(),
            err
        );
    }
}

#[test]
fn test_update_missing_creates_nothing() {
    for store in stores() {
        let err = store
            .update(&ctx(), &account(404, "ghost", 3), &[])
            .unwrap_err();
        match store.backend_name() {
            "sql" => assert!(matches!(err, Error::AffectedZero { .. })),
            _ => assert!(err.is_conflict(Some(ConflictKind::NotExist))),
        }
        assert!(fetch(&store, 404).unwrap_err().is_not_found());
    }
}

#[test]
fn test_delete_return_prior() {
    for store in stores() {
        store.insert(&ctx(), &account(100, "test", 7)).unwrap();

        let mut rec = account_key(100);
        let loaded = store
            .delete(&ctx(), &mut rec, DeleteMode::ReturnPrior)
            .unwrap();
        assert!(loaded);
        assert_eq!(rec, account(100, "test", 7), "{}", store.backend_name());
        assert!(fetch(&store, 100).unwrap_err().is_not_found());
    }
}

#[test]
fn test_increase_validation() {
    for store in stores() {
        store.insert(&ctx(), &account(1, "a", 0)).unwrap();
        for fields in [&["id"][..], &["name"][..]] {
            let err = store.increase(&ctx(), &account_key(1), fields).unwrap_err();
            assert!(err.is_validation());
        }
        assert_eq!(fetch(&store, 1).unwrap(), account(1, "a", 0));
    }
}

#[test]
fn test_filtered_get_and_partial_update() {
    for store in stores() {
        store.insert(&ctx(), &account(5, "five", 50)).unwrap();
        store
            .update(&ctx(), &account(5, "renamed", 0), &["name"])
            .unwrap();

        let mut rec = account_key(5);
        store.get(&ctx(), &mut rec, &["name", "unknown.path"]).unwrap();
        assert_eq!(rec.get("name").and_then(Value::as_str), Some("renamed"));
        assert!(!rec.is_set("coins"));
        assert_eq!(fetch(&store, 5).unwrap().get("coins"), Some(&Value::I64(50)));
    }
}

#[test]
fn test_all_kinds_roundtrip() {
    for store in stores() {
        let player = sample_player();
        store.replace(&ctx(), &player).unwrap();
        let mut got = DynamicRecord::new(player_schema());
        got.set("id", 42u64).unwrap();
        got.set("zone", 7u32).unwrap();
        store.get(&ctx(), &mut got, &[]).unwrap();
        assert_eq!(got, player, "{}", store.backend_name());
    }
}

#[test]
fn test_batch_get_unsupported() {
    for store in stores() {
        let mut a = account_key(1);
        let mut records: Vec<&mut dyn Record> = vec![&mut a];
        assert!(matches!(
            store.batch_get(&ctx(), &mut records).unwrap_err(),
            Error::NotImplemented(_)
        ));
    }
}

#[test]
fn test_open_file_backed_sql_store() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("records.db");
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        format!("backend = \"sql\"\n[sql]\ndatasource = {:?}\n", db.display().to_string()),
    )
    .unwrap();

    {
        let store = RecordStore::open_file(&path).unwrap();
        store.insert(&ctx(), &account(9, "disk", 1)).unwrap();
    }
    let store = RecordStore::open_file(&path).unwrap();
    assert_eq!(fetch(&store, 9).unwrap(), account(9, "disk", 1));
    assert!(db.exists());
}
