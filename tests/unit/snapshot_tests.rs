//! Snapshot decoding tests

use std::fs;

use tempfile::TempDir;

use rust_sqllineage::snapshot::{load_snapshot, parse_snapshot};
use rust_sqllineage::LineageError;

const SNAPSHOT: &str = r#"{
    "tables": ["Orders", null, "Customers"],
    "views": ["OpenOrders"],
    "columns": {"Orders": [{"name": "Id", "type": "int"}, {"name": null, "type": "int"}]},
    "relationships": [{"referencingTable": "Orders", "referencedTable": "Customers"}],
    "routines": [{"name": "dbo.P", "definition": null}],
    "dependencies": [{"referencingObject": "OpenOrders", "referencedObject": null}],
    "executionPlans": {"dbo.P": null},
    "indexStatistics": [{
        "tableName": "Orders",
        "indexName": null,
        "indexType": "HEAP",
        "userSeeks": null,
        "userScans": 1200,
        "lastUserScan": "2024-05-01T08:00:00.000"
    }]
}"#;

#[test]
fn test_parse_full_snapshot() {
    let snapshot = parse_snapshot(SNAPSHOT).unwrap();
    assert_eq!(snapshot.table_names().collect::<Vec<_>>(), vec!["Orders", "Customers"]);
    assert_eq!(snapshot.columns["Orders"].len(), 2);
    assert_eq!(snapshot.routines[0].definition, None);
    assert!(snapshot.triggers.is_empty());
    assert_eq!(snapshot.dependencies[0].referenced_object, None);

    let stat = &snapshot.index_statistics[0];
    assert_eq!(stat.seeks(), 0);
    assert_eq!(stat.scans(), 1200);
    assert_eq!(stat.display_index_name(), "HEAP");
    assert!(stat.last_user_scan.is_some());
}

#[test]
fn test_empty_document() {
    let snapshot = parse_snapshot("{}").unwrap();
    assert!(snapshot.tables.is_empty());
    assert!(snapshot.execution_plans.is_empty());
    assert!(snapshot.index_statistics.is_empty());
}

#[test]
fn test_load_utf16_with_bom() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    let mut bytes = vec![0xFF, 0xFE];
    for unit in SNAPSHOT.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    fs::write(&path, bytes).unwrap();

    let snapshot = load_snapshot(&path).unwrap();
    assert_eq!(snapshot.tables.len(), 3);
}

#[test]
fn test_load_utf8_with_bom() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(SNAPSHOT.as_bytes());
    fs::write(&path, bytes).unwrap();

    assert!(load_snapshot(&path).is_ok());
}

#[test]
fn test_missing_file_is_read_error() {
    let dir = TempDir::new().unwrap();
    let err = load_snapshot(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, LineageError::SnapshotReadError { .. }), "{err}");
}

#[test]
fn test_invalid_json_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    fs::write(&path, "{\"tables\": [").unwrap();
    let err = load_snapshot(&path).unwrap_err();
    assert!(matches!(err, LineageError::SnapshotParseError { .. }), "{err}");
}

#[test]
fn test_wrong_field_type_is_parse_error() {
    assert!(parse_snapshot(r#"{"tables": "Orders"}"#).is_err());
}
