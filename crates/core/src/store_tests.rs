// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the key-value store implementations.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use tempfile::tempdir;

fn exercise_basic_ops(store: &dyn KeyValueStore) {
    assert_eq!(store.get("missing").unwrap(), None);

    store.set("a", "1").unwrap();
    assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

    store.multi_set(&[("b", "2".to_string()), ("c", "3".to_string())]).unwrap();
    let values = store.multi_get(&["c", "missing", "a"]).unwrap();
    assert_eq!(
        values,
        vec![
            ("c".to_string(), Some("3".to_string())),
            ("missing".to_string(), None),
            ("a".to_string(), Some("1".to_string())),
        ]
    );

    store.remove("a").unwrap();
    assert_eq!(store.get("a").unwrap(), None);

    // Removing twice is fine
    store.remove("a").unwrap();

    store.multi_remove(&["b", "c", "never-set"]).unwrap();
    assert_eq!(store.get("b").unwrap(), None);
    assert_eq!(store.get("c").unwrap(), None);
}

#[test]
fn memory_store_basic_ops() {
    let store = MemoryStore::new();
    exercise_basic_ops(&store);
    assert!(store.is_empty());
}

#[test]
fn file_store_basic_ops() {
    let dir = tempdir().unwrap();
    let store = FileStore::open(dir.path().join("store.json")).unwrap();
    exercise_basic_ops(&store);
}

#[test]
fn arc_store_delegates() {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn KeyValueStore> = store.clone();
    shared.set("k", "v").unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn file_store_missing_file_reads_empty() {
    let dir = tempdir().unwrap();
    let store = FileStore::open(dir.path().join("nested/dir/store.json")).unwrap();

    assert_eq!(store.get("anything").unwrap(), None);
    assert!(!store.path().exists());
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");

    {
        let store = FileStore::open(&path).unwrap();
        store.set("auth_token", "abc").unwrap();
    }

    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.get("auth_token").unwrap().as_deref(), Some("abc"));
}

#[test]
fn file_store_corrupted_document_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    fs::write(&path, "{not json").unwrap();

    let store = FileStore::open(&path).unwrap();
    let err = store.get("auth_token").unwrap_err();
    assert!(matches!(err, Error::CorruptedData(_)));
}

#[test]
fn file_store_empty_document_reads_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    fs::write(&path, "  \n").unwrap();

    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.get("auth_token").unwrap(), None);
}

#[test]
fn file_store_leaves_no_temp_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = FileStore::open(&path).unwrap();

    store.set("k", "v").unwrap();

    assert!(path.exists());
    assert!(!dir.path().join("store.json.tmp").exists());
}

#[test]
fn file_store_empty_multi_set_does_not_create_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = FileStore::open(&path).unwrap();

    store.multi_set(&[]).unwrap();
    assert!(!path.exists());
}
