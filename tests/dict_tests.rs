// Dictionary integration tests
// These tests verify idempotent interning, rehash stability, and
// persistence of the string-to-id index.

use sparsedb::{Dictionary, Mode, Options};
use tempfile::TempDir;

fn small_opts() -> Options {
    Options::new().map_size(1 << 16).min_slots(64)
}

/// Concrete scenario: interning, idempotence, misses, and reverse lookup
#[test]
fn test_dictionary_concrete_scenario() {
    let dir = TempDir::new().unwrap();
    let mut dict = Dictionary::open_with(dir.path().join("d"), Mode::Create, small_opts()).unwrap();

    assert_eq!(dict.insert("amino").unwrap(), Some(1));
    assert_eq!(dict.insert("acid").unwrap(), Some(2));
    assert_eq!(dict.insert("amino").unwrap(), Some(1));
    assert_eq!(dict.lookup("unknown").unwrap(), None);
    assert_eq!(dict.key_of(1).unwrap().as_deref(), Some("amino"));
    assert_eq!(dict.len(), 2);
}

/// Rehash stability at scale: every key keeps its id through several
/// rehashes, both right after insertion and at the end
#[test]
fn test_rehash_stability_at_scale() {
    let dir = TempDir::new().unwrap();
    let mut dict = Dictionary::open_with(dir.path().join("d"), Mode::Create, small_opts()).unwrap();

    let n = 5000u32;
    for i in 0..n {
        let key = format!("token:{:05}", i);
        let id = dict.insert(&key).unwrap().unwrap();
        assert_eq!(id, i + 1, "ids are assigned sequentially");
        assert_eq!(dict.lookup(&key).unwrap(), Some(id));
    }
    for i in 0..n {
        let key = format!("token:{:05}", i);
        assert_eq!(dict.lookup(&key).unwrap(), Some(i + 1), "key {} moved", key);
    }
    assert_eq!(dict.len(), n as usize);
}

/// Interned ids survive a close and reopen, and the sequence continues
#[test]
fn test_persistence_and_continuation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("d");

    {
        let mut dict = Dictionary::open_with(&path, Mode::Create, small_opts()).unwrap();
        for word in ["the", "quick", "brown", "fox"] {
            dict.insert(word).unwrap();
        }
        dict.close().unwrap();
    }

    {
        let mut dict = Dictionary::open_with(&path, Mode::Update, small_opts()).unwrap();
        assert_eq!(dict.lookup("quick").unwrap(), Some(2));
        assert_eq!(dict.insert("jumps").unwrap(), Some(5));
        dict.close().unwrap();
    }

    let mut dict = Dictionary::open_with(&path, Mode::Read, small_opts()).unwrap();
    assert_eq!(dict.len(), 5);
    assert_eq!(dict.keys().unwrap(), vec!["the", "quick", "brown", "fox", "jumps"]);
}

/// Keys that collide in the slot table still resolve to distinct ids
#[test]
fn test_many_similar_keys() {
    let mut dict = Dictionary::in_memory();

    // near-identical keys stress hash quality and probe chains
    let mut ids = std::collections::HashSet::new();
    for i in 0..2000u32 {
        let key = format!("aaaaaaaa{}", i);
        let id = dict.insert(&key).unwrap().unwrap();
        assert!(ids.insert(id), "id {} assigned twice", id);
    }
    for i in 0..2000u32 {
        let key = format!("aaaaaaaa{}", i);
        let id = dict.lookup(&key).unwrap().unwrap();
        let back = dict.key_of(id).unwrap().unwrap();
        assert_eq!(back, key);
    }
}

/// A read-only handle sees the writer's flushed keys but cannot extend them
#[test]
fn test_read_only_view() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("d");
    {
        let mut dict = Dictionary::open_with(&path, Mode::Create, small_opts()).unwrap();
        dict.insert("frozen").unwrap();
        dict.close().unwrap();
    }

    let mut ro = Dictionary::open_with(&path, Mode::Read, small_opts()).unwrap();
    assert_eq!(ro.lookup("frozen").unwrap(), Some(1));
    assert_eq!(ro.insert("thawed").unwrap(), None);
    assert_eq!(ro.len(), 1);
}
