//! Integration tests for the query cache disk tier
//!
//! The in-module unit tests cover keys, TTL policy, and both tiers in a
//! single process. These tests cover what only shows up across instances:
//! persisted entries surviving a restart, sweeping of expired or unreadable
//! files, and disk eviction order.
//!
//! ```bash
//! cargo test --test cache_tests
//! ```

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

use codemap_engine::cache::{cache_key, CacheSource};
use codemap_engine::{CacheSettings, QueryCache};

fn cache_at(dir: &TempDir, settings: &CacheSettings) -> QueryCache {
    QueryCache::at(dir.path().join("query"), settings)
}

/// Path of the on-disk file backing an entry
fn entry_file(dir: &TempDir, entry_type: &str, params: &Value) -> PathBuf {
    dir.path()
        .join("query")
        .join(format!("{}.json", cache_key(entry_type, params)))
}

#[test]
fn test_expired_persisted_entry_is_swept_on_read() {
    let dir = TempDir::new().unwrap();
    let params = json!({"path": "/proj/a.js"});
    cache_at(&dir, &CacheSettings::default()).set("read", params.clone(), json!("body"), None);

    // push the stored expiry into the past
    let file = entry_file(&dir, "read", &params);
    let mut entry: Value = serde_json::from_slice(&fs::read(&file).unwrap()).unwrap();
    entry["expiresAt"] = json!("2000-01-01T00:00:00+00:00");
    fs::write(&file, serde_json::to_vec(&entry).unwrap()).unwrap();

    let fresh = cache_at(&dir, &CacheSettings::default());
    assert!(!fresh.get("read", &params).hit);
    assert!(!file.exists());
    assert_eq!(fresh.stats().disk_entries, 0);
}

#[test]
fn test_unreadable_disk_entry_is_swept_on_read() {
    let dir = TempDir::new().unwrap();
    let params = json!({"path": "/proj/a.js"});
    cache_at(&dir, &CacheSettings::default()).set("read", params.clone(), json!("body"), None);

    let file = entry_file(&dir, "read", &params);
    fs::write(&file, "{ not json").unwrap();

    let fresh = cache_at(&dir, &CacheSettings::default());
    assert!(!fresh.get("read", &params).hit);
    assert!(!file.exists());
}

#[test]
fn test_disk_restore_does_not_rewrite_the_entry() {
    let dir = TempDir::new().unwrap();
    let params = json!({"path": "/proj/a.js"});
    cache_at(&dir, &CacheSettings::default()).set("read", params.clone(), json!("body"), None);

    let file = entry_file(&dir, "read", &params);
    let stored = fs::read(&file).unwrap();

    let fresh = cache_at(&dir, &CacheSettings::default());
    assert_eq!(fresh.get("read", &params).source, CacheSource::Disk);

    // the restore reuses the stored expiry instead of stamping a new one
    assert_eq!(fs::read(&file).unwrap(), stored);
}

#[test]
fn test_disk_eviction_drops_oldest_files_first() {
    let dir = TempDir::new().unwrap();
    let settings = CacheSettings {
        max_disk_entries: 5,
        ..CacheSettings::default()
    };
    let cache = cache_at(&dir, &settings);

    for i in 0..6 {
        cache.set("read", json!({"path": format!("/proj/{}.js", i)}), json!(i), None);
        // distinct mtimes so eviction order is well defined
        thread::sleep(Duration::from_millis(25));
    }

    let stats = cache.stats();
    assert!(stats.disk_entries <= 5, "still {} on disk", stats.disk_entries);

    // a fresh instance sees only the disk tier
    let fresh = cache_at(&dir, &settings);
    assert!(!fresh.get("read", &json!({"path": "/proj/0.js"})).hit);
    assert!(fresh.get("read", &json!({"path": "/proj/5.js"})).hit);
}

#[test]
fn test_memory_expiry_is_lazy() {
    let dir = TempDir::new().unwrap();
    let cache = cache_at(&dir, &CacheSettings::default());
    let params = json!({"path": "/proj/a.js"});

    // below the persistence threshold, so memory-only
    cache.set("status", params.clone(), json!(1), Some(Duration::from_millis(40)));
    assert!(cache.get("status", &params).hit);

    thread::sleep(Duration::from_millis(80));
    assert!(!cache.get("status", &params).hit);
    assert_eq!(cache.stats().memory_entries, 0);
}
