//! Two-tier TTL cache fronting expensive derived reads
//!
//! Memory tier for hot entries, disk tier for anything worth keeping across
//! runs. Expiry is lazy: entries are checked when read and removed when a
//! read finds them past their TTL. A disk hit restores the entry into
//! memory with its original expiry; a restore never extends lifetime.
//!
//! Keys are FNV-1a hashes over the entry type and a canonical rendering of
//! the query parameters, so logically equal queries share one entry no
//! matter how the caller ordered its JSON keys.

pub mod policy;

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CacheSettings;
use crate::error::Result;
use crate::fs_utils::write_json_atomic;
use crate::paths::canonicalize_path;
use crate::schema::fnv1a_hash;

pub use policy::{ttl_for_type, CachePolicy};

// ============================================================================
// Entries and keys
// ============================================================================

/// One cached value with its expiry metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub entry_type: String,
    pub params: Value,
    pub value: Value,
    pub cached_at: String,
    pub expires_at: String,
}

impl CacheEntry {
    pub fn new(entry_type: &str, params: Value, value: Value, ttl: Duration) -> Self {
        let now = Utc::now();
        let expires = now + chrono::Duration::milliseconds(ttl.as_millis() as i64);
        Self {
            key: cache_key(entry_type, &params),
            entry_type: entry_type.to_string(),
            params,
            value,
            cached_at: now.to_rfc3339(),
            expires_at: expires.to_rfc3339(),
        }
    }

    /// Whether the entry is past its TTL; an unparseable expiry counts as past
    pub fn is_expired(&self) -> bool {
        match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expiry) => Utc::now() >= expiry,
            Err(_) => true,
        }
    }
}

/// Deterministic cache key: FNV-1a over the type and canonical params JSON
pub fn cache_key(entry_type: &str, params: &Value) -> String {
    let canonical = canonical_json(params);
    format!("{:016x}", fnv1a_hash(&format!("{}:{}", entry_type, canonical)))
}

/// Render JSON with object keys sorted at every level
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).unwrap_or_default(),
                        canonical_json(&map[k.as_str()])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", rendered.join(","))
        }
        other => other.to_string(),
    }
}

// ============================================================================
// Lookups
// ============================================================================

/// Where a lookup was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Memory,
    Disk,
    Miss,
}

/// Outcome of a cache read
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub hit: bool,
    pub value: Option<Value>,
    pub source: CacheSource,
}

impl CacheLookup {
    fn hit(value: Value, source: CacheSource) -> Self {
        Self {
            hit: true,
            value: Some(value),
            source,
        }
    }

    fn miss() -> Self {
        Self {
            hit: false,
            value: None,
            source: CacheSource::Miss,
        }
    }
}

/// Which entries an invalidation targets
///
/// `entry_type` must match exactly; `path` matches when the entry's
/// `params.path` equals it or lives underneath it (component-wise, never
/// substring containment). An empty pattern matches nothing.
#[derive(Debug, Clone, Default)]
pub struct InvalidatePattern {
    pub entry_type: Option<String>,
    pub path: Option<PathBuf>,
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub disk_entries: usize,
    pub disk_bytes: u64,
    pub base_dir: String,
}

// ============================================================================
// Memory tier
// ============================================================================

struct MemoryEntry {
    entry: CacheEntry,
    /// Insertion order, drives eviction
    seq: u64,
}

#[derive(Default)]
struct MemoryTier {
    entries: HashMap<String, MemoryEntry>,
    next_seq: u64,
}

impl MemoryTier {
    fn insert(&mut self, entry: CacheEntry, cap: usize, evict: usize) {
        if !self.entries.contains_key(&entry.key) && self.entries.len() >= cap {
            self.evict_oldest(evict);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(entry.key.clone(), MemoryEntry { entry, seq });
    }

    fn evict_oldest(&mut self, count: usize) {
        let mut ordered: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|(key, held)| (held.seq, key.clone()))
            .collect();
        ordered.sort();
        for (_, key) in ordered.into_iter().take(count) {
            self.entries.remove(&key);
        }
    }
}

// ============================================================================
// QueryCache
// ============================================================================

/// The two-tier cache service
pub struct QueryCache {
    base_dir: PathBuf,
    policy: CachePolicy,
    memory: Mutex<MemoryTier>,
}

impl QueryCache {
    /// Open a cache rooted at the default base directory
    pub fn new(settings: &CacheSettings) -> Self {
        Self::at(get_cache_base_dir().join("query"), settings)
    }

    /// Open a cache rooted at an explicit directory
    pub fn at(base_dir: PathBuf, settings: &CacheSettings) -> Self {
        Self {
            base_dir,
            policy: CachePolicy::from_settings(settings),
            memory: Mutex::new(MemoryTier::default()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Look a query up, memory tier first
    pub fn get(&self, entry_type: &str, params: &Value) -> CacheLookup {
        let key = cache_key(entry_type, params);

        {
            let mut memory = self.memory.lock();
            if let Some(held) = memory.entries.get(&key) {
                if held.entry.is_expired() {
                    memory.entries.remove(&key);
                    drop(memory);
                    let _ = fs::remove_file(self.entry_path(&key));
                    return CacheLookup::miss();
                }
                return CacheLookup::hit(held.entry.value.clone(), CacheSource::Memory);
            }
        }

        let path = self.entry_path(&key);
        let Some(entry) = read_entry(&path) else {
            return CacheLookup::miss();
        };
        if entry.is_expired() {
            let _ = fs::remove_file(&path);
            return CacheLookup::miss();
        }

        let value = entry.value.clone();
        // restore keeps the stored expiry, a disk hit must not extend lifetime
        self.memory.lock().insert(
            entry,
            self.policy.max_memory_entries,
            self.policy.memory_evict_count(),
        );
        CacheLookup::hit(value, CacheSource::Disk)
    }

    /// Cache a value; failures are absorbed, caching stays best-effort
    pub fn set(&self, entry_type: &str, params: Value, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or_else(|| ttl_for_type(entry_type));

        let serialized = value.to_string();
        if serialized.len() > self.policy.max_entry_bytes {
            tracing::debug!(
                "[CACHE] Skipping oversized {} entry ({} bytes)",
                entry_type,
                serialized.len()
            );
            return;
        }

        let entry = CacheEntry::new(entry_type, params, value, ttl);

        // short-lived entries stay memory-only
        if ttl > self.policy.persist_min_ttl {
            if let Err(e) = self.persist_entry(&entry) {
                tracing::warn!("[CACHE] Failed to persist {}: {}", entry.key, e);
            }
        }

        self.memory.lock().insert(
            entry,
            self.policy.max_memory_entries,
            self.policy.memory_evict_count(),
        );
    }

    /// Drop matching entries from both tiers, returns distinct keys removed
    pub fn invalidate(&self, pattern: &InvalidatePattern) -> usize {
        if pattern.entry_type.is_none() && pattern.path.is_none() {
            return 0;
        }

        let mut removed: BTreeSet<String> = BTreeSet::new();

        {
            let mut memory = self.memory.lock();
            let doomed: Vec<String> = memory
                .entries
                .values()
                .filter(|held| matches_pattern(&held.entry, pattern))
                .map(|held| held.entry.key.clone())
                .collect();
            for key in doomed {
                memory.entries.remove(&key);
                removed.insert(key);
            }
        }

        for file in self.disk_entries() {
            let Some(entry) = read_entry(&file.path) else {
                continue;
            };
            if matches_pattern(&entry, pattern) && fs::remove_file(&file.path).is_ok() {
                removed.insert(entry.key);
            }
        }

        if !removed.is_empty() {
            tracing::debug!("[CACHE] Invalidated {} entries", removed.len());
        }
        removed.len()
    }

    /// Drop everything from both tiers
    pub fn clear(&self) {
        self.memory.lock().entries.clear();
        for file in self.disk_entries() {
            let _ = fs::remove_file(&file.path);
        }
    }

    pub fn stats(&self) -> CacheStats {
        let files = self.disk_entries();
        CacheStats {
            memory_entries: self.memory.lock().entries.len(),
            disk_entries: files.len(),
            disk_bytes: files.iter().map(|f| f.size).sum(),
            base_dir: self.base_dir.display().to_string(),
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", key))
    }

    fn persist_entry(&self, entry: &CacheEntry) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        write_json_atomic(&self.entry_path(&entry.key), entry)?;
        self.enforce_disk_caps();
        Ok(())
    }

    fn enforce_disk_caps(&self) {
        let mut files = self.disk_entries();
        let total: u64 = files.iter().map(|f| f.size).sum();
        if files.len() <= self.policy.max_disk_entries && total <= self.policy.max_disk_bytes {
            return;
        }

        files.sort_by_key(|f| f.modified);
        let entry_target = self.policy.disk_entry_target();
        let bytes_target = self.policy.disk_bytes_target();

        let mut count = files.len();
        let mut bytes = total;
        let mut dropped = 0usize;
        for file in &files {
            if count <= entry_target && bytes <= bytes_target {
                break;
            }
            if fs::remove_file(&file.path).is_ok() {
                count -= 1;
                bytes = bytes.saturating_sub(file.size);
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::debug!("[CACHE] Evicted {} oldest disk entries", dropped);
        }
    }

    fn disk_entries(&self) -> Vec<DiskEntry> {
        let Ok(reader) = fs::read_dir(&self.base_dir) else {
            return Vec::new();
        };
        reader
            .flatten()
            .filter_map(|dirent| {
                let path = dirent.path();
                if path.extension().map(|e| e != "json").unwrap_or(true) {
                    return None;
                }
                let meta = dirent.metadata().ok()?;
                if !meta.is_file() {
                    return None;
                }
                Some(DiskEntry {
                    path,
                    size: meta.len(),
                    modified: meta.modified().ok()?,
                })
            })
            .collect()
    }
}

struct DiskEntry {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Read a disk entry, deleting it when unreadable
fn read_entry(path: &Path) -> Option<CacheEntry> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::debug!("[CACHE] Dropping unreadable entry {}: {}", path.display(), e);
            let _ = fs::remove_file(path);
            None
        }
    }
}

fn matches_pattern(entry: &CacheEntry, pattern: &InvalidatePattern) -> bool {
    if let Some(wanted) = &pattern.entry_type {
        if &entry.entry_type != wanted {
            return false;
        }
    }
    if let Some(prefix) = &pattern.path {
        let Some(entry_path) = entry.params.get("path").and_then(|v| v.as_str()) else {
            return false;
        };
        let prefix = canonicalize_path(prefix);
        if !canonicalize_path(Path::new(entry_path)).starts_with(&prefix) {
            return false;
        }
    }
    true
}

/// Cache base directory: `$XDG_CACHE_HOME/codemap`, else `~/.cache/codemap`,
/// else a temp-dir fallback
pub fn get_cache_base_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("codemap");
        }
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".cache").join("codemap");
    }
    std::env::temp_dir().join("codemap-cache")
}

// ============================================================================
// Tests
// ============================================================================
