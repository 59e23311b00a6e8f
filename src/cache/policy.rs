//! TTL policy table and size caps for the query cache

use std::time::Duration;

use crate::config::CacheSettings;

/// Status queries go stale quickly
pub const STATUS_TTL: Duration = Duration::from_secs(30);
/// Directory listings
pub const LIST_TTL: Duration = Duration::from_secs(120);
/// File content reads
pub const READ_TTL: Duration = Duration::from_secs(600);
/// Everything else
pub const GENERIC_TTL: Duration = Duration::from_secs(60);

/// TTL for an entry type when the caller does not pass one
pub fn ttl_for_type(entry_type: &str) -> Duration {
    match entry_type {
        "status" => STATUS_TTL,
        "list" | "ls" => LIST_TTL,
        "read" | "cat" | "file" => READ_TTL,
        _ => GENERIC_TTL,
    }
}

/// Size caps and eviction thresholds for both tiers
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub max_memory_entries: usize,
    pub max_disk_entries: usize,
    pub max_disk_bytes: u64,
    /// Serialized values above this are not cached at all
    pub max_entry_bytes: usize,
    /// Entries with a TTL at or below this stay memory-only
    pub persist_min_ttl: Duration,
    /// Fraction of memory entries dropped per eviction pass
    pub memory_evict_ratio: f64,
    /// Disk usage shrinks to this fraction of the cap on eviction
    pub disk_low_water_ratio: f64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_settings(&CacheSettings::default())
    }
}

impl CachePolicy {
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            max_memory_entries: settings.max_memory_entries,
            max_disk_entries: settings.max_disk_entries,
            max_disk_bytes: settings.max_disk_bytes,
            max_entry_bytes: settings.max_entry_bytes,
            persist_min_ttl: Duration::from_secs(settings.persist_min_ttl_secs),
            memory_evict_ratio: 0.10,
            disk_low_water_ratio: 0.80,
        }
    }

    /// How many memory entries one eviction pass removes
    pub fn memory_evict_count(&self) -> usize {
        ((self.max_memory_entries as f64 * self.memory_evict_ratio).ceil() as usize).max(1)
    }

    /// Entry-count target after a disk eviction pass
    pub fn disk_entry_target(&self) -> usize {
        (self.max_disk_entries as f64 * self.disk_low_water_ratio) as usize
    }

    /// Byte target after a disk eviction pass
    pub fn disk_bytes_target(&self) -> u64 {
        (self.max_disk_bytes as f64 * self.disk_low_water_ratio) as u64
    }
}

// ============================================================================
// Tests
// ============================================================================
