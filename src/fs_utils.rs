//! Filesystem utilities shared by the index store and the cache tiers
//!
//! Everything that touches the derived JSON documents goes through the
//! write-to-temp-then-rename protocol in this module, so readers only ever
//! observe a complete old document or a complete new one:
//! - `normalize_path`: Strips Windows `\\?\` prefix from canonicalized paths
//! - `atomic_rename`: Handles atomic file replacement (Windows requires explicit delete)
//! - `write_json_atomic`: Serialize + temp file + rename, the only write path
//! - `read_json_lenient`: Corrupt documents read as absent, never as a crash

use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Normalize Windows paths by removing the `\\?\` prefix if present.
///
/// On Windows, `Path::canonicalize()` returns paths with the extended-length
/// path prefix (`\\?\C:\...`), which breaks string comparison against the
/// configured project roots and confuses user-facing output. This strips the
/// prefix on Windows while being a no-op on Unix.
pub fn normalize_path(path: &Path) -> PathBuf {
    #[cfg(windows)]
    {
        let s = path.to_string_lossy();
        // Handle UNC paths: \\?\UNC\server\share -> \\server\share
        if let Some(stripped) = s.strip_prefix(r"\\?\UNC\") {
            return PathBuf::from(format!(r"\\{}", stripped));
        }
        // Handle local paths: \\?\C:\path -> C:\path
        if let Some(stripped) = s.strip_prefix(r"\\?\") {
            return PathBuf::from(stripped);
        }
    }
    path.to_path_buf()
}

/// Cross-platform atomic rename that handles Windows file replacement.
///
/// On Unix, `fs::rename` atomically replaces the target if it exists.
/// On Windows, `fs::rename` fails if the target exists, so the target is
/// deleted first for consistent behavior.
pub fn atomic_rename(src: &Path, dst: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        if dst.exists() {
            std::fs::remove_file(dst)?;
        }
    }
    std::fs::rename(src, dst)
}

/// Build a uniquely-named temp path in the same directory as `target`.
///
/// Same directory is required: `rename` is only atomic within a filesystem.
fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let tmp_name = format!(".{}.{}.{}.tmp", name, std::process::id(), nanos);
    match target.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}

/// Serialize a document as pretty JSON and atomically replace `target`.
///
/// The full new document is written to a uniquely-named temp file in the
/// target's directory, then renamed over the target path. A crash before the
/// rename leaves at worst an orphaned temp file, never a partial target.
pub fn write_json_atomic<T: Serialize>(target: &Path, value: &T) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = temp_path_for(target);
    let json = serde_json::to_vec_pretty(value)?;
    if let Err(e) = std::fs::write(&tmp, &json) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Err(e) = atomic_rename(&tmp, target) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Read a JSON document, treating a missing or corrupt file as absent.
///
/// Returns `None` when the file does not exist or does not parse; a corrupt
/// derived document is rebuilt fresh by the caller rather than crashing the
/// process.
pub fn read_json_lenient<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!("[STORE] Failed to read {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                "[STORE] Corrupt document {} ({}), treating as absent",
                path.display(),
                e
            );
            None
        }
    }
}

/// Remove leftover temp files from a previous crashed run.
///
/// Orphaned `.*.tmp` siblings are harmless to readers but accumulate; a
/// startup sweep keeps the memory directory tidy.
pub fn sweep_orphan_temp_files(dir: &Path) -> usize {
    let mut removed = 0;
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') && name.ends_with(".tmp") && path.is_file() {
            if std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        name: String,
        count: usize,
    }

    #[test]
    fn test_normalize_path_preserves_regular_paths() {
        let unix_path = PathBuf::from("/home/user/project");
        assert_eq!(normalize_path(&unix_path), unix_path);
    }

    #[test]
    fn test_atomic_rename_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("new.json");
        let dst = dir.path().join("existing.json");

        std::fs::write(&dst, "old content").unwrap();
        std::fs::write(&src, "new content").unwrap();

        atomic_rename(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "new content");
    }

    #[test]
    fn test_write_json_atomic_roundtrip() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("doc.json");
        let doc = Doc {
            name: "functions".to_string(),
            count: 3,
        };

        write_json_atomic(&target, &doc).unwrap();

        let loaded: Doc = read_json_lenient(&target).unwrap();
        assert_eq!(loaded, doc);

        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_write_json_atomic_replaces_whole_document() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("doc.json");

        write_json_atomic(
            &target,
            &Doc {
                name: "a".to_string(),
                count: 1,
            },
        )
        .unwrap();
        write_json_atomic(
            &target,
            &Doc {
                name: "b".to_string(),
                count: 2,
            },
        )
        .unwrap();

        let loaded: Doc = read_json_lenient(&target).unwrap();
        assert_eq!(loaded.name, "b");
        assert_eq!(loaded.count, 2);
    }

    #[test]
    fn test_read_json_lenient_missing_file() {
        let dir = TempDir::new().unwrap();
        let loaded: Option<Doc> = read_json_lenient(&dir.path().join("nope.json"));
        assert!(loaded.is_none());
    }

    #[test]
    fn test_read_json_lenient_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("broken.json");
        std::fs::write(&target, "{ not json").unwrap();

        let loaded: Option<Doc> = read_json_lenient(&target);
        assert!(loaded.is_none());
    }

    #[test]
    fn test_sweep_orphan_temp_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".functions.json.123.456.tmp"), "x").unwrap();
        std::fs::write(dir.path().join("functions.json"), "{}").unwrap();

        let removed = sweep_orphan_temp_files(dir.path());

        assert_eq!(removed, 1);
        assert!(dir.path().join("functions.json").exists());
    }
}
