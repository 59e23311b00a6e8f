//! Unified path resolution helpers
//!
//! Registry entries, cache invalidation targets, and process working
//! directories all arrive as paths from different sources. This module keeps
//! the resolution and comparison rules in one place so every code path
//! behaves the same way.

use std::path::{Path, PathBuf};

use crate::{EngineError, Result};

/// Resolve path from `Option<PathBuf>`, defaulting to CWD if None.
///
/// - Absolute paths are returned as-is
/// - Relative paths are joined with the current working directory
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined.
pub fn resolve_pathbuf(path: Option<&PathBuf>) -> Result<PathBuf> {
    match path {
        Some(p) => {
            if p.is_absolute() {
                Ok(p.clone())
            } else {
                let cwd = std::env::current_dir().map_err(|e| EngineError::FileNotFound {
                    path: format!("current directory: {}", e),
                })?;
                Ok(cwd.join(p))
            }
        }
        None => std::env::current_dir().map_err(|e| EngineError::FileNotFound {
            path: format!("current directory: {}", e),
        }),
    }
}

/// Canonicalize path for consistent comparison.
///
/// Attempts to resolve symlinks and get the absolute path. If canonicalization
/// fails (e.g., path doesn't exist), returns the original path unchanged.
///
/// Note: For Windows path normalization (UNC paths, \\?\ prefix), use
/// `fs_utils::normalize_path` instead.
pub fn canonicalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Check if a path exists and is a directory.
///
/// Returns Ok(path) if valid directory, Err otherwise.
pub fn ensure_directory(path: &Path) -> Result<&Path> {
    if !path.exists() {
        return Err(EngineError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    if !path.is_dir() {
        return Err(EngineError::FileNotFound {
            path: format!("{} is not a directory", path.display()),
        });
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_pathbuf_none_returns_cwd() {
        let result = resolve_pathbuf(None).unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(result, cwd);
    }

    #[test]
    fn test_resolve_pathbuf_absolute() {
        let path = PathBuf::from("/tmp");
        let result = resolve_pathbuf(Some(&path)).unwrap();
        assert_eq!(result, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_resolve_pathbuf_relative() {
        let path = PathBuf::from("src");
        let result = resolve_pathbuf(Some(&path)).unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(result, cwd.join("src"));
    }

    #[test]
    fn test_canonicalize_path_existing() {
        let cwd = std::env::current_dir().unwrap();
        let canonicalized = canonicalize_path(&cwd);
        // Canonicalized path should be absolute
        assert!(canonicalized.is_absolute());
    }

    #[test]
    fn test_canonicalize_path_nonexistent() {
        let fake_path = PathBuf::from("/this/path/does/not/exist/xyz");
        let canonicalized = canonicalize_path(&fake_path);
        // Should return original since canonicalization fails
        assert_eq!(canonicalized, fake_path);
    }

    #[test]
    fn test_ensure_directory_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();

        assert!(ensure_directory(dir.path()).is_ok());
        assert!(ensure_directory(&file).is_err());
        assert!(ensure_directory(&dir.path().join("missing")).is_err());
    }
}
