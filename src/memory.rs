//! Per-project memory directory management
//!
//! Each project owns one memory directory holding the five derived JSON
//! documents. The directory location comes from the registry (`memoryPath`,
//! resolved against the project root when relative) so the documents can
//! live inside the tree (`.codemap/`) or anywhere else.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ProjectConfig;
use crate::error::Result;
use crate::fs_utils::sweep_orphan_temp_files;

/// Memory directory structure manager
#[derive(Debug, Clone)]
pub struct MemoryDir {
    /// Root of the memory directory for this project
    root: PathBuf,
}

impl MemoryDir {
    /// Memory directory for a registered project
    pub fn for_project(project: &ProjectConfig) -> Self {
        Self {
            root: project.memory_dir(),
        }
    }

    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory and sweep temp files left by interrupted writes
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let swept = sweep_orphan_temp_files(&self.root);
        if swept > 0 {
            tracing::debug!(
                "[STORE] Swept {} orphan temp file(s) from {}",
                swept,
                self.root.display()
            );
        }
        Ok(())
    }

    /// Check if the memory directory exists and holds a file listing
    pub fn exists(&self) -> bool {
        self.root.exists() && self.listing_path().exists()
    }

    // ========== Path accessors ==========

    /// Path to index.json (the file listing)
    pub fn listing_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    /// Path to functions.json
    pub fn functions_path(&self) -> PathBuf {
        self.root.join("functions.json")
    }

    /// Path to summaries.json
    pub fn summaries_path(&self) -> PathBuf {
        self.root.join("summaries.json")
    }

    /// Path to schema.json (collection references)
    pub fn schema_path(&self) -> PathBuf {
        self.root.join("schema.json")
    }

    /// Path to graph.json (the navigation graph)
    pub fn graph_path(&self) -> PathBuf {
        self.root.join("graph.json")
    }

    // ========== Utility methods ==========

    /// Total size of the memory directory in bytes
    pub fn size(&self) -> u64 {
        dir_size(&self.root)
    }
}

/// Calculate total size of a directory
pub fn dir_size(path: &Path) -> u64 {
    fs::read_dir(path)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                dir_size(&path)
            } else {
                fs::metadata(&path).map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}
