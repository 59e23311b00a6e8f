//! Full-project scanning and path filtering
//!
//! One filter decides what counts as indexable, shared by the tree walk and
//! the watcher so a path never flips status depending on how it arrived.
//! The walk itself uses the `ignore` crate; unreadable directories are
//! logged and skipped, never fatal.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;

use crate::config::ProjectConfig;
use crate::schema::FileRecord;
use crate::{EngineError, Result};

/// Extensions treated as indexable source
pub const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx"];

/// Directory names never worth descending into
pub const NOISE_DIRS: &[&str] = &[
    "node_modules",
    "build",
    "dist",
    ".git",
    "target",
    "coverage",
    "__pycache__",
    ".expo",
];

// ============================================================================
// Filter
// ============================================================================

/// Path acceptance rules for one project
///
/// Applies, in order: the project's own memory directory, dotfile
/// components, the built-in noise list, and the registry `ignorePatterns`
/// compiled as gitignore globs.
#[derive(Debug, Clone)]
pub struct ProjectFilter {
    root: PathBuf,
    memory_root: PathBuf,
    ignore: Option<Gitignore>,
}

impl ProjectFilter {
    pub fn compile(project: &ProjectConfig) -> Result<Self> {
        let ignore = if project.ignore_patterns.is_empty() {
            None
        } else {
            let mut builder = GitignoreBuilder::new(project.root());
            for pattern in &project.ignore_patterns {
                builder
                    .add_line(None, pattern)
                    .map_err(|e| EngineError::ConfigError {
                        message: format!(
                            "project '{}' has an invalid ignore pattern '{}': {}",
                            project.id, pattern, e
                        ),
                    })?;
            }
            Some(builder.build().map_err(|e| EngineError::ConfigError {
                message: format!("project '{}' ignore patterns: {}", project.id, e),
            })?)
        };

        Ok(Self {
            root: project.root().to_path_buf(),
            memory_root: project.memory_dir(),
            ignore,
        })
    }

    /// Whether `abs` may be walked into or indexed at all
    pub fn allows(&self, abs: &Path, is_dir: bool) -> bool {
        if abs == self.root {
            return true;
        }
        if abs.starts_with(&self.memory_root) {
            return false;
        }

        let rel = match abs.strip_prefix(&self.root) {
            Ok(rel) => rel,
            Err(_) => return false, // outside the project root
        };

        for component in rel.components() {
            let name = component.as_os_str().to_string_lossy();
            if name.starts_with('.') || NOISE_DIRS.contains(&name.as_ref()) {
                return false;
            }
        }

        if let Some(ignore) = &self.ignore {
            if ignore.matched_path_or_any_parents(rel, is_dir).is_ignore() {
                return false;
            }
        }

        true
    }

    /// Whether `abs` has an indexable source extension
    pub fn is_source_file(&self, abs: &Path) -> bool {
        abs.extension()
            .and_then(|e| e.to_str())
            .map(|e| SOURCE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Full check applied to watcher event paths
    pub fn accepts_event(&self, abs: &Path) -> bool {
        self.is_source_file(abs) && self.allows(abs, false)
    }
}

/// Project-relative key with forward slashes, `None` outside the root
pub fn relative_key(root: &Path, abs: &Path) -> Option<String> {
    let rel = abs.strip_prefix(root).ok()?;
    let key = rel.to_string_lossy().replace('\\', "/");
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

// ============================================================================
// Walk
// ============================================================================

/// Walk the project tree and stat every indexable source file
///
/// Returns the authoritative relative-path → record map for `index.json`.
/// The walker's own git handling stays off: the only exclusions are the
/// filter's, so scans behave identically in and out of git worktrees.
pub fn collect_source_files(
    project: &ProjectConfig,
    filter: &ProjectFilter,
) -> BTreeMap<String, FileRecord> {
    let mut files = BTreeMap::new();
    let entry_filter = filter.clone();

    // dotfile handling lives in the filter, keyed on root-relative
    // components, so a hidden-named project root still scans
    let walker = WalkBuilder::new(project.root())
        .hidden(false)
        .ignore(false)
        .parents(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            entry_filter.allows(entry.path(), is_dir)
        })
        .build();

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("[SCAN] Skipping unreadable entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if !filter.is_source_file(entry.path()) {
            continue;
        }
        let Some(rel) = relative_key(project.root(), entry.path()) else {
            continue;
        };
        if let Some(record) = FileRecord::from_disk(&rel, entry.path()) {
            files.insert(rel, record);
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project_in(dir: &TempDir, ignore_patterns: &[&str]) -> ProjectConfig {
        ProjectConfig {
            id: "test".to_string(),
            path: dir.path().to_path_buf(),
            memory_path: PathBuf::from(".codemap"),
            ignore_patterns: ignore_patterns.iter().map(|s| s.to_string()).collect(),
            scan_interval_ms: 30_000,
            sync_command: None,
        }
    }

    fn add_file(dir: &TempDir, rel: &str) {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "export const x = 1;\n").unwrap();
    }

    #[test]
    fn test_collect_filters_noise_and_extensions() {
        let dir = TempDir::new().unwrap();
        add_file(&dir, "App.js");
        add_file(&dir, "screens/Home.tsx");
        add_file(&dir, "node_modules/lib/index.js");
        add_file(&dir, "build/bundle.js");
        add_file(&dir, ".hidden/secret.js");
        add_file(&dir, "README.md");
        add_file(&dir, ".codemap/functions.json");

        let project = project_in(&dir, &[]);
        let filter = ProjectFilter::compile(&project).unwrap();
        let files = collect_source_files(&project, &filter);

        let keys: Vec<&String> = files.keys().collect();
        assert_eq!(keys, vec!["App.js", "screens/Home.tsx"]);
        assert_eq!(files["App.js"].file_type, "js");
        assert!(files["App.js"].size > 0);
    }

    #[test]
    fn test_ignore_patterns() {
        let dir = TempDir::new().unwrap();
        add_file(&dir, "App.js");
        add_file(&dir, "App.test.js");
        add_file(&dir, "storybook/Story.jsx");

        let project = project_in(&dir, &["*.test.js", "storybook/"]);
        let filter = ProjectFilter::compile(&project).unwrap();
        let files = collect_source_files(&project, &filter);

        let keys: Vec<&String> = files.keys().collect();
        assert_eq!(keys, vec!["App.js"]);
    }

    #[test]
    fn test_invalid_ignore_pattern_is_config_error() {
        let dir = TempDir::new().unwrap();
        let project = project_in(&dir, &["a/**b/["]);
        assert!(matches!(
            ProjectFilter::compile(&project),
            Err(EngineError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_accepts_event() {
        let dir = TempDir::new().unwrap();
        let project = project_in(&dir, &["*.gen.ts"]);
        let filter = ProjectFilter::compile(&project).unwrap();

        assert!(filter.accepts_event(&dir.path().join("src/Feed.tsx")));
        assert!(!filter.accepts_event(&dir.path().join("src/Feed.gen.ts")));
        assert!(!filter.accepts_event(&dir.path().join("notes.txt")));
        assert!(!filter.accepts_event(&dir.path().join("node_modules/pkg/a.js")));
        assert!(!filter.accepts_event(&dir.path().join(".codemap/index.json")));
        assert!(!filter.accepts_event(&dir.path().join(".env.js")));
    }

    #[test]
    fn test_relative_key_uses_forward_slashes() {
        let root = Path::new("/work/app");
        assert_eq!(
            relative_key(root, Path::new("/work/app/screens/Home.tsx")),
            Some("screens/Home.tsx".to_string())
        );
        assert_eq!(relative_key(root, Path::new("/elsewhere/x.js")), None);
        assert_eq!(relative_key(root, root), None);
    }
}
