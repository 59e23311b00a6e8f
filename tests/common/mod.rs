//! Common test utilities and fixtures for codemap-engine integration tests
//!
//! Provides `TestProject`, a throwaway project tree with helpers for opening
//! stores, reading the derived documents back, and writing registry files,
//! plus source snippets shaped like the codebases the extractor targets.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use codemap_engine::config::{EngineSettings, ProjectConfig, Registry};
use codemap_engine::extract::LexicalExtractor;
use codemap_engine::index::IndexStore;
use codemap_engine::memory::MemoryDir;
use codemap_engine::schema::{
    FunctionsIndex, NavigationGraph, ProjectListing, SchemaIndex, SummariesIndex,
};

/// A temp directory holding one project tree and its memory directory
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    /// Create an empty project
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Path to the project root
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Project config pointing at this tree, memory under `.codemap`
    pub fn project(&self) -> ProjectConfig {
        ProjectConfig {
            id: "app".to_string(),
            path: self.dir.path().to_path_buf(),
            memory_path: PathBuf::from(".codemap"),
            ignore_patterns: vec![],
            scan_interval_ms: 30_000,
            sync_command: None,
        }
    }

    /// Registry containing only this project, debounce shortened for tests
    pub fn registry(&self) -> Registry {
        Registry {
            projects: vec![self.project()],
            settings: EngineSettings {
                debounce_ms: 100,
                ..EngineSettings::default()
            },
        }
    }

    /// Write the registry JSON into the tree and return its path
    pub fn write_registry(&self) -> PathBuf {
        let path = self.dir.path().join("projects.json");
        let json = serde_json::to_string_pretty(&self.registry()).expect("serialize registry");
        fs::write(&path, json).expect("write registry");
        path
    }

    /// Add a source file, creating parent directories as needed
    pub fn add_file(&self, relative_path: &str, content: &str) -> &Self {
        let full_path = self.dir.path().join(relative_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("failed to write file");
        self
    }

    /// Delete a source file
    pub fn remove_file(&self, relative_path: &str) -> &Self {
        fs::remove_file(self.dir.path().join(relative_path)).expect("failed to remove file");
        self
    }

    /// Open an index store over this project
    pub fn store(&self) -> IndexStore {
        IndexStore::open(self.project(), Box::<LexicalExtractor>::default())
            .expect("failed to open index store")
    }

    /// The project's memory directory
    pub fn memory(&self) -> MemoryDir {
        MemoryDir::for_project(&self.project())
    }

    // ========================================================================
    // Document readers
    // ========================================================================

    pub fn listing(&self) -> ProjectListing {
        read_doc(&self.memory().listing_path())
    }

    pub fn functions_index(&self) -> FunctionsIndex {
        read_doc(&self.memory().functions_path())
    }

    pub fn summaries(&self) -> SummariesIndex {
        read_doc(&self.memory().summaries_path())
    }

    pub fn schema_index(&self) -> SchemaIndex {
        read_doc(&self.memory().schema_path())
    }

    pub fn graph(&self) -> NavigationGraph {
        read_doc(&self.memory().graph_path())
    }

    /// All five document paths, listing first
    pub fn doc_paths(&self) -> Vec<PathBuf> {
        let memory = self.memory();
        vec![
            memory.listing_path(),
            memory.functions_path(),
            memory.summaries_path(),
            memory.schema_path(),
            memory.graph_path(),
        ]
    }

    /// Raw bytes of every document, for determinism checks
    pub fn doc_bytes(&self) -> Vec<Vec<u8>> {
        self.doc_paths()
            .iter()
            .map(|p| fs::read(p).expect("read document"))
            .collect()
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

fn read_doc<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let raw = fs::read_to_string(path).expect("document missing");
    serde_json::from_str(&raw).expect("document unreadable")
}

// ============================================================================
// Source snippets
// ============================================================================

/// A screen component: functions, hooks, state, navigation, a collection
pub fn feed_screen() -> &'static str {
    r#"import React, { useState, useEffect } from 'react';
import { View, FlatList } from 'react-native';
import { db, collection } from '../firebase';

export default function FeedScreen({ navigation }) {
  const [posts, setPosts] = useState([]);
  useEffect(() => {
    const ref = collection(db, 'posts');
    ref.get().then(snapshot => setPosts(snapshot.docs));
  }, []);
  const openPost = (id) => {
    navigation.navigate('PostDetail');
  };
  return <FlatList data={posts} />;
}
"#
}

/// A plain utility module, no component markers
pub fn util_module() -> &'static str {
    r#"export function formatDate(date) {
  return date.toISOString().slice(0, 10);
}

export const clamp = (n, lo, hi) => {
  return Math.min(hi, Math.max(lo, n));
};
"#
}

/// A custom hook module
pub fn hook_module() -> &'static str {
    r#"import { useState, useCallback } from 'react';

export function useToggle(initial) {
  const [on, setOn] = useState(initial);
  const toggle = useCallback(() => setOn(v => !v), []);
  return [on, toggle];
}
"#
}
