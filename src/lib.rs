//! codemap-engine: incremental code index engine
//!
//! Watches registered project trees and keeps five derived JSON documents
//! per project continuously consistent with the files on disk: a file
//! listing, a function index, structural summaries, a datastore schema
//! index, and a navigation graph.
//!
//! Indexing is contention-aware. While a project's dev tooling is running
//! (a bundler port is open or a known dev process is alive), changes are
//! deferred into per-project batches and drained either when the tooling
//! goes quiet or on the project's scan interval, so index writes never
//! race a hot reload.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//!
//! use codemap_engine::extract::LexicalExtractor;
//! use codemap_engine::index::IndexStore;
//! use codemap_engine::Registry;
//!
//! let registry = Registry::load(Path::new("projects.json"))?;
//! let project = registry.project("app")?.clone();
//!
//! let mut store = IndexStore::open(project, Box::new(LexicalExtractor::default()))?;
//! let summary = store.full_scan()?;
//! println!("indexed {} files", summary.files_seen);
//! ```

pub mod background;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod fs_utils;
pub mod index;
pub mod memory;
pub mod paths;
pub mod pidlock;
pub mod schema;
pub mod watch;

// Re-export commonly used types
pub use cli::{Cli, Commands, OutputFormat};
pub use config::{default_registry_path, CacheSettings, EngineSettings, ProjectConfig, Registry};
pub use error::{EngineError, Result};
pub use extract::{Extractor, LexicalExtractor};
pub use index::{BatchReport, IndexStore, ScanSummary, UpdateOutcome};
pub use memory::MemoryDir;
pub use schema::{ChangeAction, FileRecord, StructuralFact, DOC_VERSION};

// Re-export watch pipeline types
pub use watch::{ChangeBatcher, ContentionDetector, EngineHandle, IndexEngine, ProjectWatcher};

// Re-export cache types
pub use cache::{CacheLookup, CacheSource, InvalidatePattern, QueryCache};
