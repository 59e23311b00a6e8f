//! Command modules for the codemap-engine CLI
//!
//! This module contains all subcommand implementations organized by functionality.
//!
//! ## Architecture
//!
//! Each command module implements a single top-level command:
//! - `scan` - One-shot full scans of registered projects
//! - `watch` - The long-running watch/index loop
//! - `status` - Per-project index state
//! - `projects` - Registry listing
//! - `cache` - Query cache info and clearing
//!
//! All command handlers take their respective `Args` struct from `cli.rs`
//! and a shared `CommandContext` for output format and verbosity.

pub mod cache;
pub mod projects;
pub mod scan;
pub mod status;
pub mod watch;

// Re-export command handlers for easy access
pub use cache::run_cache;
pub use projects::run_projects;
pub use scan::run_scan;
pub use status::run_status;
pub use watch::run_watch;

use std::path::PathBuf;

use crate::cli::OutputFormat;
use crate::config::{default_registry_path, Registry};
use crate::error::Result;
use crate::paths::resolve_pathbuf;

/// Shared context passed to all command handlers
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Output format (text or json)
    pub format: OutputFormat,
    /// Show verbose output
    pub verbose: bool,
    /// Registry override from --config / CODEMAP_CONFIG
    pub config: Option<PathBuf>,
}

impl Default for CommandContext {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            verbose: false,
            config: None,
        }
    }
}

impl CommandContext {
    /// Create a new CommandContext from CLI args
    pub fn from_cli(format: OutputFormat, verbose: bool, config: Option<PathBuf>) -> Self {
        Self {
            format,
            verbose,
            config,
        }
    }

    /// Path of the registry this invocation reads
    ///
    /// A relative `--config` resolves against the current directory.
    pub fn registry_path(&self) -> PathBuf {
        match &self.config {
            Some(path) => resolve_pathbuf(Some(path)).unwrap_or_else(|_| path.clone()),
            None => default_registry_path(),
        }
    }

    /// Load the registry, honoring the --config override
    pub fn load_registry(&self) -> Result<Registry> {
        Registry::load(&self.registry_path())
    }
}

/// Install the stderr tracing subscriber for long-running commands
///
/// Second and later calls are no-ops.
pub fn init_tracing(verbose: bool) {
    let directive = if verbose {
        "codemap_engine=debug"
    } else {
        "codemap_engine=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
