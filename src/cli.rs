//! CLI argument definitions using clap with subcommand architecture
//!
//! This module defines the command-line interface for codemap-engine using
//! a subcommand-based structure for better organization and discoverability.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Incremental code index engine
#[derive(Parser, Debug)]
#[command(name = "codemap")]
#[command(about = "Keeps per-project code indexes continuously consistent with the source tree")]
#[command(version)]
#[command(author)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (applies to all commands)
    #[arg(short, long, default_value = "text", value_enum, global = true)]
    pub format: OutputFormat,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project registry file (default: ~/.config/codemap/projects.json)
    #[arg(short, long, global = true, env = "CODEMAP_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

// ============================================
// Main Commands Enum
// ============================================

/// Available subcommands for codemap
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a one-shot full scan of registered projects
    #[command(visible_alias = "s")]
    Scan(ScanArgs),

    /// Watch registered projects and index changes continuously
    #[command(visible_alias = "w")]
    Watch(WatchArgs),

    /// Show index state per project
    Status(StatusArgs),

    /// List registered projects
    Projects,

    /// Manage the query cache
    Cache(CacheArgs),
}

// ============================================
// Scan Subcommand
// ============================================

/// Arguments for the scan command
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Scan only this project
    #[arg(long, value_name = "ID")]
    pub project: Option<String>,
}

// ============================================
// Watch Subcommand
// ============================================

/// Arguments for the watch command
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Watch only this project
    #[arg(long, value_name = "ID")]
    pub project: Option<String>,

    /// Emit JSON lines on stdout as the index changes
    #[arg(long)]
    pub events: bool,
}

// ============================================
// Status Subcommand
// ============================================

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show only this project
    #[arg(long, value_name = "ID")]
    pub project: Option<String>,
}

// ============================================
// Cache Subcommand
// ============================================

/// Arguments for the cache command
#[derive(Args, Debug)]
pub struct CacheArgs {
    /// Cache operation to perform
    #[command(subcommand)]
    pub operation: CacheOperation,
}

/// Cache operations
#[derive(Subcommand, Debug)]
pub enum CacheOperation {
    /// Show cache information
    Info,

    /// Clear all cached query results
    Clear,
}

// ============================================
// Shared Types
// ============================================

/// Output format options
#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with visual formatting (default for terminal)
    #[default]
    #[value(alias = "pretty")]
    Text,
    /// JSON - standard JSON output for machine parsing
    Json,
}

// ============================================
// Helper Implementations
// ============================================

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
