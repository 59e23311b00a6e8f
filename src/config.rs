//! Project registry and engine settings
//!
//! The engine is driven by a single JSON registry file listing the projects
//! to index plus optional global settings. Default location:
//!
//! ```text
//! ~/.config/codemap/projects.json
//! ```
//!
//! Example registry:
//!
//! ```json
//! {
//!   "projects": [
//!     {
//!       "id": "shop-app",
//!       "path": "/home/dev/shop-app",
//!       "memoryPath": ".codemap",
//!       "ignorePatterns": ["*.test.js", "storybook/**"],
//!       "scanIntervalMs": 30000,
//!       "syncCommand": "notify-send 'index updated'"
//!     }
//!   ],
//!   "settings": { "debounceMs": 2000 }
//! }
//! ```
//!
//! A registry that cannot be read or fails validation is a fatal error:
//! watching the wrong tree silently is worse than refusing to start.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::paths::ensure_directory;
use crate::{EngineError, Result};

// ============================================================================
// Projects
// ============================================================================

fn default_scan_interval_ms() -> u64 {
    30_000
}

/// One watched project from the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Stable identifier, used in logs, events, and CLI selectors
    pub id: String,

    /// Absolute path to the project root
    pub path: PathBuf,

    /// Where the derived JSON documents live, relative paths resolve
    /// against `path`
    pub memory_path: PathBuf,

    /// Gitignore-style patterns excluded on top of the built-in noise list
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// How often deferred changes drain while the project stays busy
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Optional shell command spawned after each applied change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_command: Option<String>,
}

impl ProjectConfig {
    pub fn root(&self) -> &Path {
        &self.path
    }

    /// Resolved memory directory for this project
    pub fn memory_dir(&self) -> PathBuf {
        if self.memory_path.is_absolute() {
            self.memory_path.clone()
        } else {
            self.path.join(&self.memory_path)
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Global knobs shared by every project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Debounce window applied to raw filesystem events
    pub debounce_ms: u64,

    /// Files larger than this are recorded but not parsed
    pub max_file_size_bytes: u64,

    /// Query cache sizing
    pub cache: CacheSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 2_000,
            max_file_size_bytes: 1024 * 1024,
            cache: CacheSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Query cache sizing, overridable from the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Memory tier entry cap
    pub max_memory_entries: usize,

    /// Disk tier entry cap
    pub max_disk_entries: usize,

    /// Disk tier byte cap
    pub max_disk_bytes: u64,

    /// Values serialized larger than this are never cached
    pub max_entry_bytes: usize,

    /// Entries only reach the disk tier when their TTL exceeds this
    pub persist_min_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_memory_entries: 500,
            max_disk_entries: 5_000,
            max_disk_bytes: 50 * 1024 * 1024,
            max_entry_bytes: 256 * 1024,
            persist_min_ttl_secs: 60,
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// The parsed registry file: projects plus global settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    pub projects: Vec<ProjectConfig>,

    #[serde(default)]
    pub settings: EngineSettings,
}

impl Registry {
    /// Load and validate the registry at `path`
    ///
    /// Any problem here is fatal: a missing file, malformed JSON, duplicate
    /// or empty project ids, or a project root that does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| EngineError::ConfigError {
            message: format!("cannot read registry {}: {}", path.display(), e),
        })?;
        let registry: Registry =
            serde_json::from_str(&raw).map_err(|e| EngineError::ConfigError {
                message: format!("invalid registry {}: {}", path.display(), e),
            })?;
        registry.validate()?;
        Ok(registry)
    }

    /// Look up a project by id
    pub fn project(&self, id: &str) -> Result<&ProjectConfig> {
        self.projects
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| EngineError::ProjectNotFound { id: id.to_string() })
    }

    /// Drop every project except `id`, error if it is not registered
    pub fn retain_project(&mut self, id: &str) -> Result<()> {
        self.project(id)?;
        self.projects.retain(|p| p.id == id);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.projects.is_empty() {
            return Err(EngineError::ConfigError {
                message: "registry has no projects".to_string(),
            });
        }
        if self.settings.debounce_ms == 0 {
            return Err(EngineError::ConfigError {
                message: "settings.debounceMs must be greater than zero".to_string(),
            });
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for project in &self.projects {
            if project.id.trim().is_empty() {
                return Err(EngineError::ConfigError {
                    message: format!("project with empty id (path {})", project.path.display()),
                });
            }
            if !seen.insert(project.id.as_str()) {
                return Err(EngineError::ConfigError {
                    message: format!("duplicate project id '{}'", project.id),
                });
            }
            ensure_directory(&project.path).map_err(|_| EngineError::ConfigError {
                message: format!(
                    "project '{}' root is not a directory: {}",
                    project.id,
                    project.path.display()
                ),
            })?;
            if project.memory_path.as_os_str().is_empty() {
                return Err(EngineError::ConfigError {
                    message: format!("project '{}' has an empty memoryPath", project.id),
                });
            }
            if project.scan_interval_ms == 0 {
                return Err(EngineError::ConfigError {
                    message: format!(
                        "project '{}' scanIntervalMs must be greater than zero",
                        project.id
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Default registry location
///
/// Resolution order: `XDG_CONFIG_HOME`, then `~/.config`, then the system
/// temp directory as a last resort.
pub fn default_registry_path() -> PathBuf {
    let base = if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config)
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config")
    } else {
        std::env::temp_dir()
    };
    base.join("codemap").join("projects.json")
}
