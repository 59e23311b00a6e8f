//! Per-project filesystem watcher
//!
//! One debounced `notify` watcher per project root. Every debounced result
//! is tagged with the project id and funneled into the engine's single
//! event channel; the watcher itself never touches the index.

use std::sync::mpsc::Sender;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};

use crate::config::ProjectConfig;
use crate::error::{EngineError, Result};

/// Keeps one project's debounced watcher alive
pub struct ProjectWatcher {
    project_id: String,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl ProjectWatcher {
    /// Start watching a project root recursively
    pub fn start(
        project: &ProjectConfig,
        debounce: Duration,
        tx: Sender<(String, DebounceEventResult)>,
    ) -> Result<Self> {
        let project_id = project.id.clone();

        let tag = project_id.clone();
        let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
            // the receiving loop may already be gone, nothing to do then
            let _ = tx.send((tag.clone(), result));
        })
        .map_err(|e| EngineError::WatchError {
            message: e.to_string(),
        })?;

        debouncer
            .watcher()
            .watch(project.root(), RecursiveMode::Recursive)
            .map_err(|e| EngineError::WatchError {
                message: format!("{}: {}", project.root().display(), e),
            })?;

        tracing::info!(
            "[WATCHER] {}: watching {} (debounce {}ms)",
            project_id,
            project.root().display(),
            debounce.as_millis()
        );

        Ok(Self {
            project_id,
            _debouncer: debouncer,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

// ============================================================================
// Tests
// ============================================================================
