//! Deferred change batching for busy projects
//!
//! While a project's dev server is active the engine queues changes here
//! instead of touching the index. Only the most recent action per path is
//! kept, so `add` then `change` then `remove` collapses to a single
//! `remove`. Drains return the batch sorted by path.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::schema::ChangeAction;

/// One deferred change
#[derive(Debug, Clone)]
struct PendingChange {
    action: ChangeAction,
    queued_at: Instant,
}

/// Per-project queues of deferred changes
#[derive(Debug, Default)]
pub struct ChangeBatcher {
    queues: HashMap<String, HashMap<String, PendingChange>>,
}

impl ChangeBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a change, replacing any earlier action for the same path
    pub fn defer(&mut self, project_id: &str, rel: &str, action: ChangeAction) {
        let queue = self.queues.entry(project_id.to_string()).or_default();
        tracing::debug!(
            "[BATCH] {}: deferring {} {}",
            project_id,
            action.label(),
            rel
        );
        queue.insert(
            rel.to_string(),
            PendingChange {
                action,
                queued_at: Instant::now(),
            },
        );
    }

    /// Take every queued change for a project, sorted by path
    pub fn drain(&mut self, project_id: &str) -> Vec<(String, ChangeAction)> {
        let Some(queue) = self.queues.remove(project_id) else {
            return Vec::new();
        };
        let mut batch: Vec<(String, ChangeAction)> = queue
            .into_iter()
            .map(|(path, pending)| (path, pending.action))
            .collect();
        batch.sort_by(|a, b| a.0.cmp(&b.0));
        batch
    }

    pub fn pending_count(&self, project_id: &str) -> usize {
        self.queues.get(project_id).map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, project_id: &str) -> bool {
        self.pending_count(project_id) == 0
    }

    /// Age of the oldest queued change, if any
    pub fn oldest_age(&self, project_id: &str) -> Option<Duration> {
        self.queues
            .get(project_id)
            .and_then(|q| q.values().map(|p| p.queued_at.elapsed()).max())
    }
}

// ============================================================================
// Tests
// ============================================================================
