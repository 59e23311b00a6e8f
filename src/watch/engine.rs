//! The engine loop: one thread funneling every project's events
//!
//! All watchers send into a single mpsc channel, so index updates for the
//! same project never run concurrently. Each loop iteration handles at most
//! one debounced result, then runs a tick that re-checks contention and
//! drains deferred batches (immediately on a busy-to-idle transition,
//! periodically while a project stays busy).

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind};

use crate::background;
use crate::config::Registry;
use crate::error::Result;
use crate::events::{
    emit_event, BatchDrainedEvent, ContentionEvent, IndexUpdatedEvent, WatcherStatusEvent,
};
use crate::extract::LexicalExtractor;
use crate::index::{relative_key, IndexStore, UpdateOutcome};
use crate::schema::ChangeAction;

use super::batcher::ChangeBatcher;
use super::contention::ContentionDetector;
use super::watcher::ProjectWatcher;

/// Loop granularity for timers and shutdown checks
const TICK: Duration = Duration::from_millis(250);

/// Per-project bookkeeping between ticks
struct ProjectClock {
    busy: bool,
    last_drain: Instant,
}

/// Stops the engine loop when dropped
pub struct EngineHandle {
    running: Arc<AtomicBool>,
}

impl EngineHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct IndexEngine {
    registry: Registry,
    stores: HashMap<String, IndexStore>,
    batcher: ChangeBatcher,
    contention: ContentionDetector,
    clocks: HashMap<String, ProjectClock>,
    running: Arc<AtomicBool>,
}

impl IndexEngine {
    pub fn new(registry: Registry) -> Result<Self> {
        Self::with_contention(registry, ContentionDetector::default())
    }

    /// Build with an explicit detector (tests probe controlled ports)
    pub fn with_contention(registry: Registry, contention: ContentionDetector) -> Result<Self> {
        let max_file_size = registry.settings.max_file_size_bytes;
        let mut stores = HashMap::new();
        for project in &registry.projects {
            let store = IndexStore::open(
                project.clone(),
                Box::new(LexicalExtractor::new(max_file_size)),
            )?;
            stores.insert(project.id.clone(), store);
        }

        Ok(Self {
            registry,
            stores,
            batcher: ChangeBatcher::new(),
            contention,
            clocks: HashMap::new(),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Handle for stopping the loop from another thread
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Run until stopped: startup scans, watchers, then the event loop
    pub fn run(&mut self) -> Result<()> {
        for store in self.stores.values_mut() {
            match store.full_scan() {
                Ok(summary) => tracing::info!(
                    "[ENGINE] {}: startup scan saw {} files ({} added, {} changed, {} removed, {} skipped)",
                    store.project().id,
                    summary.files_seen,
                    summary.added,
                    summary.changed,
                    summary.removed,
                    summary.skipped
                ),
                Err(e) => tracing::error!(
                    "[ENGINE] {}: startup scan failed: {}",
                    store.project().id,
                    e
                ),
            }
        }

        let (tx, rx) = mpsc::channel();
        let mut watchers = Vec::new();
        for project in self.registry.projects.clone() {
            match ProjectWatcher::start(&project, self.registry.settings.debounce(), tx.clone()) {
                Ok(watcher) => {
                    emit_event(&WatcherStatusEvent::started(&project.id));
                    watchers.push(watcher);
                }
                Err(e) => {
                    tracing::error!("[ENGINE] {}: watcher failed to start: {}", project.id, e);
                    emit_event(&WatcherStatusEvent::error(&project.id, e.to_string()));
                }
            }
        }
        // with every watcher gone the loop exits on Disconnected
        drop(tx);

        tracing::info!("[ENGINE] Watching {} project(s)", watchers.len());
        while self.running.load(Ordering::SeqCst) {
            match rx.recv_timeout(TICK) {
                Ok((project_id, Ok(events))) => self.handle_events(&project_id, events),
                Ok((project_id, Err(e))) => {
                    tracing::error!("[ENGINE] {}: watch error: {:?}", project_id, e);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("[ENGINE] Event channel closed, stopping");
                    break;
                }
            }
            self.tick();
        }

        for watcher in &watchers {
            emit_event(&WatcherStatusEvent::stopped(watcher.project_id()));
        }
        tracing::info!("[ENGINE] Stopped");
        Ok(())
    }

    // ========================================================================
    // Event handling
    // ========================================================================

    fn handle_events(&mut self, project_id: &str, events: Vec<DebouncedEvent>) {
        if !self.stores.contains_key(project_id) {
            return;
        }
        tracing::debug!("[ENGINE] {}: {} debounced event(s)", project_id, events.len());

        let mut changes: BTreeMap<String, ChangeAction> = BTreeMap::new();
        {
            let store = &self.stores[project_id];
            for event in events {
                // AnyContinuous means the path is still being written
                if !matches!(event.kind, DebouncedEventKind::Any) {
                    continue;
                }
                if !store.filter().accepts_event(&event.path) {
                    continue;
                }
                let Some(rel) = relative_key(store.project().root(), &event.path) else {
                    continue;
                };
                let action = derive_action(store, &rel, &event.path);
                changes.insert(rel, action);
            }
        }

        self.ingest_changes(project_id, changes);
    }

    fn ingest_changes(&mut self, project_id: &str, changes: BTreeMap<String, ChangeAction>) {
        if changes.is_empty() {
            return;
        }

        let state = {
            let store = &self.stores[project_id];
            self.contention.check(store.project())
        };
        self.note_busy(project_id, state.busy, state.reason);

        // a non-empty queue keeps ordering: new changes join it and the whole
        // batch drains together
        if state.busy || !self.batcher.is_empty(project_id) {
            for (rel, action) in changes {
                self.batcher.defer(project_id, &rel, action);
            }
            return;
        }

        for (rel, action) in changes {
            self.process_one(project_id, &rel, action);
        }
    }

    fn process_one(&mut self, project_id: &str, rel: &str, action: ChangeAction) {
        let Some(store) = self.stores.get_mut(project_id) else {
            return;
        };
        match store.apply_change(rel, action) {
            Ok(UpdateOutcome::Unchanged) => {}
            Ok(outcome) => {
                let functions = match &outcome {
                    UpdateOutcome::Updated { functions } => *functions,
                    _ => 0,
                };
                tracing::info!(
                    "[ENGINE] {}: {} {} ({})",
                    project_id,
                    action.label(),
                    rel,
                    outcome.label()
                );
                emit_event(&IndexUpdatedEvent::new(
                    project_id,
                    rel,
                    action.label(),
                    outcome.label(),
                    functions,
                ));
                if !matches!(outcome, UpdateOutcome::Skipped { .. }) {
                    background::spawn_project_sync(store.project(), rel, action);
                }
            }
            Err(e) => {
                tracing::error!(
                    "[ENGINE] {}: failed to apply {} {}: {}",
                    project_id,
                    action.label(),
                    rel,
                    e
                );
            }
        }
    }

    // ========================================================================
    // Ticks and drains
    // ========================================================================

    fn tick(&mut self) {
        let ids: Vec<String> = self.stores.keys().cloned().collect();
        for id in ids {
            let state = {
                let store = &self.stores[&id];
                self.contention.check(store.project())
            };
            self.note_busy(&id, state.busy, state.reason);

            if self.batcher.is_empty(&id) {
                // anchor the periodic timer at the last quiet moment
                if !state.busy {
                    if let Some(clock) = self.clocks.get_mut(&id) {
                        clock.last_drain = Instant::now();
                    }
                }
                continue;
            }

            if !state.busy {
                self.drain_project(&id, "idle");
                continue;
            }

            let interval = self.stores[&id].project().scan_interval();
            let due = self
                .clocks
                .get(&id)
                .map(|clock| clock.last_drain.elapsed() >= interval)
                .unwrap_or(true);
            if due {
                self.drain_project(&id, "periodic");
            }
        }
    }

    fn drain_project(&mut self, project_id: &str, trigger: &str) {
        let oldest = self.batcher.oldest_age(project_id);
        let batch = self.batcher.drain(project_id);
        if batch.is_empty() {
            return;
        }
        let Some(store) = self.stores.get_mut(project_id) else {
            return;
        };

        match store.apply_batch(&batch) {
            Ok(report) => {
                if let Some(clock) = self.clocks.get_mut(project_id) {
                    clock.last_drain = Instant::now();
                }
                tracing::info!(
                    "[ENGINE] {}: drained {} change(s) on {} trigger ({} updated, {} removed, {} skipped{})",
                    project_id,
                    batch.len(),
                    trigger,
                    report.updated(),
                    report.removed(),
                    report.skipped(),
                    oldest
                        .map(|age| format!(", oldest waited {:.1}s", age.as_secs_f64()))
                        .unwrap_or_default()
                );
                emit_event(&BatchDrainedEvent::from_report(project_id, trigger, &report));

                for entry in &report.entries {
                    if matches!(
                        entry.outcome,
                        UpdateOutcome::Updated { .. } | UpdateOutcome::Removed
                    ) {
                        background::spawn_project_sync(store.project(), &entry.path, entry.action);
                    }
                }
                // re-probe promptly once the batch has landed
                self.contention.invalidate(project_id);
            }
            Err(e) => {
                tracing::error!("[ENGINE] {}: batch drain failed: {}", project_id, e);
            }
        }
    }

    fn note_busy(&mut self, project_id: &str, busy: bool, reason: Option<String>) {
        let clock = self
            .clocks
            .entry(project_id.to_string())
            .or_insert_with(|| ProjectClock {
                busy: false,
                last_drain: Instant::now(),
            });
        if clock.busy != busy {
            clock.busy = busy;
            if busy {
                tracing::info!(
                    "[ENGINE] {}: busy ({}), deferring changes",
                    project_id,
                    reason.as_deref().unwrap_or("unknown")
                );
            } else {
                tracing::info!("[ENGINE] {}: idle", project_id);
            }
            emit_event(&ContentionEvent::new(project_id, busy, reason));
        }
    }
}

/// Action for an accepted event, derived from disk plus index state
fn derive_action(store: &IndexStore, rel: &str, abs: &Path) -> ChangeAction {
    if !abs.exists() {
        ChangeAction::Remove
    } else if store.docs().listing.files.contains_key(rel)
        || store.docs().summaries.files.contains_key(rel)
    {
        ChangeAction::Change
    } else {
        ChangeAction::Add
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineSettings, ProjectConfig};
    use crate::watch::contention::ContentionConfig;
    use std::fs;
    use std::net::TcpListener;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn registry_for(dir: &TempDir, scan_interval_ms: u64) -> Registry {
        Registry {
            projects: vec![ProjectConfig {
                id: "app".to_string(),
                path: dir.path().to_path_buf(),
                memory_path: PathBuf::from(".codemap"),
                ignore_patterns: vec![],
                scan_interval_ms,
                sync_command: None,
            }],
            settings: EngineSettings::default(),
        }
    }

    /// Detector that only probes the given port and never caches
    fn detector_on(port: u16) -> ContentionDetector {
        ContentionDetector::new(ContentionConfig {
            ports: vec![port],
            process_markers: vec![],
            cache_ttl: Duration::ZERO,
            probe_timeout: Duration::from_millis(200),
        })
    }

    /// Port that is known to be closed
    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    fn write_file(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn one_change(rel: &str, action: ChangeAction) -> BTreeMap<String, ChangeAction> {
        let mut changes = BTreeMap::new();
        changes.insert(rel.to_string(), action);
        changes
    }

    #[test]
    fn test_derive_action_matrix() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.js", "function a() {}\n");
        write_file(&dir, "b.js", "function b() {}\n");

        let registry = registry_for(&dir, 30_000);
        let mut engine =
            IndexEngine::with_contention(registry, detector_on(closed_port())).unwrap();
        engine.ingest_changes("app", one_change("a.js", ChangeAction::Add));

        let store = &engine.stores["app"];
        assert_eq!(
            derive_action(store, "a.js", &dir.path().join("a.js")),
            ChangeAction::Change
        );
        assert_eq!(
            derive_action(store, "b.js", &dir.path().join("b.js")),
            ChangeAction::Add
        );
        assert_eq!(
            derive_action(store, "gone.js", &dir.path().join("gone.js")),
            ChangeAction::Remove
        );
    }

    #[test]
    fn test_idle_changes_apply_immediately() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.js", "function alpha() {}\n");

        let mut engine =
            IndexEngine::with_contention(registry_for(&dir, 30_000), detector_on(closed_port()))
                .unwrap();
        engine.ingest_changes("app", one_change("a.js", ChangeAction::Add));

        assert!(engine.stores["app"]
            .docs()
            .functions
            .functions
            .contains_key("alpha"));
        assert!(engine.batcher.is_empty("app"));
    }

    #[test]
    fn test_busy_changes_defer_then_drain_on_idle() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.js", "function alpha() {}\n");

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut engine =
            IndexEngine::with_contention(registry_for(&dir, 30_000), detector_on(port)).unwrap();

        engine.ingest_changes("app", one_change("a.js", ChangeAction::Add));
        assert_eq!(engine.batcher.pending_count("app"), 1);
        assert!(engine.stores["app"].docs().functions.functions.is_empty());

        // dev server shuts down: next tick drains the queue
        drop(listener);
        engine.tick();

        assert!(engine.batcher.is_empty("app"));
        assert!(engine.stores["app"]
            .docs()
            .functions
            .functions
            .contains_key("alpha"));
    }

    #[test]
    fn test_new_changes_join_pending_queue_when_idle() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.js", "function alpha() {}\n");
        write_file(&dir, "b.js", "function beta() {}\n");

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut engine =
            IndexEngine::with_contention(registry_for(&dir, 30_000), detector_on(port)).unwrap();

        engine.ingest_changes("app", one_change("a.js", ChangeAction::Add));
        drop(listener);

        // idle now, but a.js is still queued: b.js must not jump ahead
        engine.ingest_changes("app", one_change("b.js", ChangeAction::Add));
        assert_eq!(engine.batcher.pending_count("app"), 2);

        engine.tick();
        let functions = &engine.stores["app"].docs().functions.functions;
        assert!(functions.contains_key("alpha"));
        assert!(functions.contains_key("beta"));
    }

    #[test]
    fn test_periodic_drain_while_still_busy() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.js", "function alpha() {}\n");

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        // zero interval: the periodic drain is due immediately
        let mut engine =
            IndexEngine::with_contention(registry_for(&dir, 0), detector_on(port)).unwrap();

        engine.ingest_changes("app", one_change("a.js", ChangeAction::Add));
        assert_eq!(engine.batcher.pending_count("app"), 1);

        engine.tick();
        assert!(engine.batcher.is_empty("app"));
        assert!(engine.stores["app"]
            .docs()
            .functions
            .functions
            .contains_key("alpha"));
        drop(listener);
    }

    #[test]
    fn test_deferred_change_then_remove_collapses() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.js", "function alpha() {}\n");

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut engine =
            IndexEngine::with_contention(registry_for(&dir, 30_000), detector_on(port)).unwrap();

        engine.ingest_changes("app", one_change("a.js", ChangeAction::Add));
        fs::remove_file(dir.path().join("a.js")).unwrap();
        engine.ingest_changes("app", one_change("a.js", ChangeAction::Remove));
        assert_eq!(engine.batcher.pending_count("app"), 1);

        drop(listener);
        engine.tick();

        assert!(engine.stores["app"].docs().functions.functions.is_empty());
        assert!(engine.stores["app"].docs().listing.files.is_empty());
    }

    #[test]
    fn test_engine_handle_stops_loop_flag() {
        let dir = TempDir::new().unwrap();
        let engine =
            IndexEngine::with_contention(registry_for(&dir, 30_000), detector_on(closed_port()))
                .unwrap();

        let handle = engine.handle();
        assert!(handle.is_running());
        handle.stop();
        assert!(!engine.running.load(Ordering::SeqCst));
    }
}
