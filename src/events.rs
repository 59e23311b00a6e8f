//! Engine events pushed to stdout in watch mode
//!
//! When the watcher runs with `--events`, every noteworthy state change is
//! printed as one JSON object per line (JSON Lines), so a supervising tool
//! can follow along without polling the index documents.
//!
//! ```json
//! {"type":"index_updated","project":"app","file":"src/Feed.js",...}
//! ```

use std::io::{self, Write};
use std::sync::OnceLock;

use serde::Serialize;

use crate::index::BatchReport;

/// Event emitter for sending JSON events to stdout
pub struct EventEmitter {
    enabled: bool,
}

impl EventEmitter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Emit an event to stdout as a single JSON line
    pub fn emit<E: EngineEvent>(&self, event: &E) {
        if !self.enabled {
            return;
        }

        let wrapper = EventWrapper {
            event_type: E::event_type(),
            payload: event,
        };

        if let Ok(json) = serde_json::to_string(&wrapper) {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            // ignore write errors, the consumer may have closed the pipe
            let _ = writeln!(handle, "{}", json);
            let _ = handle.flush();
        }
    }
}

/// Wrapper adding the `type` discriminator
#[derive(Serialize)]
struct EventWrapper<'a, P: Serialize> {
    #[serde(rename = "type")]
    event_type: &'static str,
    #[serde(flatten)]
    payload: &'a P,
}

/// Trait for engine events
pub trait EngineEvent: Serialize {
    fn event_type() -> &'static str;
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ============================================================================
// Event Types
// ============================================================================

/// Emitted after a single file change lands in the index
#[derive(Debug, Clone, Serialize)]
pub struct IndexUpdatedEvent {
    pub project: String,
    pub file: String,
    pub action: String,
    pub outcome: String,
    pub functions: usize,
    pub timestamp: String,
}

impl EngineEvent for IndexUpdatedEvent {
    fn event_type() -> &'static str {
        "index_updated"
    }
}

impl IndexUpdatedEvent {
    pub fn new(project: &str, file: &str, action: &str, outcome: &str, functions: usize) -> Self {
        Self {
            project: project.to_string(),
            file: file.to_string(),
            action: action.to_string(),
            outcome: outcome.to_string(),
            functions,
            timestamp: now_rfc3339(),
        }
    }
}

/// Emitted after a deferred batch is drained into the index
#[derive(Debug, Clone, Serialize)]
pub struct BatchDrainedEvent {
    pub project: String,
    /// What ended the deferral: "idle" or "periodic"
    pub trigger: String,
    pub entries: usize,
    pub updated: usize,
    pub removed: usize,
    pub skipped: usize,
    pub timestamp: String,
}

impl EngineEvent for BatchDrainedEvent {
    fn event_type() -> &'static str {
        "batch_drained"
    }
}

impl BatchDrainedEvent {
    pub fn from_report(project: &str, trigger: &str, report: &BatchReport) -> Self {
        Self {
            project: project.to_string(),
            trigger: trigger.to_string(),
            entries: report.entries.len(),
            updated: report.updated(),
            removed: report.removed(),
            skipped: report.skipped(),
            timestamp: now_rfc3339(),
        }
    }
}

/// Emitted when the watch loop starts or stops covering a project
#[derive(Debug, Clone, Serialize)]
pub struct WatcherStatusEvent {
    pub project: String,
    /// "started", "stopped" or "error"
    pub status: String,
    pub message: Option<String>,
    pub timestamp: String,
}

impl EngineEvent for WatcherStatusEvent {
    fn event_type() -> &'static str {
        "watcher_status"
    }
}

impl WatcherStatusEvent {
    pub fn started(project: &str) -> Self {
        Self {
            project: project.to_string(),
            status: "started".to_string(),
            message: None,
            timestamp: now_rfc3339(),
        }
    }

    pub fn stopped(project: &str) -> Self {
        Self {
            project: project.to_string(),
            status: "stopped".to_string(),
            message: None,
            timestamp: now_rfc3339(),
        }
    }

    pub fn error(project: &str, message: String) -> Self {
        Self {
            project: project.to_string(),
            status: "error".to_string(),
            message: Some(message),
            timestamp: now_rfc3339(),
        }
    }
}

/// Emitted when a project's busy state flips
#[derive(Debug, Clone, Serialize)]
pub struct ContentionEvent {
    pub project: String,
    pub busy: bool,
    pub reason: Option<String>,
    pub timestamp: String,
}

impl EngineEvent for ContentionEvent {
    fn event_type() -> &'static str {
        "contention"
    }
}

impl ContentionEvent {
    pub fn new(project: &str, busy: bool, reason: Option<String>) -> Self {
        Self {
            project: project.to_string(),
            busy,
            reason,
            timestamp: now_rfc3339(),
        }
    }
}

// ============================================================================
// Global Event Emitter
// ============================================================================

static GLOBAL_EMITTER: OnceLock<EventEmitter> = OnceLock::new();

/// Initialize the global event emitter
pub fn init_event_emitter(enabled: bool) {
    let _ = GLOBAL_EMITTER.set(EventEmitter::new(enabled));
}

/// Emit an event using the global emitter
pub fn emit_event<E: EngineEvent>(event: &E) {
    if let Some(emitter) = GLOBAL_EMITTER.get() {
        emitter.emit(event);
    }
}

// ============================================================================
// Tests
// ============================================================================
