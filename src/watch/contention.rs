//! Dev-server contention detection
//!
//! Indexing competes with bundlers for the same files, so before touching a
//! project the engine asks whether a dev server looks active: first a
//! connect probe against the well-known bundler ports, then a process-table
//! scan for bundler command lines. Any hit means busy, including a bundler
//! whose working directory cannot be tied to the project. Probe errors
//! resolve to not-busy so a broken probe never stalls indexing.
//!
//! Results are cached per project for a short TTL; probing the process
//! table on every watcher event would dominate the loop.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sysinfo::{ProcessesToUpdate, System};

use crate::config::ProjectConfig;
use crate::fs_utils::normalize_path;

/// What the detector probes for
#[derive(Debug, Clone)]
pub struct ContentionConfig {
    /// Local ports dev servers listen on (Metro, Expo)
    pub ports: Vec<u16>,
    /// Substrings matched against process command lines
    pub process_markers: Vec<String>,
    /// How long a probe result stays valid
    pub cache_ttl: Duration,
    /// Connect timeout per port probe
    pub probe_timeout: Duration,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            ports: vec![8081, 19000, 19001],
            process_markers: vec![
                "metro".to_string(),
                "expo start".to_string(),
                "react-native start".to_string(),
                "webpack-dev-server".to_string(),
                "vite".to_string(),
            ],
            cache_ttl: Duration::from_secs(5),
            probe_timeout: Duration::from_millis(200),
        }
    }
}

/// Outcome of a busy check
#[derive(Debug, Clone)]
pub struct BusyState {
    pub busy: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
struct ProbeResult {
    busy: bool,
    reason: Option<String>,
    checked_at: Instant,
}

/// Probes and caches per-project busy state
pub struct ContentionDetector {
    config: ContentionConfig,
    probes: Mutex<HashMap<String, ProbeResult>>,
}

impl Default for ContentionDetector {
    fn default() -> Self {
        Self::new(ContentionConfig::default())
    }
}

impl ContentionDetector {
    pub fn new(config: ContentionConfig) -> Self {
        Self {
            config,
            probes: Mutex::new(HashMap::new()),
        }
    }

    /// Whether indexing the project should be deferred right now
    pub fn is_busy(&self, project: &ProjectConfig) -> bool {
        self.check(project).busy
    }

    /// Busy state with the reason behind it, cached per project
    pub fn check(&self, project: &ProjectConfig) -> BusyState {
        if let Some(cached) = self.probes.lock().get(&project.id) {
            if cached.checked_at.elapsed() < self.config.cache_ttl {
                return BusyState {
                    busy: cached.busy,
                    reason: cached.reason.clone(),
                };
            }
        }

        let result = self.probe(project);
        let state = BusyState {
            busy: result.busy,
            reason: result.reason.clone(),
        };
        self.probes.lock().insert(project.id.clone(), result);
        state
    }

    /// Forget the cached probe so the next check hits the system again
    pub fn invalidate(&self, project_id: &str) {
        self.probes.lock().remove(project_id);
    }

    fn probe(&self, project: &ProjectConfig) -> ProbeResult {
        for &port in &self.config.ports {
            if port_open(port, self.config.probe_timeout) {
                tracing::debug!(
                    "[CONTENTION] {}: port {} answers, treating as busy",
                    project.id,
                    port
                );
                return ProbeResult {
                    busy: true,
                    reason: Some(format!("port {} in use", port)),
                    checked_at: Instant::now(),
                };
            }
        }

        if let Some(marker) = self.find_marker_process(project) {
            return ProbeResult {
                busy: true,
                reason: Some(marker),
                checked_at: Instant::now(),
            };
        }

        ProbeResult {
            busy: false,
            reason: None,
            checked_at: Instant::now(),
        }
    }

    fn find_marker_process(&self, project: &ProjectConfig) -> Option<String> {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All);
        let own_pid = std::process::id();

        for (pid, process) in system.processes() {
            // our own argv can contain a marker, project ids are user-chosen
            if pid.as_u32() == own_pid {
                continue;
            }

            let cmdline = process
                .cmd()
                .iter()
                .map(|part| part.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            if cmdline.is_empty() {
                continue;
            }

            let Some(marker) = self
                .config
                .process_markers
                .iter()
                .find(|m| cmdline.contains(m.as_str()))
            else {
                continue;
            };

            match process.cwd() {
                // canonicalized cwds can carry the verbatim prefix on Windows
                Some(cwd) if normalize_path(cwd).starts_with(normalize_path(project.root())) => {
                    tracing::debug!(
                        "[CONTENTION] {}: {} running in project tree (pid {})",
                        project.id,
                        marker,
                        pid
                    );
                }
                Some(_) => {
                    tracing::debug!(
                        "[CONTENTION] {}: {} running outside project tree (pid {}), still busy",
                        project.id,
                        marker,
                        pid
                    );
                }
                None => {
                    tracing::debug!(
                        "[CONTENTION] {}: {} running, cwd unknown (pid {})",
                        project.id,
                        marker,
                        pid
                    );
                }
            }
            return Some(format!("{} running (pid {})", marker, pid));
        }

        None
    }
}

fn port_open(port: u16, timeout: Duration) -> bool {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    TcpStream::connect_timeout(&addr, timeout).is_ok()
}

// ============================================================================
// Tests
// ============================================================================
