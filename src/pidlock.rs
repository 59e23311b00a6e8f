//! Single-instance guard backed by a PID file
//!
//! Two engines watching the same projects would race each other's atomic
//! renames, so the watch command takes this lock first. A recorded PID that
//! is still alive refuses startup; a stale one is swept and replaced. The
//! file is removed on Drop, but only while it still records our own PID.

use std::fs;
use std::path::{Path, PathBuf};

use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::error::{EngineError, Result};

pub struct PidLock {
    path: PathBuf,
    pid: u32,
}

impl PidLock {
    /// Take the lock, refusing when another live instance holds it
    pub fn acquire(path: PathBuf) -> Result<Self> {
        if let Some(recorded) = read_pid(&path) {
            if recorded != std::process::id() && pid_alive(recorded) {
                return Err(EngineError::AlreadyRunning { pid: recorded });
            }
            tracing::warn!(
                "[PID] Removing stale pid file for {} at {}",
                recorded,
                path.display()
            );
            let _ = fs::remove_file(&path);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let pid = std::process::id();
        fs::write(&path, pid.to_string())?;
        tracing::debug!("[PID] Holding {} (pid {})", path.display(), pid);

        Ok(Self { path, pid })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        // never delete a file some later instance has taken over
        if read_pid(&self.path) == Some(self.pid) {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse().ok()
}

fn pid_alive(pid: u32) -> bool {
    let mut system = System::new();
    let target = Pid::from_u32(pid);
    system.refresh_processes(ProcessesToUpdate::Some(&[target]));
    system.process(target).is_some()
}

/// Default location for the engine's pid file
pub fn default_pid_path() -> PathBuf {
    crate::cache::get_cache_base_dir().join("engine.pid")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_writes_own_pid_and_drop_removes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.pid");

        let lock = PidLock::acquire(path.clone()).unwrap();
        let recorded: u32 = fs::read_to_string(&path).unwrap().trim().parse().unwrap();
        assert_eq!(recorded, std::process::id());

        drop(lock);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_live_instance_refuses_second_acquire() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.pid");
        // pid 1 is always alive
        fs::write(&path, "1").unwrap();

        match PidLock::acquire(path) {
            Err(EngineError::AlreadyRunning { pid }) => assert_eq!(pid, 1),
            other => panic!("expected AlreadyRunning, got {:?}", other.map(|l| l.pid)),
        }
    }

    #[test]
    fn test_stale_pid_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.pid");
        // u32::MAX is far above any real pid ceiling
        fs::write(&path, u32::MAX.to_string()).unwrap();

        let lock = PidLock::acquire(path.clone()).unwrap();
        let recorded: u32 = fs::read_to_string(&path).unwrap().trim().parse().unwrap();
        assert_eq!(recorded, std::process::id());
        drop(lock);
    }

    #[test]
    fn test_garbage_pid_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.pid");
        fs::write(&path, "not a pid").unwrap();

        assert!(PidLock::acquire(path).is_ok());
    }

    #[test]
    fn test_drop_leaves_foreign_pid_file_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.pid");

        let lock = PidLock::acquire(path.clone()).unwrap();
        // another instance took the file over in the meantime
        fs::write(&path, "999999999").unwrap();
        drop(lock);

        assert!(path.exists());
    }
}
