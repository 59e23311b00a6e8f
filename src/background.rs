//! Detached subprocess spawning for per-project sync hooks
//!
//! Projects can register a `syncCommand` that runs after every applied
//! change, typically to notify an external summarizer. The child is spawned
//! through the platform shell with its stdio closed and is never awaited;
//! a failed spawn is logged and absorbed.

use std::process::{Command, Stdio};

use crate::config::ProjectConfig;
use crate::schema::ChangeAction;

/// Spawn the project's sync command for one applied change, if configured
pub fn spawn_project_sync(project: &ProjectConfig, rel: &str, action: ChangeAction) {
    let Some(command) = project.sync_command.as_deref() else {
        return;
    };
    spawn_detached(command, project, rel, action);
}

fn spawn_detached(command: &str, project: &ProjectConfig, rel: &str, action: ChangeAction) {
    let mut cmd = shell_command(command);
    cmd.current_dir(project.root())
        .env("CODEMAP_PROJECT", &project.id)
        .env("CODEMAP_FILE", rel)
        .env("CODEMAP_ACTION", action.label())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    match cmd.spawn() {
        Ok(mut child) => {
            tracing::debug!(
                "[SYNC] {}: spawned {:?} for {} (pid {})",
                project.id,
                command,
                rel,
                child.id()
            );
            // collect the exit status off-thread so the child never zombies
            std::thread::spawn(move || {
                let _ = child.wait();
            });
        }
        Err(e) => {
            tracing::warn!("[SYNC] {}: failed to spawn sync command: {}", project.id, e);
        }
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

// ============================================================================
// Tests
// ============================================================================
