//! Watch command handler - The long-running watch/index loop

use crate::cli::WatchArgs;
use crate::commands::{init_tracing, CommandContext};
use crate::error::Result;
use crate::events::init_event_emitter;
use crate::pidlock::{default_pid_path, PidLock};
use crate::watch::IndexEngine;

/// Run the watch command
///
/// Blocks until the engine loop ends. Holds the pid lock for the whole
/// run so a second `codemap watch` fails fast instead of double-indexing.
pub fn run_watch(args: &WatchArgs, ctx: &CommandContext) -> Result<String> {
    init_tracing(ctx.verbose);

    let mut registry = ctx.load_registry()?;
    if let Some(id) = &args.project {
        registry.retain_project(id)?;
    }

    let _lock = PidLock::acquire(default_pid_path())?;
    init_event_emitter(args.events);

    let mut engine = IndexEngine::new(registry)?;
    engine.run()?;

    Ok(String::new())
}
