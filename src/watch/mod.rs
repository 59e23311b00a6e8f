//! Live watching: per-project watchers, contention, batching, engine loop

pub mod batcher;
pub mod contention;
pub mod engine;
pub mod watcher;

pub use batcher::ChangeBatcher;
pub use contention::{BusyState, ContentionConfig, ContentionDetector};
pub use engine::{EngineHandle, IndexEngine};
pub use watcher::ProjectWatcher;
