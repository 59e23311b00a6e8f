//! Project indexing: tree walking and the derived-document store

pub mod scan;
pub mod store;

pub use scan::{collect_source_files, relative_key, ProjectFilter, NOISE_DIRS, SOURCE_EXTENSIONS};
pub use store::{BatchEntry, BatchReport, DocumentSet, IndexStore, ScanSummary, UpdateOutcome};
