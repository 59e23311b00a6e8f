//! Index store: owns the derived documents for one project
//!
//! All five documents live in memory and are written through atomically
//! whenever they change. The update protocol is prune-then-insert: every
//! entry belonging to the changed file is removed from every document, then
//! the fresh fact's entries are inserted, so no partial merge can leave a
//! stale function or edge behind.
//!
//! Documents are reloaded leniently at startup. Corrupt JSON or an
//! unsupported layout version is treated as absent; the next full scan
//! rebuilds from disk state.

use std::collections::BTreeSet;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::config::ProjectConfig;
use crate::error::Result;
use crate::extract::Extractor;
use crate::fs_utils::{read_json_lenient, write_json_atomic};
use crate::index::scan::{self, ProjectFilter};
use crate::memory::MemoryDir;
use crate::schema::{
    ChangeAction, FileRecord, FunctionEntry, FunctionsIndex, NavigationEdge, NavigationGraph,
    ProjectListing, SchemaIndex, StructuralFact, SummariesIndex, SummaryRecord, DOC_VERSION,
};

// ============================================================================
// Outcomes
// ============================================================================

/// What a single-file update did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Fresh facts replaced the file's entries
    Updated { functions: usize },

    /// Every entry for the file was removed
    Removed,

    /// Fact and file record already match, nothing rewritten
    Unchanged,

    /// Extraction unavailable this cycle, prior entries kept
    Skipped { reason: String },
}

impl UpdateOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            UpdateOutcome::Updated { .. } => "updated",
            UpdateOutcome::Removed => "removed",
            UpdateOutcome::Unchanged => "unchanged",
            UpdateOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// One processed entry of a drained batch
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub path: String,
    pub action: ChangeAction,
    pub outcome: UpdateOutcome,
}

/// Result of applying a drained batch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, UpdateOutcome::Updated { .. }))
    }

    pub fn removed(&self) -> usize {
        self.count(|o| matches!(o, UpdateOutcome::Removed))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, UpdateOutcome::Unchanged))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UpdateOutcome::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&UpdateOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

/// Result of a full-project scan
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanSummary {
    /// Source files found on disk
    pub files_seen: usize,
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
    pub skipped: usize,
}

// ============================================================================
// Documents
// ============================================================================

/// The five derived documents of one project
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSet {
    pub listing: ProjectListing,
    pub functions: FunctionsIndex,
    pub summaries: SummariesIndex,
    pub schema: SchemaIndex,
    pub graph: NavigationGraph,
}

impl DocumentSet {
    /// Load all five documents, reporting whether a document file was
    /// present but unusable (corrupt JSON or an unsupported layout version)
    fn load(memory: &MemoryDir, project_id: &str) -> (Self, bool) {
        let mut damaged = false;
        let docs = Self {
            listing: load_versioned(
                &memory.listing_path(),
                |d: &ProjectListing| &d.version,
                &mut damaged,
            )
            .unwrap_or_else(|| ProjectListing::empty(project_id)),
            functions: load_versioned(
                &memory.functions_path(),
                |d: &FunctionsIndex| &d.version,
                &mut damaged,
            )
            .unwrap_or_default(),
            summaries: load_versioned(
                &memory.summaries_path(),
                |d: &SummariesIndex| &d.version,
                &mut damaged,
            )
            .unwrap_or_default(),
            schema: load_versioned(
                &memory.schema_path(),
                |d: &SchemaIndex| &d.version,
                &mut damaged,
            )
            .unwrap_or_default(),
            graph: load_versioned(
                &memory.graph_path(),
                |d: &NavigationGraph| &d.version,
                &mut damaged,
            )
            .unwrap_or_default(),
        };
        (docs, damaged)
    }
}

/// Read a document, dropping it when it cannot be parsed or carries an
/// unsupported layout version; `damaged` is set when a file was present
/// but had to be dropped
fn load_versioned<T: DeserializeOwned>(
    path: &Path,
    version_of: impl Fn(&T) -> &str,
    damaged: &mut bool,
) -> Option<T> {
    let Some(doc) = read_json_lenient::<T>(path) else {
        if path.exists() {
            *damaged = true;
        }
        return None;
    };
    if version_of(&doc) == DOC_VERSION {
        Some(doc)
    } else {
        tracing::info!(
            "[STORE] {} carries layout version {:?}, expected {:?}, rebuilding",
            path.display(),
            version_of(&doc),
            DOC_VERSION
        );
        *damaged = true;
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct DirtyDocs {
    listing: bool,
    functions: bool,
    summaries: bool,
    schema: bool,
    graph: bool,
}

// ============================================================================
// Store
// ============================================================================

pub struct IndexStore {
    project: ProjectConfig,
    memory: MemoryDir,
    filter: ProjectFilter,
    extractor: Box<dyn Extractor>,
    docs: DocumentSet,
    dirty: DirtyDocs,
    /// Set when a document file on disk had to be dropped at load time;
    /// cleared once a full scan has re-derived every document
    rebuild_pending: bool,
}

impl IndexStore {
    /// Open (or create) the store for a project
    pub fn open(project: ProjectConfig, extractor: Box<dyn Extractor>) -> Result<Self> {
        let memory = MemoryDir::for_project(&project);
        memory.init()?;
        let filter = ProjectFilter::compile(&project)?;
        let (docs, rebuild_pending) = DocumentSet::load(&memory, &project.id);
        if rebuild_pending {
            tracing::warn!(
                "[STORE] {}: dropped unusable document state, next scan rebuilds",
                project.id
            );
        }

        // an unusable document loads as empty, so every doc must be
        // rewritten even if re-indexing reproduces the empty state
        let dirty = if rebuild_pending {
            DirtyDocs {
                listing: true,
                functions: true,
                summaries: true,
                schema: true,
                graph: true,
            }
        } else {
            DirtyDocs::default()
        };

        Ok(Self {
            project,
            memory,
            filter,
            extractor,
            docs,
            dirty,
            rebuild_pending,
        })
    }

    pub fn project(&self) -> &ProjectConfig {
        &self.project
    }

    pub fn filter(&self) -> &ProjectFilter {
        &self.filter
    }

    pub fn memory(&self) -> &MemoryDir {
        &self.memory
    }

    pub fn docs(&self) -> &DocumentSet {
        &self.docs
    }

    /// Apply one file change and persist whatever moved
    pub fn apply_change(&mut self, rel: &str, action: ChangeAction) -> Result<UpdateOutcome> {
        let outcome = self.upsert(rel, action);
        self.persist()?;
        Ok(outcome)
    }

    /// Apply a drained batch, then rebuild the listing exactly once
    pub fn apply_batch(&mut self, batch: &[(String, ChangeAction)]) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for (rel, action) in batch {
            let outcome = self.upsert(rel, *action);
            report.entries.push(BatchEntry {
                path: rel.clone(),
                action: *action,
                outcome,
            });
        }
        self.rebuild_listing();
        self.persist()?;
        Ok(report)
    }

    /// Walk the tree, reconcile every document with disk state, persist
    ///
    /// Self-heals on startup: stale records (mtime+size drift) re-apply as
    /// changes, unknown files as adds, and indexed files missing on disk as
    /// removes.
    pub fn full_scan(&mut self) -> Result<ScanSummary> {
        let found = scan::collect_source_files(&self.project, &self.filter);
        let force = self.rebuild_pending;
        let mut summary = ScanSummary {
            files_seen: found.len(),
            ..Default::default()
        };

        for (rel, record) in &found {
            let action = match self.docs.listing.files.get(rel) {
                None => Some(ChangeAction::Add),
                Some(prev) if force || prev != record => Some(ChangeAction::Change),
                // listed but absent from the derived documents: heal it
                Some(_) if !self.docs.summaries.files.contains_key(rel) => {
                    Some(ChangeAction::Change)
                }
                Some(_) => None,
            };
            let Some(action) = action else { continue };
            match self.upsert(rel, action) {
                UpdateOutcome::Updated { .. } => match action {
                    ChangeAction::Add => summary.added += 1,
                    _ => summary.changed += 1,
                },
                UpdateOutcome::Skipped { .. } => summary.skipped += 1,
                _ => {}
            }
        }

        let gone: BTreeSet<String> = self
            .docs
            .listing
            .files
            .keys()
            .chain(self.docs.summaries.files.keys())
            .filter(|rel| !found.contains_key(*rel))
            .cloned()
            .collect();
        for rel in gone {
            if self.upsert(&rel, ChangeAction::Remove) == UpdateOutcome::Removed {
                summary.removed += 1;
            }
        }

        // the walk is authoritative for the listing
        if self.docs.listing.files != found {
            self.docs.listing.files = found;
            self.docs.listing.recount();
            self.dirty.listing = true;
        }

        self.persist()?;
        self.rebuild_pending = false;
        Ok(summary)
    }

    // ========================================================================
    // Update protocol
    // ========================================================================

    fn upsert(&mut self, rel: &str, action: ChangeAction) -> UpdateOutcome {
        match action {
            ChangeAction::Remove => self.remove_file(rel),
            ChangeAction::Add | ChangeAction::Change => self.index_file(rel),
        }
    }

    fn index_file(&mut self, rel: &str) -> UpdateOutcome {
        let abs = self.project.root().join(rel);

        // extract first: a failed extraction must not disturb prior entries
        let fact = self.extractor.parse(&abs);
        if let Some(reason) = fact.error.clone() {
            tracing::debug!(
                "[STORE] {}: extraction unavailable for {}: {}",
                self.project.id,
                rel,
                reason
            );
            return UpdateOutcome::Skipped { reason };
        }
        let Some(record) = FileRecord::from_disk(rel, &abs) else {
            return UpdateOutcome::Skipped {
                reason: format!("{} vanished before it could be recorded", rel),
            };
        };

        let fact_unchanged = self
            .docs
            .summaries
            .files
            .get(rel)
            .map(|r| r.fact == fact)
            .unwrap_or(false);
        let record_unchanged = self.docs.listing.files.get(rel) == Some(&record);
        if fact_unchanged && record_unchanged && !self.rebuild_pending {
            return UpdateOutcome::Unchanged;
        }

        let before = self.docs.clone();
        let prior = self.prune(rel);
        self.insert_fact(rel, &fact, prior);
        self.docs.listing.files.insert(rel.to_string(), record);
        self.recompute_aggregates();
        self.mark_dirty(&before);

        UpdateOutcome::Updated {
            functions: fact.functions.len(),
        }
    }

    fn remove_file(&mut self, rel: &str) -> UpdateOutcome {
        if !self.references(rel) {
            return UpdateOutcome::Unchanged;
        }

        let before = self.docs.clone();
        self.prune(rel);
        self.docs.listing.files.remove(rel);
        self.recompute_aggregates();
        self.mark_dirty(&before);

        UpdateOutcome::Removed
    }

    /// Whether any document still references `rel`
    fn references(&self, rel: &str) -> bool {
        self.docs.listing.files.contains_key(rel)
            || self.docs.summaries.files.contains_key(rel)
            || self
                .docs
                .functions
                .functions
                .values()
                .any(|entries| entries.iter().any(|e| e.file == rel))
            || self
                .docs
                .schema
                .collections
                .values()
                .any(|files| files.iter().any(|f| f == rel))
            || self.docs.graph.edges.iter().any(|e| e.from == rel)
    }

    /// Remove every entry for `rel` across the derived documents
    ///
    /// Returns the pruned summary record so its externally-owned fields can
    /// be carried forward.
    fn prune(&mut self, rel: &str) -> Option<SummaryRecord> {
        self.docs.functions.prune_file(rel);
        let prior = self.docs.summaries.files.remove(rel);
        self.docs.schema.prune_file(rel);
        self.docs.graph.prune_file(rel);
        prior
    }

    fn insert_fact(&mut self, rel: &str, fact: &StructuralFact, prior: Option<SummaryRecord>) {
        for f in &fact.functions {
            self.docs
                .functions
                .functions
                .entry(f.name.clone())
                .or_default()
                .push(FunctionEntry {
                    file: rel.to_string(),
                    line: f.line,
                    end_line: f.end_line,
                    kind: f.kind,
                    is_async: f.is_async,
                });
        }

        let record = match prior {
            Some(mut p) => {
                let structure_changed = p.fact != *fact;
                let has_semantics =
                    p.summary.is_some() || p.purpose.is_some() || p.key_logic.is_some();
                p.fact = fact.clone();
                if structure_changed && has_semantics {
                    p.needs_resummarization = true;
                }
                p
            }
            None => SummaryRecord {
                fact: fact.clone(),
                ..Default::default()
            },
        };
        self.docs.summaries.files.insert(rel.to_string(), record);

        for collection in &fact.collection_references {
            self.docs.schema.insert_reference(collection, rel);
        }

        for target in &fact.navigation_targets {
            self.docs.graph.edges.push(NavigationEdge {
                from: rel.to_string(),
                to: target.clone(),
            });
        }
    }

    fn recompute_aggregates(&mut self) {
        for entries in self.docs.functions.functions.values_mut() {
            entries.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
        }
        self.docs.functions.recount();
        self.docs.listing.recount();

        self.docs.graph.edges.sort();
        self.docs.graph.edges.dedup();
        let components: Vec<String> = self
            .docs
            .summaries
            .files
            .values()
            .filter_map(|r| r.fact.component_name.clone())
            .collect();
        self.docs.graph.recompute_nodes(components);
    }

    /// Recompute `index.json` from a fresh tree walk
    fn rebuild_listing(&mut self) {
        let found = scan::collect_source_files(&self.project, &self.filter);
        if self.docs.listing.files != found {
            self.docs.listing.files = found;
            self.docs.listing.recount();
            self.dirty.listing = true;
        }
    }

    fn mark_dirty(&mut self, before: &DocumentSet) {
        self.dirty.listing |= before.listing != self.docs.listing;
        self.dirty.functions |= before.functions != self.docs.functions;
        self.dirty.summaries |= before.summaries != self.docs.summaries;
        self.dirty.schema |= before.schema != self.docs.schema;
        self.dirty.graph |= before.graph != self.docs.graph;
    }

    /// Write every dirty document via temp file + atomic rename
    fn persist(&mut self) -> Result<()> {
        if self.dirty.listing {
            write_json_atomic(&self.memory.listing_path(), &self.docs.listing)?;
            self.dirty.listing = false;
        }
        if self.dirty.functions {
            write_json_atomic(&self.memory.functions_path(), &self.docs.functions)?;
            self.dirty.functions = false;
        }
        if self.dirty.summaries {
            write_json_atomic(&self.memory.summaries_path(), &self.docs.summaries)?;
            self.dirty.summaries = false;
        }
        if self.dirty.schema {
            write_json_atomic(&self.memory.schema_path(), &self.docs.schema)?;
            self.dirty.schema = false;
        }
        if self.dirty.graph {
            write_json_atomic(&self.memory.graph_path(), &self.docs.graph)?;
            self.dirty.graph = false;
        }
        Ok(())
    }
}
