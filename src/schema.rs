//! Wire data model for the derived JSON documents
//!
//! Every document the engine writes (`index.json`, `functions.json`,
//! `summaries.json`, `schema.json`, `graph.json`) is defined here with
//! explicit optional fields and camelCase wire names, validated at the
//! read/write boundary. Downstream tools (summarizer, analyzers, dashboard)
//! read these files directly, so the shapes are part of the contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current document version for output stability
/// 1.0 - Initial layout
/// 1.1 - Added endLine to function entries
/// 1.2 - Navigation graph gained component nodes
pub const DOC_VERSION: &str = "1.2";

// FNV-1a constants for 64-bit hash
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Compute a stable FNV-1a hash (deterministic across runs and platforms)
///
/// Used for cache keys derived from query type + parameters.
pub fn fnv1a_hash(data: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in data.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// A file-level change observed by the watcher or derived during a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    /// File appeared (not yet indexed)
    Add,
    /// File content changed (already indexed)
    Change,
    /// File disappeared from disk
    Remove,
}

impl ChangeAction {
    /// Lowercase label used in logs and events
    pub fn label(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Change => "change",
            Self::Remove => "remove",
        }
    }
}

/// How a function was declared in source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    /// `function name() {}`
    #[default]
    Declaration,
    /// `const name = () => {}`
    Arrow,
}

/// One function found in a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionFact {
    /// Function name as written in source
    pub name: String,

    /// Declaration form
    #[serde(rename = "type")]
    pub kind: FunctionKind,

    /// Start line (1-indexed)
    pub line: usize,

    /// End line (1-indexed, inclusive); equals `line` when the body could
    /// not be balanced
    pub end_line: usize,

    /// Whether the function is declared async
    #[serde(rename = "async")]
    pub is_async: bool,
}

/// Export statements found in a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFacts {
    /// Default export name, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Named exports in order of appearance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub named: Vec<String>,
}

/// One import statement found in a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFact {
    /// Module specifier (`'react'`, `'./utils'`)
    pub source: String,

    /// Default import binding, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Named import bindings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub named: Vec<String>,
}

/// Structural facts extracted from one source file
///
/// Produced fresh on every add/change and never merged with stale data.
/// The same file content always yields a byte-identical fact. A populated
/// `error` means extraction was unavailable this cycle; it never means the
/// file has no functions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralFact {
    /// Whether the file looks like a UI component
    pub is_component: bool,

    /// Component name when `is_component` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,

    /// Functions in order of appearance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionFact>,

    /// Export statements
    #[serde(default)]
    pub exports: ExportFacts,

    /// Import statements in order of appearance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<ImportFact>,

    /// Distinct hook-style calls (`useXxx`) in order of first use
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<String>,

    /// State variables declared via `useState` destructuring
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub state_variables: Vec<String>,

    /// Distinct navigation call targets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub navigation_targets: Vec<String>,

    /// Distinct datastore collection names referenced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collection_references: Vec<String>,

    /// Set when extraction was unavailable (read failure, oversized file)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StructuralFact {
    /// Build the tagged fact for a failed extraction
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Whether this fact carries usable structure
    pub fn is_usable(&self) -> bool {
        self.error.is_none()
    }
}

/// One entry per indexed source file in `index.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Path relative to the project root (forward slashes)
    pub path: String,

    /// File type, the lowercase extension (`js`, `tsx`, ...)
    #[serde(rename = "type")]
    pub file_type: String,

    /// Modification time (Unix seconds)
    pub last_modified: u64,

    /// File size in bytes
    pub size: u64,
}

impl FileRecord {
    /// Build a record from the file on disk, `None` if it cannot be stat'ed
    pub fn from_disk(rel_path: &str, abs_path: &std::path::Path) -> Option<Self> {
        let metadata = std::fs::metadata(abs_path).ok()?;
        let last_modified = metadata
            .modified()
            .ok()?
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .ok()?
            .as_secs();
        let file_type = abs_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Some(Self {
            path: rel_path.to_string(),
            file_type,
            last_modified,
            size: metadata.len(),
        })
    }

    /// Whether the file on disk no longer matches this record
    ///
    /// Stale if mtime or size changed, or if the file is gone.
    pub fn is_stale(&self, abs_path: &std::path::Path) -> bool {
        match Self::from_disk(&self.path, abs_path) {
            Some(current) => current != *self,
            None => true,
        }
    }
}

/// One location entry in the functions index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEntry {
    /// Project-relative file path declaring the function
    pub file: String,

    /// Start line (1-indexed)
    pub line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    /// Declaration form
    #[serde(rename = "type")]
    pub kind: FunctionKind,

    /// Whether the function is declared async
    #[serde(rename = "async")]
    pub is_async: bool,
}

/// `index.json`: authoritative file listing for a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListing {
    /// Document version, rebuilt when it does not match [`DOC_VERSION`]
    pub version: String,

    /// Project id this listing belongs to
    pub project_id: String,

    /// One record per indexed source file, keyed by relative path
    pub files: BTreeMap<String, FileRecord>,

    /// Number of files in the listing
    pub file_count: usize,

    /// Sum of file sizes in bytes
    pub total_size: u64,
}

impl ProjectListing {
    /// Create an empty listing for a project
    pub fn empty(project_id: &str) -> Self {
        Self {
            version: DOC_VERSION.to_string(),
            project_id: project_id.to_string(),
            files: BTreeMap::new(),
            file_count: 0,
            total_size: 0,
        }
    }

    /// Recompute the aggregate counters from the file map
    pub fn recount(&mut self) {
        self.file_count = self.files.len();
        self.total_size = self.files.values().map(|f| f.size).sum();
    }
}

/// `functions.json`: function name to declaration sites
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionsIndex {
    /// Document version
    pub version: String,

    /// Name → declaration sites, names sorted for stable output
    pub functions: BTreeMap<String, Vec<FunctionEntry>>,

    /// Total number of entries across all names
    pub total_functions: usize,
}

impl Default for FunctionsIndex {
    fn default() -> Self {
        Self {
            version: DOC_VERSION.to_string(),
            functions: BTreeMap::new(),
            total_functions: 0,
        }
    }
}

impl FunctionsIndex {
    /// Drop every entry whose `file` matches, pruning emptied names
    pub fn prune_file(&mut self, file: &str) {
        for entries in self.functions.values_mut() {
            entries.retain(|e| e.file != file);
        }
        self.functions.retain(|_, entries| !entries.is_empty());
    }

    /// Recompute `total_functions`
    pub fn recount(&mut self) {
        self.total_functions = self.functions.values().map(|v| v.len()).sum();
    }
}

/// Per-file record in `summaries.json`
///
/// Structural fields are owned by the engine; `summary`, `purpose` and
/// `key_logic` are owned by the external summarizer. Structural updates copy
/// the semantic fields forward and flip `needs_resummarization` instead of
/// clearing them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    /// Structural facts, flattened into the record on the wire
    #[serde(flatten)]
    pub fact: StructuralFact,

    /// One-paragraph semantic summary (external)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// What the file is for (external)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Key logic bullet points (external)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_logic: Option<Vec<String>>,

    /// Set by the engine when structure changed under an existing summary
    #[serde(default)]
    pub needs_resummarization: bool,
}

/// `summaries.json`: per-file structural + semantic records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummariesIndex {
    /// Document version
    pub version: String,

    /// Relative path → record
    pub files: BTreeMap<String, SummaryRecord>,
}

impl Default for SummariesIndex {
    fn default() -> Self {
        Self {
            version: DOC_VERSION.to_string(),
            files: BTreeMap::new(),
        }
    }
}

/// `schema.json`: datastore collection name to referencing files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaIndex {
    /// Document version
    pub version: String,

    /// Collection name → sorted referencing files
    pub collections: BTreeMap<String, Vec<String>>,
}

impl Default for SchemaIndex {
    fn default() -> Self {
        Self {
            version: DOC_VERSION.to_string(),
            collections: BTreeMap::new(),
        }
    }
}

impl SchemaIndex {
    /// Drop a file from every collection, pruning emptied collections
    pub fn prune_file(&mut self, file: &str) {
        for files in self.collections.values_mut() {
            files.retain(|f| f != file);
        }
        self.collections.retain(|_, files| !files.is_empty());
    }

    /// Record that `file` references `collection`
    pub fn insert_reference(&mut self, collection: &str, file: &str) {
        let files = self.collections.entry(collection.to_string()).or_default();
        if !files.iter().any(|f| f == file) {
            files.push(file.to_string());
            files.sort();
        }
    }
}

/// One navigation edge in `graph.json`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEdge {
    /// Relative path of the file performing the navigation
    pub from: String,

    /// Navigation target (screen/route name)
    pub to: String,
}

/// `graph.json`: navigation graph over all indexed files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationGraph {
    /// Document version
    pub version: String,

    /// Sorted distinct component names and navigation targets
    pub nodes: Vec<String>,

    /// Sorted navigation edges
    pub edges: Vec<NavigationEdge>,
}

impl Default for NavigationGraph {
    fn default() -> Self {
        Self {
            version: DOC_VERSION.to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}

impl NavigationGraph {
    /// Drop every edge originating from `file`
    pub fn prune_file(&mut self, file: &str) {
        self.edges.retain(|e| e.from != file);
    }

    /// Recompute the node set from edges and the given component names
    pub fn recompute_nodes(&mut self, component_names: impl IntoIterator<Item = String>) {
        let mut nodes: Vec<String> = component_names.into_iter().collect();
        for edge in &self.edges {
            nodes.push(edge.to.clone());
        }
        nodes.sort();
        nodes.dedup();
        self.nodes = nodes;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_hash_deterministic() {
        assert_eq!(fnv1a_hash("status"), fnv1a_hash("status"));
        assert_ne!(fnv1a_hash("status"), fnv1a_hash("list"));
    }

    #[test]
    fn test_structural_fact_wire_names() {
        let fact = StructuralFact {
            is_component: true,
            component_name: Some("HomeScreen".to_string()),
            functions: vec![FunctionFact {
                name: "loadData".to_string(),
                kind: FunctionKind::Arrow,
                line: 4,
                end_line: 9,
                is_async: true,
            }],
            ..Default::default()
        };

        let json = serde_json::to_string(&fact).unwrap();
        assert!(json.contains("\"isComponent\":true"));
        assert!(json.contains("\"componentName\":\"HomeScreen\""));
        assert!(json.contains("\"type\":\"arrow\""));
        assert!(json.contains("\"async\":true"));
        assert!(json.contains("\"endLine\":9"));
    }

    #[test]
    fn test_unavailable_fact_is_tagged() {
        let fact = StructuralFact::unavailable("permission denied");
        assert!(!fact.is_usable());
        assert!(fact.functions.is_empty());

        let json = serde_json::to_string(&fact).unwrap();
        assert!(json.contains("\"error\":\"permission denied\""));
    }

    #[test]
    fn test_functions_index_prune_and_recount() {
        let mut index = FunctionsIndex::default();
        index.functions.insert(
            "load".to_string(),
            vec![
                FunctionEntry {
                    file: "a.js".to_string(),
                    line: 1,
                    end_line: 3,
                    kind: FunctionKind::Declaration,
                    is_async: false,
                },
                FunctionEntry {
                    file: "b.js".to_string(),
                    line: 5,
                    end_line: 9,
                    kind: FunctionKind::Arrow,
                    is_async: true,
                },
            ],
        );
        index.recount();
        assert_eq!(index.total_functions, 2);

        index.prune_file("a.js");
        index.recount();
        assert_eq!(index.total_functions, 1);
        assert_eq!(index.functions["load"].len(), 1);
        assert_eq!(index.functions["load"][0].file, "b.js");

        index.prune_file("b.js");
        index.recount();
        assert!(index.functions.is_empty());
        assert_eq!(index.total_functions, 0);
    }

    #[test]
    fn test_schema_index_reference_dedup() {
        let mut schema = SchemaIndex::default();
        schema.insert_reference("users", "a.js");
        schema.insert_reference("users", "a.js");
        schema.insert_reference("users", "b.js");

        assert_eq!(schema.collections["users"], vec!["a.js", "b.js"]);

        schema.prune_file("a.js");
        assert_eq!(schema.collections["users"], vec!["b.js"]);
        schema.prune_file("b.js");
        assert!(schema.collections.is_empty());
    }

    #[test]
    fn test_navigation_graph_nodes() {
        let mut graph = NavigationGraph::default();
        graph.edges.push(NavigationEdge {
            from: "Home.js".to_string(),
            to: "Details".to_string(),
        });
        graph.recompute_nodes(vec!["Home".to_string()]);

        assert_eq!(graph.nodes, vec!["Details", "Home"]);

        graph.prune_file("Home.js");
        graph.recompute_nodes(Vec::new());
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_summary_record_flattens_fact() {
        let record = SummaryRecord {
            fact: StructuralFact {
                is_component: false,
                ..Default::default()
            },
            summary: Some("Utility helpers".to_string()),
            purpose: None,
            key_logic: None,
            needs_resummarization: true,
        };

        let json = serde_json::to_string(&record).unwrap();
        // Fact fields sit at the top level of the record
        assert!(json.contains("\"isComponent\":false"));
        assert!(json.contains("\"needsResummarization\":true"));
        assert!(json.contains("\"summary\":\"Utility helpers\""));
    }
}
