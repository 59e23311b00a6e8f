//! Status command handler - Per-project index state
//!
//! Reads the index documents leniently and never writes, so `status` is
//! safe to run while a watch loop owns the memory directory.

use crate::cli::{OutputFormat, StatusArgs};
use crate::commands::CommandContext;
use crate::error::Result;
use crate::fs_utils::read_json_lenient;
use crate::memory::MemoryDir;
use crate::schema::{FunctionsIndex, NavigationGraph, ProjectListing, SchemaIndex, SummariesIndex};

/// Run the status command
pub fn run_status(args: &StatusArgs, ctx: &CommandContext) -> Result<String> {
    let mut registry = ctx.load_registry()?;
    if let Some(id) = &args.project {
        registry.retain_project(id)?;
    }

    let mut rows: Vec<serde_json::Value> = Vec::new();
    for project in &registry.projects {
        let memory = MemoryDir::for_project(project);
        let listing: Option<ProjectListing> = read_json_lenient(&memory.listing_path());
        let functions: Option<FunctionsIndex> = read_json_lenient(&memory.functions_path());
        let summaries: Option<SummariesIndex> = read_json_lenient(&memory.summaries_path());
        let schema: Option<SchemaIndex> = read_json_lenient(&memory.schema_path());
        let graph: Option<NavigationGraph> = read_json_lenient(&memory.graph_path());

        let needs_resummarization = summaries
            .as_ref()
            .map(|s| {
                s.files
                    .values()
                    .filter(|r| r.needs_resummarization)
                    .count()
            })
            .unwrap_or(0);

        rows.push(serde_json::json!({
            "project": project.id,
            "root": project.root().display().to_string(),
            "memory": memory.root().display().to_string(),
            "indexed": listing.is_some(),
            "files": listing.as_ref().map(|l| l.file_count),
            "total_size_bytes": listing.as_ref().map(|l| l.total_size),
            "functions": functions.as_ref().map(|f| f.total_functions),
            "collections": schema.as_ref().map(|s| s.collections.len()),
            "graph_edges": graph.as_ref().map(|g| g.edges.len()),
            "needs_resummarization": needs_resummarization,
            "memory_bytes": memory.size(),
        }));
    }

    let mut output = String::new();

    let json_value = serde_json::json!({
        "_type": "status",
        "registry": ctx.registry_path().display().to_string(),
        "projects": rows,
    });

    match ctx.format {
        OutputFormat::Json => {
            output = serde_json::to_string_pretty(&json_value).unwrap_or_default();
        }
        OutputFormat::Text => {
            output.push_str("═══════════════════════════════════════════════════════\n");
            output.push_str("  STATUS\n");
            output.push_str("═══════════════════════════════════════════════════════\n\n");
            output.push_str(&format!("registry: {}\n\n", ctx.registry_path().display()));

            for row in &rows {
                let id = row["project"].as_str().unwrap_or("?");
                output.push_str(&format!("{}\n", id));
                output.push_str(&format!(
                    "  root: {}\n",
                    row["root"].as_str().unwrap_or("?")
                ));
                if row["indexed"].as_bool().unwrap_or(false) {
                    output.push_str(&format!(
                        "  files: {}  functions: {}\n",
                        row["files"].as_u64().unwrap_or(0),
                        row["functions"].as_u64().unwrap_or(0)
                    ));
                    output.push_str(&format!(
                        "  collections: {}  graph_edges: {}\n",
                        row["collections"].as_u64().unwrap_or(0),
                        row["graph_edges"].as_u64().unwrap_or(0)
                    ));
                    let stale = row["needs_resummarization"].as_u64().unwrap_or(0);
                    if stale > 0 {
                        output.push_str(&format!("  needs_resummarization: {}\n", stale));
                    }
                    output.push_str(&format!(
                        "  memory: {} ({} bytes)\n\n",
                        row["memory"].as_str().unwrap_or("?"),
                        row["memory_bytes"].as_u64().unwrap_or(0)
                    ));
                } else {
                    output.push_str("  not indexed yet (run `codemap scan`)\n\n");
                }
            }
        }
    }

    Ok(output)
}
