//! Scan command handler - One-shot full project scans

use crate::cli::{OutputFormat, ScanArgs};
use crate::commands::CommandContext;
use crate::error::Result;
use crate::extract::LexicalExtractor;
use crate::index::{IndexStore, ScanSummary};

/// Run the scan command
pub fn run_scan(args: &ScanArgs, ctx: &CommandContext) -> Result<String> {
    let mut registry = ctx.load_registry()?;
    if let Some(id) = &args.project {
        registry.retain_project(id)?;
    }

    let max_file_size = registry.settings.max_file_size_bytes;
    let mut scans: Vec<(String, String, ScanSummary)> = Vec::new();
    for project in &registry.projects {
        if ctx.verbose {
            eprintln!("Scanning {} at {}", project.id, project.root().display());
        }
        let mut store = IndexStore::open(
            project.clone(),
            Box::new(LexicalExtractor::new(max_file_size)),
        )?;
        let summary = store.full_scan()?;
        scans.push((
            project.id.clone(),
            project.memory_dir().display().to_string(),
            summary,
        ));
    }

    let mut output = String::new();

    let json_value = serde_json::json!({
        "_type": "scan",
        "projects": scans
            .iter()
            .map(|(id, memory, s)| {
                serde_json::json!({
                    "project": id,
                    "memory": memory,
                    "files": s.files_seen,
                    "added": s.added,
                    "changed": s.changed,
                    "removed": s.removed,
                    "skipped": s.skipped,
                })
            })
            .collect::<Vec<_>>(),
    });

    match ctx.format {
        OutputFormat::Json => {
            output = serde_json::to_string_pretty(&json_value).unwrap_or_default();
        }
        OutputFormat::Text => {
            output.push_str("═══════════════════════════════════════════════════════\n");
            output.push_str(&format!("  SCAN ({} project(s))\n", scans.len()));
            output.push_str("═══════════════════════════════════════════════════════\n\n");

            for (id, memory, summary) in &scans {
                output.push_str(&format!("{}\n", id));
                output.push_str(&format!("  memory: {}\n", memory));
                output.push_str(&format!("  files: {}\n", summary.files_seen));
                output.push_str(&format!(
                    "  added: {}  changed: {}  removed: {}  skipped: {}\n\n",
                    summary.added, summary.changed, summary.removed, summary.skipped
                ));
            }
        }
    }

    Ok(output)
}
