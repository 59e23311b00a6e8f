//! Projects command handler - Registry listing

use crate::cli::OutputFormat;
use crate::commands::CommandContext;
use crate::error::Result;

/// Run the projects command
pub fn run_projects(ctx: &CommandContext) -> Result<String> {
    let registry = ctx.load_registry()?;

    let mut output = String::new();

    let json_value = serde_json::json!({
        "_type": "projects",
        "registry": ctx.registry_path().display().to_string(),
        "count": registry.projects.len(),
        "projects": registry
            .projects
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.id,
                    "root": p.root().display().to_string(),
                    "memory": p.memory_dir().display().to_string(),
                    "scan_interval_ms": p.scan_interval_ms,
                    "ignore_patterns": p.ignore_patterns,
                    "sync_command": p.sync_command,
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
            output.push_str(&format!(
                "  PROJECTS ({} registered)\n",
                registry.projects.len()
            ));
            output.push_str("═══════════════════════════════════════════════════════\n\n");
            output.push_str(&format!("registry: {}\n\n", ctx.registry_path().display()));

            for project in &registry.projects {
                output.push_str(&format!("{}\n", project.id));
                output.push_str(&format!("  root: {}\n", project.root().display()));
                output.push_str(&format!("  memory: {}\n", project.memory_dir().display()));
                output.push_str(&format!(
                    "  scan_interval: {}ms\n",
                    project.scan_interval_ms
                ));
                if !project.ignore_patterns.is_empty() {
                    output.push_str(&format!(
                        "  ignore: {}\n",
                        project.ignore_patterns.join(", ")
                    ));
                }
                if let Some(cmd) = &project.sync_command {
                    output.push_str(&format!("  sync: {}\n", cmd));
                }
                output.push('\n');
            }
        }
    }

    Ok(output)
}
