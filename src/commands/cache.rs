//! Cache command handler - Query cache info and clearing

use crate::cache::QueryCache;
use crate::cli::{CacheArgs, CacheOperation, OutputFormat};
use crate::commands::CommandContext;
use crate::error::Result;

/// Run the cache command
pub fn run_cache(args: &CacheArgs, ctx: &CommandContext) -> Result<String> {
    match &args.operation {
        CacheOperation::Info => run_cache_info(ctx),
        CacheOperation::Clear => run_cache_clear(ctx),
    }
}

/// Cache caps come from the registry when one is readable, defaults otherwise,
/// so `cache info` works before any project is registered.
fn open_cache(ctx: &CommandContext) -> QueryCache {
    let settings = ctx
        .load_registry()
        .map(|r| r.settings.cache)
        .unwrap_or_default();
    QueryCache::new(&settings)
}

/// Show cache information
fn run_cache_info(ctx: &CommandContext) -> Result<String> {
    let cache = open_cache(ctx);
    let stats = cache.stats();

    let mut output = String::new();

    let json_value = serde_json::json!({
        "_type": "cache_info",
        "cache_base": stats.base_dir,
        "disk_entries": stats.disk_entries,
        "disk_bytes": stats.disk_bytes,
        "disk_mb": stats.disk_bytes as f64 / (1024.0 * 1024.0),
    });

    match ctx.format {
        OutputFormat::Json => {
            output = serde_json::to_string_pretty(&json_value).unwrap_or_default();
        }
        OutputFormat::Text => {
            output.push_str("═══════════════════════════════════════════════════════\n");
            output.push_str("  QUERY CACHE INFO\n");
            output.push_str("═══════════════════════════════════════════════════════\n\n");

            output.push_str(&format!("cache_base: {}\n", stats.base_dir));
            if stats.disk_entries == 0 {
                output.push_str("No cached entries on disk.\n");
            } else {
                output.push_str(&format!("disk_entries: {}\n", stats.disk_entries));
                output.push_str(&format!(
                    "disk_size: {} bytes ({:.2} MB)\n",
                    stats.disk_bytes,
                    stats.disk_bytes as f64 / (1024.0 * 1024.0)
                ));
            }
        }
    }

    Ok(output)
}

/// Clear every cached query result
fn run_cache_clear(ctx: &CommandContext) -> Result<String> {
    let cache = open_cache(ctx);
    let before = cache.stats();
    cache.clear();

    let mut output = String::new();

    let json_value = serde_json::json!({
        "_type": "cache_clear",
        "cleared": before.disk_entries > 0,
        "cache_base": before.base_dir,
        "freed_entries": before.disk_entries,
        "freed_bytes": before.disk_bytes,
        "freed_mb": before.disk_bytes as f64 / (1024.0 * 1024.0),
    });

    match ctx.format {
        OutputFormat::Json => {
            output = serde_json::to_string_pretty(&json_value).unwrap_or_default();
        }
        OutputFormat::Text => {
            if before.disk_entries > 0 {
                output.push_str(&format!("Cache cleared: {}\n", before.base_dir));
                output.push_str(&format!(
                    "Freed: {} entries, {} bytes ({:.2} MB)\n",
                    before.disk_entries,
                    before.disk_bytes,
                    before.disk_bytes as f64 / (1024.0 * 1024.0)
                ));
            } else {
                output.push_str(&format!("No cache entries at: {}\n", before.base_dir));
            }
        }
    }

    Ok(output)
}
