//! Statistics for the last combine run.
//!
//! Reads `stats.json` from the output directory and prints a summary:
//! totals, drop breakdown, per-source and per-type counts, and the most
//! prolific authors. Used by `unify stats` to check a run without opening
//! the (potentially very large) output files.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::pipeline::STATS_FILE;
use crate::reconcile::{RunStats, COMPLETION_MARKER};

/// Run the stats command: load `stats.json` and print a summary.
pub fn run_stats(config: &Config) -> Result<()> {
    let path = config.output.dir.join(STATS_FILE);
    let content = std::fs::read(&path)
        .with_context(|| format!("No stats at {} (run `unify combine` first)", path.display()))?;
    let stats: RunStats = serde_json::from_slice(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let complete = config.output.dir.join(COMPLETION_MARKER).exists();

    let t = &stats.totals;
    println!("Corpus Unify — Run Stats");
    println!("========================");
    println!();
    println!("  Output:      {}", config.output.dir.display());
    println!(
        "  Finished:    {} ({})",
        format_ts_relative(stats.finished_at.timestamp()),
        if complete { "complete" } else { "INCOMPLETE" }
    );
    println!("  Duration:    {} ms", stats.duration_ms);
    println!();
    println!("  Authors:     {}", t.authors);
    println!("  Works:       {} ({} skipped)", t.works, t.works_skipped);
    println!("  Chunks:      {} / {} read", t.chunks_emitted, t.chunks_read);
    println!(
        "  Dropped:     {} (too short {}, unresolved {}, malformed {})",
        t.chunks_dropped, t.too_short, t.unresolved, t.malformed
    );
    println!("  Files:       {} ({} failed)", t.files, t.files_failed);

    if !stats.output_files.is_empty() {
        println!();
        println!("  Output files:");
        for (name, size) in &stats.output_files {
            println!("    {:<16} {:>10}", name, format_bytes(*size));
        }
    }

    if !stats.by_source.is_empty() {
        println!();
        println!("  By source:");
        println!(
            "  {:<16} {:>8} {:>8} {:>10} {:>10}",
            "SOURCE", "AUTHORS", "WORKS", "CHUNKS", "DROPPED"
        );
        println!("  {}", "-".repeat(56));
        for (source, s) in &stats.by_source {
            println!(
                "  {:<16} {:>8} {:>8} {:>10} {:>10}",
                source,
                s.authors_ingested,
                s.works_assembled,
                s.emitted,
                s.dropped()
            );
        }
    }

    if !stats.by_type.is_empty() {
        println!();
        println!("  By type:");
        for (chunk_type, count) in &stats.by_type {
            println!("    {:<16} {:>10}", chunk_type, count);
        }
    }

    if !stats.top_authors.is_empty() {
        println!();
        println!("  Top authors:");
        for (rank, a) in stats.top_authors.iter().enumerate() {
            println!(
                "  {:>3}. {:<32} {:>10} chunks {:>5} works",
                rank + 1,
                a.name,
                a.chunk_count,
                a.work_count
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
