//! Count reconciliation, run statistics, and the completion marker.
//!
//! Passage counts per work and per author are only known once the streaming
//! pass has finished. [`reconcile_counts`] writes them back onto the (much
//! smaller) author and work collections in a second pass; [`build_stats`]
//! then summarizes the run for `stats.json`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::io::AsyncReadExt;

use crate::combine::{CombineTotals, SourceTotals};
use crate::context::ResolutionContext;

/// File name of the completion marker inside the output directory.
pub const COMPLETION_MARKER: &str = "COMPLETE.json";

/// Rewrite `chunk_count` on every work and author from the streaming totals.
/// Entities that received no passages are reset to zero.
pub fn reconcile_counts(ctx: &mut ResolutionContext, totals: &CombineTotals) {
    for work in ctx.works.works_mut() {
        work.chunk_count = totals.per_work.get(&work.id).copied().unwrap_or(0);
    }
    for author in ctx.authors.authors_mut() {
        author.chunk_count = totals.per_author.get(&author.id).copied().unwrap_or(0);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub authors: u64,
    pub works: u64,
    pub works_skipped: u64,
    pub files: u64,
    pub files_failed: u64,
    pub chunks_read: u64,
    pub chunks_emitted: u64,
    pub chunks_dropped: u64,
    pub too_short: u64,
    pub unresolved: u64,
    pub malformed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRank {
    pub id: String,
    pub name: String,
    pub chunk_count: u64,
    pub work_count: u64,
}

/// Contents of `stats.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub totals: RunTotals,
    pub by_source: BTreeMap<String, SourceTotals>,
    pub by_type: BTreeMap<String, u64>,
    pub top_authors: Vec<AuthorRank>,
    /// Output file name to size in bytes.
    pub output_files: BTreeMap<String, u64>,
}

/// Summarize a reconciled run.
pub fn build_stats(
    ctx: &ResolutionContext,
    totals: &CombineTotals,
    top_n: usize,
    output_files: BTreeMap<String, u64>,
    started_at: DateTime<Utc>,
) -> RunStats {
    let sum = |f: &dyn Fn(&SourceTotals) -> u64| totals.per_source.values().map(f).sum::<u64>();

    let run_totals = RunTotals {
        authors: ctx.authors.len() as u64,
        works: ctx.works.len() as u64,
        works_skipped: sum(&|s| s.works_skipped),
        files: sum(&|s| s.files),
        files_failed: sum(&|s| s.files_failed),
        chunks_read: totals.read(),
        chunks_emitted: totals.emitted(),
        chunks_dropped: totals.dropped(),
        too_short: sum(&|s| s.too_short),
        unresolved: sum(&|s| s.unresolved),
        malformed: sum(&|s| s.malformed),
    };

    let mut ranked: Vec<_> = ctx
        .authors
        .authors()
        .iter()
        .filter(|a| a.chunk_count > 0)
        .collect();
    ranked.sort_by(|a, b| b.chunk_count.cmp(&a.chunk_count).then_with(|| a.id.cmp(&b.id)));
    let top_authors = ranked
        .into_iter()
        .take(top_n)
        .map(|a| AuthorRank {
            id: a.id.clone(),
            name: a.name.clone(),
            chunk_count: a.chunk_count,
            work_count: a.work_count,
        })
        .collect();

    let finished_at = Utc::now();
    RunStats {
        started_at,
        finished_at,
        duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
        totals: run_totals,
        by_source: totals.per_source.clone(),
        by_type: totals.per_type.clone(),
        top_authors,
        output_files,
    }
}

/// Contents of the completion marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub authors: u64,
    pub works: u64,
    pub chunks: u64,
    pub chunks_dropped: u64,
    pub authors_sha256: String,
    pub works_sha256: String,
}

/// Write the completion marker into `dir`. Called only after every output
/// file has been written successfully.
pub async fn write_completion_marker(dir: &Path, stats: &RunStats) -> Result<CompletionMarker> {
    let marker = CompletionMarker {
        finished_at: stats.finished_at,
        duration_ms: stats.duration_ms,
        authors: stats.totals.authors,
        works: stats.totals.works,
        chunks: stats.totals.chunks_emitted,
        chunks_dropped: stats.totals.chunks_dropped,
        authors_sha256: sha256_file(&dir.join("authors.json")).await?,
        works_sha256: sha256_file(&dir.join("works.json")).await?,
    };
    let path = dir.join(COMPLETION_MARKER);
    tokio::fs::write(&path, serde_json::to_vec_pretty(&marker)?)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(marker)
}

/// Remove a marker left by a previous run so a failed run never looks
/// complete.
pub async fn clear_completion_marker(dir: &Path) -> Result<()> {
    let path = dir.join(COMPLETION_MARKER);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
