//! End-to-end combine pipeline.
//!
//! Runs the phases of `unify combine` in order against one
//! [`ResolutionContext`]:
//!
//! ```text
//! authors ──▶ works ──▶ passages ──▶ reconcile ──▶ write
//!  (per source, config order)  (streamed)   (counts)   (authors/works/stats/marker)
//! ```
//!
//! Author and work files are small and read whole; passage files are
//! streamed through the [`Combiner`]. Missing or unreadable inputs are
//! logged and skipped. Any failure to write an output is fatal, and the
//! completion marker is only written once everything else is on disk.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::combine::{CombineOptions, CombineTotals, Combiner, PassageFile};
use crate::config::Config;
use crate::context::ResolutionContext;
use crate::decode::{decode_author, decode_work};
use crate::progress::{CombineProgressEvent, CombineProgressReporter, ProgressMode};
use crate::reconcile::{
    build_stats, clear_completion_marker, reconcile_counts, write_completion_marker,
    CompletionMarker, RunStats,
};
use crate::works::WorkSource;
use crate::writer::ChunkWriter;

pub const AUTHORS_FILE: &str = "authors.json";
pub const WORKS_FILE: &str = "works.json";
pub const CHUNKS_FILE: &str = "chunks.json";
pub const STATS_FILE: &str = "stats.json";

/// Result of a successful combine run.
#[derive(Debug)]
pub struct CombineRun {
    pub out_dir: PathBuf,
    pub stats: RunStats,
    pub marker: CompletionMarker,
}

/// Combine every configured source into `out_dir`.
pub async fn combine_corpus(
    config: &Config,
    out_dir: &Path,
    reporter: &dyn CombineProgressReporter,
) -> Result<CombineRun> {
    let started_at = Utc::now();

    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;
    clear_completion_marker(out_dir).await?;

    let mut ctx = ResolutionContext::new();
    let mut totals = CombineTotals::default();

    // Phase 1: authors
    reporter.report(CombineProgressEvent::Phase { phase: "authors" });
    for source in &config.sources {
        let Some(path) = source.author_file() else {
            continue;
        };
        let Some(values) = read_records(&path, &source.name).await else {
            continue;
        };
        let mut records = Vec::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            match decode_author(value) {
                Ok(record) => records.push(record),
                Err(e) => debug!(source = %source.name, index, error = %e, "malformed author record"),
            }
        }
        let folded = ctx.authors.ingest_author_file(&records, &source.name);
        totals.source_mut(&source.name).authors_ingested += folded as u64;
        info!(source = %source.name, records = folded, authors = ctx.authors.len(), "authors ingested");
    }

    // Phase 2: works
    reporter.report(CombineProgressEvent::Phase { phase: "works" });
    for source in &config.sources {
        let path = source.work_file();
        let Some(values) = read_records(&path, &source.name).await else {
            continue;
        };
        let mut records = Vec::with_capacity(values.len());
        let mut malformed = 0u64;
        for (index, value) in values.iter().enumerate() {
            match decode_work(value, source.schema) {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!(source = %source.name, index, error = %e, "malformed work record");
                    malformed += 1;
                }
            }
        }
        let summary = ctx.works.ingest_work_file(
            &records,
            WorkSource {
                name: &source.name,
                phase: source.phase.as_deref(),
                url_template: source.url_template(),
            },
            &mut ctx.authors,
        );
        let src = totals.source_mut(&source.name);
        src.works_assembled += summary.assembled as u64;
        src.works_skipped += summary.skipped as u64 + summary.duplicates as u64 + malformed;
        info!(
            source = %source.name,
            assembled = summary.assembled,
            skipped = summary.skipped,
            duplicates = summary.duplicates,
            "works assembled"
        );
    }

    // Phase 3: passages
    reporter.report(CombineProgressEvent::Phase { phase: "passages" });
    let mut files = Vec::new();
    for source in &config.sources {
        let matched = source
            .chunk_files()
            .with_context(|| format!("Failed to list passage files for {}", source.name))?;
        if matched.is_empty() {
            warn!(source = %source.name, dir = %source.dir.display(), "no passage files matched");
        }
        files.extend(matched.into_iter().map(|path| PassageFile {
            path,
            source: source.name.clone(),
            schema: source.schema,
            scripture: source.scripture,
        }));
    }

    let chunks_path = out_dir.join(CHUNKS_FILE);
    let mut writer = ChunkWriter::create(&chunks_path)
        .await
        .with_context(|| format!("Failed to create {}", chunks_path.display()))?;
    let combiner = Combiner::new(
        CombineOptions {
            min_text_chars: config.combine.min_text_chars,
            channel_capacity: config.combine.channel_capacity,
            progress_every: config.combine.progress_every,
        },
        reporter,
    );
    combiner
        .combine(&files, &mut ctx, &mut writer, &mut totals)
        .await
        .with_context(|| format!("Failed to write {}", chunks_path.display()))?;
    let written = writer.written();
    writer
        .finish()
        .await
        .with_context(|| format!("Failed to write {}", chunks_path.display()))?;
    info!(files = files.len(), written, dropped = totals.dropped(), "passages combined");

    // Phase 4: reconcile and write
    reporter.report(CombineProgressEvent::Phase { phase: "reconcile" });
    reconcile_counts(&mut ctx, &totals);

    write_pretty(&out_dir.join(AUTHORS_FILE), ctx.authors.authors()).await?;
    write_pretty(&out_dir.join(WORKS_FILE), ctx.works.works()).await?;

    let mut output_files = BTreeMap::new();
    for name in [AUTHORS_FILE, WORKS_FILE, CHUNKS_FILE] {
        let meta = tokio::fs::metadata(out_dir.join(name))
            .await
            .with_context(|| format!("Failed to stat {}", name))?;
        output_files.insert(name.to_string(), meta.len());
    }

    let stats = build_stats(
        &ctx,
        &totals,
        config.combine.top_authors,
        output_files,
        started_at,
    );
    write_pretty(&out_dir.join(STATS_FILE), &stats).await?;

    let marker = write_completion_marker(out_dir, &stats).await?;
    info!(
        authors = marker.authors,
        works = marker.works,
        chunks = marker.chunks,
        duration_ms = marker.duration_ms,
        "combine complete"
    );

    Ok(CombineRun {
        out_dir: out_dir.to_path_buf(),
        stats,
        marker,
    })
}

/// Read a whole JSON array of records. Missing or invalid files are logged
/// and yield `None`.
async fn read_records(path: &Path, source: &str) -> Option<Vec<Value>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(source, path = %path.display(), "input file missing, skipped");
            return None;
        }
        Err(e) => {
            warn!(source, path = %path.display(), error = %e, "input file unreadable, skipped");
            return None;
        }
    };
    match serde_json::from_slice::<Vec<Value>>(&bytes) {
        Ok(values) => Some(values),
        Err(e) => {
            warn!(source, path = %path.display(), error = %e, "input file is not a JSON array, skipped");
            None
        }
    }
}

async fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Run `unify combine` and print a summary to stdout.
pub async fn run_combine(config: &Config, output: Option<PathBuf>, mode: ProgressMode) -> Result<()> {
    let out_dir = output.unwrap_or_else(|| config.output.dir.clone());
    let reporter = mode.reporter();
    let run = combine_corpus(config, &out_dir, reporter.as_ref()).await?;

    let totals = &run.stats.totals;
    println!("combine {}", run.out_dir.display());
    println!("  authors: {}", totals.authors);
    println!("  works: {} ({} skipped)", totals.works, totals.works_skipped);
    println!(
        "  passage files: {} ({} failed)",
        totals.files, totals.files_failed
    );
    println!("  chunks read: {}", totals.chunks_read);
    println!("  chunks written: {}", totals.chunks_emitted);
    println!(
        "  chunks dropped: {} (too short: {}, unresolved: {}, malformed: {})",
        totals.chunks_dropped, totals.too_short, totals.unresolved, totals.malformed
    );
    println!("  duration: {} ms", run.stats.duration_ms);
    println!("ok");

    Ok(())
}
