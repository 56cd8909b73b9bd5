//! Output verification for `unify verify`.
//!
//! Re-reads a finished output directory and checks that it can be loaded
//! without dangling references:
//!
//! - every chunk's `author_id` names an author in `authors.json`
//! - every chunk's `work_id`, when present, names a work in `works.json`
//! - every work's `author_id` names an author
//! - chunk ids are unique
//! - stored `chunk_count`s match the chunks actually present
//!
//! `chunks.json` is streamed; only ids and per-entity counters are held.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::models::{UnifiedAuthor, UnifiedWork};
use crate::pipeline::{AUTHORS_FILE, CHUNKS_FILE, WORKS_FILE};
use crate::reconcile::COMPLETION_MARKER;
use crate::stream::spawn_array_reader;

const VERIFY_CHANNEL_CAPACITY: usize = 1024;

/// Findings of one verification pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub authors: u64,
    pub works: u64,
    pub chunks: u64,
    pub complete: bool,
    pub orphan_works: u64,
    pub orphan_chunk_authors: u64,
    pub orphan_chunk_works: u64,
    pub duplicate_chunk_ids: u64,
    pub invalid_chunks: u64,
    pub count_mismatches: u64,
}

impl VerifyReport {
    pub fn violations(&self) -> u64 {
        self.orphan_works
            + self.orphan_chunk_authors
            + self.orphan_chunk_works
            + self.duplicate_chunk_ids
            + self.invalid_chunks
            + self.count_mismatches
    }

    pub fn is_clean(&self) -> bool {
        self.violations() == 0
    }
}

/// Verify the outputs in `dir`. Errors only when a file cannot be read at
/// all; data problems are reported as violations.
pub async fn verify_output(dir: &Path) -> Result<VerifyReport> {
    let mut report = VerifyReport {
        complete: dir.join(COMPLETION_MARKER).is_file(),
        ..Default::default()
    };

    let authors: Vec<UnifiedAuthor> = read_json(&dir.join(AUTHORS_FILE)).await?;
    let works: Vec<UnifiedWork> = read_json(&dir.join(WORKS_FILE)).await?;
    report.authors = authors.len() as u64;
    report.works = works.len() as u64;

    let author_ids: HashSet<&str> = authors.iter().map(|a| a.id.as_str()).collect();
    let work_ids: HashSet<&str> = works.iter().map(|w| w.id.as_str()).collect();

    for work in &works {
        if !author_ids.contains(work.author_id.as_str()) {
            warn!(work = %work.id, author = %work.author_id, "work references unknown author");
            report.orphan_works += 1;
        }
    }

    let mut seen: HashSet<u128> = HashSet::new();
    let mut per_author: HashMap<String, u64> = HashMap::new();
    let mut per_work: HashMap<String, u64> = HashMap::new();

    let chunks_path = dir.join(CHUNKS_FILE);
    let mut rx = spawn_array_reader(chunks_path.clone(), VERIFY_CHANNEL_CAPACITY);
    while let Some(item) = rx.recv().await {
        let value = item.with_context(|| format!("Failed to read {}", chunks_path.display()))?;
        report.chunks += 1;

        let (Some(id), Some(author_id)) = (str_field(&value, "id"), str_field(&value, "author_id"))
        else {
            report.invalid_chunks += 1;
            continue;
        };

        match Uuid::parse_str(id) {
            Ok(uuid) => {
                if !seen.insert(uuid.as_u128()) {
                    warn!(chunk = id, "duplicate chunk id");
                    report.duplicate_chunk_ids += 1;
                }
            }
            Err(_) => report.invalid_chunks += 1,
        }

        if author_ids.contains(author_id) {
            *per_author.entry(author_id.to_string()).or_default() += 1;
        } else {
            warn!(chunk = id, author = author_id, "chunk references unknown author");
            report.orphan_chunk_authors += 1;
        }

        if let Some(work_id) = str_field(&value, "work_id") {
            if work_ids.contains(work_id) {
                *per_work.entry(work_id.to_string()).or_default() += 1;
            } else {
                warn!(chunk = id, work = work_id, "chunk references unknown work");
                report.orphan_chunk_works += 1;
            }
        }
    }

    for author in &authors {
        if per_author.get(&author.id).copied().unwrap_or(0) != author.chunk_count {
            report.count_mismatches += 1;
        }
    }
    for work in &works {
        if per_work.get(&work.id).copied().unwrap_or(0) != work.chunk_count {
            report.count_mismatches += 1;
        }
    }

    Ok(report)
}

fn str_field<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value.get(key).and_then(Value::as_str)
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Run `unify verify` against the configured output directory.
pub async fn run_verify(config: &Config) -> Result<()> {
    let dir = &config.output.dir;
    let report = verify_output(dir).await?;

    println!("verify {}", dir.display());
    println!(
        "  marker: {}",
        if report.complete { "present" } else { "MISSING" }
    );
    println!("  authors: {}", report.authors);
    println!("  works: {}", report.works);
    println!("  chunks: {}", report.chunks);
    println!("  orphan works: {}", report.orphan_works);
    println!("  chunks with unknown author: {}", report.orphan_chunk_authors);
    println!("  chunks with unknown work: {}", report.orphan_chunk_works);
    println!("  duplicate chunk ids: {}", report.duplicate_chunk_ids);
    println!("  invalid chunks: {}", report.invalid_chunks);
    println!("  count mismatches: {}", report.count_mismatches);

    if !report.is_clean() {
        bail!("{} violation(s) found in {}", report.violations(), dir.display());
    }
    println!("ok");
    Ok(())
}
