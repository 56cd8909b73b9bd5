//! `unify sources`: list configured sources and whether their inputs exist.

use anyhow::Result;

use crate::config::{Config, SourceConfig};

/// Presence of one source's input files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    pub name: String,
    pub schema: &'static str,
    pub authors: &'static str,
    pub works: &'static str,
    pub chunk_files: usize,
}

impl SourceStatus {
    /// A source is usable if at least one passage file matched.
    pub fn healthy(&self) -> bool {
        self.chunk_files > 0
    }
}

pub fn source_status(source: &SourceConfig) -> Result<SourceStatus> {
    let authors = match source.author_file() {
        Some(path) if path.is_file() => "OK",
        Some(_) => "MISSING",
        None => "-",
    };
    let works = if source.work_file().is_file() {
        "OK"
    } else {
        "MISSING"
    };
    Ok(SourceStatus {
        name: source.name.clone(),
        schema: source.schema.as_str(),
        authors,
        works,
        chunk_files: source.chunk_files()?.len(),
    })
}

pub fn list_sources(config: &Config) -> Result<()> {
    println!(
        "{:<16} {:<10} {:<10} {:<10} {:<12} HEALTHY",
        "SOURCE", "SCHEMA", "AUTHORS", "WORKS", "CHUNK FILES"
    );
    for source in &config.sources {
        let status = source_status(source)?;
        println!(
            "{:<16} {:<10} {:<10} {:<10} {:<12} {}",
            status.name,
            status.schema,
            status.authors,
            status.works,
            status.chunk_files,
            status.healthy()
        );
    }
    Ok(())
}
