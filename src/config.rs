use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::models::SchemaKind;
use crate::works::{known_url_template, SOURCE_ID_PLACEHOLDER};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub output: OutputConfig,
    #[serde(default)]
    pub combine: CombineConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CombineConfig {
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
    #[serde(default = "default_top_authors")]
    pub top_authors: usize,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            min_text_chars: default_min_text_chars(),
            channel_capacity: default_channel_capacity(),
            progress_every: default_progress_every(),
            top_authors: default_top_authors(),
        }
    }
}

fn default_min_text_chars() -> usize {
    10
}
fn default_channel_capacity() -> usize {
    256
}
fn default_progress_every() -> u64 {
    100_000
}
fn default_top_authors() -> usize {
    20
}

/// One upstream corpus provider and the layout of its files.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,
    pub dir: PathBuf,
    pub schema: SchemaKind,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub authors: Option<PathBuf>,
    #[serde(default = "default_works_file")]
    pub works: PathBuf,
    #[serde(default = "default_chunk_globs")]
    pub chunks: Vec<String>,
    #[serde(default)]
    pub url_template: Option<String>,
    #[serde(default)]
    pub scripture: bool,
}

fn default_works_file() -> PathBuf {
    PathBuf::from("works.json")
}

fn default_chunk_globs() -> Vec<String> {
    vec!["chunks.json".to_string()]
}

impl SourceConfig {
    /// Author file, if this source ships one. Standard sources default to
    /// `authors.json`; inline sources have none unless configured.
    pub fn author_file(&self) -> Option<PathBuf> {
        match (&self.authors, self.schema) {
            (Some(file), _) => Some(self.dir.join(file)),
            (None, SchemaKind::Standard) => Some(self.dir.join("authors.json")),
            (None, SchemaKind::Inline) => None,
        }
    }

    pub fn work_file(&self) -> PathBuf {
        self.dir.join(&self.works)
    }

    /// Configured template, else the built-in one for known sources.
    pub fn url_template(&self) -> Option<&str> {
        self.url_template
            .as_deref()
            .or_else(|| known_url_template(&self.name))
    }

    /// Passage files matching the `chunks` globs, relative to `dir`, in
    /// sorted order. A missing `dir` yields no files.
    pub fn chunk_files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let include_set = build_globset(&self.chunks)?;

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(&self.dir).unwrap_or(path);
            if include_set.is_match(relative) {
                files.push(path.to_path_buf());
            }
        }

        // Sort for deterministic ordering
        files.sort();
        Ok(files)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate combine
    if config.combine.channel_capacity == 0 {
        bail!("combine.channel_capacity must be > 0");
    }
    if config.combine.progress_every == 0 {
        bail!("combine.progress_every must be > 0");
    }

    // Validate sources
    if config.sources.is_empty() {
        bail!("at least one [[sources]] entry is required");
    }
    let mut seen = HashSet::new();
    for source in &config.sources {
        if source.name.is_empty()
            || !source
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            bail!(
                "source name '{}' must be non-empty and use only [a-z0-9_-]",
                source.name
            );
        }
        if !seen.insert(source.name.as_str()) {
            bail!("duplicate source name '{}'", source.name);
        }
        if let Some(template) = &source.url_template {
            if !template.contains(SOURCE_ID_PLACEHOLDER) {
                bail!(
                    "sources.{}.url_template must contain {}",
                    source.name,
                    SOURCE_ID_PLACEHOLDER
                );
            }
        }
        if source.chunks.is_empty() {
            bail!("sources.{}.chunks must list at least one glob", source.name);
        }
    }

    Ok(config)
}
