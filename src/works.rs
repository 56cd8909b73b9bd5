//! Work assembly.
//!
//! Raw works are attributed to unified authors and given a synthesized id
//! `work-<title slug>-<source>-<source id>`. Works are never merged across
//! sources, even when titles and authors match: each `(source, source_id)`
//! pair yields its own [`UnifiedWork`].

use std::collections::HashMap;
use tracing::debug;

use crate::authors::AuthorRegistry;
use crate::models::{RawWork, UnifiedWork, WorkAttribution};
use crate::normalize::slugify;

/// Placeholder substituted with a work's source id in URL templates.
pub const SOURCE_ID_PLACEHOLDER: &str = "{source_id}";

/// Full-text URL templates for sources whose URL scheme is known.
const KNOWN_URL_TEMPLATES: &[(&str, &str)] = &[
    ("gutenberg", "https://www.gutenberg.org/ebooks/{source_id}"),
    ("wikisource", "https://en.wikisource.org/wiki/{source_id}"),
    ("sacred-texts", "https://sacred-texts.com/{source_id}"),
    ("ccel", "https://ccel.org/ccel/{source_id}"),
    (
        "perseus",
        "https://www.perseus.tufts.edu/hopper/text?doc={source_id}",
    ),
];

/// Built-in URL template for a source, if one is known.
pub fn known_url_template(source: &str) -> Option<&'static str> {
    KNOWN_URL_TEMPLATES
        .iter()
        .find(|(name, _)| *name == source)
        .map(|(_, template)| *template)
}

/// Per-file context for [`WorkRegistry::ingest_work_file`]. The schema kind
/// is already carried by each record's [`WorkAttribution`].
#[derive(Debug, Clone, Copy)]
pub struct WorkSource<'a> {
    pub name: &'a str,
    pub phase: Option<&'a str>,
    pub url_template: Option<&'a str>,
}

/// Outcome counts for one work file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkFileSummary {
    pub assembled: usize,
    /// No resolvable author, or neither a source id nor a raw id.
    pub skipped: usize,
    /// Same work id already assembled earlier in the run.
    pub duplicates: usize,
}

#[derive(Debug, Default)]
pub struct WorkRegistry {
    works: Vec<UnifiedWork>,
    by_id: HashMap<String, usize>,
    by_raw_id: HashMap<(String, String), usize>,
    by_source_id: HashMap<(String, String), usize>,
}

impl WorkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble every record of one source's work file.
    ///
    /// Inline-schema works create their author on the fly from the first
    /// listed name; standard-schema works must reference an author already
    /// ingested from the same source's author file. Works whose author cannot
    /// be resolved are skipped.
    pub fn ingest_work_file(
        &mut self,
        records: &[RawWork],
        source: WorkSource<'_>,
        authors: &mut AuthorRegistry,
    ) -> WorkFileSummary {
        let mut summary = WorkFileSummary::default();

        for record in records {
            let author_id = match &record.attribution {
                WorkAttribution::Names(names) => names
                    .first()
                    .map(|name| authors.resolve_or_create(name, source.name)),
                WorkAttribution::AuthorId(raw_id) => raw_id
                    .as_deref()
                    .and_then(|id| authors.by_source_id(source.name, id))
                    .map(str::to_string),
            };
            let Some(author_id) = author_id else {
                debug!(
                    source = source.name,
                    title = record.title.as_deref().unwrap_or_default(),
                    "work skipped: author unresolved"
                );
                summary.skipped += 1;
                continue;
            };

            let Some(source_id) = record.source_id.clone().or_else(|| record.id.clone()) else {
                debug!(source = source.name, "work skipped: no source id");
                summary.skipped += 1;
                continue;
            };

            let title = record
                .title
                .clone()
                .unwrap_or_else(|| "Untitled".to_string());
            let slug = match slugify(&title) {
                s if s.is_empty() => "untitled".to_string(),
                s => s,
            };
            let id = format!("work-{}-{}-{}", slug, source.name, source_id);

            if let Some(&existing) = self.by_id.get(&id) {
                if let Some(raw_id) = &record.id {
                    self.by_raw_id
                        .entry((source.name.to_string(), raw_id.clone()))
                        .or_insert(existing);
                }
                summary.duplicates += 1;
                continue;
            }

            let full_text_url = source
                .url_template
                .map(|template| template.replace(SOURCE_ID_PLACEHOLDER, &source_id));

            let idx = self.works.len();
            self.by_id.insert(id.clone(), idx);
            if let Some(raw_id) = &record.id {
                self.by_raw_id
                    .entry((source.name.to_string(), raw_id.clone()))
                    .or_insert(idx);
            }
            if let Some(sid) = &record.source_id {
                self.by_source_id
                    .entry((source.name.to_string(), sid.clone()))
                    .or_insert(idx);
            }

            if let Some(author) = authors.get_mut(&author_id) {
                author.work_count += 1;
            }

            self.works.push(UnifiedWork {
                id,
                title,
                slug,
                author_id,
                source: source.name.to_string(),
                source_id,
                phase: source.phase.map(str::to_string),
                full_text_url,
                publication_year: record.publication_year,
                original_language: record.original_language.clone(),
                translator: record.translator.clone(),
                form: record.form.clone(),
                genre: record.genre.clone(),
                tradition: record.tradition.clone(),
                chunk_count: 0,
            });
            summary.assembled += 1;
        }

        summary
    }

    /// Work assembled from `source`'s work record with raw id `raw_id`.
    pub fn by_raw_id(&self, source: &str, raw_id: &str) -> Option<&UnifiedWork> {
        self.by_raw_id
            .get(&(source.to_string(), raw_id.to_string()))
            .map(|&idx| &self.works[idx])
    }

    /// Work assembled from `source`'s work record with source id `source_id`.
    pub fn by_source_id(&self, source: &str, source_id: &str) -> Option<&UnifiedWork> {
        self.by_source_id
            .get(&(source.to_string(), source_id.to_string()))
            .map(|&idx| &self.works[idx])
    }

    pub fn get(&self, id: &str) -> Option<&UnifiedWork> {
        self.by_id.get(id).map(|&idx| &self.works[idx])
    }

    /// Works in assembly order.
    pub fn works(&self) -> &[UnifiedWork] {
        &self.works
    }

    pub(crate) fn works_mut(&mut self) -> &mut [UnifiedWork] {
        &mut self.works
    }

    pub fn len(&self) -> usize {
        self.works.len()
    }

    pub fn is_empty(&self) -> bool {
        self.works.is_empty()
    }
}
