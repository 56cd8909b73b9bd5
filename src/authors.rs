//! Author resolution across sources.
//!
//! Every raw author name, whether it comes from a source's author file or is
//! embedded inline in a work or passage, is folded into exactly one
//! [`UnifiedAuthor`] per normalized-name slug. Merging is purely by slug:
//! two historical figures who normalize to the same name become one author.
//!
//! Two lookup indices are kept alongside the authors:
//!
//! - `(source, raw author id)` for standard-schema sources, populated only
//!   from author files;
//! - lower-cased raw and canonical names, for inline sources that have no
//!   stable ids.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::models::{RawAuthor, UnifiedAuthor};
use crate::normalize::normalize;

#[derive(Debug, Default)]
pub struct AuthorRegistry {
    authors: Vec<UnifiedAuthor>,
    by_slug: HashMap<String, usize>,
    by_source_id: HashMap<(String, String), usize>,
    by_name: HashMap<String, usize>,
}

impl AuthorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a raw name to a unified author id, creating the author if no
    /// author with the same slug exists yet. `source` is recorded as a
    /// contributing source either way.
    pub fn resolve_or_create(&mut self, raw_name: &str, source: &str) -> String {
        let idx = self.merge(Some(raw_name), source);
        self.authors[idx].id.clone()
    }

    /// Fold every record of one source's author file into the registry.
    ///
    /// Biographical fields are filled first-non-null-wins across sources, and
    /// `source_ids[source]` records the first raw id seen for that source.
    /// Returns the number of records folded.
    pub fn ingest_author_file(&mut self, records: &[RawAuthor], source: &str) -> usize {
        for record in records {
            let idx = self.merge(record.name.as_deref(), source);
            let author = &mut self.authors[idx];

            author.birth_year = author.birth_year.or(record.birth_year);
            author.death_year = author.death_year.or(record.death_year);
            if author.nationality.is_none() {
                author.nationality = record.nationality.clone();
            }
            if author.era.is_none() {
                author.era = record.era.clone();
            }

            if let Some(raw_id) = &record.id {
                author
                    .source_ids
                    .entry(source.to_string())
                    .or_insert_with(|| raw_id.clone());
                self.by_source_id
                    .entry((source.to_string(), raw_id.clone()))
                    .or_insert(idx);
            }
        }
        records.len()
    }

    /// Unified author id for a raw author id from `source`'s author file.
    pub fn by_source_id(&self, source: &str, raw_id: &str) -> Option<&str> {
        self.by_source_id
            .get(&(source.to_string(), raw_id.to_string()))
            .map(|&idx| self.authors[idx].id.as_str())
    }

    /// Unified author id for a raw or canonical name already seen this run.
    pub fn by_name(&self, raw_name: &str) -> Option<&str> {
        self.by_name
            .get(&name_key(raw_name))
            .map(|&idx| self.authors[idx].id.as_str())
    }

    pub fn get(&self, id: &str) -> Option<&UnifiedAuthor> {
        let slug = id.strip_prefix(ID_PREFIX)?;
        self.by_slug.get(slug).map(|&idx| &self.authors[idx])
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut UnifiedAuthor> {
        let slug = id.strip_prefix(ID_PREFIX)?;
        let idx = *self.by_slug.get(slug)?;
        Some(&mut self.authors[idx])
    }

    /// Authors in first-creation order.
    pub fn authors(&self) -> &[UnifiedAuthor] {
        &self.authors
    }

    pub(crate) fn authors_mut(&mut self) -> &mut [UnifiedAuthor] {
        &mut self.authors
    }

    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    fn merge(&mut self, raw_name: Option<&str>, source: &str) -> usize {
        let raw = raw_name.map(str::trim).unwrap_or_default();

        let idx = match self.by_name.get(&name_key(raw)) {
            Some(&idx) if !raw.is_empty() => idx,
            _ => {
                let (name, slug) = normalize(raw_name);
                let slug = if slug.is_empty() {
                    fallback_slug(&name)
                } else {
                    slug
                };
                match self.by_slug.get(&slug) {
                    Some(&idx) => idx,
                    None => self.create(name, slug),
                }
            }
        };

        let author = &mut self.authors[idx];
        if !author.sources.iter().any(|s| s == source) {
            author.sources.push(source.to_string());
        }
        if !raw.is_empty() && raw != author.name && !author.name_variants.iter().any(|v| v == raw)
        {
            author.name_variants.push(raw.to_string());
        }

        if !raw.is_empty() {
            self.by_name.entry(name_key(raw)).or_insert(idx);
        }
        idx
    }

    fn create(&mut self, name: String, slug: String) -> usize {
        let idx = self.authors.len();
        self.by_name.entry(name_key(&name)).or_insert(idx);
        self.by_slug.insert(slug.clone(), idx);
        self.authors.push(UnifiedAuthor {
            id: format!("{}{}", ID_PREFIX, slug),
            name,
            slug,
            name_variants: Vec::new(),
            sources: Vec::new(),
            source_ids: Default::default(),
            birth_year: None,
            death_year: None,
            nationality: None,
            era: None,
            work_count: 0,
            chunk_count: 0,
        });
        idx
    }
}

const ID_PREFIX: &str = "author-";

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Names with no ASCII letters or digits (e.g. `李白`) slug to nothing; give
/// them a stable hash-derived slug so distinct names stay distinct.
fn fallback_slug(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    let hex: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
    format!("x-{}", hex)
}
