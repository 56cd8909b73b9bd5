//! Per-run resolution state.
//!
//! A [`ResolutionContext`] is built once per batch run, threaded by `&mut`
//! through author resolution, work assembly, and passage combination, and
//! dropped when the run ends. It is the only place lookup indices live.

use crate::authors::AuthorRegistry;
use crate::models::PassageAttribution;
use crate::works::WorkRegistry;

#[derive(Debug, Default)]
pub struct ResolutionContext {
    pub authors: AuthorRegistry,
    pub works: WorkRegistry,
}

/// Resolved author and work for one passage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribution {
    pub author_id: Option<String>,
    pub work_id: Option<String>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a passage's author and work.
    ///
    /// - Inline: the primary embedded name is resolved (creating the author
    ///   if needed) and the work is looked up by `(source, source_id)`.
    /// - Standard: the work is looked up by `(source, work_id)`; the author by
    ///   `(source, author_id)`, falling back to the work's author.
    pub fn attribute(&mut self, source: &str, attribution: &PassageAttribution) -> Attribution {
        match attribution {
            PassageAttribution::Inline { authors, source_id } => {
                let author_id = authors
                    .first()
                    .map(|name| self.authors.resolve_or_create(name, source));
                let work_id = source_id
                    .as_deref()
                    .and_then(|sid| self.works.by_source_id(source, sid))
                    .map(|w| w.id.clone());
                Attribution { author_id, work_id }
            }
            PassageAttribution::Standard { work_id, author_id } => {
                let work = work_id
                    .as_deref()
                    .and_then(|id| self.works.by_raw_id(source, id));
                let author_id = author_id
                    .as_deref()
                    .and_then(|id| self.authors.by_source_id(source, id))
                    .or_else(|| work.map(|w| w.author_id.as_str()))
                    .map(str::to_string);
                Attribution {
                    author_id,
                    work_id: work.map(|w| w.id.clone()),
                }
            }
        }
    }
}
