//! Core data models used throughout the unification pipeline.
//!
//! Two families of types live here:
//!
//! - **Raw records** (`RawAuthor`, `RawWork`, `PassageRecord`): the strict
//!   internal form of one per-source input record, produced by
//!   [`crate::decode`] at the file boundary.
//! - **Unified entities** (`UnifiedAuthor`, `UnifiedWork`, `UnifiedChunk`):
//!   the deduplicated, cross-referenced records written to the output files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Shape of a source's work and passage files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    /// Records reference a stable `author_id` / `work_id` from the source's
    /// own author and work files.
    Standard,
    /// Records embed an `authors` array of names and no stable author id.
    Inline,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::Standard => "standard",
            SchemaKind::Inline => "inline",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record of a source's author file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAuthor {
    pub id: Option<String>,
    pub name: Option<String>,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    pub nationality: Option<String>,
    pub era: Option<String>,
}

/// How a raw work names its author.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkAttribution {
    /// Reference into the same source's author file.
    AuthorId(Option<String>),
    /// Embedded author names, primary author first.
    Names(Vec<String>),
}

/// One record of a source's work file, either schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWork {
    pub id: Option<String>,
    pub title: Option<String>,
    pub source_id: Option<String>,
    pub attribution: WorkAttribution,
    pub publication_year: Option<i32>,
    pub original_language: Option<String>,
    pub translator: Option<String>,
    pub form: Option<String>,
    pub genre: Option<String>,
    pub tradition: Option<String>,
}

/// Chapter, verse, and similar locators. Sources disagree on whether these
/// are numbers (`4`) or labels (`"IV"`), so both are kept as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StructuralRef {
    Number(i64),
    Text(String),
}

/// Structural position of a passage inside its work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralMeta {
    pub chapter: Option<StructuralRef>,
    pub section: Option<StructuralRef>,
    pub book: Option<StructuralRef>,
    pub verse: Option<StructuralRef>,
    pub paragraph: Option<StructuralRef>,
    pub translation: Option<String>,
}

/// How a passage record names its author and work.
#[derive(Debug, Clone, PartialEq)]
pub enum PassageAttribution {
    Standard {
        work_id: Option<String>,
        author_id: Option<String>,
    },
    Inline {
        authors: Vec<String>,
        source_id: Option<String>,
    },
}

/// One decoded passage record with every legacy field alias resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PassageRecord {
    pub id: Option<String>,
    pub text: String,
    pub attribution: PassageAttribution,
    pub chunk_type: Option<String>,
    pub position_index: i64,
    pub meta: StructuralMeta,
}

/// A deduplicated author. Exactly one exists per normalized-name slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedAuthor {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub name_variants: Vec<String>,
    pub sources: Vec<String>,
    pub source_ids: BTreeMap<String, String>,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    pub nationality: Option<String>,
    pub era: Option<String>,
    pub work_count: u64,
    pub chunk_count: u64,
}

/// A work attributed to a unified author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedWork {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub author_id: String,
    pub source: String,
    pub source_id: String,
    pub phase: Option<String>,
    pub full_text_url: Option<String>,
    pub publication_year: Option<i32>,
    pub original_language: Option<String>,
    pub translator: Option<String>,
    pub form: Option<String>,
    pub genre: Option<String>,
    pub tradition: Option<String>,
    pub chunk_count: u64,
}

/// A passage in the combined output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedChunk {
    pub id: String,
    pub text: String,
    pub author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_id: Option<String>,
    #[serde(rename = "type")]
    pub chunk_type: String,
    pub position_index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<StructuralRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<StructuralRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book: Option<StructuralRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verse: Option<StructuralRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<StructuralRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_chunk_id: Option<String>,
    pub char_count: u64,
    pub word_count: u64,
}
