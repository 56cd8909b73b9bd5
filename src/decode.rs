//! Boundary decoding of raw per-source records.
//!
//! Source files were produced by several generations of scrapers and use
//! different names for the same field (`text` / `content`, `sequence` /
//! `chunk_index` / `index` / `position`, …) and both numbers and strings for
//! ids. All of that aliasing is resolved here, once per record, into the
//! strict types of [`crate::models`]. Nothing downstream looks at raw JSON.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{
    PassageAttribution, PassageRecord, RawAuthor, RawWork, SchemaKind, StructuralMeta,
    StructuralRef, WorkAttribution,
};

/// A record that cannot be decoded. The record is skipped; the file continues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("field `{field}` has an unexpected type (expected {expected})")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

const TEXT_KEYS: &[&str] = &["text", "content"];
const TYPE_KEYS: &[&str] = &["chunk_type", "type"];
const POSITION_KEYS: &[&str] = &["sequence", "chunk_index", "index", "position"];
const METADATA_KEYS: &[&str] = &["source_metadata", "metadata"];
const TRANSLATION_KEYS: &[&str] = &["translation", "version"];

/// Decode one record of an author file.
pub fn decode_author(value: &Value) -> Result<RawAuthor, DecodeError> {
    let obj = as_object(value)?;
    Ok(RawAuthor {
        id: id_field(obj, "id")?,
        name: descriptive_field(obj, "name"),
        birth_year: year_field(obj, "birth_year"),
        death_year: year_field(obj, "death_year"),
        nationality: descriptive_field(obj, "nationality"),
        era: descriptive_field(obj, "era"),
    })
}

/// Decode one record of a work file in the given schema.
pub fn decode_work(value: &Value, schema: SchemaKind) -> Result<RawWork, DecodeError> {
    let obj = as_object(value)?;
    let attribution = match schema {
        SchemaKind::Standard => WorkAttribution::AuthorId(id_field(obj, "author_id")?),
        SchemaKind::Inline => WorkAttribution::Names(names_field(obj, "authors")?),
    };

    Ok(RawWork {
        id: id_field(obj, "id")?,
        title: descriptive_field(obj, "title"),
        source_id: id_field(obj, "source_id")?,
        attribution,
        publication_year: year_field(obj, "publication_year"),
        original_language: descriptive_field(obj, "original_language"),
        translator: descriptive_field(obj, "translator"),
        form: descriptive_field(obj, "form"),
        genre: descriptive_field(obj, "genre"),
        tradition: descriptive_field(obj, "tradition"),
    })
}

/// Decode one record of a passage file in the given schema.
///
/// `scripture` enables the translation/book/chapter/verse fallbacks that only
/// scripture sources carry at the top level of the record.
pub fn decode_passage(
    value: &Value,
    schema: SchemaKind,
    scripture: bool,
) -> Result<PassageRecord, DecodeError> {
    let obj = as_object(value)?;

    let text = match first_present(obj, TEXT_KEYS) {
        Some((_, Value::String(s))) => s.clone(),
        Some(_) => {
            return Err(DecodeError::InvalidField {
                field: "text",
                expected: "string",
            })
        }
        None => String::new(),
    };

    let attribution = match schema {
        SchemaKind::Standard => PassageAttribution::Standard {
            work_id: id_field(obj, "work_id")?,
            author_id: id_field(obj, "author_id")?,
        },
        SchemaKind::Inline => PassageAttribution::Inline {
            authors: names_field(obj, "authors")?,
            source_id: id_field(obj, "source_id")?,
        },
    };

    let chunk_type = match first_present(obj, TYPE_KEYS) {
        Some((_, Value::String(s))) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    };

    let position_index = first_present(obj, POSITION_KEYS)
        .and_then(|(_, v)| integer_value(v))
        .unwrap_or(0);

    Ok(PassageRecord {
        id: id_field(obj, "id")?,
        text,
        attribution,
        chunk_type,
        position_index,
        meta: structural_meta(obj, scripture),
    })
}

fn structural_meta(obj: &Map<String, Value>, scripture: bool) -> StructuralMeta {
    let nested = first_present(obj, METADATA_KEYS).and_then(|(_, v)| v.as_object());
    let from_nested = |key: &str| nested.and_then(|m| m.get(key)).and_then(structural_ref);

    let mut meta = StructuralMeta {
        chapter: from_nested("chapter"),
        section: from_nested("section"),
        book: from_nested("book"),
        verse: from_nested("verse"),
        paragraph: from_nested("paragraph"),
        translation: None,
    };

    if scripture {
        let top = |key: &str| obj.get(key).and_then(structural_ref);
        meta.book = meta.book.or_else(|| top("book"));
        meta.chapter = meta.chapter.or_else(|| top("chapter"));
        meta.verse = meta.verse.or_else(|| top("verse"));
        meta.translation = nested
            .and_then(|m| first_present(m, TRANSLATION_KEYS))
            .or_else(|| first_present(obj, TRANSLATION_KEYS))
            .and_then(|(_, v)| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }

    meta
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, DecodeError> {
    value.as_object().ok_or(DecodeError::NotAnObject)
}

/// First key in `keys` whose value is present and not `null`.
fn first_present<'a>(
    obj: &'a Map<String, Value>,
    keys: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    keys.iter()
        .find_map(|k| obj.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)))
}

/// Ids arrive as strings or numbers depending on the scraper generation.
fn id_field(obj: &Map<String, Value>, key: &'static str) -> Result<Option<String>, DecodeError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(DecodeError::InvalidField {
            field: key,
            expected: "string or number",
        }),
    }
}

/// Descriptive fields never reject a record: strings are trimmed, arrays of
/// strings are joined with `", "`, numbers are rendered, anything else is
/// `None`.
fn descriptive_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match obj.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Accepts `["A", "B"]` or a bare `"A"`. Position is significant: the first
/// entry is the primary author, so a blank or non-string first entry yields
/// no names at all. Later blank entries are dropped.
fn names_field(obj: &Map<String, Value>, key: &'static str) -> Result<Vec<String>, DecodeError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.trim().to_string()]),
        Some(Value::Array(items)) => {
            match items.first().and_then(listed_name) {
                None => Ok(Vec::new()),
                Some(_) => Ok(items
                    .iter()
                    .filter_map(listed_name)
                    .map(str::to_string)
                    .collect()),
            }
        }
        Some(_) => Err(DecodeError::InvalidField {
            field: key,
            expected: "array of strings",
        }),
    }
}

fn listed_name(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// Years are informational; unparseable values (`"c. 1850"`) become `None`.
fn year_field(obj: &Map<String, Value>, key: &str) -> Option<i32> {
    obj.get(key)
        .and_then(integer_value)
        .and_then(|y| i32::try_from(y).ok())
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn structural_ref(value: &Value) -> Option<StructuralRef> {
    match value {
        Value::Number(n) => n.as_i64().map(StructuralRef::Number),
        Value::String(s) if !s.trim().is_empty() => Some(StructuralRef::Text(s.trim().to_string())),
        _ => None,
    }
}
