//! Streaming passage combination.
//!
//! For every configured passage file, records are pulled one at a time from
//! a [`spawn_array_reader`] channel, decoded, attributed through the
//! [`ResolutionContext`], and written straight to the output
//! [`ChunkWriter`]. Only counters survive across records, so memory is
//! bounded by the number of distinct works and authors, not by the number of
//! passages.
//!
//! Files are processed strictly one after another, in the order given, and
//! records within a file in file order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::ResolutionContext;
use crate::decode::decode_passage;
use crate::models::{PassageRecord, SchemaKind, UnifiedChunk};
use crate::progress::{CombineProgressEvent, CombineProgressReporter};
use crate::stream::spawn_array_reader;
use crate::writer::ChunkWriter;

/// Passage type used when a record carries none.
pub const DEFAULT_CHUNK_TYPE: &str = "passage";

/// One passage file to combine.
#[derive(Debug, Clone)]
pub struct PassageFile {
    pub path: PathBuf,
    pub source: String,
    pub schema: SchemaKind,
    pub scripture: bool,
}

/// Per-source counters across all phases of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTotals {
    pub authors_ingested: u64,
    pub works_assembled: u64,
    pub works_skipped: u64,
    pub files: u64,
    pub files_failed: u64,
    /// Passage records delivered by the parser.
    pub read: u64,
    pub emitted: u64,
    pub too_short: u64,
    pub unresolved: u64,
    pub malformed: u64,
}

impl SourceTotals {
    pub fn dropped(&self) -> u64 {
        self.too_short + self.unresolved + self.malformed
    }
}

/// Everything the streaming pass leaves behind for reconciliation.
#[derive(Debug, Default, Clone)]
pub struct CombineTotals {
    pub per_work: HashMap<String, u64>,
    pub per_author: HashMap<String, u64>,
    pub per_type: BTreeMap<String, u64>,
    pub per_source: BTreeMap<String, SourceTotals>,
}

impl CombineTotals {
    pub fn source_mut(&mut self, source: &str) -> &mut SourceTotals {
        self.per_source.entry(source.to_string()).or_default()
    }

    pub fn read(&self) -> u64 {
        self.per_source.values().map(|s| s.read).sum()
    }

    pub fn emitted(&self) -> u64 {
        self.per_source.values().map(|s| s.emitted).sum()
    }

    pub fn dropped(&self) -> u64 {
        self.per_source.values().map(SourceTotals::dropped).sum()
    }
}

/// Tuning for the streaming pass.
#[derive(Debug, Clone, Copy)]
pub struct CombineOptions {
    pub min_text_chars: usize,
    pub channel_capacity: usize,
    pub progress_every: u64,
}

pub struct Combiner<'a> {
    options: CombineOptions,
    reporter: &'a dyn CombineProgressReporter,
}

enum Outcome {
    Emitted,
    TooShort,
    Unresolved,
}

impl<'a> Combiner<'a> {
    pub fn new(options: CombineOptions, reporter: &'a dyn CombineProgressReporter) -> Self {
        Self { options, reporter }
    }

    /// Stream every file into `writer`, accumulating counters into `totals`.
    ///
    /// Per-record and per-file problems are logged and counted. Only a write
    /// failure on `writer` is returned as an error, and it aborts the run.
    pub async fn combine<W: AsyncWrite + Unpin>(
        &self,
        files: &[PassageFile],
        ctx: &mut ResolutionContext,
        writer: &mut ChunkWriter<W>,
        totals: &mut CombineTotals,
    ) -> std::io::Result<()> {
        for file in files {
            self.combine_file(file, ctx, writer, totals).await?;
        }
        Ok(())
    }

    async fn combine_file<W: AsyncWrite + Unpin>(
        &self,
        file: &PassageFile,
        ctx: &mut ResolutionContext,
        writer: &mut ChunkWriter<W>,
        totals: &mut CombineTotals,
    ) -> std::io::Result<()> {
        let file_label = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.path.display().to_string());

        if tokio::fs::metadata(&file.path).await.is_err() {
            warn!(source = %file.source, path = %file.path.display(), "passage file missing, skipped");
            totals.source_mut(&file.source).files_failed += 1;
            return Ok(());
        }

        info!(source = %file.source, file = %file_label, schema = %file.schema, "streaming passages");
        totals.source_mut(&file.source).files += 1;

        let mut rx = spawn_array_reader(file.path.clone(), self.options.channel_capacity);
        let mut read = 0u64;
        let mut emitted = 0u64;

        while let Some(item) = rx.recv().await {
            let value = match item {
                Ok(value) => value,
                Err(e) => {
                    warn!(source = %file.source, error = %e, "abandoning remainder of passage file");
                    totals.source_mut(&file.source).files_failed += 1;
                    break;
                }
            };
            read += 1;
            totals.source_mut(&file.source).read += 1;

            let record = match decode_passage(&value, file.schema, file.scripture) {
                Ok(record) => record,
                Err(e) => {
                    debug!(source = %file.source, index = read - 1, error = %e, "malformed passage record");
                    totals.source_mut(&file.source).malformed += 1;
                    continue;
                }
            };
            drop(value);

            match self.process(file, record, ctx, writer, totals).await? {
                Outcome::Emitted => emitted += 1,
                Outcome::TooShort => totals.source_mut(&file.source).too_short += 1,
                Outcome::Unresolved => totals.source_mut(&file.source).unresolved += 1,
            }

            if read % self.options.progress_every.max(1) == 0 {
                self.reporter.report(CombineProgressEvent::Streaming {
                    source: file.source.clone(),
                    file: file_label.clone(),
                    read,
                    emitted,
                });
            }
        }

        self.reporter.report(CombineProgressEvent::Streaming {
            source: file.source.clone(),
            file: file_label.clone(),
            read,
            emitted,
        });
        info!(source = %file.source, file = %file_label, read, emitted, "passage file done");
        Ok(())
    }

    async fn process<W: AsyncWrite + Unpin>(
        &self,
        file: &PassageFile,
        record: PassageRecord,
        ctx: &mut ResolutionContext,
        writer: &mut ChunkWriter<W>,
        totals: &mut CombineTotals,
    ) -> std::io::Result<Outcome> {
        let text = record.text.trim();
        if text.chars().count() < self.options.min_text_chars {
            return Ok(Outcome::TooShort);
        }

        let attribution = ctx.attribute(&file.source, &record.attribution);
        let Some(author_id) = attribution.author_id else {
            return Ok(Outcome::Unresolved);
        };

        let chunk_type = record
            .chunk_type
            .unwrap_or_else(|| DEFAULT_CHUNK_TYPE.to_string());
        let meta = record.meta;

        let chunk = UnifiedChunk {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            author_id,
            work_id: attribution.work_id,
            chunk_type,
            position_index: record.position_index,
            chapter: meta.chapter,
            section: meta.section,
            book: meta.book,
            verse: meta.verse,
            paragraph: meta.paragraph,
            translation: meta.translation,
            source: file.source.clone(),
            source_chunk_id: record.id,
            char_count: text.chars().count() as u64,
            word_count: text.split_whitespace().count() as u64,
        };

        writer.write(&chunk).await?;

        if let Some(work_id) = &chunk.work_id {
            *totals.per_work.entry(work_id.clone()).or_default() += 1;
        }
        *totals.per_author.entry(chunk.author_id).or_default() += 1;
        *totals.per_type.entry(chunk.chunk_type).or_default() += 1;
        totals.source_mut(&file.source).emitted += 1;

        Ok(Outcome::Emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawAuthor, RawWork, StructuralRef, WorkAttribution};
    use crate::progress::NoProgress;
    use crate::works::WorkSource;
    use std::fs;
    use tempfile::TempDir;

    const OPTIONS: CombineOptions = CombineOptions {
        min_text_chars: 10,
        channel_capacity: 2,
        progress_every: 1,
    };

    fn twain_context() -> ResolutionContext {
        let mut ctx = ResolutionContext::new();
        ctx.authors.ingest_author_file(
            &[RawAuthor {
                id: Some("a1".into()),
                name: Some("Twain, Mark".into()),
                ..Default::default()
            }],
            "gutenberg",
        );
        ctx.works.ingest_work_file(
            &[RawWork {
                id: Some("w1".into()),
                title: Some("Tom Sawyer".into()),
                source_id: Some("74".into()),
                attribution: WorkAttribution::AuthorId(Some("a1".into())),
                publication_year: Some(1876),
                original_language: None,
                translator: None,
                form: None,
                genre: None,
                tradition: None,
            }],
            WorkSource {
                name: "gutenberg",
                phase: None,
                url_template: None,
            },
            &mut ctx.authors,
        );
        ctx
    }

    fn passage_file(dir: &TempDir, name: &str, body: &str, source: &str, schema: SchemaKind) -> PassageFile {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        PassageFile {
            path,
            source: source.to_string(),
            schema,
            scripture: false,
        }
    }

    async fn run(files: &[PassageFile], ctx: &mut ResolutionContext) -> (Vec<UnifiedChunk>, CombineTotals) {
        let mut writer = ChunkWriter::begin(Vec::new()).await.unwrap();
        let mut totals = CombineTotals::default();
        Combiner::new(OPTIONS, &NoProgress)
            .combine(files, ctx, &mut writer, &mut totals)
            .await
            .unwrap();
        let out = writer.finish().await.unwrap();
        (serde_json::from_slice(&out).unwrap(), totals)
    }

    #[tokio::test]
    async fn test_standard_passages() {
        let tmp = TempDir::new().unwrap();
        let file = passage_file(
            &tmp,
            "chunks.json",
            r#"[
                {"id": "c1", "text": "It was a pleasant morning in St. Petersburg.", "work_id": "w1", "author_id": "a1", "sequence": 3,
                 "source_metadata": {"chapter": 2}},
                {"id": "c2", "content": "Tom appeared on the sidewalk with a bucket.", "work_id": "w1", "chunk_type": "paragraph"},
                {"id": "c3", "text": "Too short", "work_id": "w1"},
                {"id": "c4", "text": "A passage whose work is unknown to us.", "work_id": "w404"}
            ]"#,
            "gutenberg",
            SchemaKind::Standard,
        );
        let mut ctx = twain_context();
        let (chunks, totals) = run(&[file], &mut ctx).await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source_chunk_id.as_deref(), Some("c1"));
        assert_eq!(chunks[0].author_id, "author-mark-twain");
        assert_eq!(chunks[0].work_id.as_deref(), Some("work-tom-sawyer-gutenberg-74"));
        assert_eq!(chunks[0].position_index, 3);
        assert_eq!(chunks[0].chapter, Some(StructuralRef::Number(2)));
        assert_eq!(chunks[0].chunk_type, "passage");
        assert_eq!(chunks[0].word_count, 8);
        assert_eq!(chunks[1].chunk_type, "paragraph");
        assert_ne!(chunks[0].id, chunks[1].id);

        let src = &totals.per_source["gutenberg"];
        assert_eq!(src.read, 4);
        assert_eq!(src.emitted, 2);
        assert_eq!(src.too_short, 1);
        assert_eq!(src.unresolved, 1);
        assert_eq!(totals.per_work["work-tom-sawyer-gutenberg-74"], 2);
        assert_eq!(totals.per_author["author-mark-twain"], 2);
        assert_eq!(totals.per_type["passage"], 1);
    }

    #[tokio::test]
    async fn test_inline_passages_create_authors() {
        let tmp = TempDir::new().unwrap();
        let file = passage_file(
            &tmp,
            "quotes.json",
            r#"[
                {"text": "Know thyself.", "authors": ["Socrates"], "source_id": "s9"},
                {"text": "A quotation nobody can attribute.", "authors": []},
                {"text": "The only true wisdom is in knowing you know nothing.", "authors": "Socrates"}
            ]"#,
            "quotes",
            SchemaKind::Inline,
        );
        let mut ctx = twain_context();
        let (chunks, totals) = run(&[file], &mut ctx).await;

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.author_id == "author-socrates"));
        assert!(chunks.iter().all(|c| c.work_id.is_none()));
        assert_eq!(ctx.authors.get("author-socrates").unwrap().sources, vec!["quotes"]);
        assert_eq!(totals.per_source["quotes"].unresolved, 1);
        assert_eq!(totals.per_author["author-socrates"], 2);
    }

    #[tokio::test]
    async fn test_malformed_records_and_files_do_not_abort() {
        let tmp = TempDir::new().unwrap();
        let broken = passage_file(
            &tmp,
            "a_broken.json",
            r#"[{"text": "A perfectly fine first passage.", "authors": ["Plato"]}, {"text": ]"#,
            "quotes",
            SchemaKind::Inline,
        );
        let not_array = passage_file(&tmp, "b_object.json", r#"{"text": "x"}"#, "quotes", SchemaKind::Inline);
        let mixed = passage_file(
            &tmp,
            "c_mixed.json",
            r#"[42, {"text": 7}, {"text": "Another perfectly fine passage.", "authors": ["Plato"]}]"#,
            "quotes",
            SchemaKind::Inline,
        );
        let missing = PassageFile {
            path: tmp.path().join("d_missing.json"),
            source: "quotes".into(),
            schema: SchemaKind::Inline,
            scripture: false,
        };

        let mut ctx = ResolutionContext::new();
        let (chunks, totals) = run(&[broken, not_array, missing, mixed], &mut ctx).await;

        assert_eq!(chunks.len(), 2);
        let src = &totals.per_source["quotes"];
        assert_eq!(src.files, 3);
        assert_eq!(src.files_failed, 3);
        assert_eq!(src.malformed, 2);
        assert_eq!(src.read, 4);
        assert_eq!(src.read, src.emitted + src.dropped());
    }

    #[tokio::test]
    async fn test_scripture_fields() {
        let tmp = TempDir::new().unwrap();
        let mut file = passage_file(
            &tmp,
            "kjv.json",
            r#"[{"text": "Jesus wept, and the people marvelled.", "authors": ["Various"],
                 "book": "John", "chapter": 11, "verse": 35, "translation": "KJV"}]"#,
            "bible",
            SchemaKind::Inline,
        );
        file.scripture = true;

        let mut ctx = ResolutionContext::new();
        let (chunks, _) = run(&[file], &mut ctx).await;
        assert_eq!(chunks[0].book, Some(StructuralRef::Text("John".into())));
        assert_eq!(chunks[0].verse, Some(StructuralRef::Number(35)));
        assert_eq!(chunks[0].translation.as_deref(), Some("KJV"));
    }

    #[tokio::test]
    async fn test_order_follows_files_then_records() {
        let tmp = TempDir::new().unwrap();
        let first = passage_file(
            &tmp,
            "1.json",
            r#"[{"id": "a", "text": "First file, first record.", "authors": ["X"]},
                {"id": "b", "text": "First file, second record.", "authors": ["Y"]}]"#,
            "quotes",
            SchemaKind::Inline,
        );
        let second = passage_file(
            &tmp,
            "2.json",
            r#"[{"id": "c", "text": "Second file, only record.", "authors": ["X"]}]"#,
            "quotes",
            SchemaKind::Inline,
        );
        let mut ctx = ResolutionContext::new();
        let (chunks, _) = run(&[first, second], &mut ctx).await;
        let ids: Vec<_> = chunks.iter().filter_map(|c| c.source_chunk_id.as_deref()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_zero_progress_interval_reports_every_record() {
        use std::sync::Mutex;

        struct Recorder(Mutex<Vec<u64>>);
        impl CombineProgressReporter for Recorder {
            fn report(&self, event: CombineProgressEvent) {
                if let CombineProgressEvent::Streaming { read, .. } = event {
                    self.0.lock().unwrap().push(read);
                }
            }
        }

        let tmp = TempDir::new().unwrap();
        let file = passage_file(
            &tmp,
            "quotes.json",
            r#"[{"text": "Know thyself.", "authors": ["Socrates"]},
                {"text": "The only true wisdom is knowing you know nothing.", "authors": ["Socrates"]}]"#,
            "quotes",
            SchemaKind::Inline,
        );
        let options = CombineOptions {
            progress_every: 0,
            ..OPTIONS
        };
        let recorder = Recorder(Mutex::new(Vec::new()));
        let mut ctx = ResolutionContext::new();
        let mut writer = ChunkWriter::begin(Vec::new()).await.unwrap();
        let mut totals = CombineTotals::default();
        Combiner::new(options, &recorder)
            .combine(&[file], &mut ctx, &mut writer, &mut totals)
            .await
            .unwrap();

        assert_eq!(totals.emitted(), 2);
        assert_eq!(*recorder.0.lock().unwrap(), vec![1, 2, 2]);
    }
}
