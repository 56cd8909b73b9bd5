use corpus_unify::config::parse_config;
use corpus_unify::pipeline::combine_corpus;
use corpus_unify::progress::NoProgress;
use corpus_unify::verify::verify_output;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_json(path: &Path, value: &Value) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, value.to_string()).unwrap();
}

fn config_for(root: &Path, extra: &str) -> corpus_unify::config::Config {
    parse_config(&format!(
        r#"
[output]
dir = "{root}/out"

[combine]
channel_capacity = 1
progress_every = 7

[[sources]]
name = "wikiquote"
dir = "{root}/wikiquote"
schema = "inline"
chunks = ["chunks_*.json"]

[[sources]]
name = "bible"
dir = "{root}/bible"
schema = "inline"
scripture = true
{extra}
"#,
        root = root.display(),
        extra = extra
    ))
    .unwrap()
}

#[tokio::test]
async fn test_many_passages_through_small_channel() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    for part in 0..3 {
        let records: Vec<Value> = (0..500)
            .map(|i| {
                let name = if i % 2 == 0 {
                    "Wilde, Oscar"
                } else {
                    "Wilde, Oscar (playwright)"
                };
                json!({
                    "text": format!("Quotation number {} from part {}.", i, part),
                    "authors": [name],
                    "chunk_index": i,
                })
            })
            .collect();
        write_json(
            &root.join(format!("wikiquote/chunks_{:03}.json", part)),
            &Value::Array(records),
        );
    }

    let config = config_for(root, "");
    let run = combine_corpus(&config, &config.output.dir, &NoProgress)
        .await
        .unwrap();

    assert_eq!(run.stats.totals.authors, 1);
    assert_eq!(run.stats.totals.chunks_read, 1500);
    assert_eq!(run.stats.totals.chunks_emitted, 1500);
    assert_eq!(run.stats.totals.files, 3);
    assert_eq!(run.stats.top_authors[0].id, "author-oscar-wilde");
    assert_eq!(run.stats.top_authors[0].chunk_count, 1500);

    let chunks: Vec<Value> =
        serde_json::from_slice(&fs::read(config.output.dir.join("chunks.json")).unwrap()).unwrap();
    let positions: Vec<_> = chunks[..3]
        .iter()
        .map(|c| c["position_index"].as_i64().unwrap())
        .collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert!(chunks[500]["text"].as_str().unwrap().ends_with("part 1."));

    let report = verify_output(&config.output.dir).await.unwrap();
    assert!(report.complete);
    assert!(report.is_clean(), "{:?}", report);
}

#[tokio::test]
async fn test_scripture_and_inline_works() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    write_json(
        &root.join("bible/works.json"),
        &json!([{"title": "Genesis", "authors": ["Moses"], "source_id": "gen", "tradition": "Hebrew Bible"}]),
    );
    write_json(
        &root.join("bible/chunks.json"),
        &json!([
            {"content": "In the beginning God created the heaven and the earth.",
             "authors": ["Moses"], "source_id": "gen", "book": "Genesis", "chapter": 1, "verse": 1,
             "translation": "KJV"},
            {"content": "And the earth was without form, and void.",
             "authors": [], "source_id": "gen"}
        ]),
    );

    let config = config_for(root, "url_template = \"https://example.org/bible/{source_id}\"");
    let run = combine_corpus(&config, &config.output.dir, &NoProgress)
        .await
        .unwrap();

    assert_eq!(run.stats.totals.works, 1);
    assert_eq!(run.stats.totals.chunks_emitted, 1);
    assert_eq!(run.stats.totals.unresolved, 1);
    assert_eq!(run.stats.by_source["bible"].works_assembled, 1);

    let works: Vec<Value> =
        serde_json::from_slice(&fs::read(config.output.dir.join("works.json")).unwrap()).unwrap();
    assert_eq!(works[0]["full_text_url"], "https://example.org/bible/gen");
    assert_eq!(works[0]["tradition"], "Hebrew Bible");
    assert_eq!(works[0]["chunk_count"], 1);

    let chunks: Vec<Value> =
        serde_json::from_slice(&fs::read(config.output.dir.join("chunks.json")).unwrap()).unwrap();
    assert_eq!(chunks[0]["work_id"], works[0]["id"]);
    assert_eq!(chunks[0]["book"], "Genesis");
    assert_eq!(chunks[0]["chapter"], 1);
    assert_eq!(chunks[0]["verse"], 1);
    assert_eq!(chunks[0]["translation"], "KJV");
}

#[tokio::test]
async fn test_stale_marker_removed_on_failure() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let config = config_for(root, "");

    fs::create_dir_all(&config.output.dir).unwrap();
    fs::write(config.output.dir.join("COMPLETE.json"), "{}").unwrap();
    // A directory where chunks.json should go makes the passage phase fail.
    fs::create_dir_all(config.output.dir.join("chunks.json")).unwrap();

    assert!(combine_corpus(&config, &config.output.dir, &NoProgress)
        .await
        .is_err());
    assert!(!config.output.dir.join("COMPLETE.json").exists());
}

fn gutenberg_config(root: &Path) -> corpus_unify::config::Config {
    parse_config(&format!(
        r#"
[output]
dir = "{root}/out"

[[sources]]
name = "gutenberg"
dir = "{root}/gutenberg"
schema = "standard"
"#,
        root = root.display()
    ))
    .unwrap()
}

#[tokio::test]
async fn test_odd_descriptive_fields_keep_records() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    write_json(
        &root.join("gutenberg/authors.json"),
        &json!([{"id": "a1", "name": "Twain, Mark", "nationality": ["American"]}]),
    );
    write_json(
        &root.join("gutenberg/works.json"),
        &json!([{"id": "w1", "author_id": "a1", "title": "Huckleberry Finn", "source_id": "76",
                 "genre": ["novel", "satire"]}]),
    );
    write_json(
        &root.join("gutenberg/chunks.json"),
        &json!([{"id": "c1", "text": "You don't know about me, without.", "work_id": "w1"}]),
    );

    let config = gutenberg_config(root);
    let run = combine_corpus(&config, &config.output.dir, &NoProgress)
        .await
        .unwrap();

    assert_eq!(run.stats.totals.authors, 1);
    assert_eq!(run.stats.totals.works, 1);
    assert_eq!(run.stats.totals.chunks_emitted, 1);
    assert_eq!(run.stats.totals.unresolved, 0);

    let authors: Vec<Value> =
        serde_json::from_slice(&fs::read(config.output.dir.join("authors.json")).unwrap()).unwrap();
    assert_eq!(authors[0]["nationality"], "American");
    let works: Vec<Value> =
        serde_json::from_slice(&fs::read(config.output.dir.join("works.json")).unwrap()).unwrap();
    assert_eq!(works[0]["genre"], "novel, satire");
}

#[tokio::test]
async fn test_passages_of_duplicate_work_record_resolve() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    write_json(
        &root.join("gutenberg/authors.json"),
        &json!([{"id": "a1", "name": "Twain, Mark"}]),
    );
    write_json(
        &root.join("gutenberg/works.json"),
        &json!([
            {"id": "w1", "author_id": "a1", "title": "Tom Sawyer", "source_id": "74"},
            {"id": "w2", "author_id": "a1", "title": "Tom Sawyer", "source_id": "74"}
        ]),
    );
    write_json(
        &root.join("gutenberg/chunks.json"),
        &json!([
            {"text": "It was a pleasant morning in St. Petersburg.", "work_id": "w1"},
            {"text": "Tom appeared on the sidewalk with a bucket.", "work_id": "w2"}
        ]),
    );

    let config = gutenberg_config(root);
    let run = combine_corpus(&config, &config.output.dir, &NoProgress)
        .await
        .unwrap();

    assert_eq!(run.stats.totals.works, 1);
    assert_eq!(run.stats.totals.chunks_emitted, 2);
    assert_eq!(run.stats.totals.unresolved, 0);

    let chunks: Vec<Value> =
        serde_json::from_slice(&fs::read(config.output.dir.join("chunks.json")).unwrap()).unwrap();
    assert_eq!(chunks[1]["work_id"], "work-tom-sawyer-gutenberg-74");
    assert_eq!(chunks[1]["author_id"], "author-mark-twain");
}
