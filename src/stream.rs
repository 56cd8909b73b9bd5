//! Element-at-a-time reading of large top-level JSON arrays.
//!
//! Passage files run to gigabytes, so they are never parsed into a `Vec`.
//! [`spawn_array_reader`] parses a file on a blocking thread and forwards each
//! array element through a bounded channel. When the consumer falls behind,
//! the parser parks on the full channel, so at most `capacity` elements are
//! held in memory at once.
//!
//! ```text
//! ┌──────────────────┐  bounded mpsc  ┌──────────────┐
//! │ parser (blocking)│ ─────────────▶ │ consumer     │
//! │ visit_seq → Value│   capacity N   │ (async task) │
//! └──────────────────┘                └──────────────┘
//! ```
//!
//! A syntax error ends the stream with a [`StreamError`]; elements before it
//! have already been delivered.

use serde::de::{self, Deserializer as _, SeqAccess, Visitor};
use serde_json::Value;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

/// Why a file's element stream ended early.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: invalid JSON after {elements} elements: {source}")]
    Parse {
        path: PathBuf,
        elements: u64,
        #[source]
        source: serde_json::Error,
    },
}

pub type ArrayItem = Result<Value, StreamError>;

/// Start streaming the elements of the JSON array stored at `path`.
///
/// The receiver yields every element in file order, then at most one `Err`
/// if the file could not be opened or parsed to the end. Dropping the
/// receiver stops the parser at its next element.
pub fn spawn_array_reader(path: PathBuf, capacity: usize) -> mpsc::Receiver<ArrayItem> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::task::spawn_blocking(move || {
        if let Err(e) = read_array(&path, &tx) {
            let _ = tx.blocking_send(Err(e));
        }
    });
    rx
}

fn read_array(path: &Path, tx: &mpsc::Sender<ArrayItem>) -> Result<u64, StreamError> {
    let file = File::open(path).map_err(|source| StreamError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut elements = 0u64;
    let parse_err = |elements, source| StreamError::Parse {
        path: path.to_path_buf(),
        elements,
        source,
    };

    let mut de = serde_json::Deserializer::from_reader(BufReader::new(file));
    let forwarder = ElementForwarder {
        tx,
        sent: &mut elements,
    };
    let result = (&mut de).deserialize_seq(forwarder);
    match result {
        Ok(()) => {}
        Err(_) if tx.is_closed() => return Ok(elements),
        Err(e) => return Err(parse_err(elements, e)),
    }
    de.end().map_err(|e| parse_err(elements, e))?;
    Ok(elements)
}

struct ElementForwarder<'a> {
    tx: &'a mpsc::Sender<ArrayItem>,
    sent: &'a mut u64,
}

impl<'de> Visitor<'de> for ElementForwarder<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON array of records")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(value) = seq.next_element::<Value>()? {
            if self.tx.blocking_send(Ok(value)).is_err() {
                return Err(de::Error::custom("receiver dropped"));
            }
            *self.sent += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    async fn collect(path: PathBuf, capacity: usize) -> (Vec<Value>, Option<StreamError>) {
        let mut rx = spawn_array_reader(path, capacity);
        let mut values = Vec::new();
        let mut error = None;
        while let Some(item) = rx.recv().await {
            match item {
                Ok(v) => values.push(v),
                Err(e) => error = Some(e),
            }
        }
        (values, error)
    }

    #[tokio::test]
    async fn test_reads_all_elements_in_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.json");
        fs::write(&path, r#"[{"n": 1}, {"n": 2}, "three", 4]"#).unwrap();

        let (values, error) = collect(path, 2).await;
        assert!(error.is_none());
        assert_eq!(values.len(), 4);
        assert_eq!(values[0]["n"], 1);
        assert_eq!(values[2], "three");
    }

    #[tokio::test]
    async fn test_empty_array() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.json");
        fs::write(&path, " [ ] \n").unwrap();
        let (values, error) = collect(path, 4).await;
        assert!(values.is_empty());
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_syntax_error_keeps_earlier_elements() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.json");
        fs::write(&path, r#"[{"n": 1}, {"n": }, {"n": 3}]"#).unwrap();

        let (values, error) = collect(path, 4).await;
        assert_eq!(values.len(), 1);
        match error {
            Some(StreamError::Parse { elements, .. }) => assert_eq!(elements, 1),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_not_an_array() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.json");
        fs::write(&path, r#"{"records": []}"#).unwrap();
        let (values, error) = collect(path, 4).await;
        assert!(values.is_empty());
        assert!(matches!(error, Some(StreamError::Parse { elements: 0, .. })));
    }

    #[tokio::test]
    async fn test_trailing_garbage_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.json");
        fs::write(&path, r#"[1, 2] [3]"#).unwrap();
        let (values, error) = collect(path, 4).await;
        assert_eq!(values.len(), 2);
        assert!(matches!(error, Some(StreamError::Parse { elements: 2, .. })));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let tmp = TempDir::new().unwrap();
        let (values, error) = collect(tmp.path().join("nope.json"), 4).await;
        assert!(values.is_empty());
        assert!(matches!(error, Some(StreamError::Open { .. })));
    }

    #[tokio::test]
    async fn test_capacity_one_streams_many() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.json");
        let body: Vec<String> = (0..5000).map(|i| format!("{{\"n\": {}}}", i)).collect();
        fs::write(&path, format!("[{}]", body.join(","))).unwrap();

        let mut rx = spawn_array_reader(path, 1);
        let mut expected = 0;
        while let Some(item) = rx.recv().await {
            assert_eq!(item.unwrap()["n"], expected);
            expected += 1;
        }
        assert_eq!(expected, 5000);
    }

    #[tokio::test]
    async fn test_dropping_receiver_stops_reader() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.json");
        let body: Vec<String> = (0..1000).map(|i| i.to_string()).collect();
        fs::write(&path, format!("[{}]", body.join(","))).unwrap();

        let mut rx = spawn_array_reader(path, 1);
        assert!(rx.recv().await.unwrap().is_ok());
        drop(rx);
    }
}
