//! Incremental writer for the combined `chunks.json` array.
//!
//! Each [`UnifiedChunk`] is serialized and written as soon as it is produced;
//! nothing is buffered beyond the underlying `BufWriter`. Every write is
//! awaited, so a slow sink holds back the producer.
//!
//! Output layout, one record per line:
//!
//! ```text
//! [
//! {"id":"…","text":"…",…},
//! {"id":"…","text":"…",…}
//! ]
//! ```

use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::models::UnifiedChunk;

pub struct ChunkWriter<W> {
    inner: W,
    written: u64,
}

impl ChunkWriter<BufWriter<File>> {
    /// Create (or truncate) `path` and open the array.
    pub async fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path).await?;
        Self::begin(BufWriter::new(file)).await
    }
}

impl<W: AsyncWrite + Unpin> ChunkWriter<W> {
    /// Open the array on an arbitrary sink.
    pub async fn begin(mut inner: W) -> io::Result<Self> {
        inner.write_all(b"[\n").await?;
        Ok(Self { inner, written: 0 })
    }

    /// Append one chunk to the array.
    pub async fn write(&mut self, chunk: &UnifiedChunk) -> io::Result<()> {
        let line = serde_json::to_vec(chunk)?;
        if self.written > 0 {
            self.inner.write_all(b",\n").await?;
        }
        self.inner.write_all(&line).await?;
        self.written += 1;
        Ok(())
    }

    /// Number of chunks written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Close the array, flush, and hand back the sink.
    pub async fn finish(mut self) -> io::Result<W> {
        if self.written > 0 {
            self.inner.write_all(b"\n").await?;
        }
        self.inner.write_all(b"]\n").await?;
        self.inner.flush().await?;
        Ok(self.inner)
    }
}
