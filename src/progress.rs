//! Combine progress reporting.
//!
//! Reports observable progress during `unify combine` so operators can see
//! which phase is running and how far the passage stream has got.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum CombineProgressEvent {
    /// A pipeline phase started (`authors`, `works`, `passages`, `reconcile`).
    Phase { phase: &'static str },
    /// Passage streaming: records read and emitted so far for one file.
    Streaming {
        source: String,
        file: String,
        read: u64,
        emitted: u64,
    },
}

/// Reports combine progress. Implementations write to stderr (human or JSON).
pub trait CombineProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the pipeline.
    fn report(&self, event: CombineProgressEvent);
}

/// Human-friendly progress on stderr: "combine gutenberg chunks.json  1,234 read  1,200 emitted".
pub struct StderrProgress;

impl CombineProgressReporter for StderrProgress {
    fn report(&self, event: CombineProgressEvent) {
        let line = match &event {
            CombineProgressEvent::Phase { phase } => format!("combine  {}...\n", phase),
            CombineProgressEvent::Streaming {
                source,
                file,
                read,
                emitted,
            } => format!(
                "combine {} {}  {} read  {} emitted\n",
                source,
                file,
                format_number(*read),
                format_number(*emitted)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl CombineProgressReporter for JsonProgress {
    fn report(&self, event: CombineProgressEvent) {
        let obj = match &event {
            CombineProgressEvent::Phase { phase } => serde_json::json!({
                "event": "progress",
                "phase": phase
            }),
            CombineProgressEvent::Streaming {
                source,
                file,
                read,
                emitted,
            } => serde_json::json!({
                "event": "progress",
                "phase": "passages",
                "source": source,
                "file": file,
                "read": read,
                "emitted": emitted
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl CombineProgressReporter for NoProgress {
    fn report(&self, _event: CombineProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn CombineProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
