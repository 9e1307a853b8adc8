/// Log Sinks Module
///
/// A sink receives the rendered diagnostic block of a failed query context.
/// `TracingSink` is used when nothing else is configured.

use crate::core::Result;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, warn};

/// Destination for rendered diagnostics.
pub trait LogSink: Send + Sync {
    /// Writes one block of free-form text, possibly spanning several lines
    fn write_text(&self, text: &str);
}

/// Forwards diagnostics to the `tracing` subscriber at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write_text(&self, text: &str) {
        error!(target: "querylog", "{}", text);
    }
}

/// Writes each block followed by a newline to any `Write` implementation.
pub struct WriterSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl WriterSink {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        WriterSink {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Opens `path` for appending, creating it if needed
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl LogSink for WriterSink {
    fn write_text(&self, text: &str) {
        let Ok(mut writer) = self.writer.lock() else {
            warn!("Log sink writer lock poisoned; dropping diagnostics");
            return;
        };
        if let Err(e) = writeln!(writer, "{}", text).and_then(|_| writer.flush()) {
            warn!("Failed to write diagnostics to log sink: {}", e);
        }
    }
}

/// Keeps every block in memory; handy for tests and for callers that
/// forward diagnostics somewhere themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of all blocks written so far, oldest first
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn write_text(&self, text: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(text.to_string());
        }
    }
}
