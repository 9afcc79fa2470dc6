//! Batched JSONL output sinks.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::errors::ReconcileError;

/// JSONL writer that flushes every `batch_size` records and on demand.
///
/// The file is truncated on creation; a run always starts from empty
/// outputs.
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
    batch_size: usize,
    buffered: usize,
    written: usize,
}

impl JsonlSink {
    /// Create (or truncate) the output file.
    pub fn create(path: impl AsRef<Path>, batch_size: usize) -> Result<Self, ReconcileError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            batch_size,
            buffered: 0,
            written: 0,
        })
    }

    /// Append one record as a JSON line.
    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<(), ReconcileError> {
        let line = serde_json::to_string(record)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.buffered += 1;
        self.written += 1;
        if self.buffered >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Flush buffered records to disk.
    pub fn flush(&mut self) -> Result<(), ReconcileError> {
        if self.buffered > 0 {
            debug!(path = %self.path.display(), records = self.buffered, "flushing output batch");
        }
        self.writer.flush()?;
        self.buffered = 0;
        Ok(())
    }

    /// Records written so far.
    pub fn written(&self) -> usize {
        self.written
    }
}
