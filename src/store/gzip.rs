//! Gzip JSONL record store.
//!
//! The compressed stream has no random access, so locators are byte offsets
//! into the decompressed stream. Scans resume by re-reading and discarding
//! the prefix, which mirrors how seekable text handles behave over gzip and
//! keeps memory flat at the cost of re-decompression.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tracing::{debug, warn};

use crate::config::DuplicateKeyPolicy;
use crate::constants::engine::{SKIP_MALFORMED_MSG, STORE_PROGRESS_EVERY};
use crate::data::StoreRecord;
use crate::errors::ReconcileError;
use crate::index::{IndexEntry, QuestionIndex, RecordLocator};
use crate::store::{IndexWindow, RecordStore, StoreCursor, WindowStats};

/// Record store backed by a gzip-compressed JSONL file.
#[derive(Debug)]
pub struct GzipJsonlStore {
    path: PathBuf,
}

impl GzipJsonlStore {
    /// Open a store file. Fails fast when the path is not a readable file
    /// so configuration errors surface before any processing starts.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReconcileError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(ReconcileError::StoreUnavailable {
                path,
                reason: "not a readable file".to_string(),
            });
        }
        Ok(Self { path })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reader(&self) -> Result<BufReader<MultiGzDecoder<File>>, ReconcileError> {
        let file = File::open(&self.path).map_err(|err| ReconcileError::StoreUnavailable {
            path: self.path.clone(),
            reason: err.to_string(),
        })?;
        Ok(BufReader::new(MultiGzDecoder::new(file)))
    }

    /// Discard `count` decompressed bytes. Returns how many were actually
    /// available.
    fn skip_bytes(
        reader: &mut BufReader<MultiGzDecoder<File>>,
        count: u64,
    ) -> io::Result<u64> {
        io::copy(&mut reader.by_ref().take(count), &mut io::sink())
    }
}

impl RecordStore for GzipJsonlStore {
    fn id(&self) -> String {
        self.path.display().to_string()
    }

    fn scan_window(
        &self,
        cursor: Option<StoreCursor>,
        limit: Option<usize>,
        policy: DuplicateKeyPolicy,
    ) -> Result<IndexWindow, ReconcileError> {
        let mut reader = self.reader()?;
        let start = cursor.map(|c| c.position).unwrap_or(0);
        if start > 0 {
            let skipped = Self::skip_bytes(&mut reader, start)?;
            if skipped < start {
                return Err(ReconcileError::StoreInconsistent {
                    path: self.path.clone(),
                    details: format!("cursor at byte {start} is past the end of the stream"),
                });
            }
        }

        let mut index = QuestionIndex::new(policy);
        let mut stats = WindowStats::default();
        let mut position = start;
        let mut line = String::new();
        loop {
            if let Some(limit) = limit {
                if stats.scanned >= limit {
                    return Ok(IndexWindow {
                        index,
                        next: Some(StoreCursor { position }),
                        stats,
                    });
                }
            }
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                return Ok(IndexWindow {
                    index,
                    next: None,
                    stats,
                });
            }
            let offset = position;
            position += read as u64;
            stats.scanned += 1;
            if stats.scanned % STORE_PROGRESS_EVERY == 0 {
                debug!(store = %self.path.display(), scanned = stats.scanned, "store scan progress");
            }

            let record: StoreRecord = match serde_json::from_str(line.trim_end()) {
                Ok(record) => record,
                Err(err) => {
                    stats.skipped += 1;
                    warn!(store = %self.path.display(), offset, error = %err, SKIP_MALFORMED_MSG);
                    continue;
                }
            };
            let entry = IndexEntry {
                locator: RecordLocator::Offset(offset),
                question: record.question_text,
                document_url: record.document_url,
                example_id: record.example_id,
            };
            if index.insert(entry) {
                stats.indexed += 1;
            } else {
                stats.skipped += 1;
                debug!(store = %self.path.display(), offset, "record has an empty question key");
            }
        }
    }

    fn fetch(&self, locator: &RecordLocator) -> Result<Option<StoreRecord>, ReconcileError> {
        let RecordLocator::Offset(offset) = locator else {
            return Err(ReconcileError::StoreInconsistent {
                path: self.path.clone(),
                details: "keyed locator passed to an offset store".to_string(),
            });
        };
        let mut reader = self.reader()?;
        if *offset > 0 {
            match Self::skip_bytes(&mut reader, *offset) {
                Ok(skipped) if skipped == *offset => {}
                Ok(_) => {
                    warn!(store = %self.path.display(), offset, "record offset is past the end of the stream");
                    return Ok(None);
                }
                Err(err) => {
                    warn!(store = %self.path.display(), offset, error = %err, "failed to reach record offset");
                    return Ok(None);
                }
            }
        }
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => match serde_json::from_str(line.trim_end()) {
                Ok(record) => Ok(Some(record)),
                Err(err) => {
                    warn!(store = %self.path.display(), offset, error = %err, "record at offset is not parseable");
                    Ok(None)
                }
            },
            Err(err) => {
                warn!(store = %self.path.display(), offset, error = %err, "failed to read record at offset");
                Ok(None)
            }
        }
    }
}
