//! Record store backends.
//!
//! A [`RecordStore`] is scanned in windows: each window builds a
//! [`QuestionIndex`] over up to `limit` records and reports where the next
//! window should resume. Indexed entries carry a [`RecordLocator`] so the
//! full record can be re-read later without holding document bodies in
//! memory.

use crate::config::DuplicateKeyPolicy;
use crate::data::StoreRecord;
use crate::errors::ReconcileError;
use crate::index::{IndexEntry, QuestionIndex, RecordLocator};

mod gzip;
mod sqlite;

pub use gzip::GzipJsonlStore;
pub use sqlite::{SqliteLoadSummary, SqliteStore};

/// Resume point for the next scan window.
///
/// The meaning of `position` is backend-specific: decompressed byte offset
/// for line-oriented stores, row offset for keyed ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreCursor {
    /// Backend-specific scan position.
    pub position: u64,
}

/// Per-window scan counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowStats {
    /// Records consumed from the store, valid or not.
    pub scanned: usize,
    /// Records that produced an index entry.
    pub indexed: usize,
    /// Records dropped for malformed payloads or empty keys.
    pub skipped: usize,
}

/// One scan window: the index built over it plus the resume cursor.
pub struct IndexWindow {
    /// Index over the records in this window.
    pub index: QuestionIndex,
    /// Cursor for the next window, or `None` at end of store.
    pub next: Option<StoreCursor>,
    /// Scan counters for this window.
    pub stats: WindowStats,
}

/// A scannable, re-readable store of annotated records.
pub trait RecordStore {
    /// Identifier used in logs and the run report.
    fn id(&self) -> String;

    /// Scan up to `limit` records starting at `cursor` and index them.
    ///
    /// `cursor` of `None` starts from the beginning; `limit` of `None`
    /// scans to the end of the store in one window.
    fn scan_window(
        &self,
        cursor: Option<StoreCursor>,
        limit: Option<usize>,
        policy: DuplicateKeyPolicy,
    ) -> Result<IndexWindow, ReconcileError>;

    /// Re-read one record. `Ok(None)` means the locator no longer resolves
    /// to a parseable record; callers treat that as a per-record miss.
    fn fetch(&self, locator: &RecordLocator) -> Result<Option<StoreRecord>, ReconcileError>;
}

/// In-memory store used by tests and small fixtures. Locators are record
/// positions in the backing vector.
pub struct InMemoryStore {
    id: String,
    records: Vec<StoreRecord>,
    unfetchable: std::collections::HashSet<u64>,
}

impl InMemoryStore {
    /// Create a store over the given records.
    pub fn new(id: impl Into<String>, records: Vec<StoreRecord>) -> Self {
        Self {
            id: id.into(),
            records,
            unfetchable: std::collections::HashSet::new(),
        }
    }

    /// Mark a record position as unfetchable so `fetch` reports a miss for
    /// it while scans still index it.
    pub fn with_unfetchable(mut self, position: u64) -> Self {
        self.unfetchable.insert(position);
        self
    }
}

impl RecordStore for InMemoryStore {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn scan_window(
        &self,
        cursor: Option<StoreCursor>,
        limit: Option<usize>,
        policy: DuplicateKeyPolicy,
    ) -> Result<IndexWindow, ReconcileError> {
        let start = cursor.map(|c| c.position as usize).unwrap_or(0);
        let end = match limit {
            Some(limit) => (start + limit).min(self.records.len()),
            None => self.records.len(),
        };
        let mut index = QuestionIndex::new(policy);
        let mut stats = WindowStats::default();
        for (position, record) in self.records[start.min(self.records.len())..end]
            .iter()
            .enumerate()
        {
            stats.scanned += 1;
            let entry = IndexEntry {
                locator: RecordLocator::Offset((start + position) as u64),
                question: record.question_text.clone(),
                document_url: record.document_url.clone(),
                example_id: record.example_id.clone(),
            };
            if index.insert(entry) {
                stats.indexed += 1;
            } else {
                stats.skipped += 1;
            }
        }
        let next = (end < self.records.len()).then_some(StoreCursor {
            position: end as u64,
        });
        Ok(IndexWindow { index, next, stats })
    }

    fn fetch(&self, locator: &RecordLocator) -> Result<Option<StoreRecord>, ReconcileError> {
        let RecordLocator::Offset(position) = locator else {
            return Err(ReconcileError::StoreInconsistent {
                path: self.id.clone().into(),
                details: "keyed locator passed to a positional store".to_string(),
            });
        };
        if self.unfetchable.contains(position) {
            return Ok(None);
        }
        Ok(self.records.get(*position as usize).cloned())
    }
}
