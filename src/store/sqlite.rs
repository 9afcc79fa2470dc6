//! SQLite record store.
//!
//! Rows are keyed by the aggressively normalized question, so loading
//! deduplicates at the key level and locators are the keys themselves.
//! The full record is stored as JSON in `data_json` so fetches can serve
//! complete payloads.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::config::DuplicateKeyPolicy;
use crate::constants::sqlite::{INSERT_BATCH, TABLE};
use crate::data::StoreRecord;
use crate::errors::ReconcileError;
use crate::index::{IndexEntry, QuestionIndex, RecordLocator};
use crate::normalize::aggressive_key;
use crate::store::{IndexWindow, RecordStore, StoreCursor, WindowStats};

/// Counters reported by [`SqliteStore::load_records`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SqliteLoadSummary {
    /// Records offered to the loader.
    pub scanned: usize,
    /// Rows written (replacements included).
    pub loaded: usize,
    /// Records dropped because their key normalizes to empty.
    pub skipped: usize,
}

/// Record store backed by a SQLite key-value table.
#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    conn: Connection,
}

impl SqliteStore {
    /// Create (or reuse) a database at `path` with the store schema.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ReconcileError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {TABLE} \
                 (question TEXT PRIMARY KEY, original_question TEXT, data_json TEXT)"
            ),
            [],
        )?;
        Ok(Self { path, conn })
    }

    /// Open an existing database. Fails fast when the file or the store
    /// table is missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReconcileError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(ReconcileError::StoreUnavailable {
                path,
                reason: "not a readable file".to_string(),
            });
        }
        let conn = Connection::open(&path)?;
        let present: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![TABLE],
                |row| row.get(0),
            )
            .optional()?;
        if present.is_none() {
            return Err(ReconcileError::StoreUnavailable {
                path,
                reason: format!("table '{TABLE}' is missing"),
            });
        }
        Ok(Self { path, conn })
    }

    /// Load records, keyed by their aggressively normalized question.
    ///
    /// Keyed storage cannot hold duplicates, so `CollectAll` degrades to
    /// `LastWriteWins` with a warning. Writes are batched into transactions.
    pub fn load_records<I>(
        &mut self,
        records: I,
        policy: DuplicateKeyPolicy,
    ) -> Result<SqliteLoadSummary, ReconcileError>
    where
        I: IntoIterator<Item = StoreRecord>,
    {
        let policy = match policy {
            DuplicateKeyPolicy::CollectAll => {
                warn!(
                    store = %self.path.display(),
                    "keyed storage cannot collect duplicates, using last-write-wins"
                );
                DuplicateKeyPolicy::LastWriteWins
            }
            other => other,
        };
        let sql = match policy {
            DuplicateKeyPolicy::FirstWriteWins => format!(
                "INSERT OR IGNORE INTO {TABLE} \
                 (question, original_question, data_json) VALUES (?1, ?2, ?3)"
            ),
            _ => format!(
                "INSERT OR REPLACE INTO {TABLE} \
                 (question, original_question, data_json) VALUES (?1, ?2, ?3)"
            ),
        };

        let mut summary = SqliteLoadSummary::default();
        let mut records = records.into_iter().peekable();
        while records.peek().is_some() {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare(&sql)?;
                for record in records.by_ref().take(INSERT_BATCH) {
                    summary.scanned += 1;
                    let key = aggressive_key(&record.question_text);
                    if key.is_empty() {
                        summary.skipped += 1;
                        continue;
                    }
                    let payload = serde_json::to_string(&record)?;
                    stmt.execute(params![key, record.question_text, payload])?;
                    summary.loaded += 1;
                }
            }
            tx.commit()?;
        }
        debug!(
            store = %self.path.display(),
            loaded = summary.loaded,
            skipped = summary.skipped,
            "record load finished"
        );
        Ok(summary)
    }
}

impl RecordStore for SqliteStore {
    fn id(&self) -> String {
        self.path.display().to_string()
    }

    fn scan_window(
        &self,
        cursor: Option<StoreCursor>,
        limit: Option<usize>,
        policy: DuplicateKeyPolicy,
    ) -> Result<IndexWindow, ReconcileError> {
        let start = cursor.map(|c| c.position).unwrap_or(0);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT question, original_question, data_json FROM {TABLE} \
             ORDER BY rowid LIMIT ?1 OFFSET ?2"
        ))?;
        // SQLite treats a negative LIMIT as unbounded.
        let row_limit: i64 = limit.map(|l| l as i64).unwrap_or(-1);
        let mut rows = stmt.query(params![row_limit, start as i64])?;

        let mut index = QuestionIndex::new(policy);
        let mut stats = WindowStats::default();
        while let Some(row) = rows.next()? {
            stats.scanned += 1;
            let key: String = row.get(0)?;
            let original: String = row.get(1)?;
            let payload: String = row.get(2)?;
            let record: StoreRecord = match serde_json::from_str(&payload) {
                Ok(record) => record,
                Err(err) => {
                    stats.skipped += 1;
                    warn!(store = %self.path.display(), key = %key, error = %err, "skipping unparseable row");
                    continue;
                }
            };
            let entry = IndexEntry {
                locator: RecordLocator::Key(key),
                question: original,
                document_url: record.document_url,
                example_id: record.example_id,
            };
            if index.insert(entry) {
                stats.indexed += 1;
            } else {
                stats.skipped += 1;
            }
        }
        let next = match limit {
            Some(window) if stats.scanned == window && window > 0 => Some(StoreCursor {
                position: start + window as u64,
            }),
            _ => None,
        };
        Ok(IndexWindow { index, next, stats })
    }

    fn fetch(&self, locator: &RecordLocator) -> Result<Option<StoreRecord>, ReconcileError> {
        let RecordLocator::Key(key) = locator else {
            return Err(ReconcileError::StoreInconsistent {
                path: self.path.clone(),
                details: "offset locator passed to a keyed store".to_string(),
            });
        };
        let payload: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT data_json FROM {TABLE} WHERE question = ?1"),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            None => Ok(None),
            Some(payload) => match serde_json::from_str(&payload) {
                Ok(record) => Ok(Some(record)),
                Err(err) => {
                    warn!(store = %self.path.display(), key = %key, error = %err, "row payload is not parseable");
                    Ok(None)
                }
            },
        }
    }
}
