//! Reconciliation driver.
//!
//! Queries are loaded once into a pending set, then resolved window by
//! window against the store index. Resolution tries the exact key, then the
//! aggressively normalized key, then the keyword-similarity fallback; a
//! query that resolves leaves the pending set, so each query produces
//! exactly one output record across the whole run.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::constants::engine::{QUERY_PROGRESS_EVERY, SKIP_QUERY_MSG};
use crate::data::{MergedRecord, QueryRecord, UnmatchedReason, UnmatchedRecord};
use crate::errors::ReconcileError;
use crate::index::{IndexEntry, QuestionIndex};
use crate::normalize::{aggressive_key, extract_keywords, normalize_key};
use crate::output::JsonlSink;
use crate::stats::{DatasetStats, FuzzyExample};
use crate::store::RecordStore;
use crate::types::{DatasetName, Keyword, QuestionKey, Similarity};

/// A query waiting for resolution, with its lookup keys precomputed.
#[derive(Clone, Debug)]
pub struct PendingQuery {
    /// The query record, carried verbatim into output.
    pub record: QueryRecord,
    key: QuestionKey,
    aggressive: QuestionKey,
    keywords: HashSet<Keyword>,
}

impl PendingQuery {
    /// Derive the lookup keys for a query.
    pub fn new(record: QueryRecord) -> Self {
        let key = normalize_key(&record.question);
        let aggressive = aggressive_key(&record.question);
        let keywords = extract_keywords(&record.question);
        Self {
            record,
            key,
            aggressive,
            keywords,
        }
    }
}

/// One query dataset being reconciled: its pending set, output sinks, and
/// counters.
pub struct DatasetTask {
    dataset: DatasetName,
    pending: Vec<PendingQuery>,
    merged: JsonlSink,
    unmatched: JsonlSink,
    stats: DatasetStats,
}

impl DatasetTask {
    /// Stream the query file into a pending set, then open the output sinks.
    pub fn load(
        dataset: impl Into<DatasetName>,
        query_path: &Path,
        merged_path: &Path,
        unmatched_path: &Path,
        batch_size: usize,
    ) -> Result<Self, ReconcileError> {
        let dataset = dataset.into();
        let mut stats = DatasetStats::new(dataset.clone());
        let pending = load_pending(query_path, &mut stats)?;
        let merged = JsonlSink::create(merged_path, batch_size)?;
        let unmatched = JsonlSink::create(unmatched_path, batch_size)?;
        debug!(dataset = %dataset, queries = pending.len(), "query dataset loaded");
        Ok(Self {
            dataset,
            pending,
            merged,
            unmatched,
            stats,
        })
    }

    /// Dataset label.
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Queries still waiting for a window that resolves them.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &DatasetStats {
        &self.stats
    }

    /// Finish the task, returning its counters.
    pub fn into_stats(self) -> DatasetStats {
        self.stats
    }

    /// Resolve pending queries against one window's index. Resolved queries
    /// leave the pending set; the rest wait for the next window.
    pub fn resolve_window<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        index: &QuestionIndex,
        threshold: Similarity,
        cancel: &CancelToken,
    ) -> Result<(), ReconcileError> {
        let before = self.pending.len();
        let mut queue = std::mem::take(&mut self.pending).into_iter();
        let mut seen = 0usize;
        while let Some(query) = queue.next() {
            if cancel.is_cancelled() {
                self.pending.push(query);
                self.pending.extend(queue);
                return Err(ReconcileError::Cancelled("query".to_string()));
            }
            seen += 1;
            if seen % QUERY_PROGRESS_EVERY == 0 {
                debug!(dataset = %self.dataset, seen, "matching progress");
            }
            if let Some(kept) = self.resolve_one(store, index, threshold, query)? {
                self.pending.push(kept);
            }
        }
        debug!(
            dataset = %self.dataset,
            resolved = before - self.pending.len(),
            pending = self.pending.len(),
            "window resolved"
        );
        Ok(())
    }

    /// Emit `no_match` records for everything still pending. Called once
    /// after the final window.
    pub fn drain_unmatched(&mut self, cancel: &CancelToken) -> Result<(), ReconcileError> {
        let mut queue = std::mem::take(&mut self.pending).into_iter();
        while let Some(query) = queue.next() {
            if cancel.is_cancelled() {
                self.pending.push(query);
                self.pending.extend(queue);
                return Err(ReconcileError::Cancelled("drain".to_string()));
            }
            self.unmatched.write(&UnmatchedRecord::with_reason(
                query.record,
                UnmatchedReason::NoMatch,
            ))?;
            self.stats.record_unmatched(false);
        }
        Ok(())
    }

    /// Flush both sinks.
    pub fn flush(&mut self) -> Result<(), ReconcileError> {
        self.merged.flush()?;
        self.unmatched.flush()?;
        debug!(
            dataset = %self.dataset,
            merged = self.merged.written(),
            unmatched = self.unmatched.written(),
            "outputs flushed"
        );
        Ok(())
    }

    fn resolve_one<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        index: &QuestionIndex,
        threshold: Similarity,
        query: PendingQuery,
    ) -> Result<Option<PendingQuery>, ReconcileError> {
        if let Some(entries) = index.lookup_exact(&query.key) {
            self.emit_exact(store, entries, query)?;
            return Ok(None);
        }
        if let Some(entries) = index.lookup_aggressive(&query.aggressive) {
            self.emit_exact(store, entries, query)?;
            return Ok(None);
        }
        if let Some(hit) = index.best_fuzzy(&query.keywords, threshold) {
            let (entries, similarity) = (hit.entries, hit.similarity);
            self.emit_fuzzy(store, entries, similarity, query)?;
            return Ok(None);
        }
        Ok(Some(query))
    }

    /// Fetch and emit on the exact path. Entries are tried in insertion
    /// order; if none can be re-read the query resolves as `fetch_failed`.
    fn emit_exact<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        entries: &[IndexEntry],
        query: PendingQuery,
    ) -> Result<(), ReconcileError> {
        for entry in entries {
            if let Some(record) = store.fetch(&entry.locator)? {
                let merged = MergedRecord::merge(&query.record, entry, record);
                self.merged.write(&merged)?;
                self.stats.record_exact();
                return Ok(());
            }
            warn!(
                dataset = %self.dataset,
                question = %query.record.question,
                "indexed record could not be re-read"
            );
        }
        self.unmatched.write(&UnmatchedRecord::with_reason(
            query.record,
            UnmatchedReason::FetchFailed,
        ))?;
        self.stats.record_unmatched(true);
        Ok(())
    }

    fn emit_fuzzy<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        entries: &[IndexEntry],
        similarity: Similarity,
        query: PendingQuery,
    ) -> Result<(), ReconcileError> {
        for entry in entries {
            if let Some(record) = store.fetch(&entry.locator)? {
                let example = FuzzyExample {
                    question: query.record.question.clone(),
                    answer: first_answer(&query.record),
                    matched_question: entry.question.clone(),
                    similarity,
                };
                let merged = MergedRecord::merge(&query.record, entry, record)
                    .with_fuzzy(similarity, entry.question.clone());
                self.merged.write(&merged)?;
                self.stats.record_fuzzy(example);
                return Ok(());
            }
            warn!(
                dataset = %self.dataset,
                question = %query.record.question,
                "indexed record could not be re-read"
            );
        }
        self.unmatched.write(&UnmatchedRecord::with_reason(
            query.record,
            UnmatchedReason::FetchFailed,
        ))?;
        self.stats.record_unmatched(true);
        Ok(())
    }
}

/// Stream a query file into a pending set, counting malformed lines.
fn load_pending(
    path: &Path,
    stats: &mut DatasetStats,
) -> Result<Vec<PendingQuery>, ReconcileError> {
    let file = File::open(path).map_err(|err| ReconcileError::QueryUnavailable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let reader = BufReader::new(file);
    let mut pending = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<QueryRecord>(&line) {
            Ok(record) => {
                pending.push(PendingQuery::new(record));
                if pending.len() % QUERY_PROGRESS_EVERY == 0 {
                    debug!(path = %path.display(), loaded = pending.len(), "loading queries");
                }
            }
            Err(err) => {
                stats.parse_errors += 1;
                warn!(path = %path.display(), error = %err, SKIP_QUERY_MSG);
            }
        }
    }
    Ok(pending)
}

fn first_answer(record: &QueryRecord) -> String {
    match record.answer.first() {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use serde_json::json;

    use crate::config::DuplicateKeyPolicy;
    use crate::data::StoreRecord;
    use crate::store::InMemoryStore;

    fn store_record(question: &str, text: &str) -> StoreRecord {
        StoreRecord {
            question_text: question.to_string(),
            document_url: format!("http://example.test/{}", question.len()),
            document_text: text.to_string(),
            example_id: Some(json!(question.len())),
            ..StoreRecord::default()
        }
    }

    fn write_queries(dir: &Path, lines: &[&str]) -> PathBuf {
        let path = dir.join("queries.jsonl");
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    fn task(dir: &Path, lines: &[&str]) -> DatasetTask {
        let queries = write_queries(dir, lines);
        DatasetTask::load(
            "test",
            &queries,
            &dir.join("merged.jsonl"),
            &dir.join("unmatched.jsonl"),
            100,
        )
        .unwrap()
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn exact_match_emits_the_full_merged_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new(
            "mem",
            vec![store_record("What is the capital of France?", "Paris is the capital.")],
        );
        let index = store
            .scan_window(None, None, DuplicateKeyPolicy::LastWriteWins)
            .unwrap()
            .index;
        let mut task = task(
            dir.path(),
            &[r#"{"question": "what is the capital of france", "answer": ["Paris"]}"#],
        );
        task.resolve_window(&store, &index, 0.8, &CancelToken::new())
            .unwrap();
        task.flush().unwrap();

        assert_eq!(task.pending_len(), 0);
        assert_eq!(task.stats().exact_matches, 1);
        let merged = read_lines(&dir.path().join("merged.jsonl"));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0]["question"], json!("what is the capital of france"));
        assert_eq!(merged[0]["answer"], json!(["Paris"]));
        assert_eq!(merged[0]["document_text"], json!("Paris is the capital."));
        assert!(merged[0].get("nq_similarity").is_none());
    }

    #[test]
    fn aggressive_tier_recovers_a_stripped_question() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new(
            "mem",
            vec![store_record("What is the capital of France?", "Paris body")],
        );
        let index = store
            .scan_window(None, None, DuplicateKeyPolicy::LastWriteWins)
            .unwrap()
            .index;
        let mut task = task(
            dir.path(),
            &[r#"{"question": "the capital of France?", "answer": ["Paris"]}"#],
        );
        task.resolve_window(&store, &index, 0.99, &CancelToken::new())
            .unwrap();
        task.flush().unwrap();

        assert_eq!(task.stats().exact_matches, 1);
        let merged = read_lines(&dir.path().join("merged.jsonl"));
        assert!(merged[0].get("nq_similarity").is_none());
    }

    #[test]
    fn fuzzy_tier_attaches_similarity_and_matched_question() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new(
            "mem",
            vec![store_record("the capital city of france", "Paris body")],
        );
        let index = store
            .scan_window(None, None, DuplicateKeyPolicy::LastWriteWins)
            .unwrap()
            .index;
        let mut task = task(
            dir.path(),
            &[r#"{"question": "capital of france", "answer": ["Paris"]}"#],
        );
        task.resolve_window(&store, &index, 0.5, &CancelToken::new())
            .unwrap();
        task.flush().unwrap();

        assert_eq!(task.stats().fuzzy_matches, 1);
        assert_eq!(task.stats().fuzzy_examples.len(), 1);
        assert_eq!(task.stats().fuzzy_examples[0].answer, "Paris");
        let merged = read_lines(&dir.path().join("merged.jsonl"));
        assert_eq!(
            merged[0]["nq_question"],
            json!("the capital city of france")
        );
        let similarity = merged[0]["nq_similarity"].as_f64().unwrap();
        assert!((similarity - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn unresolved_queries_drain_to_no_match() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new("mem", vec![store_record("capital of france", "body")]);
        let index = store
            .scan_window(None, None, DuplicateKeyPolicy::LastWriteWins)
            .unwrap()
            .index;
        let mut task = task(
            dir.path(),
            &[r#"{"question": "quantum entanglement experiments", "answer": []}"#],
        );
        task.resolve_window(&store, &index, 0.3, &CancelToken::new())
            .unwrap();
        assert_eq!(task.pending_len(), 1);

        task.drain_unmatched(&CancelToken::new()).unwrap();
        task.flush().unwrap();
        assert_eq!(task.stats().unmatched, 1);
        let unmatched = read_lines(&dir.path().join("unmatched.jsonl"));
        assert_eq!(unmatched[0]["error"], json!("no_match"));
    }

    #[test]
    fn failed_fetch_resolves_as_fetch_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new("mem", vec![store_record("capital of france", "body")])
            .with_unfetchable(0);
        let index = store
            .scan_window(None, None, DuplicateKeyPolicy::LastWriteWins)
            .unwrap()
            .index;
        let mut task = task(
            dir.path(),
            &[r#"{"question": "capital of france", "answer": []}"#],
        );
        task.resolve_window(&store, &index, 0.8, &CancelToken::new())
            .unwrap();
        task.flush().unwrap();

        assert_eq!(task.pending_len(), 0);
        assert_eq!(task.stats().fetch_failures, 1);
        let unmatched = read_lines(&dir.path().join("unmatched.jsonl"));
        assert_eq!(unmatched[0]["error"], json!("fetch_failed"));
    }

    #[test]
    fn malformed_query_lines_are_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let task = task(
            dir.path(),
            &[
                r#"{"question": "capital of france", "answer": []}"#,
                "{broken",
                "",
            ],
        );
        assert_eq!(task.pending_len(), 1);
        assert_eq!(task.stats().parse_errors, 1);
    }

    #[test]
    fn cancellation_keeps_the_pending_set_intact() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new("mem", vec![store_record("capital of france", "body")]);
        let index = store
            .scan_window(None, None, DuplicateKeyPolicy::LastWriteWins)
            .unwrap()
            .index;
        let mut task = task(
            dir.path(),
            &[
                r#"{"question": "capital of france", "answer": []}"#,
                r#"{"question": "who wrote hamlet", "answer": []}"#,
            ],
        );
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = task
            .resolve_window(&store, &index, 0.8, &cancel)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Cancelled(_)));
        assert_eq!(task.pending_len(), 2);
    }
}
