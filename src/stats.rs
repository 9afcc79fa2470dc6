//! Run statistics.
//!
//! Counters are split by logical query dataset so the run report can show
//! per-dataset match rates alongside the store-wide scan totals.

use chrono::{DateTime, Utc};

use crate::constants::report::FUZZY_EXAMPLES_KEPT;
use crate::store::WindowStats;
use crate::types::{DatasetName, Similarity};

/// One fuzzy match kept as a report example.
#[derive(Clone, Debug, PartialEq)]
pub struct FuzzyExample {
    /// Query-side question.
    pub question: String,
    /// First accepted answer, empty when the query carries none.
    pub answer: String,
    /// Store-side question that matched.
    pub matched_question: String,
    /// Achieved similarity.
    pub similarity: Similarity,
}

/// Reconciliation counters for one query dataset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DatasetStats {
    /// Dataset label used in logs and the report.
    pub dataset: DatasetName,
    /// Queries that produced an output record.
    pub processed: usize,
    /// Queries resolved on an exact key.
    pub exact_matches: usize,
    /// Queries resolved through the similarity fallback.
    pub fuzzy_matches: usize,
    /// Queries that produced an unmatched record.
    pub unmatched: usize,
    /// Malformed query lines skipped during streaming.
    pub parse_errors: usize,
    /// Unmatched queries whose index hits could not be re-read.
    pub fetch_failures: usize,
    /// First few fuzzy matches, kept for the report.
    pub fuzzy_examples: Vec<FuzzyExample>,
}

impl DatasetStats {
    /// Empty counters for the given dataset label.
    pub fn new(dataset: impl Into<DatasetName>) -> Self {
        Self {
            dataset: dataset.into(),
            ..Self::default()
        }
    }

    /// Total matched queries, both tiers.
    pub fn matched(&self) -> usize {
        self.exact_matches + self.fuzzy_matches
    }

    /// Match rate in percent. Zero when nothing was processed.
    pub fn match_rate(&self) -> f64 {
        if self.processed == 0 {
            return 0.0;
        }
        self.matched() as f64 / self.processed as f64 * 100.0
    }

    /// Count an exact match.
    pub fn record_exact(&mut self) {
        self.processed += 1;
        self.exact_matches += 1;
    }

    /// Count a fuzzy match, keeping it as an example while room remains.
    pub fn record_fuzzy(&mut self, example: FuzzyExample) {
        self.processed += 1;
        self.fuzzy_matches += 1;
        if self.fuzzy_examples.len() < FUZZY_EXAMPLES_KEPT {
            self.fuzzy_examples.push(example);
        }
    }

    /// Count an unmatched query.
    pub fn record_unmatched(&mut self, fetch_failed: bool) {
        self.processed += 1;
        self.unmatched += 1;
        if fetch_failed {
            self.fetch_failures += 1;
        }
    }
}

/// Store scan totals accumulated across windows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreScanStats {
    /// Scan windows completed.
    pub windows: usize,
    /// Records consumed from the store.
    pub scanned: usize,
    /// Records indexed.
    pub indexed: usize,
    /// Records skipped as malformed or keyless.
    pub skipped: usize,
}

impl StoreScanStats {
    /// Fold one window's counters into the totals.
    pub fn absorb(&mut self, window: &WindowStats) {
        self.windows += 1;
        self.scanned += window.scanned;
        self.indexed += window.indexed;
        self.skipped += window.skipped;
    }
}

/// Statistics for a whole reconciliation run.
#[derive(Clone, Debug)]
pub struct RunStats {
    /// Wall-clock start of the run.
    pub started: DateTime<Utc>,
    /// Wall-clock end of the run, set once processing finishes.
    pub finished: Option<DateTime<Utc>>,
    /// Store scan totals.
    pub store: StoreScanStats,
    /// Per-dataset counters, in processing order.
    pub datasets: Vec<DatasetStats>,
}

impl RunStats {
    /// Start tracking a run from now.
    pub fn begin() -> Self {
        Self {
            started: Utc::now(),
            finished: None,
            store: StoreScanStats::default(),
            datasets: Vec::new(),
        }
    }

    /// Mark the run finished.
    pub fn finish(&mut self) {
        self.finished = Some(Utc::now());
    }

    /// Queries processed across all datasets.
    pub fn total_processed(&self) -> usize {
        self.datasets.iter().map(|d| d.processed).sum()
    }

    /// Matched queries across all datasets.
    pub fn total_matched(&self) -> usize {
        self.datasets.iter().map(|d| d.matched()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_rate_divides_matched_by_processed() {
        let mut stats = DatasetStats::new("train");
        stats.record_exact();
        stats.record_fuzzy(FuzzyExample {
            question: "q".to_string(),
            answer: "a".to_string(),
            matched_question: "m".to_string(),
            similarity: 0.8,
        });
        stats.record_unmatched(false);
        stats.record_unmatched(true);
        assert_eq!(stats.processed, 4);
        assert_eq!(stats.matched(), 2);
        assert_eq!(stats.unmatched, 2);
        assert_eq!(stats.fetch_failures, 1);
        assert!((stats.match_rate() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn match_rate_of_empty_dataset_is_zero() {
        let stats = DatasetStats::new("dev");
        assert_eq!(stats.match_rate(), 0.0);
    }

    #[test]
    fn fuzzy_examples_are_capped() {
        let mut stats = DatasetStats::new("train");
        for i in 0..10 {
            stats.record_fuzzy(FuzzyExample {
                question: format!("q{i}"),
                answer: String::new(),
                matched_question: format!("m{i}"),
                similarity: 0.9,
            });
        }
        assert_eq!(stats.fuzzy_matches, 10);
        assert_eq!(stats.fuzzy_examples.len(), FUZZY_EXAMPLES_KEPT);
        assert_eq!(stats.fuzzy_examples[0].question, "q0");
    }

    #[test]
    fn store_totals_absorb_window_counters() {
        let mut totals = StoreScanStats::default();
        totals.absorb(&WindowStats {
            scanned: 10,
            indexed: 8,
            skipped: 2,
        });
        totals.absorb(&WindowStats {
            scanned: 5,
            indexed: 5,
            skipped: 0,
        });
        assert_eq!(totals.windows, 2);
        assert_eq!(totals.scanned, 15);
        assert_eq!(totals.indexed, 13);
        assert_eq!(totals.skipped, 2);
    }
}
