//! Run configuration.
//!
//! A [`MergeConfig`] is built with `with_*` methods (or mapped from CLI
//! arguments) and validated once before any file is touched.

use std::path::PathBuf;

use clap::ValueEnum;

use crate::constants::{engine, layout};
use crate::errors::ReconcileError;
use crate::types::Similarity;

/// How the index treats records whose question keys collide.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DuplicateKeyPolicy {
    /// Keep the first record seen for a key.
    FirstWriteWins,
    /// Keep the most recent record seen for a key.
    #[default]
    LastWriteWins,
    /// Keep every record; exact lookups try them in insertion order.
    CollectAll,
}

/// Record store backend selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StoreFormat {
    /// Gzip-compressed JSONL file.
    #[default]
    Gzip,
    /// SQLite database produced by the store loader.
    Sqlite,
}

/// One query split of the NQ-open dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuerySplit {
    /// The train split.
    Train,
    /// The dev split.
    Dev,
}

impl QuerySplit {
    /// Short label used in logs, statistics, and the report.
    pub fn label(self) -> &'static str {
        match self {
            QuerySplit::Train => "train",
            QuerySplit::Dev => "dev",
        }
    }

    /// Query file name under the data directory.
    pub fn query_file(self) -> &'static str {
        match self {
            QuerySplit::Train => layout::TRAIN_QUERY_FILE,
            QuerySplit::Dev => layout::DEV_QUERY_FILE,
        }
    }

    /// Merged output file name, derived from the query file name.
    pub fn merged_file(self) -> String {
        let name = self.query_file();
        match name.strip_suffix(".jsonl") {
            Some(stem) => format!("{stem}{}", layout::MERGED_SUFFIX),
            None => format!("{name}{}", layout::MERGED_SUFFIX),
        }
    }

    /// Unmatched output file name.
    pub fn unmatched_file(self) -> &'static str {
        match self {
            QuerySplit::Train => layout::TRAIN_UNMATCHED_FILE,
            QuerySplit::Dev => layout::DEV_UNMATCHED_FILE,
        }
    }
}

/// Which query splits a run reconciles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DatasetSelection {
    /// Only the train split.
    Train,
    /// Only the dev split.
    Dev,
    /// Both splits, train first.
    #[default]
    Both,
}

impl DatasetSelection {
    /// Splits covered by this selection, in processing order.
    pub fn splits(self) -> &'static [QuerySplit] {
        match self {
            DatasetSelection::Train => &[QuerySplit::Train],
            DatasetSelection::Dev => &[QuerySplit::Dev],
            DatasetSelection::Both => &[QuerySplit::Train, QuerySplit::Dev],
        }
    }
}

/// Configuration for one reconciliation run.
#[derive(Clone, Debug)]
pub struct MergeConfig {
    /// Directory holding the store and query files.
    pub data_dir: PathBuf,
    /// Explicit store path; defaults to the standard store file under
    /// `data_dir`.
    pub store: Option<PathBuf>,
    /// Store backend.
    pub store_format: StoreFormat,
    /// Query splits to reconcile.
    pub datasets: DatasetSelection,
    /// Output directory; defaults to `data_dir`.
    pub output: Option<PathBuf>,
    /// Store records indexed per window; `None` scans the store in one pass.
    pub chunk_size: Option<usize>,
    /// Output records between sink flushes.
    pub batch_size: usize,
    /// Similarity threshold for the fuzzy tier, in `(0, 1]`.
    pub threshold: Similarity,
    /// Duplicate-key policy for the index.
    pub duplicate_policy: DuplicateKeyPolicy,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            store: None,
            store_format: StoreFormat::default(),
            datasets: DatasetSelection::default(),
            output: None,
            chunk_size: Some(engine::DEFAULT_CHUNK_SIZE),
            batch_size: engine::DEFAULT_BATCH_SIZE,
            threshold: engine::DEFAULT_SIMILARITY_THRESHOLD,
            duplicate_policy: DuplicateKeyPolicy::default(),
        }
    }
}

impl MergeConfig {
    /// Set the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set an explicit store path.
    pub fn with_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.store = Some(path.into());
        self
    }

    /// Set the store backend.
    pub fn with_store_format(mut self, format: StoreFormat) -> Self {
        self.store_format = format;
        self
    }

    /// Set the query splits to reconcile.
    pub fn with_datasets(mut self, datasets: DatasetSelection) -> Self {
        self.datasets = datasets;
        self
    }

    /// Set an explicit output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output = Some(dir.into());
        self
    }

    /// Set the window size, or `None` for a single unbounded pass.
    pub fn with_chunk_size(mut self, chunk_size: Option<usize>) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the output flush interval.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the fuzzy acceptance threshold.
    pub fn with_threshold(mut self, threshold: Similarity) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the duplicate-key policy.
    pub fn with_duplicate_policy(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Check scalar knobs before any processing starts.
    pub fn validate(&self) -> Result<(), ReconcileError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 || self.threshold > 1.0 {
            return Err(ReconcileError::Configuration(format!(
                "similarity threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        if self.batch_size == 0 {
            return Err(ReconcileError::Configuration(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.chunk_size == Some(0) {
            return Err(ReconcileError::Configuration(
                "chunk size must be at least 1, or unset for a single pass".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved store path.
    pub fn store_path(&self) -> PathBuf {
        self.store
            .clone()
            .unwrap_or_else(|| self.data_dir.join(layout::STORE_FILE))
    }

    /// Resolved output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| self.data_dir.clone())
    }

    /// Query file path for a split.
    pub fn query_path(&self, split: QuerySplit) -> PathBuf {
        self.data_dir.join(split.query_file())
    }

    /// Merged output path for a split.
    pub fn merged_path(&self, split: QuerySplit) -> PathBuf {
        self.output_dir().join(split.merged_file())
    }

    /// Unmatched output path for a split.
    pub fn unmatched_path(&self, split: QuerySplit) -> PathBuf {
        self.output_dir().join(split.unmatched_file())
    }

    /// Run report path.
    pub fn report_path(&self) -> PathBuf {
        self.output_dir().join(layout::REPORT_FILE)
    }
}
