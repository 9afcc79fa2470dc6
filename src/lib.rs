#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Reusable application runners shared by the shipped binaries.
pub mod app;
/// Cooperative cancellation token checked at run boundaries.
pub mod cancel;
/// Run configuration types.
pub mod config;
/// Centralized constants used across normalization, the engine, and reports.
pub mod constants;
/// Top-level run orchestration.
pub mod coordinator;
/// Record, query, and output row types.
pub mod data;
/// Per-dataset resolution engine.
pub mod driver;
/// Windowed question index and lookup tiers.
pub mod index;
/// Question key normalization and keyword extraction.
pub mod normalize;
/// Plain-text processing report rendering.
pub mod report;
/// Keyword-set similarity scoring.
pub mod similarity;
/// Per-run and per-dataset counters.
pub mod stats;
/// Record store backends and the windowed scan trait.
pub mod store;
/// Shared type aliases.
pub mod types;

mod errors;
mod output;

pub use cancel::CancelToken;
pub use config::{DatasetSelection, DuplicateKeyPolicy, MergeConfig, QuerySplit, StoreFormat};
pub use coordinator::{run_merge, run_merge_with_store};
pub use data::{MergedRecord, QueryRecord, StoreRecord, UnmatchedReason, UnmatchedRecord};
pub use errors::ReconcileError;
pub use index::{IndexEntry, QuestionIndex, RecordLocator};
pub use stats::{DatasetStats, RunStats};
pub use store::{
    GzipJsonlStore, InMemoryStore, IndexWindow, RecordStore, SqliteStore, StoreCursor,
};
pub use types::{ByteOffset, DatasetName, Keyword, QuestionKey, Similarity};
