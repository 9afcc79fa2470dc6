//! Chunk coordinator.
//!
//! Runs the whole reconciliation: opens the store backend, loads each
//! selected query dataset into a pending set, then loops bounded scan
//! windows over the store, resolving every dataset's pending queries
//! against each window. Peak memory stays proportional to the window size,
//! never to the store. After the last window, still-pending queries drain
//! to unmatched output and the run report is written.

use tracing::{debug, error, info};

use crate::cancel::CancelToken;
use crate::config::{MergeConfig, StoreFormat};
use crate::driver::DatasetTask;
use crate::errors::ReconcileError;
use crate::report;
use crate::stats::RunStats;
use crate::store::{GzipJsonlStore, RecordStore, SqliteStore, StoreCursor};

/// Run a reconciliation against the store backend named by the config.
pub fn run_merge(config: &MergeConfig, cancel: &CancelToken) -> Result<RunStats, ReconcileError> {
    config.validate()?;
    match config.store_format {
        StoreFormat::Gzip => {
            let store = GzipJsonlStore::open(config.store_path())?;
            run_merge_with_store(config, &store, cancel)
        }
        StoreFormat::Sqlite => {
            let store = SqliteStore::open(config.store_path())?;
            run_merge_with_store(config, &store, cancel)
        }
    }
}

/// Run a reconciliation against an already opened store.
///
/// An unavailable query file skips that dataset only; the run fails when no
/// dataset could be loaded. Output sinks are flushed on every exit path,
/// cancellation included.
pub fn run_merge_with_store<S: RecordStore + ?Sized>(
    config: &MergeConfig,
    store: &S,
    cancel: &CancelToken,
) -> Result<RunStats, ReconcileError> {
    config.validate()?;
    let mut stats = RunStats::begin();
    info!(store = %store.id(), "starting dataset reconciliation");

    let mut tasks: Vec<DatasetTask> = Vec::new();
    let mut load_failure: Option<ReconcileError> = None;
    for split in config.datasets.splits() {
        match DatasetTask::load(
            split.label(),
            &config.query_path(*split),
            &config.merged_path(*split),
            &config.unmatched_path(*split),
            config.batch_size,
        ) {
            Ok(task) => tasks.push(task),
            Err(err) => {
                error!(dataset = split.label(), error = %err, "query dataset skipped");
                load_failure = Some(err);
            }
        }
    }
    if tasks.is_empty() {
        if let Some(err) = load_failure {
            return Err(err);
        }
        return Err(ReconcileError::Configuration(
            "no query dataset selected".to_string(),
        ));
    }

    let outcome = drive_windows(store, config, cancel, &mut stats, &mut tasks);

    // Flush whatever was written, even when the run is aborting.
    let mut flush_failure: Option<ReconcileError> = None;
    for task in &mut tasks {
        if let Err(err) = task.flush() {
            error!(dataset = task.dataset(), error = %err, "output flush failed");
            flush_failure.get_or_insert(err);
        }
    }
    outcome?;
    if let Some(err) = flush_failure {
        return Err(err);
    }

    for task in tasks {
        stats.datasets.push(task.into_stats());
    }
    stats.finish();
    info!(
        processed = stats.total_processed(),
        matched = stats.total_matched(),
        "reconciliation finished"
    );
    report::write_report(&config.report_path(), &stats)?;
    Ok(stats)
}

fn drive_windows<S: RecordStore + ?Sized>(
    store: &S,
    config: &MergeConfig,
    cancel: &CancelToken,
    stats: &mut RunStats,
    tasks: &mut [DatasetTask],
) -> Result<(), ReconcileError> {
    let mut cursor: Option<StoreCursor> = None;
    let mut window_no = 0usize;
    loop {
        cancel.checkpoint("chunk")?;
        if tasks.iter().all(|task| task.pending_len() == 0) {
            debug!("every query resolved, stopping the store scan early");
            break;
        }
        window_no += 1;
        debug!(
            window = window_no,
            position = cursor.map(|c| c.position).unwrap_or(0),
            "scanning store window"
        );
        let window = store.scan_window(cursor, config.chunk_size, config.duplicate_policy)?;
        stats.store.absorb(&window.stats);
        debug!(window = window_no, keys = window.index.len(), "window indexed");
        for task in tasks.iter_mut() {
            task.resolve_window(store, &window.index, config.threshold, cancel)?;
        }
        match window.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    for task in tasks.iter_mut() {
        task.drain_unmatched(cancel)?;
    }
    Ok(())
}
