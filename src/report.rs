//! Human-readable run report.
//!
//! Written once at run end: a timing block, store scan totals, and one
//! section per query dataset with its match rate and the first few fuzzy
//! matches as examples.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::errors::ReconcileError;
use crate::stats::RunStats;

/// Write the run report to `path`, truncating any previous report.
pub fn write_report(path: &Path, stats: &RunStats) -> Result<(), ReconcileError> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    render(&mut out, stats)?;
    out.flush()?;
    info!(report = %path.display(), "run report written");
    Ok(())
}

fn render<W: Write>(out: &mut W, stats: &RunStats) -> io::Result<()> {
    let finished = stats.finished.unwrap_or(stats.started);

    writeln!(out, "Processing Report")?;
    writeln!(out, "{}", "=".repeat(80))?;
    writeln!(out)?;

    writeln!(out, "Processing Time")?;
    writeln!(out, "{}", "-".repeat(80))?;
    writeln!(out, "Started: {}", stats.started.format("%Y-%m-%d %H:%M:%S%.6f UTC"))?;
    writeln!(out, "Finished: {}", finished.format("%Y-%m-%d %H:%M:%S%.6f UTC"))?;
    writeln!(out, "Total time: {}", format_duration(finished - stats.started))?;
    writeln!(out)?;

    writeln!(out, "Record Store Statistics")?;
    writeln!(out, "{}", "-".repeat(80))?;
    writeln!(out, "Scan windows: {}", stats.store.windows)?;
    writeln!(out, "Records scanned: {}", stats.store.scanned)?;
    writeln!(out, "Records indexed: {}", stats.store.indexed)?;
    writeln!(out, "Records skipped: {}", stats.store.skipped)?;
    writeln!(out)?;

    for dataset in &stats.datasets {
        writeln!(out, "Query Dataset: {}", dataset.dataset)?;
        writeln!(out, "{}", "-".repeat(80))?;
        writeln!(out, "Total questions: {}", dataset.processed)?;
        writeln!(
            out,
            "Matches found: {} ({} exact, {} fuzzy)",
            dataset.matched(),
            dataset.exact_matches,
            dataset.fuzzy_matches
        )?;
        writeln!(out, "Match rate: {:.1}%", dataset.match_rate())?;
        writeln!(out, "Unmatched: {}", dataset.unmatched)?;
        writeln!(out, "Parse errors: {}", dataset.parse_errors)?;
        writeln!(out, "Fetch failures: {}", dataset.fetch_failures)?;
        writeln!(out)?;

        writeln!(out, "Example fuzzy matches from {}:", dataset.dataset)?;
        for example in &dataset.fuzzy_examples {
            writeln!(out)?;
            writeln!(out, "Question: {}", example.question)?;
            writeln!(out, "Answer: {}", example.answer)?;
            writeln!(out, "Matched Question: {}", example.matched_question)?;
            writeln!(out, "Similarity: {:.2}", example.similarity)?;
            writeln!(out, "{}", "-".repeat(40))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Render an elapsed time as `H:MM:SS` with microseconds when present.
fn format_duration(delta: chrono::Duration) -> String {
    let total_micros = delta.num_microseconds().unwrap_or(0).max(0);
    let micros = total_micros % 1_000_000;
    let total_secs = total_micros / 1_000_000;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    if micros == 0 {
        format!("{hours}:{mins:02}:{secs:02}")
    } else {
        format!("{hours}:{mins:02}:{secs:02}.{micros:06}")
    }
}
