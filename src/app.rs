//! Application wiring for the `merge-datasets` binary.

use std::error::Error;
use std::path::PathBuf;

use clap::{error::ErrorKind, Parser};

use crate::cancel::CancelToken;
use crate::config::{DatasetSelection, DuplicateKeyPolicy, MergeConfig, StoreFormat};
use crate::constants::engine;
use crate::coordinator::run_merge;
use crate::stats::RunStats;
use crate::types::Similarity;

#[derive(Debug, Parser)]
#[command(
    name = "merge-datasets",
    disable_help_subcommand = true,
    about = "Reconcile NQ-open query datasets against an annotated record store",
    long_about = "Stream NQ-open queries once, index the record store in bounded windows, and join each query to its annotated record by normalized question key, with a keyword-similarity fallback for paraphrased questions.",
    after_help = "Store and query files are resolved under --data-dir unless overridden; outputs land next to them unless --output-dir is set."
)]
struct MergeDatasetsCli {
    #[arg(
        long = "data-dir",
        value_name = "DIR",
        default_value = ".",
        help = "Directory holding the record store and query files"
    )]
    data_dir: PathBuf,
    #[arg(long, value_name = "PATH", help = "Record store path override")]
    store: Option<PathBuf>,
    #[arg(
        long = "store-format",
        value_enum,
        default_value = "gzip",
        help = "Record store backend"
    )]
    store_format: StoreFormat,
    #[arg(
        long,
        value_enum,
        default_value = "both",
        help = "Which query splits to process"
    )]
    dataset: DatasetSelection,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        help = "Directory for merged, unmatched, and report files"
    )]
    output_dir: Option<PathBuf>,
    #[arg(
        long = "chunk-size",
        default_value_t = engine::DEFAULT_CHUNK_SIZE,
        value_parser = parse_positive_usize,
        help = "Store records indexed per window"
    )]
    chunk_size: usize,
    #[arg(
        long = "single-pass",
        conflicts_with = "chunk_size",
        help = "Index the whole store in one window instead of bounded chunks"
    )]
    single_pass: bool,
    #[arg(
        long = "batch-size",
        default_value_t = engine::DEFAULT_BATCH_SIZE,
        value_parser = parse_positive_usize,
        help = "Output records buffered between flushes"
    )]
    batch_size: usize,
    #[arg(
        long,
        default_value_t = engine::DEFAULT_SIMILARITY_THRESHOLD,
        value_parser = parse_threshold,
        help = "Similarity threshold for the fuzzy tier, in (0, 1]"
    )]
    threshold: Similarity,
    #[arg(
        long = "duplicates",
        value_enum,
        default_value = "last-write-wins",
        help = "How colliding question keys are kept in the index"
    )]
    duplicates: DuplicateKeyPolicy,
    #[arg(long, help = "Log per-window and per-batch progress detail")]
    debug: bool,
}

/// Entry point for the `merge-datasets` binary.
pub fn run_merge_datasets<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let Some(cli) = parse_cli::<MergeDatasetsCli, _>(
        std::iter::once("merge-datasets".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    init_tracing(cli.debug);

    let chunk_size = if cli.single_pass {
        None
    } else {
        Some(cli.chunk_size)
    };
    let mut config = MergeConfig::default()
        .with_data_dir(cli.data_dir)
        .with_store_format(cli.store_format)
        .with_datasets(cli.dataset)
        .with_chunk_size(chunk_size)
        .with_batch_size(cli.batch_size)
        .with_threshold(cli.threshold)
        .with_duplicate_policy(cli.duplicates);
    if let Some(store) = cli.store {
        config = config.with_store(store);
    }
    if let Some(output) = cli.output_dir {
        config = config.with_output_dir(output);
    }

    let stats = run_merge(&config, &CancelToken::new())?;
    print_summary(&config, &stats);
    Ok(())
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "reconcile=debug,info" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn print_summary(config: &MergeConfig, stats: &RunStats) {
    for dataset in &stats.datasets {
        println!(
            "{} dataset: processed {} questions, found matches for {} ({} exact, {} fuzzy), match rate {:.1}%",
            dataset.dataset,
            dataset.processed,
            dataset.matched(),
            dataset.exact_matches,
            dataset.fuzzy_matches,
            dataset.match_rate()
        );
    }
    println!(
        "Detailed report saved to {}",
        config.report_path().display()
    );
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed: usize = raw
        .parse()
        .map_err(|_| format!("invalid value '{raw}': must be a positive integer"))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_threshold(raw: &str) -> Result<Similarity, String> {
    let parsed: f64 = raw
        .parse()
        .map_err(|_| format!("invalid threshold '{raw}': must be a float"))?;
    if !parsed.is_finite() || parsed <= 0.0 || parsed > 1.0 {
        return Err(format!("threshold {parsed} is outside (0, 1]"));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<MergeDatasetsCli, clap::Error> {
        MergeDatasetsCli::try_parse_from(
            std::iter::once("merge-datasets").chain(args.iter().copied()),
        )
    }

    #[test]
    fn defaults_mirror_the_engine_constants() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.chunk_size, engine::DEFAULT_CHUNK_SIZE);
        assert_eq!(cli.batch_size, engine::DEFAULT_BATCH_SIZE);
        assert_eq!(cli.threshold, engine::DEFAULT_SIMILARITY_THRESHOLD);
        assert_eq!(cli.dataset, DatasetSelection::Both);
        assert_eq!(cli.duplicates, DuplicateKeyPolicy::LastWriteWins);
        assert!(!cli.single_pass);
    }

    #[test]
    fn enum_flags_parse_kebab_case_values() {
        let cli = parse(&[
            "--dataset",
            "dev",
            "--duplicates",
            "collect-all",
            "--store-format",
            "sqlite",
        ])
        .unwrap();
        assert_eq!(cli.dataset, DatasetSelection::Dev);
        assert_eq!(cli.duplicates, DuplicateKeyPolicy::CollectAll);
        assert_eq!(cli.store_format, StoreFormat::Sqlite);
    }

    #[test]
    fn out_of_range_knobs_are_rejected_at_parse_time() {
        assert!(parse(&["--threshold", "0.0"]).is_err());
        assert!(parse(&["--threshold", "1.5"]).is_err());
        assert!(parse(&["--chunk-size", "0"]).is_err());
        assert!(parse(&["--batch-size", "0"]).is_err());
    }

    #[test]
    fn single_pass_conflicts_with_an_explicit_chunk_size() {
        assert!(parse(&["--single-pass"]).is_ok());
        assert!(parse(&["--single-pass", "--chunk-size", "5"]).is_err());
    }
}
