//! Pose Feature Extractor CLI
//!
//! Builds exercise-recognition datasets from pose detections.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pose_feature_extractor::{
    config::{Config, ErrorPolicy, LabelSet},
    core::{
        dataset, BatchExtractor, BatchOptions, Dataset, DatasetWriter, FeatureExtractor,
        FeatureMode, RepCounter,
    },
    detector::DetectionReader,
    report::{create_shared_log_with_persistence, ExtractionLog},
    VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pose-features")]
#[command(version = VERSION)]
#[command(about = "Joint-angle and landmark features for exercise recognition", long_about = None)]
struct Cli {
    /// Log every processed frame
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a labeled dataset from detection records (JSON Lines)
    Extract {
        /// Detection records file (.jsonl, or .json array)
        #[arg(long, short)]
        input: PathBuf,

        /// Feature mode (angles, points or normalized_points)
        #[arg(long, short)]
        feature: Option<FeatureMode>,

        /// Output dataset file
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Accepted labels: a comma-separated list, "exercises" or "stages"
        #[arg(long)]
        labels: Option<String>,

        /// What to do with frames that fail (skip or abort)
        #[arg(long)]
        on_error: Option<ErrorPolicy>,

        /// Number of worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Append to an existing dataset instead of recreating it
        #[arg(long)]
        append: bool,
    },

    /// Print the dataset header for a feature mode
    Header {
        /// Feature mode (angles, points or normalized_points)
        #[arg(long, short, default_value = "angles")]
        feature: FeatureMode,
    },

    /// Drop rows with blank, NaN or infinite values
    Clean {
        /// Dataset to clean
        #[arg(long, short)]
        input: PathBuf,

        /// Cleaned dataset (defaults to <input>_clean.csv)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show class counts and per-column statistics of a dataset
    Summary {
        #[arg(long, short)]
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Count repetitions from per-frame predictions (CSV with exercise,stage)
    Reps {
        #[arg(long, short)]
        input: PathBuf,

        /// Frames in the exercise majority vote
        #[arg(long, default_value = "120")]
        exercise_window: usize,

        /// Frames that must agree on a stage
        #[arg(long, default_value = "5")]
        stage_window: usize,
    },

    /// Show statistics of the last extraction run
    Status,

    /// Show configuration
    Config {
        /// Write the current configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Extract {
            input,
            feature,
            output,
            labels,
            on_error,
            workers,
            append,
        } => cmd_extract(&input, feature, output, labels, on_error, workers, append),
        Commands::Header { feature } => {
            cmd_header(feature);
            Ok(())
        }
        Commands::Clean { input, output } => cmd_clean(&input, output),
        Commands::Summary { input, json } => cmd_summary(&input, json),
        Commands::Reps {
            input,
            exercise_window,
            stage_window,
        } => cmd_reps(&input, exercise_window, stage_window),
        Commands::Status => cmd_status(),
        Commands::Config { save } => cmd_config(save),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[allow(clippy::too_many_arguments)]
fn cmd_extract(
    input: &Path,
    feature: Option<FeatureMode>,
    output: Option<PathBuf>,
    labels: Option<String>,
    on_error: Option<ErrorPolicy>,
    workers: Option<usize>,
    append: bool,
) -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    let mode = feature.unwrap_or(config.feature_mode);
    let options = BatchOptions {
        mode,
        labels: labels
            .map(|l| LabelSet::from_csv(&l))
            .unwrap_or_else(|| config.labels.clone()),
        on_error: on_error.unwrap_or(config.on_error),
        workers: workers.unwrap_or(config.workers).max(1),
    };
    let output = output.unwrap_or_else(|| config.dataset_path(mode));

    println!("Pose Feature Extractor v{VERSION}");
    println!();
    println!("  Input: {}", input.display());
    println!("  Output: {}", output.display());
    println!("  Feature mode: {mode}");
    println!(
        "  Labels: {}",
        if options.labels.is_empty() {
            "any".to_string()
        } else {
            options.labels.labels().join(", ")
        }
    );
    println!("  On error: {}", options.on_error);
    println!("  Workers: {}", options.workers);
    println!();

    let extractor = FeatureExtractor::canonical();
    let header = dataset::header(&extractor, mode);
    let mut writer = if append {
        DatasetWriter::append(&output, &header)
    } else {
        DatasetWriter::create(&output, &header)
    }
    .with_context(|| format!("opening dataset {}", output.display()))?;

    let records = DetectionReader::open(input)
        .with_context(|| format!("opening detections {}", input.display()))?;

    let log = create_shared_log_with_persistence(config.log_path());
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")?;

    let batch = BatchExtractor::new(extractor, options, log.clone()).with_cancel_flag(cancel);
    let result = batch.run(records, &mut writer);

    if let Err(e) = log.save() {
        eprintln!("Warning: Could not save extraction log: {e}");
    }

    println!("{}", log.summary());
    println!();
    result?;
    println!("Wrote {} rows to {}", writer.rows_written(), output.display());
    Ok(())
}

fn cmd_header(feature: FeatureMode) {
    let extractor = FeatureExtractor::canonical();
    println!("{}", dataset::header(&extractor, feature).join(","));
}

fn cmd_clean(input: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
    let dataset =
        Dataset::read(input).with_context(|| format!("reading dataset {}", input.display()))?;
    let report = dataset.clean();

    println!("Before:");
    for (label, count) in &report.before {
        println!("  {label}: {count}");
    }
    println!("After:");
    for (label, count) in &report.after {
        println!("  {label}: {count}");
    }
    println!("Dropped {} incomplete rows", report.dropped);

    let output = output.unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        input.with_file_name(format!("{stem}_clean.csv"))
    });
    report
        .dataset
        .write(&output)
        .with_context(|| format!("writing dataset {}", output.display()))?;
    println!("Wrote cleaned dataset to {}", output.display());
    Ok(())
}

fn cmd_summary(input: &Path, json: bool) -> anyhow::Result<()> {
    let dataset =
        Dataset::read(input).with_context(|| format!("reading dataset {}", input.display()))?;
    let summary = dataset.summarize();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Dataset: {}", input.display());
    println!("Rows: {} ({} complete)", summary.rows, summary.complete_rows);
    println!();
    println!("Classes:");
    for (label, count) in &summary.class_counts {
        println!("  {label}: {count}");
    }
    println!();
    println!("{:<32} {:>12} {:>12} {:>12} {:>12}", "column", "mean", "std", "min", "max");
    let fmt = |v: Option<f64>| v.map(|v| format!("{v:.4}")).unwrap_or_else(|| "-".to_string());
    for column in &summary.columns {
        println!(
            "{:<32} {:>12} {:>12} {:>12} {:>12}",
            column.name,
            fmt(column.mean),
            fmt(column.std_dev),
            fmt(column.min),
            fmt(column.max)
        );
    }
    Ok(())
}

fn cmd_reps(input: &Path, exercise_window: usize, stage_window: usize) -> anyhow::Result<()> {
    let predictions =
        Dataset::read(input).with_context(|| format!("reading predictions {}", input.display()))?;

    let (exercise_col, stage_col) = prediction_columns(&predictions.header)
        .with_context(|| format!("reading predictions {}", input.display()))?;

    let mut counter = RepCounter::new(exercise_window, stage_window);
    let mut last = counter.state();
    for (frame, row) in predictions.rows.iter().enumerate() {
        let (Some(exercise), Some(stage)) = (row.get(exercise_col), row.get(stage_col)) else {
            eprintln!("Warning: Skipping short row at frame {frame}");
            continue;
        };
        let state = counter.process(exercise.trim(), stage.trim());
        if state != last {
            println!(
                "[frame {frame}] {} | stage: {} | reps: {}",
                state.exercise, state.stage, state.reps
            );
            last = state;
        }
    }

    println!();
    println!("Final: {} -> {} reps", last.exercise, last.reps);
    Ok(())
}

/// Column indices of the exercise and stage predictions.
///
/// Both headers must be present, or neither, in which case the first two
/// columns are used.
fn prediction_columns(header: &[String]) -> anyhow::Result<(usize, usize)> {
    let find = |name: &str| header.iter().position(|h| h.trim() == name);
    match (find("exercise"), find("stage")) {
        (Some(exercise), Some(stage)) => Ok((exercise, stage)),
        (None, None) if header.len() >= 2 => Ok((0, 1)),
        (None, None) => bail!("expected exercise and stage columns"),
        (Some(_), None) => bail!("found an exercise column but no stage column"),
        (None, Some(_)) => bail!("found a stage column but no exercise column"),
    }
}

fn cmd_status() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Pose Feature Extractor Status");
    println!("=============================");
    println!();

    match ExtractionLog::load_last(&config.log_path())? {
        Some(stats) => {
            println!("Last run: {} ({})", stats.run_id, stats.run_start.format("%Y-%m-%d %H:%M:%S"));
            println!("  Frames read: {}", stats.frames_read);
            println!("  Rows written: {}", stats.rows_written);
            println!("  Frames without pose: {}", stats.frames_without_pose);
            println!("  Unknown labels: {}", stats.unknown_labels);
            println!("  Failed frames: {}", stats.failed_frames());
            println!("  Duration: {}s", stats.run_duration_secs);
        }
        None => println!("No previous extraction run found."),
    }
    Ok(())
}

fn cmd_config(save: bool) -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    if save {
        config.save()?;
        config.ensure_directories()?;
        println!();
        println!("Saved configuration.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_prediction_columns() {
        assert_eq!(
            prediction_columns(&header(&["frame", "stage", "exercise"])).unwrap(),
            (2, 1)
        );
        assert_eq!(prediction_columns(&header(&["a", "b"])).unwrap(), (0, 1));
        assert!(prediction_columns(&header(&["a"])).is_err());

        // One named column must not make both lookups share a column.
        assert!(prediction_columns(&header(&["stage", "x"])).is_err());
        assert!(prediction_columns(&header(&["x", "exercise"])).is_err());
    }
}
