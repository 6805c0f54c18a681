//! Run subcommand - turn a batch of locations into context files

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use aictx_core::{BatchConfig, BatchOutcome, NoProgress, ProgressReporter, SharedProgress, run_batch};
use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::{Config, WorkersConfig};

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["url", "file"])))]
pub struct RunArgs {
    /// Single location: repository URL, video link, web page or local directory
    #[arg(short, long)]
    pub url: Option<String>,

    /// File with one location per line
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Extra ignore patterns, comma separated (e.g. "*.csv,fixtures")
    #[arg(short, long, value_delimiter = ',')]
    pub ignore: Vec<String>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: RunArgs, config: &Config, progress: &SharedProgress, quiet: bool) -> Result<ExitCode> {
    let locations = match (&args.url, &args.file) {
        (Some(url), _) => vec![url.trim().to_string()],
        (None, Some(path)) => read_locations(path)?,
        (None, None) => anyhow::bail!("either --url or --file is required"),
    };

    let batch_config = BatchConfig {
        output_dir: args.output.unwrap_or_else(|| config.output.dir.clone()),
        budget: resolve_budget(args.threads, &config.workers),
        ignore_patterns: merge_patterns(&config.ignore.patterns, &args.ignore),
    };
    log::info!("Output: {}", batch_config.output_dir.display());
    if !batch_config.ignore_patterns.is_empty() {
        log::info!("Ignoring: {}", batch_config.ignore_patterns.join(", "));
    }

    let collaborators = aictx_sources::collaborators(config.endpoints());

    let status = if quiet {
        None
    } else {
        match progress.status_line("aictx") {
            Ok(line) => Some(line),
            Err(e) => {
                log::warn!("progress display unavailable: {e}");
                None
            }
        }
    };
    let reporter: &dyn ProgressReporter = match &status {
        Some(line) => line,
        None => &NoProgress,
    };

    let outcome = run_batch(&locations, &batch_config, &collaborators, reporter)
        .with_context(|| format!("Failed to prepare {}", batch_config.output_dir.display()))?;
    drop(status);

    if !progress.is_tty() {
        outcome.log();
    }
    print_summary(&outcome, &batch_config.output_dir);

    if outcome.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        print_failures(&outcome);
        Ok(ExitCode::FAILURE)
    }
}

/// One location per line; surrounding whitespace trimmed, blank lines skipped
pub fn read_locations(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read location list: {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// CLI value, else the configured default, capped at the configured maximum
fn resolve_budget(requested: Option<usize>, workers: &WorkersConfig) -> usize {
    let max = workers.max.max(1);
    let budget = requested.unwrap_or(workers.default).max(1);
    if budget > max {
        log::warn!("{budget} workers requested, capping at {max}");
        return max;
    }
    budget
}

/// Configured patterns followed by CLI ones, without blanks or repeats
pub(crate) fn merge_patterns(configured: &[String], cli: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for pattern in configured.iter().chain(cli).map(|p| p.trim()) {
        if !pattern.is_empty() && !merged.iter().any(|p| p == pattern) {
            merged.push(pattern.to_string());
        }
    }
    merged
}

fn styled_table(headers: [&str; 2]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    table
}

fn print_summary(outcome: &BatchOutcome, output_dir: &Path) {
    let mut table = styled_table(["Batch", "Value"]);
    let rows = [
        ("Succeeded", outcome.succeeded.to_string()),
        ("Failed", outcome.failed.to_string()),
        ("Rejected", outcome.rejected.to_string()),
        ("Output", output_dir.display().to_string()),
        ("Time", format!("{:.1}s", outcome.elapsed.as_secs_f64())),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}

fn print_failures(outcome: &BatchOutcome) {
    let mut table = styled_table(["Location", "Error"]);
    for (location, err) in &outcome.errors {
        table.add_row(vec![Cell::new(location), Cell::new(err.to_string()).fg(Color::Red)]);
    }
    eprintln!("{table}");
}
