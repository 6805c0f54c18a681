//! Batch coordinator: classify, dispatch, drain, clean up.

use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::aggregate::{Aggregator, Tally};
use crate::artifact::ArtifactNamer;
use crate::classify::{Rejected, classify};
use crate::collaborator::{Collaborators, SharedOptions};
use crate::error::{PipelineError, SetupError};
use crate::pool::{Task, WorkerPool};
use crate::progress::{IsolatedReporter, ProgressReporter};
use crate::scratch::ScratchDir;
use crate::work_queue::WorkQueue;

/// Default number of concurrent collaborator calls
pub const DEFAULT_BUDGET: usize = 5;

/// Default output directory
pub const DEFAULT_OUTPUT_DIR: &str = "context";

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub output_dir: PathBuf,
    /// Concurrency budget; 0 is treated as 1
    pub budget: usize,
    pub ignore_patterns: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            budget: DEFAULT_BUDGET,
            ignore_patterns: Vec::new(),
        }
    }
}

/// Coordinator lifecycle. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    Classifying,
    Dispatching,
    Draining,
    CleaningUp,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Classifying => "classifying",
            Self::Dispatching => "dispatching",
            Self::Draining => "draining",
            Self::CleaningUp => "cleaning up",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct PhaseTracker {
    current: Phase,
    history: Vec<Phase>,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            current: Phase::Idle,
            history: vec![Phase::Idle],
        }
    }

    fn enter(&mut self, next: Phase) {
        debug_assert!(next > self.current, "{} -> {}", self.current, next);
        log::debug!("batch: {} -> {}", self.current, next);
        self.current = next;
        self.history.push(next);
    }
}

/// Final result of one batch
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Items whose collaborator produced an artifact
    pub succeeded: usize,
    /// Dispatched items whose collaborator failed
    pub failed: usize,
    /// Locations the classifier rejected (never dispatched)
    pub rejected: usize,
    /// `(location, artifact)` for every success, in completion order
    pub artifacts: Vec<(String, PathBuf)>,
    /// Rejections first, then item failures in completion order, then a
    /// cleanup failure if any
    pub errors: Vec<(String, PipelineError)>,
    pub elapsed: Duration,
    phases: Vec<Phase>,
}

impl BatchOutcome {
    /// No rejection, item failure or cleanup failure
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn dispatched(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Phases the coordinator went through, in order
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn log(&self) {
        log::info!("=== Batch Summary ===");
        log::info!(
            "Items: {}/{} succeeded ({} failed, {} rejected)",
            self.succeeded,
            self.dispatched(),
            self.failed,
            self.rejected
        );
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        for (location, err) in &self.errors {
            log::warn!("{location}: {err}");
        }
    }
}

/// Run one batch to completion.
///
/// Only a [`SetupError`] aborts; every per-item failure is recorded in the
/// returned outcome. Blocks until every dispatched item has finished.
pub fn run_batch<S: AsRef<str>>(
    locations: &[S],
    config: &BatchConfig,
    collaborators: &Collaborators,
    reporter: &dyn ProgressReporter,
) -> Result<BatchOutcome, SetupError> {
    let start = Instant::now();
    let mut phase = PhaseTracker::new();

    phase.enter(Phase::Classifying);
    let mut namer = ArtifactNamer::new(&config.output_dir);
    let mut tasks = Vec::new();
    let mut rejected: Vec<Rejected> = Vec::new();
    for location in locations {
        match classify(location.as_ref()) {
            Ok(item) => {
                log::debug!("{}: {}", item.location, item.kind);
                let artifact = namer.assign(&item);
                tasks.push(Task { item, artifact });
            }
            Err(e) => {
                log::warn!("{e}");
                rejected.push(e);
            }
        }
    }

    let mut outcome = BatchOutcome {
        rejected: rejected.len(),
        errors: rejected
            .into_iter()
            .map(|e| (e.location.clone(), PipelineError::Classification(e)))
            .collect(),
        ..BatchOutcome::default()
    };

    if tasks.is_empty() {
        log::warn!("no locations to process");
        phase.enter(Phase::Done);
        outcome.elapsed = start.elapsed();
        outcome.phases = phase.history;
        return Ok(outcome);
    }

    let scratch = ScratchDir::prepare(&config.output_dir)?;
    let pool = WorkerPool::new(collaborators, config.budget)?;
    let shared = SharedOptions {
        ignore_patterns: config.ignore_patterns.clone(),
        image_dir: scratch.image_dir().to_path_buf(),
    };
    log::info!(
        "Processing {} locations with {} workers",
        tasks.len(),
        pool.budget()
    );

    phase.enter(Phase::Dispatching);
    let isolated = IsolatedReporter::new(reporter);
    let reporter: &dyn ProgressReporter = &isolated;
    let queue = WorkQueue::new(tasks);
    reporter.begin(queue.total());
    let (tx, rx) = mpsc::channel();

    let tally: Tally = std::thread::scope(|s| -> Result<Tally, SetupError> {
        let aggregator = std::thread::Builder::new()
            .name("aictx-aggregate".into())
            .spawn_scoped(s, move || Aggregator::new(reporter).drain(rx))
            .map_err(|e| SetupError::Threads(e.to_string()))?;

        pool.run(queue, &shared, tx);
        phase.enter(Phase::Draining);

        match aggregator.join() {
            Ok(tally) => Ok(tally),
            Err(payload) => std::panic::resume_unwind(payload),
        }
    })?;
    reporter.finish();

    phase.enter(Phase::CleaningUp);
    outcome.succeeded = tally.succeeded();
    outcome.failed = tally.failed();
    outcome.artifacts = tally.artifacts;
    outcome.errors.extend(tally.failures);
    if let Err(e) = scratch.cleanup() {
        log::warn!("{e}");
        outcome
            .errors
            .push((scratch.image_dir().display().to_string(), e));
    }

    phase.enter(Phase::Done);
    outcome.elapsed = start.elapsed();
    outcome.phases = phase.history;
    Ok(outcome)
}
