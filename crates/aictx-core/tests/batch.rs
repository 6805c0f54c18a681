//! Batch coordinator behaviour against instrumented collaborators.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use aictx_core::{
    BatchConfig, CollaboratorError, Collaborators, NoProgress, PipelineError, Produce,
    ProduceOptions, ProgressReporter, SourceKind, run_batch,
};
use tempfile::TempDir;

/// Writes the artifact and records when each call started and ended.
#[derive(Default)]
struct Timed {
    spans: Mutex<Vec<(Instant, Instant)>>,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
}

impl Produce for Timed {
    fn produce(
        &self,
        location: &str,
        options: &ProduceOptions<'_>,
    ) -> Result<PathBuf, CollaboratorError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);
        let start = Instant::now();
        std::thread::sleep(Duration::from_millis(20));
        std::fs::write(options.artifact, format!("# {location}\n"))?;
        let end = Instant::now();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.spans.lock().unwrap().push((start, end));
        Ok(options.artifact.to_path_buf())
    }
}

/// Page collaborator that drops a file into the shared image directory
struct ImageWriter;

impl Produce for ImageWriter {
    fn produce(
        &self,
        _location: &str,
        options: &ProduceOptions<'_>,
    ) -> Result<PathBuf, CollaboratorError> {
        std::fs::write(options.image_dir.join("logo.png"), b"\x89PNG")?;
        std::fs::write(options.artifact, "page")?;
        Ok(options.artifact.to_path_buf())
    }
}

/// Fails everything it is given
struct Failing;

impl Produce for Failing {
    fn produce(
        &self,
        location: &str,
        _options: &ProduceOptions<'_>,
    ) -> Result<PathBuf, CollaboratorError> {
        Err(CollaboratorError::Http {
            status: Some(404),
            message: format!("{location} not found"),
        })
    }
}

#[derive(Default)]
struct CountingReporter {
    total: AtomicUsize,
    ticks: AtomicUsize,
    last: AtomicUsize,
    finished: AtomicUsize,
}

impl ProgressReporter for CountingReporter {
    fn begin(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }
    fn advance(&self, completed: usize) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        self.last.fetch_max(completed, Ordering::SeqCst);
    }
    fn finish(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

fn config(tmp: &TempDir, budget: usize) -> BatchConfig {
    BatchConfig {
        output_dir: tmp.path().join("context"),
        budget,
        ignore_patterns: Vec::new(),
    }
}

#[test]
fn mixed_batch_dispatches_only_accepted_locations() {
    let tmp = TempDir::new().unwrap();
    let timed = Arc::new(Timed::default());
    let collaborators = Collaborators::uniform(timed.clone());
    let reporter = CountingReporter::default();

    let locations = [
        "https://example.com/",
        "./localdir",
        "https://youtu.be/abc123",
        "not a url",
    ];
    let outcome = run_batch(&locations, &config(&tmp, 2), &collaborators, &reporter).unwrap();

    assert_eq!(outcome.dispatched(), 3);
    assert_eq!(outcome.succeeded + outcome.failed, 3);
    assert_eq!(outcome.rejected, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].0, "not a url");

    assert_eq!(reporter.total.load(Ordering::SeqCst), 3);
    assert_eq!(reporter.ticks.load(Ordering::SeqCst), 3);
    assert_eq!(reporter.last.load(Ordering::SeqCst), 3);
    assert_eq!(reporter.finished.load(Ordering::SeqCst), 1);

    for (_, artifact) in &outcome.artifacts {
        assert!(artifact.is_file(), "{} missing", artifact.display());
    }
}

#[test]
fn budget_of_one_serializes_calls() {
    let tmp = TempDir::new().unwrap();
    let timed = Arc::new(Timed::default());
    let collaborators = Collaborators::uniform(timed.clone());
    let locations: Vec<String> = (0..5).map(|i| format!("./dir{i}")).collect();

    let outcome = run_batch(&locations, &config(&tmp, 1), &collaborators, &NoProgress).unwrap();
    assert_eq!(outcome.succeeded, 5);
    assert_eq!(timed.high_water.load(Ordering::SeqCst), 1);

    let mut spans = timed.spans.lock().unwrap().clone();
    spans.sort();
    for pair in spans.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "scans overlapped");
    }
}

#[test]
fn concurrency_never_exceeds_budget() {
    let tmp = TempDir::new().unwrap();
    let timed = Arc::new(Timed::default());
    let collaborators = Collaborators::uniform(timed.clone());
    let locations: Vec<String> = (0..16).map(|i| format!("./d{i}")).collect();

    let outcome = run_batch(&locations, &config(&tmp, 3), &collaborators, &NoProgress).unwrap();
    assert_eq!(outcome.succeeded, 16);
    assert!(timed.high_water.load(Ordering::SeqCst) <= 3);
}

#[test]
fn failures_are_local_to_their_item() {
    let tmp = TempDir::new().unwrap();
    let timed: Arc<dyn Produce> = Arc::new(Timed::default());
    let collaborators = Collaborators::new(timed.clone(), timed.clone(), timed, Arc::new(Failing));

    let locations = [
        "./a",
        "https://example.com/one",
        "./b",
        "https://example.com/two",
    ];
    let outcome = run_batch(&locations, &config(&tmp, 4), &collaborators, &NoProgress).unwrap();

    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.failed, 2);
    assert!(!outcome.is_success());
    let mut failed: Vec<&str> = outcome.errors.iter().map(|(l, _)| l.as_str()).collect();
    failed.sort_unstable();
    assert_eq!(failed, ["https://example.com/one", "https://example.com/two"]);
    assert!(
        outcome
            .errors
            .iter()
            .all(|(_, e)| matches!(e, PipelineError::Collaborator(CollaboratorError::Http { .. })))
    );
}

#[test]
fn duplicate_locations_get_distinct_artifacts() {
    let tmp = TempDir::new().unwrap();
    let collaborators = Collaborators::uniform(Arc::new(Timed::default()));
    let outcome = run_batch(
        &["./docs", "./docs", "./other/docs"],
        &config(&tmp, 3),
        &collaborators,
        &NoProgress,
    )
    .unwrap();

    let mut names: Vec<String> = outcome
        .artifacts
        .iter()
        .map(|(_, p)| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["dir-docs-2.md", "dir-docs-3.md", "dir-docs.md"]);
}

#[test]
fn empty_image_directory_is_removed_every_run() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(&tmp, 2);
    let collaborators = Collaborators::uniform(Arc::new(Timed::default()));

    for _ in 0..2 {
        let outcome = run_batch(&["./a", "./b"], &cfg, &collaborators, &NoProgress).unwrap();
        assert!(outcome.is_success());
        assert!(!cfg.output_dir.join("images").exists());
    }
}

/// Reporter whose rendering blows up on the first update
struct Broken;

impl ProgressReporter for Broken {
    fn begin(&self, _total: usize) {}
    fn advance(&self, _completed: usize) {
        panic!("terminal went away");
    }
    fn finish(&self) {}
}

#[test]
fn panicking_reporter_does_not_abort_the_batch() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(&tmp, 2);
    let collaborators = Collaborators::uniform(Arc::new(Timed::default()));

    let outcome = run_batch(&["./a", "./b"], &cfg, &collaborators, &Broken).unwrap();

    assert_eq!(outcome.succeeded, 2);
    assert!(outcome.is_success());
    assert!(cfg.output_dir.join("dir-a.md").is_file());
    // cleanup still ran
    assert!(!cfg.output_dir.join("images").exists());
}

#[test]
fn existing_images_survive_a_batch_without_pages() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(&tmp, 2);
    let images = cfg.output_dir.join("images");
    std::fs::create_dir_all(&images).unwrap();
    std::fs::write(images.join("earlier.png"), b"png").unwrap();

    let collaborators = Collaborators::uniform(Arc::new(Timed::default()));
    let outcome = run_batch(&["./a"], &cfg, &collaborators, &NoProgress).unwrap();

    assert!(outcome.is_success());
    assert!(images.join("earlier.png").is_file());
}

#[test]
fn images_written_by_workers_are_kept() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(&tmp, 2);
    let timed: Arc<dyn Produce> = Arc::new(Timed::default());
    let collaborators = Collaborators::new(timed.clone(), timed.clone(), timed, Arc::new(ImageWriter));

    let outcome = run_batch(
        &["https://example.com/", "./a"],
        &cfg,
        &collaborators,
        &NoProgress,
    )
    .unwrap();

    assert!(outcome.is_success());
    assert!(cfg.output_dir.join("images/logo.png").is_file());
}

#[test]
fn artifacts_carry_their_kind_prefix() {
    let tmp = TempDir::new().unwrap();
    let collaborators = Collaborators::uniform(Arc::new(Timed::default()));
    let outcome = run_batch(
        &[
            "https://github.com/owner/name",
            "https://youtu.be/vid",
            "./src",
            "https://example.com/docs",
        ],
        &config(&tmp, 2),
        &collaborators,
        &NoProgress,
    )
    .unwrap();

    for kind in SourceKind::ALL {
        let prefix = format!("{}-", kind.artifact_prefix());
        assert!(
            outcome.artifacts.iter().any(|(_, p)| p
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with(&prefix))),
            "no {kind} artifact"
        );
    }
}
