//! Bounded worker pool.
//!
//! The dispatch loop runs on the caller's thread. It takes tasks from the
//! queue in enqueue order, blocks on the admission semaphore, and spawns one
//! execution unit per task onto a rayon pool sized to the budget. A unit
//! holds its permit until it has sent its result, so at most `budget`
//! collaborator calls are ever in flight. The in-place scope is the join
//! barrier: [`WorkerPool::run`] returns only after every unit finished, and
//! the result sender is dropped on return, closing the stream.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Instant;

use crate::classify::{SourceKind, WorkItem};
use crate::collaborator::{Collaborators, SharedOptions};
use crate::error::{CollaboratorError, SetupError};
use crate::semaphore::Semaphore;
use crate::work_queue::WorkQueue;

/// A work item with its assigned artifact path
#[derive(Debug, Clone)]
pub struct Task {
    pub item: WorkItem,
    pub artifact: PathBuf,
}

/// Exactly one per dispatched task
#[derive(Debug)]
pub struct ItemResult {
    pub location: String,
    pub kind: SourceKind,
    pub outcome: Result<PathBuf, CollaboratorError>,
}

impl ItemResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

pub struct WorkerPool<'c> {
    collaborators: &'c Collaborators,
    admission: Semaphore,
    threads: rayon::ThreadPool,
}

impl<'c> WorkerPool<'c> {
    /// Build a pool allowing `budget` concurrent collaborator calls (min 1).
    pub fn new(collaborators: &'c Collaborators, budget: usize) -> Result<Self, SetupError> {
        let admission = Semaphore::new(budget);
        let threads = rayon::ThreadPoolBuilder::new()
            .num_threads(admission.capacity())
            .thread_name(|i| format!("aictx-worker-{i}"))
            .build()
            .map_err(|e| SetupError::Threads(e.to_string()))?;
        Ok(Self {
            collaborators,
            admission,
            threads,
        })
    }

    pub fn budget(&self) -> usize {
        self.admission.capacity()
    }

    /// Dispatch every queued task and block until all of them finished.
    ///
    /// Sends one [`ItemResult`] per task on `results` and returns the number
    /// of tasks dispatched.
    pub fn run(
        &self,
        tasks: WorkQueue<Task>,
        shared: &SharedOptions,
        results: Sender<ItemResult>,
    ) -> usize {
        let collaborators = self.collaborators;
        let mut dispatched = 0;

        self.threads.in_place_scope(|scope| {
            for task in tasks {
                let permit = self.admission.acquire();
                let results = results.clone();
                scope.spawn(move |_| {
                    let result = execute(collaborators, task, shared);
                    if results.send(result).is_err() {
                        log::error!("result stream closed early; result dropped");
                    }
                    drop(permit);
                });
                dispatched += 1;
            }
        });

        log::debug!("pool drained: {dispatched} tasks joined");
        dispatched
    }
}

/// Run one collaborator call, converting a panic into an error result.
fn execute(collaborators: &Collaborators, task: Task, shared: &SharedOptions) -> ItemResult {
    let Task { item, artifact } = task;
    let options = shared.for_artifact(&artifact);
    let producer = collaborators.for_kind(item.kind);
    let start = Instant::now();

    log::debug!("{}: producing {} artifact", item.location, item.kind);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        producer.produce(&item.location, &options)
    }))
    .unwrap_or_else(|payload| Err(CollaboratorError::Panicked(panic_message(payload.as_ref()))));

    match &outcome {
        Ok(path) => log::info!(
            "{}: wrote {} [{:.1}s]",
            item.location,
            path.display(),
            start.elapsed().as_secs_f64()
        ),
        Err(e) => log::error!("{}: {e}", item.location),
    }

    ItemResult {
        location: item.location,
        kind: item.kind,
        outcome,
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{Produce, ProduceOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, mpsc};
    use std::time::Duration;

    /// Collaborator tracking the concurrency high-water mark
    #[derive(Default)]
    struct Gauge {
        in_flight: AtomicUsize,
        high_water: AtomicUsize,
        calls: AtomicUsize,
    }

    impl Produce for Gauge {
        fn produce(
            &self,
            location: &str,
            options: &ProduceOptions<'_>,
        ) -> Result<PathBuf, CollaboratorError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(15));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            if location.contains("fail") {
                return Err(CollaboratorError::Parse("bad input".into()));
            }
            if location.contains("panic") {
                panic!("collaborator exploded on {location}");
            }
            Ok(options.artifact.to_path_buf())
        }
    }

    fn tasks(locations: &[&str]) -> WorkQueue<Task> {
        WorkQueue::new(locations.iter().enumerate().map(|(i, loc)| Task {
            item: WorkItem {
                location: loc.to_string(),
                kind: SourceKind::Directory,
            },
            artifact: PathBuf::from(format!("out/{i}.md")),
        }))
    }

    fn run_pool(gauge: &Arc<Gauge>, budget: usize, locations: &[&str]) -> Vec<ItemResult> {
        let collaborators = Collaborators::uniform(gauge.clone());
        let pool = WorkerPool::new(&collaborators, budget).unwrap();
        let (tx, rx) = mpsc::channel();
        let dispatched = pool.run(tasks(locations), &SharedOptions::default(), tx);
        let results: Vec<ItemResult> = rx.iter().collect();
        assert_eq!(dispatched, locations.len());
        results
    }

    #[test]
    fn one_result_per_task() {
        let gauge = Arc::new(Gauge::default());
        let locations: Vec<String> = (0..20).map(|i| format!("./item{i}")).collect();
        let refs: Vec<&str> = locations.iter().map(String::as_str).collect();
        let results = run_pool(&gauge, 4, &refs);

        assert_eq!(results.len(), 20);
        let mut seen: Vec<&str> = results.iter().map(|r| r.location.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 20, "no duplicates");
        assert_eq!(gauge.calls.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn never_exceeds_budget() {
        for budget in [1, 2, 3] {
            let gauge = Arc::new(Gauge::default());
            let locations = ["./a"; 12];
            run_pool(&gauge, budget, &locations);
            let high = gauge.high_water.load(Ordering::SeqCst);
            assert!(high <= budget, "budget {budget}, high-water {high}");
            assert!(high >= 1);
        }
    }

    #[test]
    fn failures_and_panics_become_results() {
        let gauge = Arc::new(Gauge::default());
        let results = run_pool(&gauge, 2, &["./ok", "./fail", "./panic", "./ok2"]);
        assert_eq!(results.len(), 4);

        let panicked = results.iter().find(|r| r.location == "./panic").unwrap();
        match &panicked.outcome {
            Err(CollaboratorError::Panicked(msg)) => {
                assert!(msg.contains("collaborator exploded"))
            }
            other => panic!("expected panic result, got {other:?}"),
        }
        let failed = results.iter().find(|r| r.location == "./fail").unwrap();
        assert!(matches!(failed.outcome, Err(CollaboratorError::Parse(_))));
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    }

    #[test]
    fn empty_queue_closes_stream() {
        let gauge = Arc::new(Gauge::default());
        let results = run_pool(&gauge, 3, &[]);
        assert!(results.is_empty());
    }

    #[test]
    fn zero_budget_is_clamped() {
        let gauge = Arc::new(Gauge::default());
        let collaborators = Collaborators::uniform(gauge.clone());
        let pool = WorkerPool::new(&collaborators, 0).unwrap();
        assert_eq!(pool.budget(), 1);
    }

    #[test]
    fn panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic payload");
    }
}
