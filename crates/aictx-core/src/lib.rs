//! aictx core - batch ingestion pipeline
//!
//! Classifies input locations, fans them out to a bounded pool of workers,
//! aggregates per-item results and progress, and cleans up the shared
//! scratch directory once every worker has finished.

pub mod aggregate;
pub mod artifact;
pub mod batch;
pub mod classify;
pub mod collaborator;
pub mod error;
pub mod logging;
pub mod pool;
pub mod progress;
pub mod scratch;
pub mod semaphore;
pub mod work_queue;

// Re-exports for convenience
pub use aggregate::{Aggregator, Tally};
pub use artifact::ArtifactNamer;
pub use batch::{BatchConfig, BatchOutcome, DEFAULT_BUDGET, DEFAULT_OUTPUT_DIR, Phase, run_batch};
pub use classify::{Rejected, SourceKind, WorkItem, classify, video_id};
pub use collaborator::{Collaborators, Produce, ProduceOptions, SharedOptions};
pub use error::{CollaboratorError, PipelineError, SetupError};
pub use logging::{IndicatifLogger, init_logging};
pub use pool::{ItemResult, Task, WorkerPool};
pub use progress::{IsolatedReporter, NoProgress, ProgressContext, ProgressReporter, SharedProgress, StatusLine};
pub use scratch::{Cleanup, IMAGE_DIR, ScratchDir};
pub use semaphore::{Permit, Semaphore};
pub use work_queue::WorkQueue;
