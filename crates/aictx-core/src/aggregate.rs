//! Fan-in consumer of the result stream.
//!
//! Exactly one aggregator owns the receiving end, so its tallies need no
//! locking. Every result bumps the completed counter and is forwarded to the
//! progress reporter; failures are appended in completion order.

use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use crate::error::PipelineError;
use crate::pool::ItemResult;
use crate::progress::ProgressReporter;

/// Final tallies of one drained result stream
#[derive(Debug, Default)]
pub struct Tally {
    pub completed: usize,
    pub artifacts: Vec<(String, PathBuf)>,
    pub failures: Vec<(String, PipelineError)>,
}

impl Tally {
    pub fn succeeded(&self) -> usize {
        self.artifacts.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

pub struct Aggregator<'r> {
    reporter: &'r dyn ProgressReporter,
    tally: Tally,
}

impl<'r> Aggregator<'r> {
    pub fn new(reporter: &'r dyn ProgressReporter) -> Self {
        Self {
            reporter,
            tally: Tally::default(),
        }
    }

    /// Account for one result
    pub fn record(&mut self, result: ItemResult) {
        match result.outcome {
            Ok(path) => self.tally.artifacts.push((result.location, path)),
            Err(e) => self
                .tally
                .failures
                .push((result.location, PipelineError::Collaborator(e))),
        }
        self.tally.completed += 1;
        self.reporter.advance(self.tally.completed);
    }

    /// Consume results until every sender has been dropped.
    pub fn drain(mut self, results: Receiver<ItemResult>) -> Tally {
        for result in results {
            self.record(result);
        }
        self.tally
    }
}
