//! Progress reporting for TTY and non-TTY environments.
//!
//! The aggregator pushes completion counts through [`ProgressReporter`] and
//! never waits on rendering. [`StatusLine`] stores the latest count in an
//! atomic and a separate render thread draws it on a fixed tick, so a slow
//! terminal coalesces updates instead of slowing the batch.
//!
//! TTY mode: indicatif spinner line managed by a `MultiProgress`.
//! Non-TTY mode: one log line per rendered update.

use std::io::IsTerminal;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Default interval between renders
pub const RENDER_TICK: Duration = Duration::from_millis(200);

/// Observer of batch completion. Purely informational.
pub trait ProgressReporter: Send + Sync {
    /// Total number of dispatched items is known
    fn begin(&self, total: usize);
    /// `completed` items have finished so far; must not block
    fn advance(&self, completed: usize);
    /// The result stream is drained
    fn finish(&self);
}

/// Reporter that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn begin(&self, _total: usize) {}
    fn advance(&self, _completed: usize) {}
    fn finish(&self) {}
}

/// Keeps a panicking reporter from taking the batch down with it. The first
/// panic is logged and the wrapped reporter is not called again.
pub struct IsolatedReporter<'r> {
    inner: &'r dyn ProgressReporter,
    disabled: AtomicBool,
}

impl<'r> IsolatedReporter<'r> {
    pub fn new(inner: &'r dyn ProgressReporter) -> Self {
        Self {
            inner,
            disabled: AtomicBool::new(false),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    fn guard(&self, call: &str, f: impl FnOnce(&dyn ProgressReporter)) {
        if self.is_disabled() {
            return;
        }
        if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| f(self.inner))) {
            if !self.disabled.swap(true, Ordering::AcqRel) {
                log::warn!(
                    "progress reporter panicked in {call}: {}; progress disabled",
                    crate::pool::panic_message(payload.as_ref())
                );
            }
        }
    }
}

impl ProgressReporter for IsolatedReporter<'_> {
    fn begin(&self, total: usize) {
        self.guard("begin", |r| r.begin(total));
    }

    fn advance(&self, completed: usize) {
        self.guard("advance", |r| r.advance(completed));
    }

    fn finish(&self) {
        self.guard("finish", |r| r.finish());
    }
}

pub fn status_text(completed: usize, total: usize) -> String {
    format!("{completed}/{total} finished")
}

/// Snapshot handed to a render callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub completed: usize,
    pub total: usize,
    /// Last frame; the line will not be drawn again
    pub done: bool,
}

impl Frame {
    pub fn text(&self) -> String {
        status_text(self.completed, self.total)
    }
}

#[derive(Default)]
struct Counts {
    completed: AtomicUsize,
    total: AtomicUsize,
}

/// Coalescing `"{completed}/{total} finished"` line drawn off-thread.
pub struct StatusLine {
    counts: Arc<Counts>,
    stop: Mutex<Option<Sender<()>>>,
    renderer: Mutex<Option<JoinHandle<()>>>,
}

impl StatusLine {
    /// Start the render thread. `render` runs only on that thread, at most
    /// once per `tick`, and only when the counts changed (plus a final frame).
    pub fn spawn(
        tick: Duration,
        mut render: impl FnMut(Frame) + Send + 'static,
    ) -> std::io::Result<Self> {
        let counts = Arc::new(Counts::default());
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let shared = counts.clone();
        let renderer = std::thread::Builder::new()
            .name("aictx-progress".into())
            .spawn(move || {
                let mut last = None;
                loop {
                    let done = !matches!(stop_rx.recv_timeout(tick), Err(RecvTimeoutError::Timeout));
                    let frame = Frame {
                        completed: shared.completed.load(Ordering::Relaxed),
                        total: shared.total.load(Ordering::Relaxed),
                        done,
                    };
                    if done || last != Some((frame.completed, frame.total)) {
                        render(frame);
                        last = Some((frame.completed, frame.total));
                    }
                    if done {
                        break;
                    }
                }
            })?;

        Ok(Self {
            counts,
            stop: Mutex::new(Some(stop_tx)),
            renderer: Mutex::new(Some(renderer)),
        })
    }

    fn stop(&self) {
        let stop = self.stop.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(stop) = stop {
            // a dead renderer has already dropped the receiver
            let _ = stop.send(());
        }
        let handle = self
            .renderer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::warn!("progress renderer panicked; status line disabled");
            }
        }
    }
}

impl ProgressReporter for StatusLine {
    fn begin(&self, total: usize) {
        self.counts.total.store(total, Ordering::Relaxed);
    }

    fn advance(&self, completed: usize) {
        self.counts.completed.fetch_max(completed, Ordering::Relaxed);
    }

    fn finish(&self) {
        self.stop();
    }
}

impl Drop for StatusLine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Central progress context owning the `MultiProgress`.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
    tick: Duration,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: std::io::stderr().is_terminal(),
            tick: RENDER_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Batch status line for `label`.
    ///
    /// TTY: spinner line with the running count.
    /// Non-TTY: the count is logged at info level whenever it changes.
    pub fn status_line(&self, label: &str) -> std::io::Result<StatusLine> {
        if !self.is_tty {
            let label = label.to_string();
            return StatusLine::spawn(self.tick, move |frame| {
                if frame.total > 0 {
                    log::info!("{label}: {}", frame.text());
                }
            });
        }

        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {prefix:<10.cyan.bold} {wide_msg}")
                .expect("invalid template"),
        );
        pb.set_prefix(label.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        StatusLine::spawn(self.tick, move |frame| {
            if frame.done {
                pb.finish_with_message(frame.text());
            } else {
                pb.set_message(frame.text());
            }
        })
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;
