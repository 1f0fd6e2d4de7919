//! Sequential batch control: inter-call delay, per-call timeout,
//! cancellation between rows, progress reporting.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::GeocodeError;

/// Shared flag used to stop a batch between two rows.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives batch progress (e.g. a terminal progress bar).
pub trait Progress: Send + Sync {
    fn start(&self, total: usize);
    fn advance(&self);
    fn finish(&self);
}

impl Progress for indicatif::ProgressBar {
    fn start(&self, total: usize) {
        self.set_length(total as u64);
        self.set_position(0);
    }

    fn advance(&self) {
        self.inc(1);
    }

    fn finish(&self) {
        indicatif::ProgressBar::finish(self);
    }
}

/// Explicit pacing policy for loops that call external services.
#[derive(Clone)]
pub struct BatchControl {
    /// Minimum spacing between the end of one call and the start of the next
    pub delay: Duration,
    /// Upper bound for a single call
    pub timeout: Duration,
    pub cancel: CancelFlag,
    progress: Option<Arc<dyn Progress>>,
}

impl fmt::Debug for BatchControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchControl")
            .field("delay", &self.delay)
            .field("timeout", &self.timeout)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl BatchControl {
    pub fn new(delay: Duration, timeout: Duration) -> Self {
        Self {
            delay,
            timeout,
            cancel: CancelFlag::new(),
            progress: None,
        }
    }

    /// No delay between calls; for offline collaborators and tests.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::from_secs(30))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Begin a loop over `total` rows.
    pub fn start(&self, total: usize) -> BatchRun<'_> {
        if let Some(progress) = &self.progress {
            progress.start(total);
        }
        BatchRun {
            control: self,
            last_call: None,
            completed: 0,
            interrupted: false,
        }
    }
}

impl Default for BatchControl {
    fn default() -> Self {
        Self::new(Duration::from_millis(1100), Duration::from_secs(10))
    }
}

/// State of one running batch loop.
pub struct BatchRun<'a> {
    control: &'a BatchControl,
    last_call: Option<Instant>,
    completed: usize,
    interrupted: bool,
}

impl BatchRun<'_> {
    /// Check for cancellation before starting the next row.
    ///
    /// Returns `false` once cancellation was requested; the caller must stop
    /// and keep what it has.
    pub fn proceed(&mut self) -> bool {
        if self.control.cancel.is_cancelled() {
            if !self.interrupted {
                warn!("Batch interrupted after {} rows", self.completed);
            }
            self.interrupted = true;
            return false;
        }
        true
    }

    /// Run one external call: wait out the delay since the previous call,
    /// then bound the call by the timeout.
    pub async fn call<T, F>(&mut self, call: F) -> Result<T, GeocodeError>
    where
        F: Future<Output = Result<T, GeocodeError>>,
    {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.control.delay {
                let wait = self.control.delay - elapsed;
                debug!("Waiting {:?} before next request", wait);
                tokio::time::sleep(wait).await;
            }
        }

        let result = tokio::time::timeout(self.control.timeout, call).await;
        self.last_call = Some(Instant::now());

        match result {
            Ok(inner) => inner,
            Err(_) => Err(GeocodeError::Timeout(self.control.timeout)),
        }
    }

    /// Mark the current row as done.
    pub fn complete_row(&mut self) {
        self.completed += 1;
        if let Some(progress) = &self.control.progress {
            progress.advance();
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    /// Close the loop. Returns whether it was interrupted.
    pub fn finish(self) -> bool {
        if let Some(progress) = &self.control.progress {
            progress.finish();
        }
        self.interrupted
    }
}
