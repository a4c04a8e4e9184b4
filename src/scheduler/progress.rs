use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use log::info;
use tokio::task::JoinHandle;

/// Live counters for a run in flight.
#[derive(Debug)]
pub struct Progress {
    total: usize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

/// Point-in-time copy of [`Progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl ProgressSnapshot {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.completed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    pub fn record(&self, success: bool) {
        if !success {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// Log progress every `interval` until the run is done.
///
/// The returned handle is aborted by the dispatcher once every outcome has
/// been collected, so a slow interval never delays the end of a run.
pub(crate) fn spawn_reporter(progress: Arc<Progress>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_reported = 0;

        loop {
            tokio::time::sleep(interval).await;

            let snapshot = progress.snapshot();
            if snapshot.completed != last_reported {
                info!("Upload progress: {}/{} files ({:.1}%), {} failed",
                      snapshot.completed, snapshot.total, snapshot.percentage(), snapshot.failed);
                last_reported = snapshot.completed;
            }

            if snapshot.is_done() {
                break;
            }
        }
    })
}
