use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Deserialize};

/// One file-to-key upload unit.
///
/// Built by [`crate::enumerate::enumerate`] and consumed exactly once by the
/// scheduler. Fields are private so a task cannot be altered after it is
/// constructed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadTask {
    source_path: PathBuf,
    destination_key: String,
}

impl UploadTask {
    pub fn new(source_path: impl Into<PathBuf>, destination_key: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            destination_key: destination_key.into(),
        }
    }

    /// Local file the task reads from.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Object key inside the bucket, always forward-slash separated.
    pub fn destination_key(&self) -> &str {
        &self.destination_key
    }
}

/// Terminal state of a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Success,
    Failure(String),
}

impl UploadStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadStatus::Success)
    }

    /// Error detail for a failed task
    pub fn error_detail(&self) -> Option<&str> {
        match self {
            UploadStatus::Success => None,
            UploadStatus::Failure(detail) => Some(detail),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub task: UploadTask,
    pub status: UploadStatus,
    pub duration_micros: u64,
}

impl UploadOutcome {
    pub fn new(task: UploadTask, status: UploadStatus, duration: Duration) -> Self {
        Self {
            task,
            status,
            duration_micros: u64::try_from(duration.as_micros()).unwrap_or(u64::MAX),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_micros(self.duration_micros)
    }
}

/// Aggregate counts for a finished run.
///
/// Always derived from the complete outcome set via [`RunSummary::from_outcomes`],
/// which is a fold and therefore independent of completion order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub total_tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[UploadOutcome], elapsed: Duration) -> Self {
        outcomes.iter().fold(
            RunSummary { elapsed, ..Default::default() },
            |mut summary, outcome| {
                summary.total_tasks += 1;
                if outcome.status.is_success() {
                    summary.succeeded += 1;
                } else {
                    summary.failed += 1;
                }
                summary
            },
        )
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// The line printed once a run is over.
    pub fn elapsed_line(&self) -> String {
        format!("Elapsed time: {:.2}s", self.elapsed.as_secs_f64())
    }
}

/// Everything a run produced: the per-task outcomes in completion order and
/// the summary folded from them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    pub outcomes: Vec<UploadOutcome>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn new(outcomes: Vec<UploadOutcome>, elapsed: Duration) -> Self {
        let summary = RunSummary::from_outcomes(&outcomes, elapsed);
        Self { outcomes, summary }
    }

    /// Outcomes whose status is a failure.
    pub fn failures(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success())
    }

    /// Find the outcome produced for a destination key.
    pub fn outcome_for_key(&self, key: &str) -> Option<&UploadOutcome> {
        self.outcomes.iter().find(|o| o.task.destination_key() == key)
    }
}
