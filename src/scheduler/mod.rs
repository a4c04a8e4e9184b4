//! Concurrent upload scheduler.
//!
//! A [`Scheduler`] takes an ordered list of [`UploadTask`]s and drives every
//! one of them to exactly one [`UploadOutcome`](crate::models::UploadOutcome)
//! through the caller's [`Uploader`]. How the uploads run side by side is
//! chosen with a [`ConcurrencyPolicy`]; the call site is the same for all of
//! them.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dirpush::cloud::s3::{S3Options, S3Uploader};
//! use dirpush::enumerate::enumerate;
//! use dirpush::scheduler::{ConcurrencyPolicy, Scheduler};
//!
//! # fn main() -> anyhow::Result<()> {
//! let tasks = enumerate("./logs".as_ref(), "backups")?;
//! let uploader = Arc::new(S3Uploader::new(&S3Options::default())?);
//!
//! let report = Scheduler::new("my-bucket", ConcurrencyPolicy::BoundedPool { limit: 8 })
//!     .run(tasks, uploader)?;
//! println!("{} of {} uploaded", report.summary.succeeded, report.summary.total_tasks);
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod process;
pub mod progress;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use tokio::runtime::{Builder, Runtime};

use crate::cloud::Uploader;
use crate::constants::{DEFAULT_POOL_LIMIT, UPLOAD_PROGRESS_INTERVAL_SECS};
use crate::models::{RunReport, UploadTask};
use dispatch::{dispatch_all, DispatchOptions};
use process::{ProcessUploader, WorkerCommand};

/// How uploads are executed relative to each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConcurrencyPolicy {
    /// At most `limit` uploads in flight on a multi-threaded runtime.
    BoundedPool { limit: usize },

    /// Every task is started immediately, no cap.
    FanOut,

    /// All uploads interleave on the calling thread.
    Cooperative,

    /// One child process per upload, at most `limit` alive at once.
    ///
    /// The caller's uploader is not used; each child builds its own.
    Isolated { worker: WorkerCommand, limit: usize },
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        ConcurrencyPolicy::BoundedPool { limit: DEFAULT_POOL_LIMIT }
    }
}

impl ConcurrencyPolicy {
    /// Isolated policy running the current executable's worker subcommand,
    /// one child per CPU.
    pub fn isolated() -> std::io::Result<Self> {
        Ok(ConcurrencyPolicy::Isolated {
            worker: WorkerCommand::current_exe()?,
            limit: num_cpus::get(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConcurrencyPolicy::BoundedPool { .. } => "pool",
            ConcurrencyPolicy::FanOut => "fan-out",
            ConcurrencyPolicy::Cooperative => "cooperative",
            ConcurrencyPolicy::Isolated { .. } => "isolated",
        }
    }

    /// Maximum number of uploads in flight, `None` for uncapped.
    pub fn limit(&self) -> Option<usize> {
        match self {
            ConcurrencyPolicy::BoundedPool { limit } | ConcurrencyPolicy::Isolated { limit, .. } => {
                Some((*limit).max(1))
            },
            ConcurrencyPolicy::FanOut | ConcurrencyPolicy::Cooperative => None,
        }
    }

    fn build_runtime(&self) -> std::io::Result<Runtime> {
        match self {
            ConcurrencyPolicy::Cooperative => Builder::new_current_thread().enable_all().build(),
            _ => Builder::new_multi_thread()
                .worker_threads(num_cpus::get())
                .enable_all()
                .build(),
        }
    }
}

impl fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limit() {
            Some(limit) => write!(f, "{} (limit {})", self.name(), limit),
            None => f.write_str(self.name()),
        }
    }
}

/// Runs a batch of uploads into one bucket.
#[derive(Debug, Clone)]
pub struct Scheduler {
    bucket: Arc<str>,
    policy: ConcurrencyPolicy,
    task_timeout: Option<Duration>,
    progress_interval: Option<Duration>,
}

impl Scheduler {
    pub fn new(bucket: impl Into<String>, policy: ConcurrencyPolicy) -> Self {
        Self {
            bucket: Arc::from(bucket.into()),
            policy,
            task_timeout: None,
            progress_interval: Some(Duration::from_secs(UPLOAD_PROGRESS_INTERVAL_SECS)),
        }
    }

    /// Fail any single upload that takes longer than `timeout`.
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Log progress at this interval; `None` disables it.
    pub fn with_progress_interval(mut self, interval: Option<Duration>) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn policy(&self) -> &ConcurrencyPolicy {
        &self.policy
    }

    /// Run every task to completion on a runtime built for the policy.
    ///
    /// Blocks the calling thread. Must not be called from inside a tokio
    /// runtime; use [`Scheduler::run_async`] there. Only runtime construction
    /// can fail; per-task failures are reported in the returned outcomes.
    pub fn run(&self, tasks: Vec<UploadTask>, uploader: Arc<dyn Uploader>) -> Result<RunReport> {
        let runtime = self.policy
            .build_runtime()
            .with_context(|| format!("Failed to build runtime for {} policy", self.policy.name()))?;

        Ok(runtime.block_on(self.run_async(tasks, uploader)))
    }

    /// Run every task on the ambient runtime.
    ///
    /// The caller's runtime decides threading, so `Cooperative` only stays
    /// single-threaded when called from a current-thread runtime.
    pub async fn run_async(&self, tasks: Vec<UploadTask>, uploader: Arc<dyn Uploader>) -> RunReport {
        info!("Uploading {} files to bucket {} using {} policy",
              tasks.len(), self.bucket, self.policy);

        let uploader: Arc<dyn Uploader> = match &self.policy {
            ConcurrencyPolicy::Isolated { worker, .. } => Arc::new(ProcessUploader::new(worker.clone())),
            _ => uploader,
        };

        let options = DispatchOptions {
            limit: self.policy.limit(),
            task_timeout: self.task_timeout,
            progress_interval: self.progress_interval,
        };

        let (outcomes, elapsed) = dispatch_all(tasks, Arc::clone(&self.bucket), uploader, &options).await;
        let report = RunReport::new(outcomes, elapsed);

        info!("Upload finished: {} succeeded, {} failed of {} in {:.2}s",
              report.summary.succeeded, report.summary.failed,
              report.summary.total_tasks, elapsed.as_secs_f64());

        report
    }
}
