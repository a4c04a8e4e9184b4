//! Ordered admission and outcome collection on the ambient tokio runtime.
//!
//! Tasks are admitted strictly in input order: the dispatcher acquires a
//! permit from a FIFO semaphore *before* spawning each task, so task `n + 1`
//! cannot start ahead of task `n`. Each spawned task holds its permit until
//! its outcome has been sent, which keeps at most `limit` uploads in flight.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use log::{debug, warn};
use tokio::sync::{Semaphore, OwnedSemaphorePermit, mpsc};

use crate::cloud::Uploader;
use crate::errors::TransferError;
use crate::models::{UploadOutcome, UploadStatus, UploadTask};
use crate::scheduler::progress::{self, Progress};
use crate::security::credential_scrubber::scrub_credentials;

/// Per-run knobs passed down from the scheduler.
#[derive(Debug, Clone)]
pub(crate) struct DispatchOptions {
    pub limit: Option<usize>,
    pub task_timeout: Option<Duration>,
    pub progress_interval: Option<Duration>,
}

/// Run every task to a terminal outcome and return the outcomes in
/// completion order together with the wall-clock time from first dispatch
/// to last outcome collected.
pub(crate) async fn dispatch_all(
    tasks: Vec<UploadTask>,
    bucket: Arc<str>,
    uploader: Arc<dyn Uploader>,
    options: &DispatchOptions,
) -> (Vec<UploadOutcome>, Duration) {
    let total = tasks.len();
    let progress = Arc::new(Progress::new(total));
    let semaphore = options.limit.map(|limit| Arc::new(Semaphore::new(limit.max(1))));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let reporter = options.progress_interval
        .filter(|_| total > 0)
        .map(|interval| progress::spawn_reporter(Arc::clone(&progress), interval));

    let started = Instant::now();
    let mut dispatched = Vec::with_capacity(total);
    let mut handles = Vec::with_capacity(total);

    for task in tasks {
        let permit = match &semaphore {
            // Never closed, so acquisition cannot fail
            Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
            None => None,
        };

        let handle = tokio::spawn(execute(
            task.clone(),
            Arc::clone(&bucket),
            Arc::clone(&uploader),
            options.task_timeout,
            Arc::clone(&progress),
            tx.clone(),
            permit,
        ));
        dispatched.push(task);
        handles.push(handle);
    }
    drop(tx);

    let mut outcomes = Vec::with_capacity(total);
    while let Some(outcome) = rx.recv().await {
        outcomes.push(outcome);
    }

    // A task that panicked never sent its outcome; record it as failed.
    let joined = join_all(handles).await;
    for (task, result) in dispatched.into_iter().zip(joined) {
        if let Err(e) = result {
            warn!("Upload task for {} aborted: {}", task.source_path().display(), e);
            progress.record(false);
            outcomes.push(UploadOutcome::new(
                task,
                UploadStatus::Failure(format!("upload task aborted: {}", e)),
                Duration::ZERO,
            ));
        }
    }

    let elapsed = started.elapsed();

    if let Some(reporter) = reporter {
        reporter.abort();
    }

    (outcomes, elapsed)
}

async fn execute(
    task: UploadTask,
    bucket: Arc<str>,
    uploader: Arc<dyn Uploader>,
    task_timeout: Option<Duration>,
    progress: Arc<Progress>,
    tx: mpsc::UnboundedSender<UploadOutcome>,
    _permit: Option<OwnedSemaphorePermit>,
) {
    debug!("Dispatching {} -> s3://{}/{}",
           task.source_path().display(), bucket, task.destination_key());

    let started = Instant::now();
    let result = put_with_timeout(
        uploader.as_ref(),
        task.source_path(),
        &bucket,
        task.destination_key(),
        task_timeout,
    ).await;
    let elapsed = started.elapsed();

    let status = match result {
        Ok(()) => {
            debug!("Uploaded {} to s3://{}/{} in {:?}",
                   task.source_path().display(), bucket, task.destination_key(), elapsed);
            UploadStatus::Success
        },
        Err(e) => {
            let detail = scrub_credentials(&e.to_string());
            warn!("Failed to upload {}: {}", task.source_path().display(), detail);
            UploadStatus::Failure(detail)
        }
    };

    progress.record(status.is_success());

    // The receiver lives until every sender is dropped.
    let _ = tx.send(UploadOutcome::new(task, status, elapsed));
}

async fn put_with_timeout(
    uploader: &dyn Uploader,
    local_path: &Path,
    bucket: &str,
    key: &str,
    task_timeout: Option<Duration>,
) -> Result<(), TransferError> {
    let attempt = uploader.put(local_path, bucket, key);
    match task_timeout {
        Some(limit) => match tokio::time::timeout(limit, attempt).await {
            Ok(result) => result,
            Err(_) => Err(TransferError::Timeout(limit)),
        },
        None => attempt.await,
    }
}
