//! Shared fixtures and fake uploaders for the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::{Barrier, Semaphore};

use dirpush::cloud::Uploader;
use dirpush::errors::TransferError;
use dirpush::models::UploadTask;

/// Creates a temporary directory holding the given files.
pub fn create_source_dir(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (name, content) in files {
        fs::write(temp_dir.path().join(name), content).unwrap();
    }
    temp_dir
}

/// Tasks for `n` made-up files, no filesystem involved.
pub fn synthetic_tasks(n: usize) -> Vec<UploadTask> {
    (0..n)
        .map(|i| UploadTask::new(format!("file_{:03}.bin", i), format!("batch/file_{:03}.bin", i)))
        .collect()
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Succeeds for every file except the named ones, and records each call.
#[derive(Default)]
pub struct FakeUploader {
    fail_on: HashSet<String>,
    keys: Mutex<Vec<String>>,
    threads: Mutex<HashSet<ThreadId>>,
}

impl FakeUploader {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing_on(names: &[&str]) -> Self {
        Self {
            fail_on: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.lock().unwrap().len()
    }
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn put(&self, local_path: &Path, _bucket: &str, key: &str) -> Result<(), TransferError> {
        self.keys.lock().unwrap().push(key.to_string());
        self.threads.lock().unwrap().insert(thread::current().id());

        // Yield so uploads actually interleave
        tokio::task::yield_now().await;

        let name = local_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        if self.fail_on.contains(&name) {
            Err(TransferError::Remote(format!("AccessDenied for {}", name)))
        } else {
            Ok(())
        }
    }
}

/// Blocks every upload until the test releases permits on `gate`, tracking
/// how many uploads are in flight.
pub struct GatedUploader {
    pub gate: Semaphore,
    pub started: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl GatedUploader {
    pub fn closed() -> Self {
        Self {
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Uploader for GatedUploader {
    async fn put(&self, _local_path: &Path, _bucket: &str, _key: &str) -> Result<(), TransferError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.started.fetch_add(1, Ordering::SeqCst);

        let permit = self.gate.acquire().await;
        drop(permit);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Completes only once `n` uploads are waiting at the same time.
pub struct BarrierUploader {
    barrier: Barrier,
    threads: Mutex<HashSet<ThreadId>>,
}

impl BarrierUploader {
    pub fn new(n: usize) -> Self {
        Self {
            barrier: Barrier::new(n),
            threads: Mutex::new(HashSet::new()),
        }
    }

    pub fn thread_count(&self) -> usize {
        self.threads.lock().unwrap().len()
    }
}

#[async_trait]
impl Uploader for BarrierUploader {
    async fn put(&self, _local_path: &Path, _bucket: &str, _key: &str) -> Result<(), TransferError> {
        self.threads.lock().unwrap().insert(thread::current().id());
        self.barrier.wait().await;
        Ok(())
    }
}

/// Must never be called.
pub struct UnusedUploader;

#[async_trait]
impl Uploader for UnusedUploader {
    async fn put(&self, local_path: &Path, _bucket: &str, _key: &str) -> Result<(), TransferError> {
        Err(TransferError::Remote(format!("in-process uploader used for {}", local_path.display())))
    }
}
