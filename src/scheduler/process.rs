//! Process-level isolation: one child process per upload.
//!
//! The parent never shares a client with its children. Each child is started
//! as `program args... -- <bucket> <source> <key>`, builds its own uploader from
//! the environment it inherited, performs a single put and reports back with
//! one JSON line on stdout:
//!
//! ```text
//! {"ok":true}
//! {"ok":false,"error":"remote rejected upload: AccessDenied"}
//! ```
//!
//! The exit status is authoritative for success; the report only supplies
//! the error detail (falling back to stderr, then to the status itself).

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use log::debug;
use serde::{Serialize, Deserialize};
use tokio::process::Command;

use crate::cloud::Uploader;
use crate::constants::WORKER_SUBCOMMAND;
use crate::errors::TransferError;

/// How to start a worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set an environment variable for every child, on top of the
    /// inherited environment.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// The running executable's own `worker` subcommand.
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?).arg(WORKER_SUBCOMMAND))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, bucket: &str, local_path: &Path, key: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            // Keys and paths may start with '-'
            .arg("--")
            .arg(bucket)
            .arg(local_path)
            .arg(key)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Result line a worker prints on stdout.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerReport {
    pub fn success() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self { ok: false, error: Some(detail.into()) }
    }

    pub fn to_line(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| if self.ok { r#"{"ok":true}"#.to_string() } else { r#"{"ok":false}"#.to_string() })
    }

    /// Parse the last JSON line of a worker's stdout, if any.
    pub fn parse(stdout: &str) -> Option<Self> {
        stdout
            .lines()
            .rev()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .find_map(|line| serde_json::from_str(line).ok())
    }
}

/// Worker side: perform one upload and describe the result.
pub async fn run_worker(uploader: &dyn Uploader, bucket: &str, local_path: &Path, key: &str) -> WorkerReport {
    match uploader.put(local_path, bucket, key).await {
        Ok(()) => WorkerReport::success(),
        Err(e) => WorkerReport::failure(e.to_string()),
    }
}

/// Uploader that delegates every put to a fresh worker process.
#[derive(Debug, Clone)]
pub struct ProcessUploader {
    worker: WorkerCommand,
}

impl ProcessUploader {
    pub fn new(worker: WorkerCommand) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl Uploader for ProcessUploader {
    async fn put(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), TransferError> {
        debug!("Spawning worker {} for {}", self.worker.program().display(), local_path.display());

        let output = self.worker
            .command(bucket, local_path, key)
            .output()
            .await
            .map_err(|e| TransferError::Worker(
                format!("failed to start {}: {}", self.worker.program().display(), e)
            ))?;

        interpret(
            output.status,
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        )
    }
}

fn interpret(status: ExitStatus, stdout: &str, stderr: &str) -> Result<(), TransferError> {
    let report = WorkerReport::parse(stdout);

    if status.success() && report.as_ref().map_or(true, |r| r.ok) {
        return Ok(());
    }

    let detail = report
        .and_then(|r| r.error)
        .or_else(|| {
            let stderr = stderr.trim();
            (!stderr.is_empty()).then(|| stderr.lines().last().unwrap_or(stderr).to_string())
        })
        .unwrap_or_else(|| format!("worker exited with {}", status));

    Err(TransferError::Worker(detail))
}
