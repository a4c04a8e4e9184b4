//! # dirpush
//!
//! Upload the files of a local directory to an S3 (or S3-compatible) bucket,
//! many at a time.
//!
//! ## Overview
//!
//! A run has two stages. [`enumerate::enumerate`] turns a directory into an
//! ordered list of [`models::UploadTask`]s, one per regular file, each with a
//! forward-slash object key under a prefix. A [`scheduler::Scheduler`] then
//! pushes every task through an [`cloud::Uploader`] and collects exactly one
//! [`models::UploadOutcome`] per task into a [`models::RunReport`].
//!
//! ## Features
//!
//! - **Four concurrency policies** behind one call: bounded pool, fan-out,
//!   cooperative single thread, and one child process per upload
//! - **Fault isolation**: a failed upload becomes a failed outcome, never an
//!   aborted run
//! - **Pluggable uploader**: rusoto-backed S3, optional retry decorator, or
//!   any test double
//! - **Credential scrubbing** of every failure detail before it is logged
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use dirpush::cloud::s3::{S3Options, S3Uploader};
//! use dirpush::enumerate::enumerate;
//! use dirpush::scheduler::{ConcurrencyPolicy, Scheduler};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let tasks = enumerate(Path::new("/var/log/app"), "logs/2024-01-01")?;
//! let uploader = Arc::new(S3Uploader::new(&S3Options::default())?);
//!
//! let report = Scheduler::new("my-bucket", ConcurrencyPolicy::default()).run(tasks, uploader)?;
//! for failure in report.failures() {
//!     eprintln!("{}: {:?}", failure.task.destination_key(), failure.status.error_detail());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`models`]: tasks, outcomes and run summaries
//! - [`errors`]: listing, transfer and configuration errors
//! - [`enumerate`]: directory to task list
//! - [`scheduler`]: concurrency policies and the dispatch loop
//! - [`cloud`]: the upload capability and its implementations
//! - [`config`]: settings from environment, file and command line
//! - [`security`]: credential scrubbing
//! - [`utils`]: run report output
//! - [`cli`]: command-line interface definitions
//! - [`constants`]: application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models
pub mod models;

/// Error types
pub mod errors;

/// Directory enumeration into upload tasks
pub mod enumerate;

/// Concurrent upload scheduling
pub mod scheduler;

/// Upload capability and cloud storage clients
pub mod cloud;

/// Settings loading and validation
pub mod config;

/// Credential protection for logs and reports
pub mod security;

/// Run reporting
pub mod utils;

/// Application constants and configuration values
pub mod constants;
