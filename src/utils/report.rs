use std::fs;
use std::path::Path;

use anyhow::{Result, Context};
use chrono::{DateTime, Utc};
use log::info;
use serde_json::json;
use uuid::Uuid;

use crate::models::RunReport;
use crate::security::scrub_credentials;

/// What a run was asked to do, recorded next to what it did.
#[derive(Debug, Clone)]
pub struct RunContext<'a> {
    pub bucket: &'a str,
    pub key_prefix: &'a str,
    pub policy: &'a str,
    pub started_at: DateTime<Utc>,
    /// Set when the source directory could not be listed.
    pub listing_error: Option<String>,
}

/// Create a JSON report of a finished run.
///
/// # Example Output
///
/// ```json
/// {
///   "run_id": "550e8400-e29b-41d4-a716-446655440000",
///   "started_at": "2024-01-15T14:30:52+00:00",
///   "bucket": "my-bucket",
///   "key_prefix": "backups",
///   "policy": "pool",
///   "total_tasks": 2,
///   "succeeded": 1,
///   "failed": 1,
///   "elapsed_seconds": 0.42,
///   "outcomes": [
///     { "source": "logs/a.txt", "key": "backups/a.txt", "status": "success", "error": null, "duration_micros": 1200 },
///     ...
///   ]
/// }
/// ```
pub fn create_run_report(context: &RunContext<'_>, report: &RunReport) -> Result<String> {
    let outcomes: Vec<_> = report.outcomes.iter()
        .map(|outcome| {
            json!({
                "source": outcome.task.source_path().display().to_string(),
                "key": outcome.task.destination_key(),
                "status": if outcome.status.is_success() { "success" } else { "failure" },
                "error": outcome.status.error_detail().map(scrub_credentials),
                "duration_micros": outcome.duration_micros,
            })
        })
        .collect();

    let summary = &report.summary;
    let mut document = json!({
        "run_id": Uuid::new_v4().to_string(),
        "started_at": context.started_at.to_rfc3339(),
        "dirpush_version": env!("CARGO_PKG_VERSION"),
        "bucket": context.bucket,
        "key_prefix": context.key_prefix,
        "policy": context.policy,
        "total_tasks": summary.total_tasks,
        "succeeded": summary.succeeded,
        "failed": summary.failed,
        "elapsed_seconds": summary.elapsed.as_secs_f64(),
        "outcomes": outcomes,
    });

    if let Some(error) = &context.listing_error {
        if let Some(obj) = document.as_object_mut() {
            obj.insert("listing_error".to_string(), json!(scrub_credentials(error)));
        }
    }

    serde_json::to_string_pretty(&document).context("Failed to serialize run report to JSON")
}

pub fn write_run_report(path: &Path, context: &RunContext<'_>, report: &RunReport) -> Result<()> {
    let json = create_run_report(context, report)?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write run report to {}", path.display()))?;
    info!("Wrote run report to {}", path.display());
    Ok(())
}
