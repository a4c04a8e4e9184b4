//! Helpers around a finished run.

/// JSON run report generation
pub mod report;
