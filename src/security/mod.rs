//! Keeps secrets out of logs and reports.

pub mod credential_scrubber;

pub use credential_scrubber::{safe_error_message, scrub_credentials};
