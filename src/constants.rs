//! Global constants for dirpush.
//!
//! Centralises defaults so the CLI, the configuration layer and the
//! scheduler agree on them.

// Scheduling
/// Default number of in-flight uploads for the bounded pool
pub const DEFAULT_POOL_LIMIT: usize = 30;

/// Progress reporting interval in seconds
pub const UPLOAD_PROGRESS_INTERVAL_SECS: u64 = 5;

// Retry
/// Default retry attempts per upload (0 disables retries)
pub const DEFAULT_MAX_RETRIES: usize = 0;

/// Base retry delay in milliseconds
pub const RETRY_BASE_DELAY_MS: u64 = 250;

/// Maximum retry delay in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 30;

// Cloud storage
/// Region used when none is configured alongside a custom endpoint
pub const DEFAULT_REGION: &str = "us-east-1";

// Environment variable names
pub const ENV_BUCKET_NAME: &str = "BUCKET_NAME";
pub const ENV_BUCKET_KEY: &str = "BUCKET_KEY";
pub const ENV_ACCESS_KEY_ID: &str = "ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "SECRET_ACCESS_KEY";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_ENDPOINT: &str = "S3_ENDPOINT";

// Process exit codes
pub const EXIT_TRANSFER_FAILED: i32 = 1;
pub const EXIT_LISTING_FAILED: i32 = 2;
pub const EXIT_CONFIGURATION_ERROR: i32 = 3;

// Default file names
pub const DEFAULT_CONFIG_NAME: &str = "dirpush.yaml";

/// Name of the hidden subcommand that runs a single upload in a child process
pub const WORKER_SUBCOMMAND: &str = "worker";
