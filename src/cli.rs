use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{PolicyKind, Settings};
use crate::constants::DEFAULT_CONFIG_NAME;

/// Command-line arguments for dirpush.
///
/// Every value here is optional and, when given, overrides the same setting
/// from the environment or the settings file.
#[derive(Parser, Debug)]
#[clap(
    name = "dirpush",
    version,
    about = "Upload the files of a directory to an S3 bucket in parallel",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct Args {
    /// Directory whose files are uploaded (not recursive)
    #[clap(required = true)]
    pub directory: Option<PathBuf>,

    /// Destination bucket [env: BUCKET_NAME]
    #[clap(short, long)]
    pub bucket: Option<String>,

    /// Key prefix inside the bucket [env: BUCKET_KEY]
    #[clap(short, long)]
    pub prefix: Option<String>,

    /// AWS region [env: AWS_REGION]
    #[clap(long)]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible storage [env: S3_ENDPOINT]
    #[clap(long)]
    pub endpoint: Option<String>,

    /// How uploads run side by side
    #[clap(long, value_enum)]
    pub policy: Option<PolicyKind>,

    /// Maximum uploads in flight for the pool and isolated policies
    #[clap(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Retry attempts for each failed upload
    #[clap(long)]
    pub retries: Option<usize>,

    /// Fail any single upload that runs longer than this
    #[clap(long)]
    pub timeout_secs: Option<u64>,

    /// Write a JSON run report to this path
    #[clap(long)]
    pub report: Option<PathBuf>,

    /// Path to settings YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Create a settings file template
    InitConfig {
        /// Path to output settings file
        #[clap(default_value = DEFAULT_CONFIG_NAME)]
        path: PathBuf,
    },

    /// Upload a single file and report the result as one JSON line
    #[clap(hide = true)]
    Worker {
        /// Retry attempts for the upload
        #[clap(long, default_value_t = 0)]
        retries: usize,

        bucket: String,
        source: PathBuf,
        key: String,
    },
}

impl Args {
    /// The settings layer given on the command line.
    pub fn settings(&self) -> Settings {
        Settings {
            bucket: self.bucket.clone(),
            key_prefix: self.prefix.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            policy: self.policy,
            concurrency: self.concurrency,
            retries: self.retries,
            timeout_secs: self.timeout_secs,
            ..Default::default()
        }
    }
}
