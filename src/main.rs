use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::Parser;
use log::{debug, error, info, LevelFilter};
use simplelog::{Config, TermLogger, TerminalMode, ColorChoice};
use tokio::runtime::Runtime;

use dirpush::cli::{Args, Commands};
use dirpush::cloud::Uploader;
use dirpush::cloud::retry::RetryingUploader;
use dirpush::cloud::s3::S3Uploader;
use dirpush::config::{RunConfig, Settings};
use dirpush::constants::{EXIT_CONFIGURATION_ERROR, EXIT_LISTING_FAILED, EXIT_TRANSFER_FAILED};
use dirpush::enumerate::enumerate;
use dirpush::errors::ConfigurationError;
use dirpush::scheduler::Scheduler;
use dirpush::scheduler::process::{run_worker, WorkerReport};
use dirpush::security::{safe_error_message, scrub_credentials};
use dirpush::utils::report::{write_run_report, RunContext};

fn main() -> Result<()> {
    // Variables already set in the environment win over .env
    let dotenv = dotenvy::dotenv();

    // Parse arguments
    let args = Args::parse();

    // A worker's stdout carries its report, so it logs to stderr only
    if let Some(Commands::Worker { retries, bucket, source, key }) = &args.command {
        initialize_logging(LevelFilter::Warn, TerminalMode::Stderr, ColorChoice::Never)?;
        let ok = handle_worker(*retries, bucket, source, key)?;
        std::process::exit(if ok { 0 } else { EXIT_TRANSFER_FAILED });
    }

    // Initialize logging
    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    initialize_logging(level, TerminalMode::Mixed, ColorChoice::Auto)?;

    if let Ok(path) = &dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    if let Some(Commands::InitConfig { path }) = &args.command {
        return Settings::create_template_file(path);
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(EXIT_CONFIGURATION_ERROR);
        }
    };

    let exit_code = run_upload(&args, &config)?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(level: LevelFilter, mode: TerminalMode, color: ColorChoice) -> Result<()> {
    TermLogger::init(
        level,
        Config::default(),
        mode,
        color,
    ).context("Failed to initialize logger")?;
    Ok(())
}

/// Environment, then settings file, then command line.
fn load_config(args: &Args) -> Result<RunConfig, ConfigurationError> {
    let mut settings = Settings::from_env();

    if let Some(path) = &args.config {
        settings = settings.merge(Settings::from_yaml_file(path)?);
    }

    settings.merge(args.settings()).resolve()
}

/// Enumerate, upload, report. Returns the process exit code.
fn run_upload(args: &Args, config: &RunConfig) -> Result<i32> {
    let directory = args.directory
        .as_deref()
        .ok_or_else(|| anyhow!("No directory given"))?;

    let started_at = Utc::now();

    // A failed listing still runs (with nothing to do) so the summary is printed
    let (tasks, listing_error) = match enumerate(directory, &config.key_prefix) {
        Ok(tasks) => (tasks, None),
        Err(e) => {
            error!("{}", safe_error_message("Cannot enumerate source directory", &e));
            (Vec::new(), Some(e.to_string()))
        }
    };

    let policy = config.concurrency_policy()
        .context("Failed to set up the concurrency policy")?;

    let uploader = S3Uploader::new(&config.s3)
        .context("Failed to create S3 client")?;
    let uploader: Arc<dyn Uploader> = Arc::new(RetryingUploader::new(uploader, config.retries));

    let scheduler = Scheduler::new(config.bucket.clone(), policy)
        .with_task_timeout(config.task_timeout);
    let report = scheduler.run(tasks, uploader)?;

    println!("{}", report.summary.elapsed_line());

    if let Some(path) = &args.report {
        let context = RunContext {
            bucket: &config.bucket,
            key_prefix: &config.key_prefix,
            policy: scheduler.policy().name(),
            started_at,
            listing_error: listing_error.clone(),
        };
        if let Err(e) = write_run_report(path, &context, &report) {
            error!("{:#}", e);
        }
    }

    let summary = &report.summary;
    if listing_error.is_some() {
        Ok(EXIT_LISTING_FAILED)
    } else if !summary.all_succeeded() {
        error!("{} of {} uploads failed", summary.failed, summary.total_tasks);
        Ok(EXIT_TRANSFER_FAILED)
    } else {
        info!("All {} uploads succeeded", summary.total_tasks);
        Ok(0)
    }
}

/// Child side of the isolated policy: one upload, one JSON line on stdout.
fn handle_worker(retries: usize, bucket: &str, source: &Path, key: &str) -> Result<bool> {
    let settings = Settings::from_env();
    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;

    let mut report = runtime.block_on(async {
        match S3Uploader::new(&settings.s3_options()) {
            Ok(uploader) => run_worker(&RetryingUploader::new(uploader, retries), bucket, source, key).await,
            Err(e) => WorkerReport::failure(format!("{:#}", e)),
        }
    });
    report.error = report.error.take().map(|detail| scrub_credentials(&detail));

    println!("{}", report.to_line());
    Ok(report.ok)
}
