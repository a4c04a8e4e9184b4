//! Upload capability and its implementations.
//!
//! The scheduler only ever talks to the [`Uploader`] trait. Callers build an
//! uploader once and hand it to the scheduler, which shares it between
//! concurrent tasks; nothing in the crate holds a global client.
//!
//! ## Implementations
//!
//! - [`s3::S3Uploader`]: Amazon S3 and S3-compatible stores via rusoto
//! - [`retry::RetryingUploader`]: wraps any uploader with bounded retries
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dirpush::cloud::s3::{S3Uploader, S3Options};
//! use dirpush::cloud::retry::RetryingUploader;
//!
//! # fn example() -> anyhow::Result<()> {
//! let options = S3Options {
//!     region: Some("eu-west-1".to_string()),
//!     ..Default::default()
//! };
//! let uploader = S3Uploader::new(&options)?;
//! let uploader = Arc::new(RetryingUploader::new(uploader, 3));
//! # let _ = uploader;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use async_trait::async_trait;

use crate::errors::TransferError;

/// Amazon S3 uploader
pub mod s3;

/// Retry decorator for any uploader
pub mod retry;

/// Something that can put a local file into a bucket under a key.
///
/// Implementations must be safe to call from many tasks at once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn put(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), TransferError>;
}

#[async_trait]
impl<U: Uploader + ?Sized> Uploader for std::sync::Arc<U> {
    async fn put(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), TransferError> {
        (**self).put(local_path, bucket, key).await
    }
}
