use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use tokio::time::sleep;

use crate::cloud::Uploader;
use crate::constants::{RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_SECS};
use crate::errors::TransferError;

/// Retries failed puts of the wrapped uploader with exponential backoff.
///
/// Only errors that [`TransferError::is_retryable`] reports as transient are
/// retried. With `max_retries == 0` this is a plain pass-through.
pub struct RetryingUploader<U> {
    inner: U,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<U: Uploader> RetryingUploader<U> {
    pub fn new(inner: U, max_retries: usize) -> Self {
        Self {
            inner,
            max_retries,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_secs(RETRY_MAX_DELAY_SECS),
        }
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Delay before the given retry (1-based).
    fn backoff(&self, retry: usize) -> Duration {
        let exponent = u32::try_from(retry.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        std::cmp::min(self.base_delay.saturating_mul(2u32.pow(exponent)), self.max_delay)
    }
}

#[async_trait]
impl<U: Uploader> Uploader for RetryingUploader<U> {
    async fn put(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), TransferError> {
        let mut retry = 0;

        loop {
            match self.inner.put(local_path, bucket, key).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && retry < self.max_retries => {
                    retry += 1;
                    let delay = self.backoff(retry);
                    warn!("Upload of {} failed (retry {}/{} in {:?}): {}",
                          local_path.display(), retry, self.max_retries, delay, e);
                    sleep(delay).await;
                },
                Err(e) => return Err(e),
            }
        }
    }
}
