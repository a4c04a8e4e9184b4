use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::TryStreamExt;
use log::{debug, warn};
use rusoto_core::{ByteStream, HttpClient, Region};
use rusoto_credential::StaticProvider;
use rusoto_s3::{PutObjectRequest, S3Client, S3};
use tokio::fs::File as AsyncFile;
use tokio_util::codec::{BytesCodec, FramedRead};

use crate::cloud::Uploader;
use crate::constants::DEFAULT_REGION;
use crate::errors::TransferError;

/// Connection settings for [`S3Uploader`].
///
/// When both credential fields are `None` the default AWS credential chain
/// (environment, profile, instance metadata) is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Options {
    /// AWS region name, e.g. "us-east-1"
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO, Ceph, R2, ...)
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// Uploads files to S3 with a single `PutObject` per file.
///
/// The client is built once and shared by every task of a run. The file body
/// is streamed from disk rather than read into memory.
pub struct S3Uploader {
    client: S3Client,
    region: Region,
    bytes_uploaded: AtomicU64,
}

impl S3Uploader {
    /// Build an uploader from connection settings.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use dirpush::cloud::s3::{S3Uploader, S3Options};
    /// let uploader = S3Uploader::new(&S3Options {
    ///     region: Some("us-west-2".to_string()),
    ///     ..Default::default()
    /// }).unwrap();
    /// assert_eq!(uploader.region().name(), "us-west-2");
    /// ```
    pub fn new(options: &S3Options) -> Result<Self> {
        let region = resolve_region(options.region.as_deref(), options.endpoint.as_deref());

        let client = match (&options.access_key_id, &options.secret_access_key) {
            (Some(access_key), Some(secret_key)) => {
                let provider = StaticProvider::new_minimal(access_key.clone(), secret_key.clone());
                let http_client = HttpClient::new()
                    .context("Failed to create HTTP client")?;
                S3Client::new_with(http_client, provider, region.clone())
            },
            (None, None) => S3Client::new(region.clone()),
            _ => return Err(anyhow!("Both access key id and secret access key must be set, or neither")),
        };

        Ok(Self {
            client,
            region,
            bytes_uploaded: AtomicU64::new(0),
        })
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Bytes successfully put so far by this uploader
    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded.load(Ordering::SeqCst)
    }
}

/// Parse a region name, falling back to the default for unknown names.
///
/// A custom endpoint always produces `Region::Custom`, keeping the given name
/// for request signing.
fn resolve_region(region_name: Option<&str>, endpoint: Option<&str>) -> Region {
    if let Some(endpoint) = endpoint {
        return Region::Custom {
            name: region_name.unwrap_or(DEFAULT_REGION).to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        };
    }

    match region_name {
        Some(name) => match name.parse::<Region>() {
            Ok(r) => r,
            Err(_) => {
                warn!("Invalid region '{}', using default", name);
                Region::default()
            }
        },
        None => Region::default(),
    }
}

/// Content length and body size hint for a file of `file_size` bytes.
fn body_sizes(local_path: &Path, file_size: u64) -> Result<(i64, usize), TransferError> {
    let too_large = || TransferError::io(
        local_path,
        io::Error::new(io::ErrorKind::InvalidData, format!("file size {} does not fit in a request", file_size)),
    );
    let content_length = i64::try_from(file_size).map_err(|_| too_large())?;
    let size_hint = usize::try_from(file_size).map_err(|_| too_large())?;
    Ok((content_length, size_hint))
}

#[async_trait]
impl Uploader for S3Uploader {
    async fn put(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), TransferError> {
        let file = AsyncFile::open(local_path).await
            .map_err(|e| TransferError::io(local_path, e))?;
        let file_size = file.metadata().await
            .map_err(|e| TransferError::io(local_path, e))?
            .len();

        let (content_length, size_hint) = body_sizes(local_path, file_size)?;

        debug!("Putting {} ({} bytes) to s3://{}/{}", local_path.display(), file_size, bucket, key);

        let body = FramedRead::new(file, BytesCodec::new()).map_ok(BytesMut::freeze);

        let request = PutObjectRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_length: Some(content_length),
            body: Some(ByteStream::new_with_size(body, size_hint)),
            ..Default::default()
        };

        self.client.put_object(request).await
            .map_err(|e| TransferError::Remote(e.to_string()))?;

        self.bytes_uploaded.fetch_add(file_size, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_sizes_reject_oversized_files() {
        assert_eq!(body_sizes(Path::new("a.bin"), 1024).unwrap(), (1024, 1024));

        let err = body_sizes(Path::new("huge.bin"), u64::MAX).unwrap_err();
        assert!(matches!(err, TransferError::Io { .. }));
        assert!(err.to_string().contains("huge.bin"));
    }

    #[test]
    fn test_resolve_named_region() {
        assert_eq!(resolve_region(Some("eu-west-1"), None).name(), "eu-west-1");
    }

    #[test]
    fn test_resolve_invalid_region_falls_back() {
        assert_eq!(
            resolve_region(Some("not-a-region"), None).name(),
            Region::default().name()
        );
    }

    #[test]
    fn test_resolve_custom_endpoint() {
        let region = resolve_region(Some("garage"), Some("http://localhost:9000/"));
        assert_eq!(
            region,
            Region::Custom {
                name: "garage".to_string(),
                endpoint: "http://localhost:9000".to_string(),
            }
        );

        let region = resolve_region(None, Some("http://minio:9000"));
        assert_eq!(region.name(), DEFAULT_REGION);
    }

    #[test]
    fn test_new_with_static_credentials() {
        let uploader = S3Uploader::new(&S3Options {
            region: Some("us-west-2".to_string()),
            endpoint: None,
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
        }).unwrap();
        assert_eq!(uploader.region().name(), "us-west-2");
        assert_eq!(uploader.bytes_uploaded(), 0);
    }

    #[test]
    fn test_new_rejects_half_credentials() {
        let result = S3Uploader::new(&S3Options {
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_put_missing_file_is_io_error() {
        let uploader = S3Uploader::new(&S3Options {
            region: Some("us-east-1".to_string()),
            endpoint: Some("http://127.0.0.1:9".to_string()),
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
        }).unwrap();

        let err = uploader
            .put(Path::new("/nonexistent/file.txt"), "bucket", "key")
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Io { .. }));
    }
}
