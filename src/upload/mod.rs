//! Upload module
//!
//! The chunked upload procedure: a file at or below the size threshold is
//! sent as one `PutObject`; a larger file is split into fixed-size parts and
//! sent through a multipart session that only becomes a readable object once
//! the final `CompleteMultipartUpload` succeeds.
//!
//! # Example
//!
//! ```no_run
//! use r2_uplink::config::{Config, EnvMap};
//! use r2_uplink::s3::{S3Client, S3ClientConfig};
//! use r2_uplink::upload::{TransferRequest, Uploader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env(&EnvMap::from_process())?;
//! let client = S3Client::new(S3ClientConfig::from_r2(&config.r2)?)?;
//!
//! let request = TransferRequest::builder("ct_scan.nii.gz", "imaging", "scans/ct_scan.nii.gz")
//!     .with_config(&config.upload)
//!     .build()?;
//!
//! let result = Uploader::new(client).upload(&request).await?;
//! println!("{} bytes in {} part(s)", result.bytes_written, result.parts);
//! # Ok(())
//! # }
//! ```

use crate::config::UploadConfig;
use crate::metrics;
use crate::s3::{ErrorKind, ObjectStore, S3ClientError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

pub mod multipart;
pub mod put_object;

use multipart::{MultipartHandler, MAX_PARTS, MAX_PART_SIZE};
use put_object::PutObjectHandler;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid transfer request: {0}")]
    InvalidRequest(String),

    #[error("File needs {parts} parts, more than the {max} allowed; raise the part size", max = MAX_PARTS)]
    TooManyParts { parts: u64 },

    #[error("S3 error: {0}")]
    S3Error(#[from] S3ClientError),

    #[error("Part {part_number} of upload {upload_id} failed: {source}")]
    PartFailed {
        part_number: u32,
        upload_id: String,
        #[source]
        source: S3ClientError,
    },

    #[error("Multipart upload error: {0}")]
    MultipartError(String),
}

impl UploadError {
    /// Backend error classification, if this failure came from the backend
    pub fn backend_kind(&self) -> Option<ErrorKind> {
        match self {
            UploadError::S3Error(e) | UploadError::PartFailed { source: e, .. } => Some(e.kind()),
            _ => None,
        }
    }

    /// Whether the failure was detected before any network call
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            UploadError::FileNotFound(_)
                | UploadError::NotAFile(_)
                | UploadError::InvalidRequest(_)
                | UploadError::TooManyParts { .. }
        )
    }
}

/// How a file was transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStrategy {
    SingleShot,
    Multipart,
}

impl UploadStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStrategy::SingleShot => "put_object",
            UploadStrategy::Multipart => "multipart",
        }
    }
}

/// Upload result
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub etag: String,
    pub bytes_written: u64,
    /// Number of parts; zero for single-shot uploads
    pub parts: usize,
    pub strategy: UploadStrategy,
}

/// A validated request to move one local file to (bucket, key)
#[derive(Debug, Clone)]
pub struct TransferRequest {
    source_path: PathBuf,
    bucket: String,
    key: String,
    size_threshold: u64,
    part_size: u64,
}

impl TransferRequest {
    /// Start building a request with the default threshold and part size
    pub fn builder(
        source_path: impl Into<PathBuf>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> TransferRequestBuilder {
        let defaults = UploadConfig::default();
        TransferRequestBuilder {
            source_path: source_path.into(),
            bucket: bucket.into(),
            key: key.into(),
            size_threshold: defaults.multipart_threshold,
            part_size: defaults.part_size,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn size_threshold(&self) -> u64 {
        self.size_threshold
    }

    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    /// Whether a file of `size` bytes goes through multipart upload
    pub fn is_multipart(&self, size: u64) -> bool {
        size > self.size_threshold
    }

    /// Number of parts a file of `size` bytes is split into
    pub fn part_count(&self, size: u64) -> u64 {
        size.div_ceil(self.part_size)
    }
}

/// Builder for [`TransferRequest`]
#[derive(Debug, Clone)]
pub struct TransferRequestBuilder {
    source_path: PathBuf,
    bucket: String,
    key: String,
    size_threshold: u64,
    part_size: u64,
}

impl TransferRequestBuilder {
    /// Take threshold and part size from configuration
    pub fn with_config(mut self, config: &UploadConfig) -> Self {
        self.size_threshold = config.multipart_threshold;
        self.part_size = config.part_size;
        self
    }

    pub fn size_threshold(mut self, bytes: u64) -> Self {
        self.size_threshold = bytes;
        self
    }

    pub fn part_size(mut self, bytes: u64) -> Self {
        self.part_size = bytes;
        self
    }

    pub fn build(self) -> Result<TransferRequest, UploadError> {
        if self.bucket.trim().is_empty() {
            return Err(UploadError::InvalidRequest("bucket name is empty".into()));
        }
        if self.key.trim().is_empty() {
            return Err(UploadError::InvalidRequest("object key is empty".into()));
        }
        if self.part_size == 0 {
            return Err(UploadError::InvalidRequest(
                "part size must be greater than zero".into(),
            ));
        }
        if self.part_size > MAX_PART_SIZE {
            return Err(UploadError::InvalidRequest(format!(
                "part size {} exceeds the {} byte maximum for a single part",
                self.part_size, MAX_PART_SIZE
            )));
        }
        if usize::try_from(self.part_size).is_err() {
            return Err(UploadError::InvalidRequest(format!(
                "part size {} does not fit in memory on this platform",
                self.part_size
            )));
        }

        Ok(TransferRequest {
            source_path: self.source_path,
            bucket: self.bucket,
            key: self.key,
            size_threshold: self.size_threshold,
            part_size: self.part_size,
        })
    }
}

/// Runs transfers against an [`ObjectStore`]
///
/// Each call to [`Uploader::upload`] owns its multipart session; the
/// uploader itself holds no per-transfer state and may be reused.
pub struct Uploader<S> {
    store: S,
    abort_on_failure: bool,
}

impl<S: ObjectStore> Uploader<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            abort_on_failure: false,
        }
    }

    /// Abort the multipart session when a multipart transfer fails
    pub fn with_abort_on_failure(mut self, abort: bool) -> Self {
        self.abort_on_failure = abort;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Transfer `request.source_path` to (bucket, key)
    ///
    /// Succeeds only once the backend has acknowledged either the single
    /// `PutObject` or the final `CompleteMultipartUpload`.
    #[tracing::instrument(
        name = "upload.transfer",
        skip(self, request),
        fields(
            file = %request.source_path.display(),
            s3.bucket = %request.bucket,
            s3.key = %request.key,
            upload.bytes = tracing::field::Empty,
            upload.strategy = tracing::field::Empty
        ),
        err
    )]
    pub async fn upload(&self, request: &TransferRequest) -> Result<UploadResult, UploadError> {
        let size = source_size(&request.source_path).await?;
        let strategy = if request.is_multipart(size) {
            UploadStrategy::Multipart
        } else {
            UploadStrategy::SingleShot
        };

        let span = tracing::Span::current();
        span.record("upload.bytes", size);
        span.record("upload.strategy", strategy.as_str());

        tracing::info!(
            bytes = size,
            strategy = strategy.as_str(),
            "Starting upload"
        );

        let start_time = Instant::now();
        let outcome = match strategy {
            UploadStrategy::SingleShot => {
                PutObjectHandler::new(&self.store)
                    .upload(request, size)
                    .await
            }
            UploadStrategy::Multipart => match request.part_count(size) {
                parts if parts > MAX_PARTS => Err(UploadError::TooManyParts { parts }),
                _ => {
                    MultipartHandler::new(&self.store, request.part_size)
                        .with_abort_on_failure(self.abort_on_failure)
                        .upload(request)
                        .await
                }
            },
        };

        let duration = start_time.elapsed();
        metrics::record_upload_duration(strategy.as_str(), duration.as_secs_f64());

        match outcome {
            Ok(result) => {
                metrics::record_upload_success(strategy.as_str(), result.bytes_written);
                tracing::info!(
                    etag = %result.etag,
                    bytes_written = result.bytes_written,
                    parts = result.parts,
                    duration_ms = duration.as_millis(),
                    "Upload completed"
                );
                Ok(result)
            }
            Err(e) => {
                metrics::record_upload_failure(strategy.as_str());
                metrics::record_error(e.backend_kind().map_or("local", |k| k.as_str()));
                Err(e)
            }
        }
    }
}

/// Size of the source file; fails before any network call if it is unusable
pub async fn source_size(path: &Path) -> Result<u64, UploadError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(UploadError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_file() {
        return Err(UploadError::NotAFile(path.to_path_buf()));
    }
    Ok(metadata.len())
}
