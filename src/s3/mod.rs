//! S3 Client module
//!
//! Everything the crate needs from an S3-compatible backend goes through two
//! traits:
//!
//! - [`ObjectStore`] - the write operations used by the upload procedure
//! - [`BucketInspector`] - read-only calls used by preflight diagnostics
//!
//! [`S3Client`] implements both on top of `aws-sdk-s3`, configured for
//! Cloudflare R2 (path-style addressing, SigV4, region `auto`).
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | PutObject | `s3.put_object` | bucket, key, bytes, etag |
//! | CreateMultipartUpload | `s3.create_multipart_upload` | bucket, key, upload_id |
//! | UploadPart | `s3.upload_part` | bucket, upload_id, part_number, bytes, etag |
//! | CompleteMultipartUpload | `s3.complete_multipart_upload` | bucket, upload_id, parts_count, etag |
//! | AbortMultipartUpload | `s3.abort_multipart_upload` | bucket, upload_id |

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

mod client;
pub mod credentials;

pub use client::{S3Client, S3ClientConfig};
pub use credentials::{Credentials, CredentialsError};

/// Coarse classification of backend failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected credentials (HTTP 401)
    Unauthorized,
    /// Valid credentials without permission (HTTP 403)
    Forbidden,
    /// Missing bucket, object or upload (HTTP 404)
    NotFound,
    /// Anything else on the wire
    Transmission,
    /// Client could not be built
    Configuration,
}

impl ErrorKind {
    /// Short label used for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Transmission => "transmission",
            ErrorKind::Configuration => "configuration",
        }
    }

    /// Troubleshooting text shown by the CLI
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ErrorKind::Unauthorized => Some(
                "The backend rejected the credentials.\n\
                 1. Open R2 > Manage R2 API Tokens and check the token still exists\n\
                 2. Create a new token with 'Object Read & Write' permissions if needed\n\
                 3. Update R2_ACCESS_KEY_ID / R2_SECRET_ACCESS_KEY in your .env file",
            ),
            ErrorKind::Forbidden => Some(
                "The credentials are valid but lack permission.\n\
                 1. Make sure the token has 'Object Read & Write' permissions\n\
                 2. If the token is bucket-scoped, make sure it covers this bucket",
            ),
            ErrorKind::NotFound => Some(
                "The bucket or object was not found.\n\
                 1. Check the bucket name for typos\n\
                 2. Check R2_ACCOUNT_ID (or R2_ENDPOINT_URL) points at the right account",
            ),
            ErrorKind::Transmission | ErrorKind::Configuration => None,
        }
    }
}

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{operation} unauthorized: {message}")]
    Unauthorized {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} forbidden: {message}")]
    Forbidden {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} not found: {message}")]
    NotFound {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} failed: {message}")]
    RequestError {
        operation: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("Response error: {0}")]
    ResponseError(String),
}

impl S3ClientError {
    /// Classify a failed request from its HTTP status and S3 error code
    pub fn from_status(
        operation: &'static str,
        status: Option<u16>,
        code: Option<&str>,
        message: String,
    ) -> Self {
        match (status, code) {
            (Some(401), _) | (_, Some("Unauthorized")) => {
                Self::Unauthorized { operation, message }
            }
            (Some(403), _) | (_, Some("AccessDenied")) => Self::Forbidden { operation, message },
            (Some(404), _) | (_, Some("NoSuchBucket" | "NoSuchKey" | "NoSuchUpload")) => {
                Self::NotFound { operation, message }
            }
            _ => Self::RequestError {
                operation,
                status,
                message,
            },
        }
    }

    /// Which part of the error taxonomy this belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            S3ClientError::ConfigError(_) => ErrorKind::Configuration,
            S3ClientError::Unauthorized { .. } => ErrorKind::Unauthorized,
            S3ClientError::Forbidden { .. } => ErrorKind::Forbidden,
            S3ClientError::NotFound { .. } => ErrorKind::NotFound,
            S3ClientError::RequestError { .. } | S3ClientError::ResponseError(_) => {
                ErrorKind::Transmission
            }
        }
    }
}

/// Backend operations consumed by the upload procedure
///
/// Implementations must not retry: every failure is surfaced to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` as a complete object in one request
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
    ) -> Result<S3PutObjectResponse, S3ClientError>;

    /// Open a multipart session
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<S3CreateMultipartUploadResponse, S3ClientError>;

    /// Store one part of a multipart session
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<S3UploadPartResponse, S3ClientError>;

    /// Commit the listed parts into the final object
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<S3CompletedPart>,
    ) -> Result<S3CompleteMultipartUploadResponse, S3ClientError>;

    /// Discard a multipart session and its stored parts
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), S3ClientError>;
}

/// Read-only backend calls used for credential troubleshooting
#[async_trait]
pub trait BucketInspector: Send + Sync {
    /// Names of all buckets visible to the credentials
    async fn list_buckets(&self) -> Result<Vec<String>, S3ClientError>;

    /// Succeeds when the bucket exists and is accessible
    async fn head_bucket(&self, bucket: &str) -> Result<(), S3ClientError>;

    /// Up to `max_keys` objects from the bucket
    async fn list_objects(
        &self,
        bucket: &str,
        max_keys: i32,
    ) -> Result<Vec<ObjectSummary>, S3ClientError>;
}

/// S3 PutObject response
#[derive(Debug, Clone)]
pub struct S3PutObjectResponse {
    pub etag: String,
}

/// S3 CreateMultipartUpload response
#[derive(Debug, Clone)]
pub struct S3CreateMultipartUploadResponse {
    pub upload_id: String,
}

/// S3 UploadPart response
#[derive(Debug, Clone)]
pub struct S3UploadPartResponse {
    pub etag: String,
}

/// S3 CompleteMultipartUpload response
#[derive(Debug, Clone)]
pub struct S3CompleteMultipartUploadResponse {
    pub etag: String,
}

/// S3 completed part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// One entry of a bucket listing
#[derive(Debug, Clone, serde::Serialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}
