//! `aws-sdk-s3` backed client for Cloudflare R2

use super::{
    BucketInspector, Credentials, ObjectStore, ObjectSummary, S3ClientError,
    S3CompleteMultipartUploadResponse, S3CompletedPart, S3CreateMultipartUploadResponse,
    S3PutObjectResponse, S3UploadPartResponse,
};
use crate::config::R2Config;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::StalledStreamProtectionConfig;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use bytes::Bytes;

/// R2 ignores the region but SigV4 needs one
pub const R2_REGION: &str = "auto";

/// S3 Client configuration
#[derive(Debug, Clone)]
pub struct S3ClientConfig {
    pub endpoint: String,
    pub region: String,
    pub credentials: Credentials,
    pub force_path_style: bool,
}

impl S3ClientConfig {
    /// Build client configuration from R2 settings
    pub fn from_r2(config: &R2Config) -> Result<Self, S3ClientError> {
        config
            .validate()
            .map_err(|e| S3ClientError::ConfigError(e.to_string()))?;
        let credentials = Credentials::from_config(config)
            .map_err(|e| S3ClientError::ConfigError(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint_url(),
            region: R2_REGION.to_string(),
            credentials,
            force_path_style: true,
        })
    }
}

/// S3 Client
///
/// Retries are disabled: the upload procedure surfaces every failure once
/// and leaves the retry decision to its caller.
#[derive(Debug, Clone)]
pub struct S3Client {
    config: S3ClientConfig,
    client: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client
    pub fn new(config: S3ClientConfig) -> Result<Self, S3ClientError> {
        if !(config.endpoint.starts_with("http://") || config.endpoint.starts_with("https://")) {
            return Err(S3ClientError::ConfigError(format!(
                "endpoint '{}' must start with http:// or https://",
                config.endpoint
            )));
        }

        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(config.credentials.to_sdk())
            .force_path_style(config.force_path_style)
            .retry_config(RetryConfig::disabled())
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(sdk_config),
            config,
        })
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Get the region
    pub fn region(&self) -> &str {
        &self.config.region
    }

    /// Get the credentials in use
    pub fn credentials(&self) -> &Credentials {
        &self.config.credentials
    }

    /// Path-style URL of an object under this endpoint
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.config.endpoint, bucket, key)
    }
}

/// Convert an SDK failure into [`S3ClientError`], keeping the backend's message
fn map_sdk_error<E>(operation: &'static str, err: SdkError<E, HttpResponse>) -> S3ClientError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.code().map(str::to_string);
    let message = match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (Some(code), None) => code.to_string(),
        _ => DisplayErrorContext(&err).to_string(),
    };
    S3ClientError::from_status(operation, status, code.as_deref(), message)
}

fn to_sdk_part_number(part_number: u32) -> Result<i32, S3ClientError> {
    i32::try_from(part_number)
        .map_err(|_| S3ClientError::ConfigError(format!("part number {} out of range", part_number)))
}

#[async_trait]
impl ObjectStore for S3Client {
    #[tracing::instrument(
        name = "s3.put_object",
        skip(self, body),
        fields(
            s3.bucket = %bucket,
            s3.key = %key,
            upload.bytes = body.len(),
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
    ) -> Result<S3PutObjectResponse, S3ClientError> {
        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| map_sdk_error("PutObject", e))?;

        let etag = output.e_tag().unwrap_or_default().to_string();
        tracing::Span::current().record("s3.etag", etag.as_str());

        Ok(S3PutObjectResponse { etag })
    }

    #[tracing::instrument(
        name = "s3.create_multipart_upload",
        skip(self),
        fields(
            s3.bucket = %bucket,
            s3.key = %key,
            s3.upload_id = tracing::field::Empty
        ),
        err
    )]
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<S3CreateMultipartUploadResponse, S3ClientError> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error("CreateMultipartUpload", e))?;

        let upload_id = output
            .upload_id()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                S3ClientError::ResponseError("CreateMultipartUpload returned no upload_id".into())
            })?
            .to_string();
        tracing::Span::current().record("s3.upload_id", upload_id.as_str());

        Ok(S3CreateMultipartUploadResponse { upload_id })
    }

    #[tracing::instrument(
        name = "s3.upload_part",
        skip(self, key, body),
        fields(
            s3.bucket = %bucket,
            s3.upload_id = %upload_id,
            s3.part_number = part_number,
            upload.bytes = body.len(),
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<S3UploadPartResponse, S3ClientError> {
        let output = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(to_sdk_part_number(part_number)?)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| map_sdk_error("UploadPart", e))?;

        let etag = output
            .e_tag()
            .filter(|etag| !etag.is_empty())
            .ok_or_else(|| {
                S3ClientError::ResponseError(format!("UploadPart {} returned no ETag", part_number))
            })?
            .to_string();
        tracing::Span::current().record("s3.etag", etag.as_str());

        Ok(S3UploadPartResponse { etag })
    }

    #[tracing::instrument(
        name = "s3.complete_multipart_upload",
        skip(self, key, parts),
        fields(
            s3.bucket = %bucket,
            s3.upload_id = %upload_id,
            parts_count = parts.len(),
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<S3CompletedPart>,
    ) -> Result<S3CompleteMultipartUploadResponse, S3ClientError> {
        let mut completed = Vec::with_capacity(parts.len());
        for part in parts {
            completed.push(
                CompletedPart::builder()
                    .part_number(to_sdk_part_number(part.part_number)?)
                    .e_tag(part.etag)
                    .build(),
            );
        }

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| map_sdk_error("CompleteMultipartUpload", e))?;

        let etag = output.e_tag().unwrap_or_default().to_string();
        tracing::Span::current().record("s3.etag", etag.as_str());

        Ok(S3CompleteMultipartUploadResponse { etag })
    }

    #[tracing::instrument(
        name = "s3.abort_multipart_upload",
        skip(self, key),
        fields(s3.bucket = %bucket, s3.upload_id = %upload_id),
        err
    )]
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), S3ClientError> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| map_sdk_error("AbortMultipartUpload", e))?;
        Ok(())
    }
}

#[async_trait]
impl BucketInspector for S3Client {
    #[tracing::instrument(name = "s3.list_buckets", skip(self), err)]
    async fn list_buckets(&self) -> Result<Vec<String>, S3ClientError> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| map_sdk_error("ListBuckets", e))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    #[tracing::instrument(name = "s3.head_bucket", skip(self), err)]
    async fn head_bucket(&self, bucket: &str) -> Result<(), S3ClientError> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| map_sdk_error("HeadBucket", e))?;
        Ok(())
    }

    #[tracing::instrument(name = "s3.list_objects", skip(self), err)]
    async fn list_objects(
        &self,
        bucket: &str,
        max_keys: i32,
    ) -> Result<Vec<ObjectSummary>, S3ClientError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| map_sdk_error("ListObjectsV2", e))?;

        Ok(output
            .contents()
            .iter()
            .map(|object| ObjectSummary {
                key: object.key().unwrap_or_default().to_string(),
                size: object.size().unwrap_or_default(),
                last_modified: object.last_modified().and_then(|t| {
                    chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())
                }),
            })
            .collect())
    }
}
