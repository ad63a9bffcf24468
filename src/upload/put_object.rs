//! PutObject handler
//!
//! Single-shot uploads for files at or below the multipart threshold. The
//! backend either stores the whole object or the call fails with nothing
//! created.

use super::{TransferRequest, UploadError, UploadResult, UploadStrategy};
use crate::s3::ObjectStore;
use bytes::Bytes;

/// Simple upload handler
pub struct PutObjectHandler<'a, S> {
    store: &'a S,
}

impl<'a, S: ObjectStore> PutObjectHandler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Read the whole file and send it as one object
    #[tracing::instrument(
        name = "upload.put_object",
        skip(self, request),
        fields(
            s3.bucket = %request.bucket(),
            s3.key = %request.key(),
            upload.bytes = expected_size,
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    pub async fn upload(
        &self,
        request: &TransferRequest,
        expected_size: u64,
    ) -> Result<UploadResult, UploadError> {
        let body = Bytes::from(tokio::fs::read(request.source_path()).await?);
        let bytes_written = body.len() as u64;

        if bytes_written != expected_size {
            tracing::warn!(
                expected = expected_size,
                actual = bytes_written,
                "Source file changed size while being read"
            );
        }

        let response = self
            .store
            .put_object(request.bucket(), request.key(), body)
            .await?;

        tracing::Span::current().record("s3.etag", response.etag.as_str());

        Ok(UploadResult {
            etag: response.etag,
            bytes_written,
            parts: 0,
            strategy: UploadStrategy::SingleShot,
        })
    }
}
