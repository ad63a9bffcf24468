//! Multipart upload handler
//!
//! Reads the source file sequentially in `part_size` chunks and sends each
//! chunk as the next numbered part. Only one chunk is held in memory at a
//! time, and reading the next chunk never overlaps sending the previous one.
//! The object becomes visible only when `complete` succeeds.

use super::{TransferRequest, UploadError, UploadResult, UploadStrategy};
use crate::metrics;
use crate::s3::{ObjectStore, S3CompletedPart};
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Minimum part size (5MB) accepted by S3 for every part but the last
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum size of a single part (5GB)
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum parts allowed
pub const MAX_PARTS: u64 = 10_000;

/// One multipart session, owned by a single transfer
#[derive(Debug)]
pub struct MultipartSession {
    pub upload_id: String,
    pub bucket: String,
    pub key: String,
    parts: Vec<CompletedPart>,
}

/// Completed part info
pub type CompletedPart = S3CompletedPart;

impl MultipartSession {
    pub fn new(upload_id: String, bucket: String, key: String) -> Self {
        Self {
            upload_id,
            bucket,
            key,
            parts: Vec::new(),
        }
    }

    /// Number the next part will get
    pub fn next_part_number(&self) -> u32 {
        self.parts.len() as u32 + 1
    }

    /// Record an acknowledged part
    ///
    /// Part numbers must arrive as 1, 2, 3, ... with no gaps or repeats.
    pub fn record_part(&mut self, part: CompletedPart) -> Result<(), UploadError> {
        let expected = self.next_part_number();
        if part.part_number != expected {
            return Err(UploadError::MultipartError(format!(
                "part {} recorded out of order, expected part {}",
                part.part_number, expected
            )));
        }
        self.parts.push(part);
        Ok(())
    }

    /// Parts recorded so far, in part-number order
    pub fn parts(&self) -> &[CompletedPart] {
        &self.parts
    }
}

/// Multipart upload handler
pub struct MultipartHandler<'a, S> {
    store: &'a S,
    part_size: u64,
    abort_on_failure: bool,
}

impl<'a, S: ObjectStore> MultipartHandler<'a, S> {
    /// Create a new multipart handler
    pub fn new(store: &'a S, part_size: u64) -> Self {
        if part_size < MIN_PART_SIZE {
            tracing::warn!(
                part_size,
                "Part size below 5MB; S3-compatible backends may reject non-final parts"
            );
        }
        Self {
            store,
            part_size,
            abort_on_failure: false,
        }
    }

    pub fn with_abort_on_failure(mut self, abort: bool) -> Self {
        self.abort_on_failure = abort;
        self
    }

    /// Run the whole multipart transfer: initiate, send every part, finalize
    ///
    /// If any part or the finalize call fails, the error is returned without
    /// finalizing. The session is aborted only when `abort_on_failure` is set;
    /// otherwise it is left for the backend's lifecycle rules to clean up.
    pub async fn upload(&self, request: &TransferRequest) -> Result<UploadResult, UploadError> {
        let mut session = self.create(request.bucket(), request.key()).await?;

        let outcome = match self.upload_parts(&mut session, request).await {
            Ok(bytes_written) => self.complete(&session, bytes_written).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                metrics::record_multipart_upload_success(result.parts);
                Ok(result)
            }
            Err(e) => {
                metrics::record_multipart_upload_failure();
                tracing::error!(
                    upload_id = %session.upload_id,
                    parts_uploaded = session.parts().len(),
                    error = %e,
                    "Multipart upload failed"
                );
                if self.abort_on_failure {
                    // The original failure is what the caller needs to see
                    if let Err(abort_err) = self.abort(&session).await {
                        tracing::warn!(
                            upload_id = %session.upload_id,
                            error = %abort_err,
                            "Failed to abort multipart upload"
                        );
                    }
                } else {
                    tracing::warn!(
                        upload_id = %session.upload_id,
                        "Multipart session left open on the backend"
                    );
                }
                Err(e)
            }
        }
    }

    /// Initiate a multipart upload
    #[tracing::instrument(
        name = "upload.multipart.create",
        skip(self),
        fields(s3.bucket = %bucket, s3.key = %key),
        err
    )]
    pub async fn create(&self, bucket: &str, key: &str) -> Result<MultipartSession, UploadError> {
        let response = self.store.create_multipart_upload(bucket, key).await?;

        tracing::info!(upload_id = %response.upload_id, "Created multipart upload");

        Ok(MultipartSession::new(
            response.upload_id,
            bucket.to_string(),
            key.to_string(),
        ))
    }

    /// Send file chunks as parts until a read returns zero bytes
    ///
    /// Returns the total number of bytes sent.
    async fn upload_parts(
        &self,
        session: &mut MultipartSession,
        request: &TransferRequest,
    ) -> Result<u64, UploadError> {
        let mut file = File::open(request.source_path()).await?;
        let expected_size = file.metadata().await?.len();
        let mut bytes_written = 0u64;

        loop {
            let remaining = expected_size.saturating_sub(bytes_written);
            let chunk = read_chunk(&mut file, self.part_size, remaining).await?;
            if chunk.is_empty() {
                break;
            }
            if u64::from(session.next_part_number()) > MAX_PARTS {
                return Err(UploadError::TooManyParts {
                    parts: u64::from(session.next_part_number()),
                });
            }

            let len = chunk.len() as u64;
            self.upload_part(session, chunk).await?;
            bytes_written += len;
        }

        Ok(bytes_written)
    }

    /// Upload the next part of `session`
    #[tracing::instrument(
        name = "upload.multipart.upload_part",
        skip(self, session, body),
        fields(
            upload_id = %session.upload_id,
            part_number = session.next_part_number(),
            upload.bytes = body.len()
        ),
        err
    )]
    pub async fn upload_part(
        &self,
        session: &mut MultipartSession,
        body: Bytes,
    ) -> Result<CompletedPart, UploadError> {
        let part_number = session.next_part_number();
        let size = body.len();

        let response = self
            .store
            .upload_part(
                &session.bucket,
                &session.key,
                &session.upload_id,
                part_number,
                body,
            )
            .await
            .map_err(|source| UploadError::PartFailed {
                part_number,
                upload_id: session.upload_id.clone(),
                source,
            })?;

        let part = CompletedPart {
            part_number,
            etag: response.etag,
        };
        session.record_part(part.clone())?;
        metrics::record_part_uploaded();

        tracing::info!(part_number, size, "Uploaded part");

        Ok(part)
    }

    /// Complete a multipart upload
    #[tracing::instrument(
        name = "upload.multipart.complete",
        skip(self, session),
        fields(upload_id = %session.upload_id, parts_count = session.parts().len()),
        err
    )]
    pub async fn complete(
        &self,
        session: &MultipartSession,
        bytes_written: u64,
    ) -> Result<UploadResult, UploadError> {
        if session.parts().is_empty() {
            return Err(UploadError::MultipartError("No parts uploaded".into()));
        }

        let response = self
            .store
            .complete_multipart_upload(
                &session.bucket,
                &session.key,
                &session.upload_id,
                session.parts().to_vec(),
            )
            .await?;

        tracing::info!(
            etag = %response.etag,
            parts = session.parts().len(),
            "Completed multipart upload"
        );

        Ok(UploadResult {
            etag: response.etag,
            bytes_written,
            parts: session.parts().len(),
            strategy: UploadStrategy::Multipart,
        })
    }

    /// Abort a multipart upload
    pub async fn abort(&self, session: &MultipartSession) -> Result<(), UploadError> {
        self.store
            .abort_multipart_upload(&session.bucket, &session.key, &session.upload_id)
            .await?;

        tracing::info!(upload_id = %session.upload_id, "Aborted multipart upload");

        Ok(())
    }
}

/// Read up to `part_size` bytes, looping over short reads
///
/// The buffer starts at `min(part_size, remaining)` and only grows if the
/// file is longer than it was when the transfer started. An empty result
/// means end of file.
async fn read_chunk(file: &mut File, part_size: u64, remaining: u64) -> std::io::Result<Bytes> {
    let capacity = usize::try_from(part_size.min(remaining)).unwrap_or(0);
    let mut buf = Vec::with_capacity(capacity);
    file.take(part_size).read_to_end(&mut buf).await?;
    Ok(Bytes::from(buf))
}
