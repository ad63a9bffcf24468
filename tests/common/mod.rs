//! Shared test infrastructure
//!
//! - [`RecordingStore`]: in-memory [`ObjectStore`] that records every call
//!   and can be told to fail initiate, a specific part, or complete
//! - Fixture helpers for random source files
//! - R2 configuration pointing at a mock server

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use r2_uplink::config::R2Config;
use r2_uplink::s3::{
    ObjectStore, S3ClientError, S3CompleteMultipartUploadResponse, S3CompletedPart,
    S3CreateMultipartUploadResponse, S3PutObjectResponse, S3UploadPartResponse,
};
use rand::RngCore;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

pub const KIB: u64 = 1024;

/// One backend call as seen by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    PutObject { key: String, len: usize },
    CreateMultipartUpload { key: String },
    UploadPart { part_number: u32, len: usize },
    CompleteMultipartUpload { part_numbers: Vec<u32> },
    AbortMultipartUpload { upload_id: String },
}

#[derive(Default)]
struct StoreState {
    calls: Vec<Call>,
    objects: HashMap<(String, String), Bytes>,
    sessions: HashMap<String, (String, String, HashMap<u32, Bytes>)>,
    next_upload: u32,
}

/// In-memory object store with failure injection
#[derive(Clone, Default)]
pub struct RecordingStore {
    state: Arc<Mutex<StoreState>>,
    fail_part: Option<u32>,
    fail_create: bool,
    fail_complete: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject `UploadPart` for this part number with a 500
    pub fn failing_part(mut self, part_number: u32) -> Self {
        self.fail_part = Some(part_number);
        self
    }

    /// Reject `CreateMultipartUpload` with a 403
    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Reject `CompleteMultipartUpload` with a 500, keeping the session open
    pub fn failing_complete(mut self) -> Self {
        self.fail_complete = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Readable object at (bucket, key), if one was committed
    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Sessions that were opened and never completed or aborted
    pub fn open_sessions(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    /// Part numbers stored for the only open session
    pub fn orphaned_parts(&self) -> Vec<u32> {
        let state = self.state.lock().unwrap();
        let mut parts: Vec<u32> = state
            .sessions
            .values()
            .flat_map(|(_, _, parts)| parts.keys().copied())
            .collect();
        parts.sort_unstable();
        parts
    }
}

fn etag_for(data: &[u8]) -> String {
    format!("\"{:08x}-{}\"", data.iter().map(|b| *b as u32).sum::<u32>(), data.len())
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
    ) -> Result<S3PutObjectResponse, S3ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::PutObject {
            key: key.to_string(),
            len: body.len(),
        });
        let etag = etag_for(&body);
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(S3PutObjectResponse { etag })
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<S3CreateMultipartUploadResponse, S3ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateMultipartUpload {
            key: key.to_string(),
        });
        if self.fail_create {
            return Err(S3ClientError::from_status(
                "CreateMultipartUpload",
                Some(403),
                Some("AccessDenied"),
                "Access Denied".into(),
            ));
        }
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.sessions.insert(
            upload_id.clone(),
            (bucket.to_string(), key.to_string(), HashMap::new()),
        );
        Ok(S3CreateMultipartUploadResponse { upload_id })
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<S3UploadPartResponse, S3ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::UploadPart {
            part_number,
            len: body.len(),
        });
        if self.fail_part == Some(part_number) {
            return Err(S3ClientError::from_status(
                "UploadPart",
                Some(500),
                Some("InternalError"),
                "connection reset".into(),
            ));
        }
        let etag = etag_for(&body);
        let session = state.sessions.get_mut(upload_id).ok_or_else(|| {
            S3ClientError::from_status("UploadPart", Some(404), Some("NoSuchUpload"), upload_id.into())
        })?;
        session.2.insert(part_number, body);
        Ok(S3UploadPartResponse { etag })
    }

    async fn complete_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        parts: Vec<S3CompletedPart>,
    ) -> Result<S3CompleteMultipartUploadResponse, S3ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CompleteMultipartUpload {
            part_numbers: parts.iter().map(|p| p.part_number).collect(),
        });
        if self.fail_complete {
            return Err(S3ClientError::from_status(
                "CompleteMultipartUpload",
                Some(500),
                Some("InternalError"),
                "We encountered an internal error. Please try again.".into(),
            ));
        }
        let (bucket, key, stored) = state.sessions.remove(upload_id).ok_or_else(|| {
            S3ClientError::from_status(
                "CompleteMultipartUpload",
                Some(404),
                Some("NoSuchUpload"),
                upload_id.into(),
            )
        })?;

        let mut object = Vec::new();
        for part in &parts {
            let data = stored.get(&part.part_number).ok_or_else(|| {
                S3ClientError::from_status(
                    "CompleteMultipartUpload",
                    Some(400),
                    Some("InvalidPart"),
                    format!("part {} was never uploaded", part.part_number),
                )
            })?;
            object.extend_from_slice(data);
        }
        state.objects.insert((bucket, key), Bytes::from(object));
        Ok(S3CompleteMultipartUploadResponse {
            etag: format!("\"{}-{}\"", upload_id, parts.len()),
        })
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> Result<(), S3ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::AbortMultipartUpload {
            upload_id: upload_id.to_string(),
        });
        state.sessions.remove(upload_id);
        Ok(())
    }
}

/// Temporary file filled with `len` random bytes
pub fn random_file(len: u64) -> (tempfile::NamedTempFile, Vec<u8>) {
    let mut data = vec![0u8; len as usize];
    rand::rng().fill_bytes(&mut data);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();
    (file, data)
}

/// R2 settings that send every request to `endpoint`
pub fn r2_config_for(endpoint: &str) -> R2Config {
    R2Config {
        account_id: "0123456789abcdef".to_string(),
        access_key_id: "test-access-key-id".to_string(),
        secret_access_key: "test-secret-access-key".to_string(),
        endpoint: Some(endpoint.to_string()),
    }
}
