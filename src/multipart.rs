//! Multipart upload validator.
//!
//! Drives the create / upload-part / complete protocol while enforcing
//! the wire invariants:
//!   - every part except the last is at least [`MIN_PART_SIZE`] bytes,
//!   - part numbers are 1-based and contiguous, assigned in upload order,
//!   - completion is only attempted once every part was acknowledged.
//!
//! An undersized chunk is a `Validation` error, never silently resized.
//! Any adapter failure moves the session to `Aborted`; abort issues one
//! best-effort AbortMultipartUpload and never retries.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::client::{CompletedUpload, ObjectStoreClient, UploadedPart};
use crate::errors::ProbeError;
use crate::integrity::composite_etag;

/// Minimum size of every non-final part: 5 MiB.
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Session lifecycle.  `Completed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Uninitiated,
    Initiated,
    PartsUploading,
    Completed,
    Aborted,
}

/// One multipart session against a single key.
pub struct MultipartValidator<'a> {
    client: &'a dyn ObjectStoreClient,
    bucket: &'a str,
    key: String,
    content_type: String,
    state: UploadState,
    upload_id: Option<String>,
    parts: Vec<UploadedPart>,
}

impl<'a> MultipartValidator<'a> {
    pub fn new(
        client: &'a dyn ObjectStoreClient,
        bucket: &'a str,
        key: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket,
            key: key.into(),
            content_type: content_type.into(),
            state: UploadState::Uninitiated,
            upload_id: None,
            parts: Vec::new(),
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Upload id issued by the backend, once initiated.
    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    /// Parts acknowledged so far, in upload order.
    pub fn parts(&self) -> &[UploadedPart] {
        &self.parts
    }

    /// Sum of all acknowledged chunk sizes.
    pub fn expected_total_size(&self) -> u64 {
        self.parts.iter().map(|p| p.size_bytes).sum()
    }

    /// Composite ETag the completed object should carry, when all part
    /// ETags are plain MD5 digests.
    pub fn expected_etag(&self) -> Option<String> {
        let etags: Vec<String> = self.parts.iter().map(|p| p.etag.clone()).collect();
        composite_etag(&etags)
    }

    /// `Uninitiated -> Initiated`: obtain an upload id.
    pub async fn initiate(&mut self) -> Result<(), ProbeError> {
        self.expect_state(UploadState::Uninitiated, "initiate")?;

        let upload_id = self
            .client
            .create_multipart_upload(self.bucket, &self.key, &self.content_type)
            .await?;

        debug!("multipart initiated: key={} upload_id={}", self.key, upload_id);
        self.upload_id = Some(upload_id);
        self.state = UploadState::Initiated;
        Ok(())
    }

    /// Upload the full ordered chunk sequence.
    ///
    /// Validates each chunk's size before transmitting it; an undersized
    /// non-final chunk aborts the session and returns `Validation`
    /// without any further network call.
    pub async fn upload_chunks(&mut self, chunks: &[Bytes]) -> Result<(), ProbeError> {
        self.expect_state(UploadState::Initiated, "upload_chunks")?;
        if chunks.is_empty() {
            return Err(ProbeError::Validation {
                message: "multipart upload requires at least one chunk".to_string(),
            });
        }

        self.state = UploadState::PartsUploading;
        let last = chunks.len() - 1;

        for (idx, chunk) in chunks.iter().enumerate() {
            let size = chunk.len() as u64;
            if idx < last && size < MIN_PART_SIZE {
                let message = format!(
                    "part {} is {} bytes, below the {} byte minimum for non-final parts",
                    idx + 1,
                    size,
                    MIN_PART_SIZE
                );
                self.abort().await;
                return Err(ProbeError::Validation { message });
            }

            let part_number = (idx + 1) as i32;
            let upload_id = self.upload_id_ref()?.to_string();
            let acked = self
                .client
                .upload_part(self.bucket, &self.key, &upload_id, part_number, chunk.clone())
                .await;
            match acked {
                Ok(etag) => {
                    debug!(
                        "part acknowledged: key={} part={} size={} etag={}",
                        self.key, part_number, size, etag
                    );
                    self.parts.push(UploadedPart {
                        part_number,
                        etag,
                        size_bytes: size,
                    });
                }
                Err(e) => {
                    self.abort().await;
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// `PartsUploading -> Completed`: combine all acknowledged parts and
    /// verify the composite object's identity.
    ///
    /// The completed object's reported size must equal the sum of chunk
    /// sizes; when the expected composite ETag is computable and the
    /// backend returned one of the same shape, they must agree.
    pub async fn complete(&mut self) -> Result<CompletedUpload, ProbeError> {
        self.expect_state(UploadState::PartsUploading, "complete")?;

        let upload_id = self.upload_id_ref()?.to_string();
        let result = self
            .client
            .complete_multipart_upload(self.bucket, &self.key, &upload_id, &self.parts)
            .await;
        let completed = match result {
            Ok(completed) => completed,
            Err(e) => {
                self.abort().await;
                return Err(e);
            }
        };

        self.state = UploadState::Completed;

        let expected_size = self.expected_total_size();
        let head = self.client.head_object(self.bucket, &self.key).await?;
        if head.content_length as u64 != expected_size {
            return Err(ProbeError::IntegrityMismatch {
                detail: format!(
                    "multipart object reports {} bytes, expected {} (sum of {} parts)",
                    head.content_length,
                    expected_size,
                    self.parts.len()
                ),
            });
        }

        if let Some(expected_etag) = self.expected_etag() {
            let suffix = format!("-{}\"", self.parts.len());
            if completed.etag.ends_with(&suffix) && completed.etag != expected_etag {
                return Err(ProbeError::IntegrityMismatch {
                    detail: format!(
                        "composite etag {} does not match expected {}",
                        completed.etag, expected_etag
                    ),
                });
            }
        }

        debug!(
            "multipart completed: key={} parts={} size={} etag={}",
            self.key,
            self.parts.len(),
            expected_size,
            completed.etag
        );
        Ok(completed)
    }

    /// Move to `Aborted`, issuing one best-effort AbortMultipartUpload.
    /// Failure to abort is logged and otherwise ignored; the cleanup
    /// manager reconciles whatever the backend kept.
    pub async fn abort(&mut self) {
        if matches!(self.state, UploadState::Completed | UploadState::Aborted) {
            return;
        }
        if let Some(upload_id) = self.upload_id.clone() {
            if let Err(e) = self
                .client
                .abort_multipart_upload(self.bucket, &self.key, &upload_id)
                .await
            {
                warn!(
                    "failed to abort multipart upload {} for {}: {}",
                    upload_id, self.key, e
                );
            }
        }
        self.state = UploadState::Aborted;
    }

    /// Initiate, upload and complete in one call.
    pub async fn run(&mut self, chunks: &[Bytes]) -> Result<CompletedUpload, ProbeError> {
        self.initiate().await?;
        self.upload_chunks(chunks).await?;
        self.complete().await
    }

    fn expect_state(&self, wanted: UploadState, op: &str) -> Result<(), ProbeError> {
        if self.state != wanted {
            return Err(ProbeError::Validation {
                message: format!(
                    "{op} called in state {:?}, expected {:?}",
                    self.state, wanted
                ),
            });
        }
        Ok(())
    }

    fn upload_id_ref(&self) -> Result<&str, ProbeError> {
        self.upload_id
            .as_deref()
            .ok_or_else(|| ProbeError::Validation {
                message: "multipart session has no upload id".to_string(),
            })
    }
}
