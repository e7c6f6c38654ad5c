//! Client adapter seam.
//!
//! The harness core never talks to a concrete SDK.  Every backend
//! operation goes through [`ObjectStoreClient`], which works in terms of
//! typed per-operation result structs -- loosely-typed response payloads
//! are decoded at the adapter boundary and never leak into scenarios.
//!
//! The one production implementation is [`aws::AwsClient`]; tests inject
//! an in-memory fake.

pub mod aws;

use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::errors::ProbeError;

/// Boxed future returned by every adapter operation.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProbeError>> + Send + 'a>>;

/// One bucket from a ListBuckets response.
#[derive(Debug, Clone)]
pub struct BucketEntry {
    pub name: String,
    pub created_at: Option<String>,
}

/// One object from a ListObjectsV2 response.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
}

/// PutObject response.
#[derive(Debug, Clone)]
pub struct PutOutput {
    /// Quoted ETag as returned by the backend.
    pub etag: String,
}

/// GetObject response with the full body collected.
#[derive(Debug, Clone)]
pub struct GetOutput {
    pub body: Bytes,
    pub content_type: Option<String>,
    /// ContentLength exactly as the backend reported it; `None` when the
    /// response carried no length.  Never inferred from the body.
    pub content_length: Option<i64>,
    pub etag: String,
    pub last_modified: Option<String>,
}

/// HeadObject response (metadata only, no body).
#[derive(Debug, Clone)]
pub struct HeadOutput {
    pub content_length: i64,
    pub content_type: Option<String>,
    pub etag: String,
    pub last_modified: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// One acknowledged multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    /// 1-based, contiguous, assigned in upload order.
    pub part_number: i32,
    /// Quoted ETag the backend acknowledged for this part.
    pub etag: String,
    /// Size of the transmitted chunk.
    pub size_bytes: u64,
}

/// CompleteMultipartUpload response.
#[derive(Debug, Clone)]
pub struct CompletedUpload {
    pub etag: String,
    pub location: Option<String>,
}

/// Per-key outcomes of a batch DeleteObjects call.
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteOutcome {
    /// Keys the backend reported as deleted.
    pub deleted: Vec<String>,
    /// Keys the backend failed to delete, with their error codes.
    pub errors: Vec<BatchDeleteError>,
}

/// A single failed key inside a batch delete.
#[derive(Debug, Clone)]
pub struct BatchDeleteError {
    pub key: String,
    pub code: String,
    pub message: String,
}

/// One entry from a ListObjectVersions response.
#[derive(Debug, Clone)]
pub struct ObjectVersionEntry {
    pub key: String,
    pub version_id: Option<String>,
    pub size: i64,
    pub last_modified: Option<String>,
    pub is_latest: bool,
}

/// Operation a presigned URL grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresignOp {
    Get,
    Put,
}

/// Async contract the harness consumes from the backend under test.
///
/// Every call fails with a [`ProbeError`] on any non-2xx response; the
/// adapter classifies (not-found, auth, connectivity) but never decides
/// whether a failure is expected -- that is the scenario's job.
pub trait ObjectStoreClient: Send + Sync {
    /// List all buckets visible to the configured credentials.
    fn list_buckets(&self) -> ClientFuture<'_, Vec<BucketEntry>>;

    /// Check that `bucket` exists and is accessible.
    fn head_bucket(&self, bucket: &str) -> ClientFuture<'_, ()>;

    /// List up to `max_keys` objects under `prefix`.
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: i32,
    ) -> ClientFuture<'_, Vec<ObjectEntry>>;

    /// Upload a full object in one request.
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> ClientFuture<'_, PutOutput>;

    /// Download a full object.
    fn get_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, GetOutput>;

    /// Fetch object metadata without the body.
    fn head_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, HeadOutput>;

    /// Delete one object.  S3 semantics: deleting an absent key succeeds.
    fn delete_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, ()>;

    /// Delete up to 1000 objects in one request, returning per-key outcomes.
    fn delete_objects(&self, bucket: &str, keys: &[String])
        -> ClientFuture<'_, BatchDeleteOutcome>;

    /// Initiate a multipart upload, returning the upload id.
    fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> ClientFuture<'_, String>;

    /// Upload one part, returning its acknowledged ETag.
    fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> ClientFuture<'_, String>;

    /// Combine previously uploaded parts, in the given order, into the
    /// final object.
    fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> ClientFuture<'_, CompletedUpload>;

    /// Abandon a multipart upload and discard its parts.
    fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> ClientFuture<'_, ()>;

    /// List object versions under `prefix`.
    fn list_object_versions(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> ClientFuture<'_, Vec<ObjectVersionEntry>>;

    /// Issue a time-limited, credential-embedded URL for one operation.
    fn presign(
        &self,
        op: PresignOp,
        bucket: &str,
        key: &str,
        ttl_secs: u64,
    ) -> ClientFuture<'_, String>;
}
