//! AWS SDK adapter for the backend under test.
//!
//! Wraps `aws-sdk-s3` behind [`ObjectStoreClient`].  Responsibilities at
//! this boundary:
//!   - decode SDK responses into the typed result structs,
//!   - classify SDK failures into the [`ProbeError`] taxonomy,
//!   - bound every call with the configured timeout (a timed-out call is
//!     a `Connectivity` error, never retried here).
//!
//! Retry policy, connection pooling and request signing all live inside
//! the SDK; the harness never reimplements them.

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::{
    BatchDeleteError, BatchDeleteOutcome, BucketEntry, ClientFuture, CompletedUpload, GetOutput,
    HeadOutput, ObjectEntry, ObjectStoreClient, ObjectVersionEntry, PresignOp, PutOutput,
    UploadedPart,
};
use crate::config::Config;
use crate::errors::ProbeError;

/// `ObjectStoreClient` implementation backed by the AWS SDK.
pub struct AwsClient {
    client: Client,
    timeout: Duration,
}

impl AwsClient {
    /// Build a client for the configured endpoint with static credentials
    /// and the configured addressing style.
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let creds = aws_sdk_s3::config::Credentials::new(
            &config.access_key,
            &config.secret_key,
            None, // session_token
            None, // expiry
            "s3conform-config",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(creds)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.path_style)
            .build();

        debug!(
            "AWS adapter initialized: endpoint={} region={} path_style={}",
            config.endpoint, config.region, config.path_style
        );

        Ok(Self {
            client: Client::from_conf(s3_config),
            timeout: config.timeout,
        })
    }

    /// Run `fut` under the configured per-call timeout.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, ProbeError>
    where
        F: Future<Output = Result<T, ProbeError>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Connectivity {
                message: format!("{op} timed out after {:?}", self.timeout),
            }),
        }
    }
}

/// Classify an SDK error into the probe taxonomy.
///
/// Transport problems (dispatch failure, SDK-level timeout) become
/// `Connectivity`; service errors are classified by their protocol code;
/// anything unrecognized stays a `Backend` error with the code attached.
fn classify<E, R>(op: &str, resource: &str, err: SdkError<E, R>) -> ProbeError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ProbeError::Connectivity {
            message: format!("{op}: {}", DisplayErrorContext(&err)),
        },
        _ => {
            let code = err.meta().code().unwrap_or("Unknown").to_string();
            let message = err
                .meta()
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}", DisplayErrorContext(&err)));
            classify_code(&code, resource, message)
        }
    }
}

/// Classify an already-extracted service error (used where a call site
/// first checks a specific variant such as `is_not_found`).
fn classify_service<E>(op: &str, resource: &str, err: E) -> ProbeError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err.meta().code().unwrap_or("Unknown").to_string();
    let message = err
        .meta()
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{op}: {err}"));
    classify_code(&code, resource, message)
}

/// Pure classification of a protocol error code.
fn classify_code(code: &str, resource: &str, message: String) -> ProbeError {
    match code {
        "NoSuchKey" | "NoSuchBucket" | "NoSuchUpload" | "NotFound" | "404" => {
            ProbeError::NotFound {
                resource: resource.to_string(),
            }
        }
        "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken" => {
            ProbeError::Auth { message }
        }
        _ => ProbeError::Backend {
            code: code.to_string(),
            message,
        },
    }
}

impl ObjectStoreClient for AwsClient {
    fn list_buckets(&self) -> ClientFuture<'_, Vec<BucketEntry>> {
        Box::pin(self.bounded("list_buckets", async {
            let resp = self
                .client
                .list_buckets()
                .send()
                .await
                .map_err(|e| classify("list_buckets", "buckets", e))?;

            Ok(resp
                .buckets()
                .iter()
                .filter_map(|b| {
                    b.name().map(|name| BucketEntry {
                        name: name.to_string(),
                        created_at: b.creation_date().map(ToString::to_string),
                    })
                })
                .collect())
        }))
    }

    fn head_bucket(&self, bucket: &str) -> ClientFuture<'_, ()> {
        let bucket = bucket.to_string();
        Box::pin(self.bounded("head_bucket", async move {
            match self.client.head_bucket().bucket(&bucket).send().await {
                Ok(_) => Ok(()),
                Err(e @ (SdkError::TimeoutError(_) | SdkError::DispatchFailure(_))) => {
                    Err(classify("head_bucket", &bucket, e))
                }
                Err(e) => {
                    // Head responses carry no error body; the typed check
                    // is the only reliable not-found signal.
                    let service_err = e.into_service_error();
                    if service_err.is_not_found() {
                        Err(ProbeError::NotFound { resource: bucket })
                    } else {
                        Err(classify_service("head_bucket", &bucket, service_err))
                    }
                }
            }
        }))
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: i32,
    ) -> ClientFuture<'_, Vec<ObjectEntry>> {
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        Box::pin(self.bounded("list_objects", async move {
            debug!("list_objects_v2: bucket={} prefix={}", bucket, prefix);

            let resp = self
                .client
                .list_objects_v2()
                .bucket(&bucket)
                .prefix(&prefix)
                .max_keys(max_keys)
                .send()
                .await
                .map_err(|e| classify("list_objects_v2", &bucket, e))?;

            Ok(resp
                .contents()
                .iter()
                .filter_map(|obj| {
                    obj.key().map(|key| ObjectEntry {
                        key: key.to_string(),
                        size: obj.size().unwrap_or(0),
                        last_modified: obj.last_modified().map(ToString::to_string),
                        etag: obj.e_tag().map(str::to_string),
                    })
                })
                .collect())
        }))
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> ClientFuture<'_, PutOutput> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        let content_type = content_type.to_string();
        let metadata = metadata.clone();
        Box::pin(self.bounded("put_object", async move {
            debug!(
                "put_object: bucket={} key={} len={}",
                bucket,
                key,
                body.len()
            );

            let mut req = self
                .client
                .put_object()
                .bucket(&bucket)
                .key(&key)
                .content_type(&content_type)
                .body(aws_sdk_s3::primitives::ByteStream::from(body));

            if !metadata.is_empty() {
                req = req.set_metadata(Some(metadata));
            }

            let resource = format!("{bucket}/{key}");
            let resp = req
                .send()
                .await
                .map_err(|e| classify("put_object", &resource, e))?;

            Ok(PutOutput {
                etag: resp.e_tag().unwrap_or_default().to_string(),
            })
        }))
    }

    fn get_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, GetOutput> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(self.bounded("get_object", async move {
            debug!("get_object: bucket={} key={}", bucket, key);

            let resource = format!("{bucket}/{key}");
            let resp = self
                .client
                .get_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| match e {
                    e @ (SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)) => {
                        classify("get_object", &resource, e)
                    }
                    e => {
                        let service_err = e.into_service_error();
                        if service_err.is_no_such_key() {
                            ProbeError::NotFound {
                                resource: resource.clone(),
                            }
                        } else {
                            classify_service("get_object", &resource, service_err)
                        }
                    }
                })?;

            let content_type = resp.content_type().map(str::to_string);
            let content_length = resp.content_length();
            let etag = resp.e_tag().unwrap_or_default().to_string();
            let last_modified = resp.last_modified().map(ToString::to_string);

            let body = resp
                .body
                .collect()
                .await
                .map_err(|e| ProbeError::Connectivity {
                    message: format!("get_object body: {e}"),
                })?
                .into_bytes();

            Ok(GetOutput {
                content_length,
                body,
                content_type,
                etag,
                last_modified,
            })
        }))
    }

    fn head_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, HeadOutput> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(self.bounded("head_object", async move {
            debug!("head_object: bucket={} key={}", bucket, key);

            let resource = format!("{bucket}/{key}");
            let resp = self
                .client
                .head_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| match e {
                    e @ (SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)) => {
                        classify("head_object", &resource, e)
                    }
                    e => {
                        let service_err = e.into_service_error();
                        if service_err.is_not_found() {
                            ProbeError::NotFound {
                                resource: resource.clone(),
                            }
                        } else {
                            classify_service("head_object", &resource, service_err)
                        }
                    }
                })?;

            Ok(HeadOutput {
                content_length: resp.content_length().unwrap_or(0),
                content_type: resp.content_type().map(str::to_string),
                etag: resp.e_tag().unwrap_or_default().to_string(),
                last_modified: resp.last_modified().map(ToString::to_string),
                metadata: resp.metadata().cloned().unwrap_or_default(),
            })
        }))
    }

    fn delete_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, ()> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(self.bounded("delete_object", async move {
            debug!("delete_object: bucket={} key={}", bucket, key);

            // S3 delete_object is idempotent -- no error for missing keys.
            let resource = format!("{bucket}/{key}");
            self.client
                .delete_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| classify("delete_object", &resource, e))?;

            Ok(())
        }))
    }

    fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> ClientFuture<'_, BatchDeleteOutcome> {
        let bucket = bucket.to_string();
        let keys = keys.to_vec();
        Box::pin(self.bounded("delete_objects", async move {
            debug!("delete_objects: bucket={} count={}", bucket, keys.len());

            let objects: Vec<ObjectIdentifier> = keys
                .iter()
                .map(|k| {
                    ObjectIdentifier::builder()
                        .key(k)
                        .build()
                        .map_err(|e| ProbeError::Validation {
                            message: format!("delete_objects identifier: {e}"),
                        })
                })
                .collect::<Result<_, _>>()?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(false)
                .build()
                .map_err(|e| ProbeError::Validation {
                    message: format!("delete_objects request: {e}"),
                })?;

            let resp = self
                .client
                .delete_objects()
                .bucket(&bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| classify("delete_objects", &bucket, e))?;

            Ok(BatchDeleteOutcome {
                deleted: resp
                    .deleted()
                    .iter()
                    .filter_map(|d| d.key().map(str::to_string))
                    .collect(),
                errors: resp
                    .errors()
                    .iter()
                    .map(|e| BatchDeleteError {
                        key: e.key().unwrap_or_default().to_string(),
                        code: e.code().unwrap_or("Unknown").to_string(),
                        message: e.message().unwrap_or_default().to_string(),
                    })
                    .collect(),
            })
        }))
    }

    fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> ClientFuture<'_, String> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(self.bounded("create_multipart_upload", async move {
            debug!("create_multipart_upload: bucket={} key={}", bucket, key);

            let resource = format!("{bucket}/{key}");
            let resp = self
                .client
                .create_multipart_upload()
                .bucket(&bucket)
                .key(&key)
                .content_type(&content_type)
                .send()
                .await
                .map_err(|e| classify("create_multipart_upload", &resource, e))?;

            resp.upload_id()
                .map(str::to_string)
                .ok_or_else(|| ProbeError::Backend {
                    code: "MissingUploadId".to_string(),
                    message: "backend did not return an upload id".to_string(),
                })
        }))
    }

    fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> ClientFuture<'_, String> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        let upload_id = upload_id.to_string();
        Box::pin(self.bounded("upload_part", async move {
            debug!(
                "upload_part: bucket={} key={} part={} len={}",
                bucket,
                key,
                part_number,
                body.len()
            );

            let resource = format!("{bucket}/{key}");
            let resp = self
                .client
                .upload_part()
                .bucket(&bucket)
                .key(&key)
                .upload_id(&upload_id)
                .part_number(part_number)
                .body(aws_sdk_s3::primitives::ByteStream::from(body))
                .send()
                .await
                .map_err(|e| classify("upload_part", &resource, e))?;

            resp.e_tag()
                .map(str::to_string)
                .ok_or_else(|| ProbeError::Backend {
                    code: "MissingETag".to_string(),
                    message: format!("backend did not acknowledge part {part_number}"),
                })
        }))
    }

    fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> ClientFuture<'_, CompletedUpload> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        let upload_id = upload_id.to_string();
        let parts = parts.to_vec();
        Box::pin(self.bounded("complete_multipart_upload", async move {
            debug!(
                "complete_multipart_upload: bucket={} key={} parts={}",
                bucket,
                key,
                parts.len()
            );

            let completed: Vec<CompletedPart> = parts
                .iter()
                .map(|p| {
                    CompletedPart::builder()
                        .e_tag(&p.etag)
                        .part_number(p.part_number)
                        .build()
                })
                .collect();

            let resource = format!("{bucket}/{key}");
            let resp = self
                .client
                .complete_multipart_upload()
                .bucket(&bucket)
                .key(&key)
                .upload_id(&upload_id)
                .multipart_upload(
                    CompletedMultipartUpload::builder()
                        .set_parts(Some(completed))
                        .build(),
                )
                .send()
                .await
                .map_err(|e| classify("complete_multipart_upload", &resource, e))?;

            Ok(CompletedUpload {
                etag: resp.e_tag().unwrap_or_default().to_string(),
                location: resp.location().map(str::to_string),
            })
        }))
    }

    fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> ClientFuture<'_, ()> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        let upload_id = upload_id.to_string();
        Box::pin(self.bounded("abort_multipart_upload", async move {
            debug!(
                "abort_multipart_upload: bucket={} key={} upload_id={}",
                bucket, key, upload_id
            );

            let resource = format!("{bucket}/{key}");
            self.client
                .abort_multipart_upload()
                .bucket(&bucket)
                .key(&key)
                .upload_id(&upload_id)
                .send()
                .await
                .map_err(|e| classify("abort_multipart_upload", &resource, e))?;

            Ok(())
        }))
    }

    fn list_object_versions(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> ClientFuture<'_, Vec<ObjectVersionEntry>> {
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        Box::pin(self.bounded("list_object_versions", async move {
            debug!(
                "list_object_versions: bucket={} prefix={}",
                bucket, prefix
            );

            let resp = self
                .client
                .list_object_versions()
                .bucket(&bucket)
                .prefix(&prefix)
                .send()
                .await
                .map_err(|e| classify("list_object_versions", &bucket, e))?;

            Ok(resp
                .versions()
                .iter()
                .filter_map(|v| {
                    v.key().map(|key| ObjectVersionEntry {
                        key: key.to_string(),
                        version_id: v.version_id().map(str::to_string),
                        size: v.size().unwrap_or(0),
                        last_modified: v.last_modified().map(ToString::to_string),
                        is_latest: v.is_latest().unwrap_or(false),
                    })
                })
                .collect())
        }))
    }

    fn presign(
        &self,
        op: PresignOp,
        bucket: &str,
        key: &str,
        ttl_secs: u64,
    ) -> ClientFuture<'_, String> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(self.bounded("presign", async move {
            let presign_config = PresigningConfig::expires_in(Duration::from_secs(ttl_secs))
                .map_err(|e| ProbeError::Validation {
                    message: format!("invalid presign ttl {ttl_secs}s: {e}"),
                })?;

            let resource = format!("{bucket}/{key}");
            let uri = match op {
                PresignOp::Get => self
                    .client
                    .get_object()
                    .bucket(&bucket)
                    .key(&key)
                    .presigned(presign_config)
                    .await
                    .map_err(|e| classify("presign get_object", &resource, e))?
                    .uri()
                    .to_string(),
                PresignOp::Put => self
                    .client
                    .put_object()
                    .bucket(&bucket)
                    .key(&key)
                    .presigned(presign_config)
                    .await
                    .map_err(|e| classify("presign put_object", &resource, e))?
                    .uri()
                    .to_string(),
            };

            Ok(uri)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_codes() {
        for code in ["NoSuchKey", "NoSuchBucket", "NotFound", "404"] {
            let err = classify_code(code, "bkt/key", "gone".into());
            assert!(err.is_not_found(), "{code} should map to NotFound");
        }
    }

    #[test]
    fn test_auth_codes() {
        for code in ["AccessDenied", "InvalidAccessKeyId", "SignatureDoesNotMatch"] {
            let err = classify_code(code, "bkt", "denied".into());
            assert_eq!(err.kind(), "AuthError", "{code} should map to Auth");
        }
    }

    #[test]
    fn test_unknown_code_stays_backend() {
        let err = classify_code("SlowDown", "bkt", "throttled".into());
        assert_eq!(err.kind(), "BackendError");
        assert_eq!(err.backend_code(), Some("SlowDown"));
    }
}
