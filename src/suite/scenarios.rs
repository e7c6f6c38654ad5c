//! Built-in conformance scenarios.
//!
//! Declaration order is execution order and carries the temporal
//! dependencies between cases (upload before get, get before delete).
//! Every key a scenario creates goes through [`RunContext::tracked_key`]
//! so the cleanup manager can reclaim it even when the scenario fails
//! half-way.

use bytes::Bytes;
use tracing::debug;

use super::context::RunContext;
use super::{Outcome, ScenarioFuture, ScenarioRegistry};
use crate::client::PresignOp;
use crate::errors::ProbeError;
use crate::fixture::ObjectFixture;
use crate::integrity::verify_round_trip;
use crate::multipart::{MultipartValidator, UploadState};

const MIB: usize = 1024 * 1024;

const MAIN_KEY: &str = "test1.txt";
const MAIN_BODY: &str = "Hello, World!";
const NESTED_KEY: &str = "folder/test4.txt";
const DEEP_KEY: &str = "folder/subfolder/test5.txt";

const PRESIGN_TTL_SECS: u64 = 3600;

/// The full scenario suite in its canonical order.
pub fn builtin() -> ScenarioRegistry {
    let mut registry = ScenarioRegistry::new();
    registry.register("ListBuckets", list_buckets);
    registry.register("HeadBucket", head_bucket);
    registry.register("PutObject", put_object);
    registry.register("GetObject", get_object);
    registry.register("HeadObject", head_object);
    registry.register("ListObjects", list_objects);
    registry.register("NestedKeys", nested_keys);
    registry.register("MultipartUpload", multipart_upload);
    registry.register("MultipartUndersizedPart", multipart_undersized_part);
    registry.register("LargeObjectRoundTrip", large_object_round_trip);
    registry.register("ObjectVersions", object_versions);
    registry.register("PresignedPut", presigned_put);
    registry.register("PresignedGet", presigned_get);
    registry.register("DeleteObject", delete_object);
    registry.register("DeleteIdempotent", delete_idempotent);
    registry.register("DeleteObjectsBatch", delete_objects_batch);
    registry
}

fn list_buckets(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let buckets = ctx.client().list_buckets().await?;
        debug!("backend reports {} bucket(s)", buckets.len());
        Ok(Outcome::Passed)
    })
}

fn head_bucket(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        ctx.client().head_bucket(ctx.bucket()).await?;
        Ok(Outcome::Passed)
    })
}

fn put_object(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let fixture =
            ObjectFixture::text(ctx.tracked_key(MAIN_KEY), MAIN_BODY).with_metadata("test", "true");
        let put = fixture.upload(ctx.client(), ctx.bucket()).await?;
        if put.etag.is_empty() {
            return Err(ProbeError::Validation {
                message: "PutObject returned an empty ETag".to_string(),
            });
        }
        Ok(Outcome::Passed)
    })
}

fn get_object(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let key = ctx.key(MAIN_KEY);
        let got = ctx.client().get_object(ctx.bucket(), &key).await?;

        verify_round_trip(MAIN_BODY.as_bytes(), &got.body)?;
        // The reported length is authoritative; a backend that omits it
        // is non-conforming even when the body is intact.
        match got.content_length {
            Some(len) if len == MAIN_BODY.len() as i64 => Ok(Outcome::Passed),
            Some(len) => Err(ProbeError::IntegrityMismatch {
                detail: format!("ContentLength is {len}, expected {}", MAIN_BODY.len()),
            }),
            None => Err(ProbeError::Validation {
                message: "GetObject response did not report ContentLength".to_string(),
            }),
        }
    })
}

fn head_object(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let key = ctx.key(MAIN_KEY);
        let head = ctx.client().head_object(ctx.bucket(), &key).await?;

        if head.content_length != MAIN_BODY.len() as i64 {
            return Err(ProbeError::IntegrityMismatch {
                detail: format!(
                    "HeadObject ContentLength is {}, expected {}",
                    head.content_length,
                    MAIN_BODY.len()
                ),
            });
        }

        let got = ctx.client().get_object(ctx.bucket(), &key).await?;
        if !head.etag.is_empty() && !got.etag.is_empty() && head.etag != got.etag {
            return Err(ProbeError::IntegrityMismatch {
                detail: format!(
                    "Head ETag {} disagrees with Get ETag {}",
                    head.etag, got.etag
                ),
            });
        }

        if head.metadata.get("test").map(String::as_str) != Some("true") {
            return Err(ProbeError::Validation {
                message: format!(
                    "uploaded metadata not echoed by HeadObject (got {:?})",
                    head.metadata
                ),
            });
        }
        Ok(Outcome::Passed)
    })
}

fn list_objects(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let prefix = format!("{}/", ctx.key_prefix());
        let entries = ctx.client().list_objects(ctx.bucket(), &prefix, 100).await?;

        let main_key = ctx.key(MAIN_KEY);
        if !entries.iter().any(|e| e.key == main_key) {
            return Err(ProbeError::Validation {
                message: format!("listing under {prefix} does not contain {main_key}"),
            });
        }

        // Nothing outside the run namespace may appear under its prefix.
        if let Some(stray) = entries.iter().find(|e| !e.key.starts_with(&prefix)) {
            return Err(ProbeError::Validation {
                message: format!("listing leaked key {} from outside the run prefix", stray.key),
            });
        }

        // The namespace is known non-empty here, so MaxKeys=1 must
        // return exactly one entry.
        let capped = ctx.client().list_objects(ctx.bucket(), &prefix, 1).await?;
        if capped.len() != 1 {
            return Err(ProbeError::Validation {
                message: format!("MaxKeys=1 returned {} entries", capped.len()),
            });
        }
        Ok(Outcome::Passed)
    })
}

fn nested_keys(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        for (name, body) in [
            (NESTED_KEY, "Nested file test"),
            (DEEP_KEY, "Deep nested file test"),
        ] {
            let fixture = ObjectFixture::text(ctx.tracked_key(name), body);
            fixture.upload(ctx.client(), ctx.bucket()).await?;
            let got = ctx.client().get_object(ctx.bucket(), &fixture.key).await?;
            verify_round_trip(&fixture.content, &got.body)?;
        }
        Ok(Outcome::Passed)
    })
}

fn multipart_upload(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let key = ctx.tracked_key("multipart_test.bin");
        let chunks = vec![
            Bytes::from(vec![b'A'; 5 * MIB]),
            Bytes::from(vec![b'B'; 5 * MIB]),
            Bytes::from(vec![b'C'; MIB]),
        ];

        let mut session = MultipartValidator::new(
            ctx.client(),
            ctx.bucket(),
            &key,
            "application/octet-stream",
        );

        session.initiate().await?;
        if let Some(id) = session.upload_id() {
            ctx.register_upload(id, &key);
        }

        session.upload_chunks(&chunks).await?;
        let completed = session.complete().await?;
        if let Some(id) = session.upload_id() {
            ctx.clear_upload(id);
        }

        if completed.etag.is_empty() {
            return Err(ProbeError::Validation {
                message: "CompleteMultipartUpload returned an empty ETag".to_string(),
            });
        }
        Ok(Outcome::Passed)
    })
}

fn multipart_undersized_part(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let key = ctx.tracked_key("multipart_undersized.bin");
        // First part 4 MiB: below the non-final minimum, must be
        // rejected before any completion call.
        let chunks = vec![
            Bytes::from(vec![b'A'; 4 * MIB]),
            Bytes::from(vec![b'B'; 5 * MIB]),
        ];

        let mut session = MultipartValidator::new(
            ctx.client(),
            ctx.bucket(),
            &key,
            "application/octet-stream",
        );

        session.initiate().await?;
        if let Some(id) = session.upload_id() {
            ctx.register_upload(id, &key);
        }

        match session.upload_chunks(&chunks).await {
            Err(e) if e.kind() == "ValidationError" => {
                if session.state() != UploadState::Aborted {
                    return Err(ProbeError::Validation {
                        message: format!(
                            "session not aborted after rejection (state {:?})",
                            session.state()
                        ),
                    });
                }
                debug!("undersized part correctly rejected: {e}");
                Ok(Outcome::Passed)
            }
            Err(e) => Err(e),
            Ok(()) => Err(ProbeError::Validation {
                message: "undersized non-final part was not rejected".to_string(),
            }),
        }
    })
}

fn large_object_round_trip(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let fixture = ObjectFixture::binary(ctx.tracked_key("large_file.bin"), vec![b'A'; 10 * MIB]);
        fixture.upload(ctx.client(), ctx.bucket()).await?;

        let got = ctx.client().get_object(ctx.bucket(), &fixture.key).await?;
        verify_round_trip(&fixture.content, &got.body)?;
        Ok(Outcome::Passed)
    })
}

fn object_versions(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        // Second put of the same key gives versioning-enabled backends
        // something to list.
        let key = ctx.key(MAIN_KEY);
        let fixture = ObjectFixture::text(&key, "Hello, World! (second revision)");
        fixture.upload(ctx.client(), ctx.bucket()).await?;

        match ctx.client().list_object_versions(ctx.bucket(), &key).await {
            Ok(versions) => {
                if versions.iter().any(|v| v.key == key) {
                    Ok(Outcome::Passed)
                } else {
                    Err(ProbeError::Validation {
                        message: format!("no version entries returned for {key}"),
                    })
                }
            }
            Err(e) if e.is_unsupported() => Ok(Outcome::Skipped {
                reason: format!("backend does not support ListObjectVersions ({e})"),
            }),
            Err(e) => Err(e),
        }
    })
}

fn presigned_put(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let key = ctx.tracked_key("presigned-put.txt");
        let body = b"uploaded through a presigned URL";

        let url = ctx
            .client()
            .presign(PresignOp::Put, ctx.bucket(), &key, PRESIGN_TTL_SECS)
            .await?;

        let resp = reqwest::Client::new()
            .put(&url)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| ProbeError::Connectivity {
                message: format!("presigned PUT request: {e}"),
            })?;
        if !resp.status().is_success() {
            return Err(ProbeError::Backend {
                code: resp.status().as_str().to_string(),
                message: format!("presigned PUT rejected for {key}"),
            });
        }

        let got = ctx.client().get_object(ctx.bucket(), &key).await?;
        verify_round_trip(body, &got.body)?;
        Ok(Outcome::Passed)
    })
}

fn presigned_get(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let fixture = ObjectFixture::text(
            ctx.tracked_key("presigned-get.txt"),
            "downloaded through a presigned URL",
        );
        fixture.upload(ctx.client(), ctx.bucket()).await?;

        let url = ctx
            .client()
            .presign(PresignOp::Get, ctx.bucket(), &fixture.key, PRESIGN_TTL_SECS)
            .await?;

        let resp = reqwest::get(&url).await.map_err(|e| ProbeError::Connectivity {
            message: format!("presigned GET request: {e}"),
        })?;
        if !resp.status().is_success() {
            return Err(ProbeError::Backend {
                code: resp.status().as_str().to_string(),
                message: format!("presigned GET rejected for {}", fixture.key),
            });
        }

        let body = resp.bytes().await.map_err(|e| ProbeError::Connectivity {
            message: format!("presigned GET body: {e}"),
        })?;
        verify_round_trip(&fixture.content, &body)?;
        Ok(Outcome::Passed)
    })
}

fn delete_object(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let key = ctx.key(NESTED_KEY);
        ctx.client().delete_object(ctx.bucket(), &key).await?;

        match ctx.client().get_object(ctx.bucket(), &key).await {
            Err(e) if e.is_not_found() => Ok(Outcome::Passed),
            Err(e) => Err(e),
            Ok(_) => Err(ProbeError::Validation {
                message: format!("{key} still retrievable after delete, expected NotFound"),
            }),
        }
    })
}

fn delete_idempotent(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let fixture = ObjectFixture::text(ctx.tracked_key("delete-idempotent.txt"), "ephemeral");
        fixture.upload(ctx.client(), ctx.bucket()).await?;

        ctx.client().delete_object(ctx.bucket(), &fixture.key).await?;
        // Second delete of an absent key must succeed.
        ctx.client().delete_object(ctx.bucket(), &fixture.key).await?;
        Ok(Outcome::Passed)
    })
}

fn delete_objects_batch(ctx: &RunContext) -> ScenarioFuture<'_> {
    Box::pin(async move {
        let mut keys = Vec::new();
        for i in 0..3 {
            let fixture =
                ObjectFixture::text(ctx.tracked_key(&format!("batch/item-{i}.txt")), "batched");
            fixture.upload(ctx.client(), ctx.bucket()).await?;
            keys.push(fixture.key);
        }

        let outcome = ctx.client().delete_objects(ctx.bucket(), &keys).await?;
        if let Some(err) = outcome.errors.first() {
            return Err(ProbeError::Backend {
                code: err.code.clone(),
                message: format!("batch delete failed for {}: {}", err.key, err.message),
            });
        }

        let prefix = ctx.key("batch/");
        let remaining = ctx.client().list_objects(ctx.bucket(), &prefix, 10).await?;
        if !remaining.is_empty() {
            return Err(ProbeError::Validation {
                message: format!(
                    "{} object(s) still listed under {prefix} after batch delete",
                    remaining.len()
                ),
            });
        }
        Ok(Outcome::Passed)
    })
}
