//! In-memory `ObjectStoreClient` used by the harness self-tests.
//!
//! Implements S3 semantics the suite relies on: idempotent deletes,
//! MD5 ETags, composite multipart ETags, prefix-scoped listing.  A
//! `fail_deletes` switch lets tests exercise the cleanup manager's
//! warning path.

use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use s3conform::client::{
    BatchDeleteError, BatchDeleteOutcome, BucketEntry, ClientFuture, CompletedUpload, GetOutput,
    HeadOutput, ObjectEntry, ObjectStoreClient, ObjectVersionEntry, PresignOp, PutOutput,
    UploadedPart,
};
use s3conform::errors::ProbeError;
use s3conform::integrity::{composite_etag, compute_etag};

struct StoredEntry {
    data: Bytes,
    content_type: String,
    metadata: HashMap<String, String>,
    etag: String,
}

struct OpenUpload {
    key: String,
    content_type: String,
    parts: BTreeMap<i32, (Bytes, String)>,
}

/// In-memory fake backend for one bucket.
pub struct MemoryClient {
    bucket: String,
    objects: Mutex<HashMap<String, StoredEntry>>,
    uploads: Mutex<HashMap<String, OpenUpload>>,
    next_upload: AtomicU64,
    fail_deletes: AtomicBool,
    omit_content_length: AtomicBool,
    drop_capped_listings: AtomicBool,
}

impl MemoryClient {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(HashMap::new()),
            uploads: Mutex::new(HashMap::new()),
            next_upload: AtomicU64::new(1),
            fail_deletes: AtomicBool::new(false),
            omit_content_length: AtomicBool::new(false),
            drop_capped_listings: AtomicBool::new(false),
        }
    }

    /// Make every delete operation fail, to exercise cleanup warnings.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Stop reporting ContentLength on GetObject responses.
    pub fn omit_content_length(&self, omit: bool) {
        self.omit_content_length.store(omit, Ordering::SeqCst);
    }

    /// Return no entries whenever `max_keys` would truncate a listing.
    pub fn drop_capped_listings(&self, drop: bool) {
        self.drop_capped_listings.store(drop, Ordering::SeqCst);
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn open_upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    fn check_bucket(&self, bucket: &str) -> Result<(), ProbeError> {
        if bucket == self.bucket {
            Ok(())
        } else {
            Err(ProbeError::NotFound {
                resource: bucket.to_string(),
            })
        }
    }

    fn delete_failure(&self, key: &str) -> Option<ProbeError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            Some(ProbeError::Backend {
                code: "InternalError".to_string(),
                message: format!("injected delete failure for {key}"),
            })
        } else {
            None
        }
    }
}

impl ObjectStoreClient for MemoryClient {
    fn list_buckets(&self) -> ClientFuture<'_, Vec<BucketEntry>> {
        Box::pin(async move {
            Ok(vec![BucketEntry {
                name: self.bucket.clone(),
                created_at: None,
            }])
        })
    }

    fn head_bucket(&self, bucket: &str) -> ClientFuture<'_, ()> {
        let bucket = bucket.to_string();
        Box::pin(async move { self.check_bucket(&bucket) })
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: i32,
    ) -> ClientFuture<'_, Vec<ObjectEntry>> {
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        Box::pin(async move {
            self.check_bucket(&bucket)?;
            let objects = self.objects.lock().unwrap();
            let mut keys: Vec<&String> = objects
                .keys()
                .filter(|k| k.starts_with(&prefix))
                .collect();
            keys.sort();
            if self.drop_capped_listings.load(Ordering::SeqCst)
                && keys.len() > max_keys.max(0) as usize
            {
                return Ok(Vec::new());
            }
            Ok(keys
                .into_iter()
                .take(max_keys.max(0) as usize)
                .map(|k| {
                    let entry = &objects[k];
                    ObjectEntry {
                        key: k.clone(),
                        size: entry.data.len() as i64,
                        last_modified: None,
                        etag: Some(entry.etag.clone()),
                    }
                })
                .collect())
        })
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
        Box::pin(async move {
            self.check_bucket(&bucket)?;
            let etag = compute_etag(&body);
            self.objects.lock().unwrap().insert(
                key,
                StoredEntry {
                    data: body,
                    content_type,
                    metadata,
                    etag: etag.clone(),
                },
            );
            Ok(PutOutput { etag })
        })
    }

    fn get_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, GetOutput> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            self.check_bucket(&bucket)?;
            let objects = self.objects.lock().unwrap();
            let entry = objects.get(&key).ok_or_else(|| ProbeError::NotFound {
                resource: format!("{bucket}/{key}"),
            })?;
            let content_length = if self.omit_content_length.load(Ordering::SeqCst) {
                None
            } else {
                Some(entry.data.len() as i64)
            };
            Ok(GetOutput {
                body: entry.data.clone(),
                content_type: Some(entry.content_type.clone()),
                content_length,
                etag: entry.etag.clone(),
                last_modified: None,
            })
        })
    }

    fn head_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, HeadOutput> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            self.check_bucket(&bucket)?;
            let objects = self.objects.lock().unwrap();
            let entry = objects.get(&key).ok_or_else(|| ProbeError::NotFound {
                resource: format!("{bucket}/{key}"),
            })?;
            Ok(HeadOutput {
                content_length: entry.data.len() as i64,
                content_type: Some(entry.content_type.clone()),
                etag: entry.etag.clone(),
                last_modified: None,
                metadata: entry.metadata.clone(),
            })
        })
    }

    fn delete_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, ()> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            self.check_bucket(&bucket)?;
            if let Some(err) = self.delete_failure(&key) {
                return Err(err);
            }
            // Idempotent: removing an absent key succeeds.
            self.objects.lock().unwrap().remove(&key);
            Ok(())
        })
    }

    fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> ClientFuture<'_, BatchDeleteOutcome> {
        let bucket = bucket.to_string();
        let keys = keys.to_vec();
        Box::pin(async move {
            self.check_bucket(&bucket)?;
            let mut outcome = BatchDeleteOutcome::default();
            let mut objects = self.objects.lock().unwrap();
            for key in keys {
                if let Some(err) = self.delete_failure(&key) {
                    outcome.errors.push(BatchDeleteError {
                        key,
                        code: "InternalError".to_string(),
                        message: err.to_string(),
                    });
                    continue;
                }
                objects.remove(&key);
                outcome.deleted.push(key);
            }
            Ok(outcome)
        })
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
        Box::pin(async move {
            self.check_bucket(&bucket)?;
            let id = format!("upload-{}", self.next_upload.fetch_add(1, Ordering::SeqCst));
            self.uploads.lock().unwrap().insert(
                id.clone(),
                OpenUpload {
                    key,
                    content_type,
                    parts: BTreeMap::new(),
                },
            );
            Ok(id)
        })
    }

    fn upload_part(
        &self,
        bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> ClientFuture<'_, String> {
        let bucket = bucket.to_string();
        let upload_id = upload_id.to_string();
        Box::pin(async move {
            self.check_bucket(&bucket)?;
            let mut uploads = self.uploads.lock().unwrap();
            let upload = uploads.get_mut(&upload_id).ok_or_else(|| ProbeError::NotFound {
                resource: upload_id.clone(),
            })?;
            let etag = compute_etag(&body);
            upload.parts.insert(part_number, (body, etag.clone()));
            Ok(etag)
        })
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
        Box::pin(async move {
            self.check_bucket(&bucket)?;
            let mut uploads = self.uploads.lock().unwrap();
            let upload = uploads.remove(&upload_id).ok_or_else(|| ProbeError::NotFound {
                resource: upload_id.clone(),
            })?;

            // Parts must be listed in ascending part-number order and
            // reference acknowledged ETags.
            let mut assembled = Vec::new();
            let mut last_number = 0;
            let mut etags = Vec::new();
            for part in &parts {
                if part.part_number <= last_number {
                    return Err(ProbeError::Backend {
                        code: "InvalidPartOrder".to_string(),
                        message: "parts not in ascending order".to_string(),
                    });
                }
                last_number = part.part_number;
                let (data, etag) =
                    upload
                        .parts
                        .get(&part.part_number)
                        .ok_or_else(|| ProbeError::Backend {
                            code: "InvalidPart".to_string(),
                            message: format!("part {} was never uploaded", part.part_number),
                        })?;
                if *etag != part.etag {
                    return Err(ProbeError::Backend {
                        code: "InvalidPart".to_string(),
                        message: format!("part {} etag mismatch", part.part_number),
                    });
                }
                assembled.extend_from_slice(data);
                etags.push(etag.clone());
            }

            let etag = composite_etag(&etags).unwrap_or_else(|| compute_etag(&assembled));
            self.objects.lock().unwrap().insert(
                upload.key.clone(),
                StoredEntry {
                    data: Bytes::from(assembled),
                    content_type: upload.content_type.clone(),
                    metadata: HashMap::new(),
                    etag: etag.clone(),
                },
            );

            Ok(CompletedUpload {
                etag,
                location: Some(format!("memory://{bucket}/{key}")),
            })
        })
    }

    fn abort_multipart_upload(
        &self,
        bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> ClientFuture<'_, ()> {
        let bucket = bucket.to_string();
        let upload_id = upload_id.to_string();
        Box::pin(async move {
            self.check_bucket(&bucket)?;
            match self.uploads.lock().unwrap().remove(&upload_id) {
                Some(_) => Ok(()),
                None => Err(ProbeError::NotFound {
                    resource: upload_id,
                }),
            }
        })
    }

    fn list_object_versions(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> ClientFuture<'_, Vec<ObjectVersionEntry>> {
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        Box::pin(async move {
            self.check_bucket(&bucket)?;
            let objects = self.objects.lock().unwrap();
            let mut entries: Vec<ObjectVersionEntry> = objects
                .iter()
                .filter(|(k, _)| k.starts_with(&prefix))
                .map(|(k, entry)| ObjectVersionEntry {
                    key: k.clone(),
                    version_id: Some("null".to_string()),
                    size: entry.data.len() as i64,
                    last_modified: None,
                    is_latest: true,
                })
                .collect();
            entries.sort_by(|a, b| a.key.cmp(&b.key));
            Ok(entries)
        })
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
        Box::pin(async move {
            self.check_bucket(&bucket)?;
            Ok(format!("memory://{bucket}/{key}?op={op:?}&expires={ttl_secs}"))
        })
    }
}
