//! Shared run context.
//!
//! One [`RunContext`] exists per run.  It owns the target bucket name,
//! the time-derived key prefix that namespaces every fixture this run
//! creates, and the bookkeeping the cleanup manager consumes: the
//! created-key set and any multipart uploads still open.  Scenarios
//! mutate the bookkeeping only through the accessors here; both sets
//! are mutex-guarded so a future concurrent runner needs no interface
//! change.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::client::ObjectStoreClient;

/// State shared by every scenario in one run.
pub struct RunContext {
    client: Arc<dyn ObjectStoreClient>,
    bucket: String,
    key_prefix: String,
    created_keys: Mutex<BTreeSet<String>>,
    /// upload_id -> key, for uploads not yet completed or aborted.
    open_uploads: Mutex<HashMap<String, String>>,
}

impl RunContext {
    /// Create a context with a fresh run prefix.
    ///
    /// The prefix combines the unix start time with a random suffix so
    /// two runs never share a key namespace, even when started within
    /// the same second.
    pub fn new(client: Arc<dyn ObjectStoreClient>, bucket: impl Into<String>) -> Self {
        Self::with_prefix(client, bucket, generate_run_prefix())
    }

    /// Create a context with an explicit prefix (tests).
    pub fn with_prefix(
        client: Arc<dyn ObjectStoreClient>,
        bucket: impl Into<String>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key_prefix: key_prefix.into(),
            created_keys: Mutex::new(BTreeSet::new()),
            open_uploads: Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &dyn ObjectStoreClient {
        self.client.as_ref()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Derive a full key inside the run namespace without registering it.
    pub fn key(&self, name: &str) -> String {
        format!("{}/{}", self.key_prefix, name)
    }

    /// Derive a full key and register it for cleanup.  Scenarios call
    /// this before uploading so the key is reclaimed even when the
    /// scenario fails mid-way.
    pub fn tracked_key(&self, name: &str) -> String {
        let key = self.key(name);
        self.register_key(&key);
        key
    }

    /// Register an already-derived key for cleanup.  Re-registering is a
    /// no-op.
    pub fn register_key(&self, key: &str) {
        self.created_keys
            .lock()
            .expect("created-key set poisoned")
            .insert(key.to_string());
    }

    /// Snapshot of all keys created so far, in sorted order.
    pub fn created_keys(&self) -> Vec<String> {
        self.created_keys
            .lock()
            .expect("created-key set poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Record a multipart upload the backend considers open.
    pub fn register_upload(&self, upload_id: &str, key: &str) {
        self.open_uploads
            .lock()
            .expect("open-upload set poisoned")
            .insert(upload_id.to_string(), key.to_string());
    }

    /// Forget an upload after it completed or was aborted.
    pub fn clear_upload(&self, upload_id: &str) {
        self.open_uploads
            .lock()
            .expect("open-upload set poisoned")
            .remove(upload_id);
    }

    /// Snapshot of (upload_id, key) pairs still open.
    pub fn open_uploads(&self) -> Vec<(String, String)> {
        self.open_uploads
            .lock()
            .expect("open-upload set poisoned")
            .iter()
            .map(|(id, key)| (id.clone(), key.clone()))
            .collect()
    }
}

/// Time-derived run prefix: `conformance-<unix-secs>-<4 hex digits>`.
fn generate_run_prefix() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("conformance-{}-{:04x}", secs, rand::random::<u16>())
}
