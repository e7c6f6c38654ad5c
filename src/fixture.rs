//! Object fixtures.
//!
//! A fixture is the value a scenario intends to exist in the backend:
//! key, content, content type and user metadata.  Fixtures are created
//! before upload and logically destroyed when their backend object is
//! deleted; keys whose delete fails at teardown end up in the cleanup
//! manager's warning list.

use bytes::Bytes;
use std::collections::HashMap;

use crate::client::{ObjectStoreClient, PutOutput};
use crate::errors::ProbeError;

/// A single object a scenario uploads and verifies.
#[derive(Debug, Clone)]
pub struct ObjectFixture {
    /// Full key, unique within the run namespace.  May contain `/` to
    /// model nested namespaces; the harness performs no normalization.
    pub key: String,
    /// Exact bytes to upload.
    pub content: Bytes,
    /// MIME type sent with the upload.
    pub content_type: String,
    /// User metadata sent with the upload.
    pub metadata: HashMap<String, String>,
}

impl ObjectFixture {
    /// Text fixture with `text/plain` content type and no metadata.
    pub fn text(key: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content: Bytes::from(body.into()),
            content_type: "text/plain".to_string(),
            metadata: HashMap::new(),
        }
    }

    /// Binary fixture with `application/octet-stream` content type.
    pub fn binary(key: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            content: Bytes::from(body),
            content_type: "application/octet-stream".to_string(),
            metadata: HashMap::new(),
        }
    }

    /// Attach one metadata pair.
    pub fn with_metadata(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.metadata.insert(k.into(), v.into());
        self
    }

    /// Content length in bytes.
    pub fn content_length(&self) -> i64 {
        self.content.len() as i64
    }

    /// Upload this fixture through the adapter.
    pub async fn upload(
        &self,
        client: &dyn ObjectStoreClient,
        bucket: &str,
    ) -> Result<PutOutput, ProbeError> {
        client
            .put_object(
                bucket,
                &self.key,
                self.content.clone(),
                &self.content_type,
                &self.metadata,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_fixture() {
        let fx = ObjectFixture::text("run/test1.txt", "Hello, World!");
        assert_eq!(fx.content_length(), 13);
        assert_eq!(fx.content_type, "text/plain");
        assert!(fx.metadata.is_empty());
    }

    #[test]
    fn test_metadata_builder() {
        let fx = ObjectFixture::text("k", "v").with_metadata("test", "true");
        assert_eq!(fx.metadata.get("test").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_nested_key_is_not_normalized() {
        let fx = ObjectFixture::binary("folder/subfolder/test5.txt", vec![0u8; 4]);
        assert_eq!(fx.key, "folder/subfolder/test5.txt");
    }
}
