//! s3conform — S3 API conformance test harness.
//!
//! Certifies that a storage backend implements object-storage API
//! semantics (bucket existence, object CRUD, multipart upload,
//! versioning, presigned URLs, content integrity) by running an ordered
//! suite of scenarios against it and producing a deterministic pass/fail
//! report.  The backend is reached only through the
//! [`client::ObjectStoreClient`] seam.

pub mod cleanup;
pub mod client;
pub mod config;
pub mod errors;
pub mod fixture;
pub mod integrity;
pub mod multipart;
pub mod report;
pub mod suite;
