//! Content identity helpers.
//!
//! Round-trip verification plus the ETag arithmetic shared by the
//! multipart validator: quoted MD5-hex ETags for single objects and the
//! `md5(concat(binary part md5s))-N` composite form for multipart
//! completions.

use md5::{Digest, Md5};
use sha2::Sha256;

use crate::errors::ProbeError;

/// Above this size, round-trip comparison goes through a streaming
/// SHA-256 digest instead of byte-by-byte scanning.
const DIGEST_THRESHOLD: usize = 1024 * 1024;

/// Digest chunk size for the streaming path.
const DIGEST_CHUNK: usize = 64 * 1024;

/// Verify that `actual` is byte-for-byte what was uploaded.
///
/// Length is always checked first so truncation can never pass the
/// digest comparison.  Small payloads are compared directly and report
/// the first differing offset; large ones are compared via SHA-256.
pub fn verify_round_trip(expected: &[u8], actual: &[u8]) -> Result<(), ProbeError> {
    if expected.len() != actual.len() {
        return Err(ProbeError::IntegrityMismatch {
            detail: format!(
                "length mismatch: uploaded {} bytes, retrieved {}",
                expected.len(),
                actual.len()
            ),
        });
    }

    if expected.len() >= DIGEST_THRESHOLD {
        let expected_digest = sha256_hex(expected);
        let actual_digest = sha256_hex(actual);
        if expected_digest != actual_digest {
            return Err(ProbeError::IntegrityMismatch {
                detail: format!(
                    "sha256 mismatch over {} bytes: {} != {}",
                    expected.len(),
                    expected_digest,
                    actual_digest
                ),
            });
        }
        return Ok(());
    }

    if let Some(offset) = expected.iter().zip(actual.iter()).position(|(a, b)| a != b) {
        return Err(ProbeError::IntegrityMismatch {
            detail: format!("content differs at byte offset {offset}"),
        });
    }

    Ok(())
}

/// SHA-256 hex digest, fed in fixed-size chunks.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    for chunk in data.chunks(DIGEST_CHUNK) {
        hasher.update(chunk);
    }
    hex::encode(hasher.finalize())
}

/// Quoted MD5-hex ETag for a byte slice.
pub fn compute_etag(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Expected composite ETag for a multipart completion:
/// `"md5(concat(binary md5 of each part))-N"`.
///
/// Returns `None` when any part ETag is not a plain quoted MD5 hex
/// string (some backends return opaque tokens, which cannot be checked).
pub fn composite_etag(part_etags: &[String]) -> Option<String> {
    let mut combined: Vec<u8> = Vec::with_capacity(part_etags.len() * 16);
    for etag in part_etags {
        let hex_str = etag.trim_matches('"');
        let bytes = hex::decode(hex_str).ok()?;
        if bytes.len() != 16 {
            return None;
        }
        combined.extend_from_slice(&bytes);
    }

    let mut hasher = Md5::new();
    hasher.update(&combined);
    Some(format!(
        "\"{}-{}\"",
        hex::encode(hasher.finalize()),
        part_etags.len()
    ))
}
