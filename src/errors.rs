//! Error taxonomy for conformance probes.
//!
//! Every failure a scenario can observe is one of these variants.  The
//! adapter maps raw SDK/transport failures into the taxonomy; scenarios
//! interpret them (for example, expecting [`ProbeError::NotFound`] after
//! a delete).  The runner renders `kind(): message` into the failed
//! scenario's result detail.

use thiserror::Error;

/// Failure observed while probing the backend under test.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Transport-level failure or call timeout.
    #[error("{message}")]
    Connectivity { message: String },

    /// The backend rejected the configured credentials.
    #[error("{message}")]
    Auth { message: String },

    /// The requested bucket or object does not exist.
    #[error("{resource} does not exist")]
    NotFound { resource: String },

    /// A harness-side invariant was violated before reaching the wire
    /// (e.g. an undersized non-final multipart part).
    #[error("{message}")]
    Validation { message: String },

    /// Retrieved content differs from what was uploaded.
    #[error("{detail}")]
    IntegrityMismatch { detail: String },

    /// Teardown failed for one specific key.  Recorded as a warning by
    /// the cleanup manager, never escalated to suite failure.
    #[error("cleanup of {key} failed: {message}")]
    Cleanup { key: String, message: String },

    /// Any other non-2xx backend response, surfaced with its protocol
    /// error code.  Interpretation is the scenario's job.
    #[error("{code}: {message}")]
    Backend { code: String, message: String },
}

impl ProbeError {
    /// Stable taxonomy name used in report details and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Connectivity { .. } => "ConnectivityError",
            ProbeError::Auth { .. } => "AuthError",
            ProbeError::NotFound { .. } => "NotFoundError",
            ProbeError::Validation { .. } => "ValidationError",
            ProbeError::IntegrityMismatch { .. } => "IntegrityMismatchError",
            ProbeError::Cleanup { .. } => "CleanupError",
            ProbeError::Backend { .. } => "BackendError",
        }
    }

    /// True when the error means "the resource is absent".
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProbeError::NotFound { .. })
    }

    /// Protocol error code, when the backend supplied one.
    pub fn backend_code(&self) -> Option<&str> {
        match self {
            ProbeError::Backend { code, .. } => Some(code),
            _ => None,
        }
    }

    /// True when the backend explicitly declared the operation
    /// unsupported.  Scenarios map this to a `Skipped` outcome; any
    /// other failure stays a failure.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self.backend_code(),
            Some("NotImplemented" | "NotSupported" | "MethodNotAllowed")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_are_stable() {
        let err = ProbeError::Validation {
            message: "part 1 undersized".into(),
        };
        assert_eq!(err.kind(), "ValidationError");

        let err = ProbeError::NotFound {
            resource: "bucket/key".into(),
        };
        assert_eq!(err.kind(), "NotFoundError");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unsupported_detection() {
        let err = ProbeError::Backend {
            code: "NotImplemented".into(),
            message: "versioning is not implemented".into(),
        };
        assert!(err.is_unsupported());

        let err = ProbeError::Backend {
            code: "InternalError".into(),
            message: "boom".into(),
        };
        assert!(!err.is_unsupported());
        assert_eq!(err.backend_code(), Some("InternalError"));
    }

    #[test]
    fn test_display_carries_message() {
        let err = ProbeError::Backend {
            code: "AccessDenied".into(),
            message: "Access Denied".into(),
        };
        assert_eq!(err.to_string(), "AccessDenied: Access Denied");
    }
}
