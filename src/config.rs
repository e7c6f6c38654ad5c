//! Harness configuration.
//!
//! Everything the run needs is collected once at startup (CLI flags with
//! environment fallbacks) into an immutable [`Config`] value that is
//! passed into the adapter and runner.  Nothing reads the environment
//! after startup.

use std::time::Duration;

/// Immutable run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Endpoint URL of the backend under test.
    pub endpoint: String,

    /// Access key presented to the backend.
    pub access_key: String,

    /// Secret key presented to the backend.
    pub secret_key: String,

    /// Region name sent with requests (many S3-compatible backends
    /// accept any value here).
    pub region: String,

    /// Target bucket all fixtures are created in.
    pub bucket: String,

    /// Per-call timeout for every adapter operation.
    pub timeout: Duration,

    /// Use path-style addressing (`endpoint/bucket/key`).  Most
    /// self-hosted backends require this.
    pub path_style: bool,
}

impl Config {
    /// Default per-call timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_plain_data() {
        let config = Config {
            endpoint: "http://localhost:8081".into(),
            access_key: "ak".into(),
            secret_key: "sk".into(),
            region: "us-east-1".into(),
            bucket: "test-virtual-1".into(),
            timeout: Duration::from_secs(Config::DEFAULT_TIMEOUT_SECS),
            path_style: true,
        };
        let copy = config.clone();
        assert_eq!(copy.bucket, "test-virtual-1");
        assert_eq!(copy.timeout, Duration::from_secs(30));
    }
}
