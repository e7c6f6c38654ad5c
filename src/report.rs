//! Result aggregation and reporting.
//!
//! The aggregator accumulates [`TestResult`]s in execution order and the
//! reporter renders them deterministically: one line per case followed
//! by a totals block.  Rendering is pure; nothing here talks to the
//! backend.  Overall status maps to the process exit code: 0 iff no
//! scenario failed, 1 otherwise.  No other exit codes exist.

use serde::Serialize;
use std::fmt;

/// Verdict for one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Passed => "PASS",
            Status::Failed => "FAIL",
            Status::Skipped => "SKIP",
        };
        f.write_str(s)
    }
}

/// Recorded outcome of one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub name: String,
    pub status: Status,
    /// Diagnostic text for failures and skips.
    pub detail: Option<String>,
    pub duration_ms: u64,
}

/// A key the cleanup manager could not reclaim, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupWarning {
    pub key: String,
    pub message: String,
}

/// Append-only list of results plus teardown warnings.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    results: Vec<TestResult>,
    cleanup_warnings: Vec<CleanupWarning>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: TestResult) {
        self.results.push(result);
    }

    pub fn add_cleanup_warnings(&mut self, warnings: Vec<CleanupWarning>) {
        self.cleanup_warnings.extend(warnings);
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn passed_count(&self) -> usize {
        self.count(Status::Passed)
    }

    pub fn failed_count(&self) -> usize {
        self.count(Status::Failed)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(Status::Skipped)
    }

    /// Success iff no scenario failed.  Cleanup warnings (leaked keys)
    /// never flip the run status.
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Process exit code: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.is_success())
    }

    /// Deterministic text report.
    pub fn render(&self) -> String {
        let width = self
            .results
            .iter()
            .map(|r| r.name.len())
            .max()
            .unwrap_or(0)
            .max(20);

        let mut out = String::new();
        for result in &self.results {
            match &result.detail {
                Some(detail) => out.push_str(&format!(
                    "{:<width$} {} ({})\n",
                    result.name, result.status, detail
                )),
                None => out.push_str(&format!("{:<width$} {}\n", result.name, result.status)),
            }
        }

        out.push_str(&"-".repeat(width + 5));
        out.push('\n');
        out.push_str(&format!("Total:   {}\n", self.results.len()));
        out.push_str(&format!("Passed:  {}\n", self.passed_count()));
        out.push_str(&format!("Failed:  {}\n", self.failed_count()));
        if self.skipped_count() > 0 {
            out.push_str(&format!("Skipped: {}\n", self.skipped_count()));
        }

        if !self.cleanup_warnings.is_empty() {
            out.push_str(&format!(
                "Leaked fixtures ({}):\n",
                self.cleanup_warnings.len()
            ));
            for w in &self.cleanup_warnings {
                out.push_str(&format!("  {}: {}\n", w.key, w.message));
            }
        }

        out
    }

    /// JSON rendering of the full report.
    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn count(&self, status: Status) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, status: Status, detail: Option<&str>) -> TestResult {
        TestResult {
            name: name.to_string(),
            status,
            detail: detail.map(str::to_string),
            duration_ms: 7,
        }
    }

    #[test]
    fn test_counts_and_exit_code() {
        let mut report = RunReport::new();
        report.push(result("PutObject", Status::Passed, None));
        report.push(result("GetObject", Status::Passed, None));
        report.push(result("ObjectVersions", Status::Skipped, Some("unsupported")));

        assert_eq!(report.passed_count(), 2);
        assert_eq!(report.skipped_count(), 1);
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);

        report.push(result(
            "MultipartUpload",
            Status::Failed,
            Some("ValidationError: part 1 undersized"),
        ));
        assert!(!report.is_success());
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_render_is_ordered_and_totaled() {
        let mut report = RunReport::new();
        report.push(result("ListBuckets", Status::Passed, None));
        report.push(result("HeadBucket", Status::Failed, Some("NotFoundError: b")));

        let text = report.render();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("ListBuckets"));
        assert!(lines[0].ends_with("PASS"));
        assert!(lines[1].starts_with("HeadBucket"));
        assert!(lines[1].contains("FAIL"));
        assert!(text.contains("Total:   2"));
        assert!(text.contains("Passed:  1"));
        assert!(text.contains("Failed:  1"));
        assert!(!text.contains("Skipped:"));
    }

    #[test]
    fn test_cleanup_warnings_do_not_fail_the_run() {
        let mut report = RunReport::new();
        report.push(result("DeleteObject", Status::Passed, None));
        report.add_cleanup_warnings(vec![CleanupWarning {
            key: "conformance-1/test1.txt".to_string(),
            message: "InternalError: busy".to_string(),
        }]);

        assert!(report.is_success());
        assert!(report.render().contains("Leaked fixtures (1):"));
    }

    #[test]
    fn test_json_rendering() {
        let mut report = RunReport::new();
        report.push(result("PutObject", Status::Passed, None));
        let json = report.render_json().unwrap();
        assert!(json.contains("\"PutObject\""));
        assert!(json.contains("\"Passed\""));
    }

    #[test]
    fn test_empty_report_succeeds() {
        let report = RunReport::new();
        assert!(report.is_success());
        assert!(report.render().contains("Total:   0"));
    }
}
