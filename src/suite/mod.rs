//! Scenario registry and runner.
//!
//! Scenarios are registered once, in declaration order, and executed in
//! exactly that order -- later cases may depend on fixtures earlier ones
//! created.  A failing scenario never aborts the suite: its error is
//! converted into a `Failed` result at the runner boundary and execution
//! moves on.  Panics are harness bugs and are allowed to propagate.

pub mod context;
pub mod scenarios;

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tracing::{info, warn};

use crate::errors::ProbeError;
use crate::report::{RunReport, Status, TestResult};
use context::RunContext;

/// Successful scenario resolution.
#[derive(Debug, Clone)]
pub enum Outcome {
    Passed,
    /// The backend explicitly does not support the probed feature.
    Skipped { reason: String },
}

/// Future returned by a scenario body.
pub type ScenarioFuture<'a> = Pin<Box<dyn Future<Output = Result<Outcome, ProbeError>> + Send + 'a>>;

/// A scenario entry point.  Receives the shared run context; every key
/// it creates must be registered there so cleanup can find it.
pub type ScenarioFn = for<'a> fn(&'a RunContext) -> ScenarioFuture<'a>;

/// One registered conformance check.  Immutable once registered.
pub struct TestCase {
    pub name: &'static str,
    pub run: ScenarioFn,
}

/// Ordered collection of test cases with unique names.
#[derive(Default)]
pub struct ScenarioRegistry {
    cases: Vec<TestCase>,
    names: HashSet<&'static str>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a case.  Registration order is execution order.
    ///
    /// # Panics
    ///
    /// Panics on a duplicate name: that is a programming error in the
    /// harness, not a runtime condition.
    pub fn register(&mut self, name: &'static str, run: ScenarioFn) {
        assert!(
            self.names.insert(name),
            "duplicate scenario name registered: {name}"
        );
        self.cases.push(TestCase { name, run });
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// Executes a registry against a run context, isolating failures.
pub struct Runner {
    registry: ScenarioRegistry,
}

impl Runner {
    pub fn new(registry: ScenarioRegistry) -> Self {
        Self { registry }
    }

    /// Run every case in registration order and collect results.
    ///
    /// Errors raised inside a scenario become `Failed` results carrying
    /// the error's taxonomy kind and message; they never propagate past
    /// this boundary.
    pub async fn run(&self, ctx: &RunContext) -> RunReport {
        let mut report = RunReport::new();

        info!(
            "running {} scenarios against bucket={} prefix={}",
            self.registry.len(),
            ctx.bucket(),
            ctx.key_prefix()
        );

        for case in self.registry.cases() {
            let start = Instant::now();
            let outcome = (case.run)(ctx).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let result = match outcome {
                Ok(Outcome::Passed) => {
                    info!("{}: passed ({duration_ms}ms)", case.name);
                    TestResult {
                        name: case.name.to_string(),
                        status: Status::Passed,
                        detail: None,
                        duration_ms,
                    }
                }
                Ok(Outcome::Skipped { reason }) => {
                    info!("{}: skipped: {reason}", case.name);
                    TestResult {
                        name: case.name.to_string(),
                        status: Status::Skipped,
                        detail: Some(reason),
                        duration_ms,
                    }
                }
                Err(e) => {
                    let detail = format!("{}: {}", e.kind(), e);
                    warn!("{}: failed: {detail}", case.name);
                    TestResult {
                        name: case.name.to_string(),
                        status: Status::Failed,
                        detail: Some(detail),
                        duration_ms,
                    }
                }
            };

            report.push(result);
        }

        report
    }
}
