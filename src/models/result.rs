//! Test outcome records
//!
//! Per-method result record, status lifecycle and run summary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use crate::case::CaseFailure;

/// Execution status of a single test method.
///
/// `Created` is the only non-terminal value; a result moves from it to
/// exactly one terminal status and never changes again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Created,
    Success,
    Failure,
    Skipped,
}

impl TestStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Created => "·",
            TestStatus::Success => "✓",
            TestStatus::Failure => "✗",
            TestStatus::Skipped => "○",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TestStatus::Created)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestStatus::Success)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Created => write!(f, "CREATED"),
            TestStatus::Success => write!(f, "SUCCESS"),
            TestStatus::Failure => write!(f, "FAILURE"),
            TestStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Outcome record for one test case execution.
#[derive(Clone, Debug, Serialize)]
pub struct TestResult {
    /// Name of the executed test case (`method` or `method[row]`).
    pub method_name: String,

    /// Fully qualified name of the owning test class.
    pub test_class: String,

    /// Current status; starts at `Created`.
    pub status: TestStatus,

    /// Start of execution, milliseconds since epoch (0 until started).
    pub start_ms: i64,

    /// End of execution, milliseconds since epoch (0 until finished).
    pub end_ms: i64,

    /// Failure captured during execution, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caught: Option<CaseFailure>,
}

impl TestResult {
    pub fn new(method_name: impl Into<String>, test_class: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            test_class: test_class.into(),
            status: TestStatus::Created,
            start_ms: 0,
            end_ms: 0,
            caught: None,
        }
    }

    /// Move the result to a terminal status.
    ///
    /// Only the `Created -> terminal` transition is allowed; an attempt to
    /// overwrite a terminal status is logged and ignored.
    pub fn mark(&mut self, status: TestStatus) {
        if self.status.is_terminal() {
            warn!(
                "Refusing to overwrite terminal status {} of {}.{} with {}",
                self.status, self.test_class, self.method_name, status
            );
            return;
        }
        self.status = status;
    }

    /// Move to a terminal status and attach the failure that caused it.
    pub fn mark_with(&mut self, status: TestStatus, caught: CaseFailure) {
        let transitioning = !self.status.is_terminal();
        self.mark(status);
        if transitioning && self.status == status {
            self.caught = Some(caught);
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.end_ms - self.start_ms).max(0)
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{} [{}ms]",
            self.status.symbol(),
            self.test_class,
            self.method_name,
            self.duration_ms()
        )?;
        if let Some(caught) = &self.caught {
            write!(f, " - {caught}")?;
        }
        Ok(())
    }
}

/// Aggregated view over a run's result map.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub unfinished: usize,
    pub total_duration_ms: i64,
}

impl RunSummary {
    pub fn new(results: &HashMap<String, TestResult>) -> Self {
        let total = results.len();
        let passed = results.values().filter(|r| r.status.is_success()).count();
        let failed = results
            .values()
            .filter(|r| r.status == TestStatus::Failure)
            .count();
        let skipped = results
            .values()
            .filter(|r| r.status == TestStatus::Skipped)
            .count();
        let unfinished = results
            .values()
            .filter(|r| r.status == TestStatus::Created)
            .count();
        let total_duration_ms = results.values().map(|r| r.duration_ms()).sum();

        Self {
            total,
            passed,
            failed,
            skipped,
            unfinished,
            total_duration_ms,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Skip: {}",
            self.total, self.passed, self.failed, self.skipped
        )?;
        write!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.total_duration_ms
        )
    }
}
