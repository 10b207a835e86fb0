//! Test execution listeners
//!
//! Observer interface notified at well-defined points of a test's lifecycle.

use super::result::TestResult;

/// Receives notifications about test execution events.
///
/// All callbacks default to no-ops; implementations override the ones they
/// care about. A listener is declared once per test class and applied to all
/// of that class's method tasks, so it may be invoked concurrently when those
/// tasks run in a parallel bucket.
pub trait TestListener: Send + Sync {
    /// Called immediately before a test case begins execution.
    fn on_test_start(&self, _result: &TestResult) {}

    /// Called when a test case finishes successfully.
    fn on_test_success(&self, _result: &TestResult) {}

    /// Called when a test case fails.
    fn on_test_failure(&self, _result: &TestResult) {}

    /// Called when a test case is skipped.
    fn on_test_skipped(&self, _result: &TestResult) {}
}
