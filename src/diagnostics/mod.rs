//! Built-in diagnostic test classes
//!
//! Runnable stand-ins for the product's browser-driving classes, used to
//! exercise the engine end-to-end from the CLI. They are registered under
//! the `diagnostics` module in the default registry.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::case::{CaseFailure, ClassDescriptor, Hook, ParamRow, TestCase, TestMethod, Verdict};
use crate::models::{TestListener, TestResult};
use crate::registry::CaseRegistry;

/// Listener forwarding lifecycle events to the tracing subscriber.
pub struct TraceListener;

impl TestListener for TraceListener {
    fn on_test_start(&self, result: &TestResult) {
        debug!("Starting {}.{}", result.test_class, result.method_name);
    }

    fn on_test_success(&self, result: &TestResult) {
        info!("Passed {}.{}", result.test_class, result.method_name);
    }

    fn on_test_failure(&self, result: &TestResult) {
        warn!("Failed {}.{}", result.test_class, result.method_name);
    }

    fn on_test_skipped(&self, result: &TestResult) {
        info!("Skipped {}.{}", result.test_class, result.method_name);
    }
}

/// Engine smoke checks: lifecycle hooks, an async body, an explicit skip and
/// a disabled method.
pub struct EngineSmoke;

impl TestCase for EngineSmoke {
    fn descriptor(self: Arc<Self>) -> ClassDescriptor {
        // The timing probes share scratch clock state and must never run
        // concurrently.
        let clock_lock = Arc::new(Mutex::new(()));

        ClassDescriptor::new()
            .with_listener(Arc::new(TraceListener))
            .with_before_class(Hook::new("open_diagnostics", || async {
                debug!("Diagnostics session starting");
                Ok(())
            }))
            .with_after_class(Hook::new("close_diagnostics", || async {
                debug!("Diagnostics session closed");
                Ok(())
            }))
            .with_before_method(Hook::new("reset_scratch_state", || async { Ok(()) }))
            .with_test(
                TestMethod::new("scheduler_heartbeat", || async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(Verdict::Pass)
                })
                .with_lock(clock_lock.clone()),
            )
            .with_test(
                TestMethod::new("timestamps_monotonic", || async {
                    let first = chrono::Utc::now().timestamp_millis();
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    let second = chrono::Utc::now().timestamp_millis();
                    if second < first {
                        return Err(CaseFailure::Assertion(format!(
                            "clock went backwards: {first} -> {second}"
                        )));
                    }
                    Ok(Verdict::Pass)
                })
                .with_lock(clock_lock),
            )
            .with_test(TestMethod::new("browser_session_probe", || async {
                Ok(Verdict::skipped("no browser session attached"))
            }))
            .with_test(
                TestMethod::new("full_render_audit", || async {
                    // Heavyweight check, only run on demand.
                    tokio::time::sleep(Duration::from_millis(250)).await;
                    Ok(Verdict::Pass)
                })
                .disabled(),
            )
    }
}

/// Data-provider checks: named and positional rows expanding one method into
/// several cases.
pub struct ViewportChecks;

impl TestCase for ViewportChecks {
    fn descriptor(self: Arc<Self>) -> ClassDescriptor {
        ClassDescriptor::new()
            .with_listener(Arc::new(TraceListener))
            .with_test(TestMethod::parameterised(
                "viewport_dimensions",
                || async {
                    Ok(vec![
                        ParamRow::from_value(json!({"name": "desktop", "width": 1920, "height": 1080})),
                        ParamRow::from_value(json!({"name": "mobile", "width": 390, "height": 844})),
                        ParamRow::from_value(json!([640, 480])),
                    ])
                },
                |row| async move {
                    let width = row
                        .get("width")
                        .or_else(|| row.at(0))
                        .and_then(|value| value.as_i64())
                        .unwrap_or(0);
                    let height = row
                        .get("height")
                        .or_else(|| row.at(1))
                        .and_then(|value| value.as_i64())
                        .unwrap_or(0);

                    if width <= 0 || height <= 0 {
                        return Err(CaseFailure::Assertion(format!(
                            "degenerate viewport {width}x{height}"
                        )));
                    }
                    Ok(Verdict::Pass)
                },
            ))
    }
}

/// Registry with all built-in diagnostic classes.
pub fn default_registry() -> CaseRegistry {
    let mut registry = CaseRegistry::new();
    registry.register("diagnostics.EngineSmoke", || Arc::new(EngineSmoke));
    registry.register("diagnostics.ViewportChecks", || Arc::new(ViewportChecks));
    registry
}
