//! Executable task descriptors
//!
//! A task is one schedulable unit of work: a single test-case invocation, or
//! a class/group wrapper returning a map of results. Tasks are built once and
//! consumed exactly once by the scheduler.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::ExecutorError;
use crate::case::{BodyFn, CaseFailure, Hook, Verdict};
use crate::models::{TestListener, TestResult, TestStatus};

/// Flat map of task name to outcome.
pub type ResultMap = HashMap<String, TestResult>;

/// Body of a wrapper task; runs once and yields a per-method result map.
pub type WrapperFn =
    Box<dyn FnOnce() -> BoxFuture<'static, Result<ResultMap, ExecutorError>> + Send>;

/// What a task executes.
pub enum TaskBody {
    /// Leaf test-case body, run with the full per-method lifecycle.
    Case(BodyFn),

    /// Class or group wrapper; drives its own inner lifecycle and returns a
    /// result map to splat into the run's results.
    Wrapper(WrapperFn),
}

/// One schedulable unit of work.
pub struct TestTask {
    pub name: String,
    pub body: TaskBody,
    pub result: TestResult,
    pub listeners: Vec<Arc<dyn TestListener>>,
    pub before_methods: Vec<Hook>,
    pub after_methods: Vec<Hook>,

    /// Tasks sharing a lock never execute concurrently even when scheduled
    /// into the same parallel bucket.
    pub lock: Option<Arc<Mutex<()>>>,
}

/// Outcome of running one task.
pub enum TaskOutput {
    /// Leaf result, keyed by the task name when merged.
    Single(String, TestResult),

    /// Wrapper result map, splatted into the overall results.
    Map(ResultMap),
}

impl TestTask {
    /// Leaf test-case task.
    #[allow(clippy::too_many_arguments)]
    pub fn case(
        name: impl Into<String>,
        body: BodyFn,
        result: TestResult,
        listeners: Vec<Arc<dyn TestListener>>,
        before_methods: Vec<Hook>,
        after_methods: Vec<Hook>,
        lock: Option<Arc<Mutex<()>>>,
    ) -> Self {
        Self {
            name: name.into(),
            body: TaskBody::Case(body),
            result,
            listeners,
            before_methods,
            after_methods,
            lock,
        }
    }

    /// Wrapper task around a class or test group.
    pub fn wrapper(name: impl Into<String>, owner: impl Into<String>, body: WrapperFn) -> Self {
        let name = name.into();
        Self {
            result: TestResult::new(name.clone(), owner.into()),
            name,
            body: TaskBody::Wrapper(body),
            listeners: Vec::new(),
            before_methods: Vec::new(),
            after_methods: Vec::new(),
            lock: None,
        }
    }

    /// Execute the task, consuming it.
    ///
    /// Leaf tasks run the full lifecycle: start timestamp, start listener
    /// callback, before-method hooks, body, classification, after-method
    /// hooks, terminal listener callback, end timestamp. With a lock present
    /// the whole lifecycle executes while holding it.
    pub async fn run(self) -> Result<TaskOutput, ExecutorError> {
        let TestTask {
            name,
            body,
            result,
            listeners,
            before_methods,
            after_methods,
            lock,
        } = self;

        match body {
            TaskBody::Wrapper(wrapper) => Ok(TaskOutput::Map(wrapper().await?)),
            TaskBody::Case(case_body) => {
                let execution = run_case(
                    name,
                    case_body,
                    result,
                    listeners,
                    before_methods,
                    after_methods,
                );
                match lock {
                    Some(lock) => {
                        let _guard = lock.lock().await;
                        execution.await
                    }
                    None => execution.await,
                }
            }
        }
    }
}

/// Leaf lifecycle shared by every test-case task regardless of which bucket
/// dispatched it.
async fn run_case(
    name: String,
    body: BodyFn,
    mut result: TestResult,
    listeners: Vec<Arc<dyn TestListener>>,
    before_methods: Vec<Hook>,
    after_methods: Vec<Hook>,
) -> Result<TaskOutput, ExecutorError> {
    debug!("Running {name}");
    result.start_ms = now_ms();

    for listener in &listeners {
        listener.on_test_start(&result);
    }

    // Before-method hook failures propagate upward uncaught.
    for hook in &before_methods {
        match hook.invoke().await {
            Ok(()) => {}
            Err(CaseFailure::Aborted(message)) => return Err(ExecutorError::Aborted(message)),
            Err(failure) => {
                return Err(ExecutorError::HookFailed {
                    hook: hook.name().to_string(),
                    task: name.clone(),
                    source: failure,
                })
            }
        }
    }

    match body().await {
        Ok(Verdict::Pass) => result.mark(TestStatus::Success),
        Ok(Verdict::Explicit { status, error }) => {
            // Legacy explicit form: copied verbatim, bypassing classification.
            result.mark(status);
            result.caught = error;
        }
        Err(CaseFailure::Aborted(message)) => {
            // Uncatchable abort: never classified, status stays Created.
            return Err(ExecutorError::Aborted(message));
        }
        Err(failure) => result.mark_with(TestStatus::Failure, failure),
    }

    if result.status != TestStatus::Skipped {
        for hook in &after_methods {
            match hook.invoke().await {
                Ok(()) => {}
                Err(CaseFailure::Aborted(message)) => {
                    return Err(ExecutorError::Aborted(message))
                }
                Err(failure) => {
                    warn!(
                        "Exception in after-method hook '{}' for {}: {}",
                        hook.name(),
                        name,
                        failure
                    );
                }
            }
        }
    }

    for listener in &listeners {
        match result.status {
            TestStatus::Success => listener.on_test_success(&result),
            TestStatus::Failure => listener.on_test_failure(&result),
            TestStatus::Skipped => listener.on_test_skipped(&result),
            TestStatus::Created => {}
        }
    }

    result.end_ms = now_ms();

    Ok(TaskOutput::Single(name, result))
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
