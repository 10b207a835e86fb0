//! Test execution engine
//!
//! Task construction and the two-level scheduler.

mod builder;
mod filter;
mod runner;
mod task;

pub use builder::{BuildError, ClassFixtures, ClassTasks, TaskBuilder};
pub use filter::filter_methods;
pub use runner::{run_suite_file, TestExecutor};
pub use task::{ResultMap, TaskBody, TaskOutput, TestTask, WrapperFn};

use thiserror::Error;

use crate::case::CaseFailure;

/// Errors that abort the whole suite run.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Control-level abort re-raised past the scheduler; the caller receives
    /// this instead of a result map.
    #[error("run aborted: {0}")]
    Aborted(String),

    /// A before-method hook failed; propagated upward uncaught.
    #[error("hook '{hook}' failed for '{task}': {source}")]
    HookFailed {
        hook: String,
        task: String,
        source: CaseFailure,
    },

    /// A data provider failed while expanding a method.
    #[error("data provider for '{method}' failed: {source}")]
    ProviderFailed { method: String, source: CaseFailure },
}
