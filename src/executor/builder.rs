//! Task construction
//!
//! Converts a class configuration into executable task descriptors: resolves
//! and instantiates the class, filters its declared methods, expands data
//! providers, and routes the resulting tasks into sequential and parallel
//! buckets per the effective parallelism mode. Under `classes` mode a single
//! wrapper task is built instead, running the class's enabled methods
//! sequentially inside.

use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use super::filter::filter_methods;
use super::task::{ResultMap, TestTask, WrapperFn};
use super::ExecutorError;
use crate::case::{BodyFn, CaseBody, CaseFailure, Hook, ParamRow, TestMethod};
use crate::models::{TestListener, TestResult, TestStatus};
use crate::registry::{CaseRegistry, ClassResolutionError};
use crate::suite::{ClassConfig, ParallelMode};

/// Before/after class hooks captured per fully-qualified class name, so the
/// scheduler can run them even when method execution is driven by a wrapper.
#[derive(Clone, Default)]
pub struct ClassFixtures {
    pub before: Vec<Hook>,
    pub after: Vec<Hook>,
}

/// Everything the builder produces for one class.
pub struct ClassTasks {
    pub class_name: String,
    pub sequential: Vec<TestTask>,
    pub parallel: Vec<TestTask>,
    pub fixtures: ClassFixtures,
}

/// Failure to build tasks for a class.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Resolution(#[from] ClassResolutionError),

    #[error("data provider for '{method}' failed: {source}")]
    Provider { method: String, source: CaseFailure },
}

/// Builds executable tasks from class configurations.
pub struct TaskBuilder {
    registry: Arc<CaseRegistry>,
}

impl TaskBuilder {
    pub fn new(registry: Arc<CaseRegistry>) -> Self {
        Self { registry }
    }

    /// Build the task set for one class under the given parallelism mode.
    pub async fn build(
        &self,
        config: &ClassConfig,
        mode: ParallelMode,
    ) -> Result<ClassTasks, BuildError> {
        let class_name = config.name.clone();
        let instance = self.registry.instantiate(&class_name)?;
        let descriptor = instance.descriptor();

        let all_methods: Vec<&str> = descriptor.tests.iter().map(|m| m.name.as_str()).collect();
        let selected = filter_methods(all_methods, &config.methods);
        let selected_set: HashSet<&str> = selected.iter().map(String::as_str).collect();

        let methods: Vec<TestMethod> = descriptor
            .tests
            .iter()
            .filter(|method| selected_set.contains(method.name.as_str()))
            .cloned()
            .collect();
        let enabled: Vec<TestMethod> =
            methods.iter().filter(|m| m.enabled).cloned().collect();

        // Class-level hooks only matter for a class contributing active tests.
        let (before_class, after_class) = if enabled.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            (
                descriptor.before_class.clone(),
                descriptor.after_class.clone(),
            )
        };

        let mut tasks = ClassTasks {
            class_name: class_name.clone(),
            sequential: Vec::new(),
            parallel: Vec::new(),
            fixtures: ClassFixtures {
                before: before_class.clone(),
                after: after_class.clone(),
            },
        };

        if mode == ParallelMode::Classes {
            let wrapper = class_wrapper(
                class_name.clone(),
                selected,
                enabled,
                before_class,
                after_class,
                descriptor.before_method.clone(),
                descriptor.after_method.clone(),
                descriptor.listeners.clone(),
            );
            tasks.parallel.push(TestTask::wrapper(
                format!("{class_name}.__class_wrapper__"),
                class_name,
                wrapper,
            ));
            return Ok(tasks);
        }

        for method in &enabled {
            let cases = expand_cases(method, &class_name)
                .await
                .map_err(|source| BuildError::Provider {
                    method: format!("{class_name}.{}", method.name),
                    source,
                })?;

            let parallel_target =
                mode == ParallelMode::Methods || (mode == ParallelMode::None && method.parallel_hint);

            for (case_name, body) in cases {
                let task = TestTask::case(
                    format!("{class_name}.{case_name}"),
                    body,
                    TestResult::new(case_name, class_name.clone()),
                    descriptor.listeners.clone(),
                    descriptor.before_method.clone(),
                    descriptor.after_method.clone(),
                    method.lock.clone(),
                );

                if parallel_target {
                    tasks.parallel.push(task);
                } else {
                    tasks.sequential.push(task);
                }
            }
        }

        Ok(tasks)
    }
}

/// Expand one declared method into its executable cases.
///
/// A data-provider method yields one case per row, named `method[label]`
/// (the row's `"name"` entry, or the zero-based index); the body receives
/// the row unchanged. A plain method yields itself.
async fn expand_cases(
    method: &TestMethod,
    class_name: &str,
) -> Result<Vec<(String, BodyFn)>, CaseFailure> {
    match &method.provider {
        Some(provider) => {
            let rows = provider().await?;
            let mut cases = Vec::with_capacity(rows.len());
            for (index, row) in rows.into_iter().enumerate() {
                let label = row.label(index);
                let case_name = format!("{}[{}]", method.name, label);
                cases.push((case_name, bind_row(&method.body, row)));
            }
            Ok(cases)
        }
        None => Ok(vec![(method.name.clone(), plain_body(&method.body, class_name, method))]),
    }
}

fn bind_row(body: &CaseBody, row: ParamRow) -> BodyFn {
    match body {
        CaseBody::Parameterised(param_body) => {
            let param_body = param_body.clone();
            Arc::new(move || param_body(row.clone()))
        }
        // Provider declared on a plain body: rows drive the expansion count
        // but the body takes no arguments.
        CaseBody::Plain(plain) => plain.clone(),
    }
}

fn plain_body(body: &CaseBody, class_name: &str, method: &TestMethod) -> BodyFn {
    match body {
        CaseBody::Plain(plain) => plain.clone(),
        CaseBody::Parameterised(param_body) => {
            warn!(
                "Method {}.{} takes parameters but declares no data provider; invoking with an empty row",
                class_name, method.name
            );
            let param_body = param_body.clone();
            Arc::new(move || param_body(ParamRow::Positional(Vec::new())))
        }
    }
}

/// Build the `classes`-mode wrapper body for one class.
///
/// The wrapper runs the class's before_class hooks, then its enabled methods
/// strictly sequentially through the ordinary per-case lifecycle, and always
/// runs the after_class hooks on the way out. A before_class failure skips
/// every selected method; a harness-level failure mid-run skips the methods
/// not yet run.
#[allow(clippy::too_many_arguments)]
fn class_wrapper(
    class_name: String,
    selected: Vec<String>,
    enabled: Vec<TestMethod>,
    before_class: Vec<Hook>,
    after_class: Vec<Hook>,
    before_method: Vec<Hook>,
    after_method: Vec<Hook>,
    listeners: Vec<Arc<dyn TestListener>>,
) -> WrapperFn {
    Box::new(move || {
        Box::pin(async move {
            let mut results = ResultMap::new();

            for hook in &before_class {
                match hook.invoke().await {
                    Ok(()) => {}
                    Err(CaseFailure::Aborted(message)) => {
                        run_after_class(&after_class, &class_name).await?;
                        return Err(ExecutorError::Aborted(message));
                    }
                    Err(failure) => {
                        warn!(
                            "Exception in before_class '{}' for {}: {}",
                            hook.name(),
                            class_name,
                            failure
                        );
                        skip_methods(&mut results, &class_name, &selected, &failure);
                        run_after_class(&after_class, &class_name).await?;
                        return Ok(results);
                    }
                }
            }

            let mut ran: HashSet<String> = HashSet::new();
            let mut harness_failure: Option<CaseFailure> = None;

            'methods: for method in &enabled {
                let cases = match expand_cases(method, &class_name).await {
                    Ok(cases) => cases,
                    Err(CaseFailure::Aborted(message)) => {
                        run_after_class(&after_class, &class_name).await?;
                        return Err(ExecutorError::Aborted(message));
                    }
                    Err(failure) => {
                        harness_failure = Some(failure);
                        break 'methods;
                    }
                };

                for (case_name, body) in cases {
                    let task = TestTask::case(
                        format!("{class_name}.{case_name}"),
                        body,
                        TestResult::new(case_name, class_name.clone()),
                        listeners.clone(),
                        before_method.clone(),
                        after_method.clone(),
                        method.lock.clone(),
                    );

                    match task.run().await {
                        Ok(output) => super::runner::merge_output(&mut results, output),
                        Err(ExecutorError::Aborted(message)) => {
                            run_after_class(&after_class, &class_name).await?;
                            return Err(ExecutorError::Aborted(message));
                        }
                        Err(ExecutorError::HookFailed { source, hook, .. }) => {
                            warn!(
                                "Exception in class wrapper for {}: hook '{}' failed: {}",
                                class_name, hook, source
                            );
                            harness_failure = Some(source);
                            break 'methods;
                        }
                        Err(other) => {
                            run_after_class(&after_class, &class_name).await?;
                            return Err(other);
                        }
                    }
                }

                ran.insert(method.name.clone());
            }

            if let Some(failure) = harness_failure {
                let remaining: Vec<String> = selected
                    .iter()
                    .filter(|name| !ran.contains(*name))
                    .cloned()
                    .collect();
                skip_methods(&mut results, &class_name, &remaining, &failure);
            }

            run_after_class(&after_class, &class_name).await?;
            Ok(results)
        })
    })
}

/// Skip marking used by the wrapper failure paths: fresh results, the shared
/// failure attached, no listener callbacks.
fn skip_methods(
    results: &mut ResultMap,
    class_name: &str,
    methods: &[String],
    failure: &CaseFailure,
) {
    for method_name in methods {
        let mut result = TestResult::new(method_name.clone(), class_name.to_string());
        result.mark_with(TestStatus::Skipped, failure.clone());
        results.insert(format!("{class_name}.{method_name}"), result);
    }
}

/// After-class hooks always run; failures are logged only, aborts propagate.
async fn run_after_class(hooks: &[Hook], class_name: &str) -> Result<(), ExecutorError> {
    for hook in hooks {
        match hook.invoke().await {
            Ok(()) => {}
            Err(CaseFailure::Aborted(message)) => return Err(ExecutorError::Aborted(message)),
            Err(failure) => {
                warn!(
                    "Exception in after_class '{}' for {}: {}",
                    hook.name(),
                    class_name,
                    failure
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{ClassDescriptor, TestCase, Verdict};
    use crate::suite::MethodSelector;

    struct StaticCase(ClassDescriptor);

    impl TestCase for StaticCase {
        fn descriptor(self: Arc<Self>) -> ClassDescriptor {
            self.0.clone()
        }
    }

    fn builder_for(path: &str, descriptor: ClassDescriptor) -> TaskBuilder {
        let mut registry = CaseRegistry::new();
        registry.register(path, move || Arc::new(StaticCase(descriptor.clone())));
        TaskBuilder::new(Arc::new(registry))
    }

    fn config(name: &str) -> ClassConfig {
        ClassConfig {
            name: name.to_string(),
            methods: MethodSelector::default(),
        }
    }

    fn passing(name: &str) -> TestMethod {
        TestMethod::new(name, || async { Ok(Verdict::Pass) })
    }

    fn task_names(tasks: &[TestTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_none_mode_routes_to_sequential() {
        let descriptor = ClassDescriptor::new()
            .with_test(passing("a"))
            .with_test(passing("b"));
        let builder = builder_for("r.C", descriptor);

        let tasks = builder.build(&config("r.C"), ParallelMode::None).await.unwrap();
        assert_eq!(task_names(&tasks.sequential), vec!["r.C.a", "r.C.b"]);
        assert!(tasks.parallel.is_empty());
    }

    #[tokio::test]
    async fn test_methods_mode_routes_to_parallel() {
        let descriptor = ClassDescriptor::new()
            .with_test(passing("a"))
            .with_test(passing("b"));
        let builder = builder_for("r.C", descriptor);

        let tasks = builder
            .build(&config("r.C"), ParallelMode::Methods)
            .await
            .unwrap();
        assert!(tasks.sequential.is_empty());
        assert_eq!(task_names(&tasks.parallel), vec!["r.C.a", "r.C.b"]);
    }

    #[tokio::test]
    async fn test_legacy_parallel_hint_under_none_mode() {
        let descriptor = ClassDescriptor::new()
            .with_test(passing("plain"))
            .with_test(passing("hinted").parallel());
        let builder = builder_for("r.C", descriptor);

        let tasks = builder.build(&config("r.C"), ParallelMode::None).await.unwrap();
        assert_eq!(task_names(&tasks.sequential), vec!["r.C.plain"]);
        assert_eq!(task_names(&tasks.parallel), vec!["r.C.hinted"]);
    }

    #[tokio::test]
    async fn test_classes_mode_builds_single_wrapper() {
        let descriptor = ClassDescriptor::new()
            .with_test(passing("a"))
            .with_test(passing("b"));
        let builder = builder_for("r.C", descriptor);

        let tasks = builder
            .build(&config("r.C"), ParallelMode::Classes)
            .await
            .unwrap();
        assert!(tasks.sequential.is_empty());
        assert_eq!(task_names(&tasks.parallel), vec!["r.C.__class_wrapper__"]);
        assert!(matches!(
            tasks.parallel[0].body,
            crate::executor::TaskBody::Wrapper(_)
        ));
    }

    #[tokio::test]
    async fn test_provider_expansion_at_build_time() {
        let descriptor = ClassDescriptor::new().with_test(TestMethod::parameterised(
            "rows",
            || async {
                Ok(vec![
                    ParamRow::from_value(serde_json::json!({"name": "first"})),
                    ParamRow::from_value(serde_json::json!({"v": 2})),
                ])
            },
            |_row| async { Ok(Verdict::Pass) },
        ));
        let builder = builder_for("r.C", descriptor);

        let tasks = builder.build(&config("r.C"), ParallelMode::None).await.unwrap();
        assert_eq!(
            task_names(&tasks.sequential),
            vec!["r.C.rows[first]", "r.C.rows[1]"]
        );
    }

    #[tokio::test]
    async fn test_class_fixtures_gated_on_enabled_methods() {
        let active = ClassDescriptor::new()
            .with_before_class(Hook::new("setup", || async { Ok(()) }))
            .with_after_class(Hook::new("teardown", || async { Ok(()) }))
            .with_test(passing("a"));
        let builder = builder_for("r.C", active);
        let tasks = builder.build(&config("r.C"), ParallelMode::None).await.unwrap();
        assert_eq!(tasks.fixtures.before.len(), 1);
        assert_eq!(tasks.fixtures.after.len(), 1);

        // A class contributing zero active tests surfaces no class fixtures.
        let dormant = ClassDescriptor::new()
            .with_before_class(Hook::new("setup", || async { Ok(()) }))
            .with_test(passing("a").disabled());
        let builder = builder_for("r.D", dormant);
        let tasks = builder.build(&config("r.D"), ParallelMode::None).await.unwrap();
        assert!(tasks.fixtures.before.is_empty());
        assert!(tasks.sequential.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_class_is_resolution_error() {
        let builder = TaskBuilder::new(Arc::new(CaseRegistry::new()));
        let err = builder
            .build(&config("ghost.D"), ParallelMode::None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::Resolution(_)));
    }
}
