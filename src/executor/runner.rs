//! Suite scheduler
//!
//! Executes a normalised suite document: collects tasks from every test
//! group, runs all registered before_class hooks eagerly, drains the
//! parallel bucket (all tasks launched, all awaited), then the sequential
//! bucket in strict order, and finally runs every after_class hook
//! unconditionally. Produces a flat name-to-result map.

use futures::future::join_all;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use tracing::{debug, info, warn};

use super::builder::{BuildError, ClassFixtures, TaskBuilder};
use super::task::{ResultMap, TaskBody, TaskOutput, TestTask, WrapperFn};
use super::ExecutorError;
use crate::case::CaseFailure;
use crate::models::{TestResult, TestStatus};
use crate::registry::{CaseRegistry, ClassResolutionError};
use crate::suite::{ClassConfig, ParallelMode, SuiteDocument, TestGroup};

/// Class fixtures in suite order. Group wrappers register fixtures while the
/// run is already underway, so the registry is shared and locked.
type FixtureRegistry = Arc<StdMutex<Vec<(String, ClassFixtures)>>>;

/// Executes test suites against a class registry.
pub struct TestExecutor {
    registry: Arc<CaseRegistry>,
}

impl TestExecutor {
    pub fn new(registry: Arc<CaseRegistry>) -> Self {
        Self { registry }
    }

    /// Run a normalised suite document to completion.
    ///
    /// Returns the merged result map, or the propagated abort when a task
    /// raised one; partial results are not returned on abort.
    pub async fn run_suite(&self, doc: &SuiteDocument) -> Result<ResultMap, ExecutorError> {
        let fixtures: FixtureRegistry = Arc::new(StdMutex::new(Vec::new()));
        let mut results = ResultMap::new();
        let mut sequential: Vec<TestTask> = Vec::new();
        let mut parallel: Vec<TestTask> = Vec::new();

        // Collection pass over every test group.
        for (index, group) in doc.tests.iter().enumerate() {
            let mode = group.effective_parallel();

            if mode == ParallelMode::Tests {
                parallel.push(self.group_wrapper(group.clone(), index, fixtures.clone()));
                continue;
            }

            for entry in &group.classes {
                let config = entry.as_config();
                match TaskBuilder::new(self.registry.clone())
                    .build(&config, mode)
                    .await
                {
                    Ok(class_tasks) => {
                        register_fixtures(&fixtures, &class_tasks.class_name, class_tasks.fixtures);
                        sequential.extend(class_tasks.sequential);
                        parallel.extend(class_tasks.parallel);
                    }
                    Err(BuildError::Resolution(err)) => {
                        warn!("Skipping class {}: {}", config.name, err);
                        mark_unresolved(&mut results, &config, &err);
                    }
                    Err(BuildError::Provider { method, source }) => {
                        return Err(provider_error(method, source));
                    }
                }
            }
        }

        debug!(
            "Collected {} sequential and {} parallel tasks",
            sequential.len(),
            parallel.len()
        );

        // Eager before_class pass, suite order, before any task executes.
        let eager: Vec<(String, ClassFixtures)> = fixtures.lock().unwrap().clone();
        let mut failed_classes: HashMap<String, CaseFailure> = HashMap::new();
        for (class_name, class_fixtures) in &eager {
            for hook in &class_fixtures.before {
                match hook.invoke().await {
                    Ok(()) => {}
                    Err(CaseFailure::Aborted(message)) => {
                        return Err(ExecutorError::Aborted(message))
                    }
                    Err(failure) => {
                        warn!(
                            "Exception in before_class '{}' for {}: {}",
                            hook.name(),
                            class_name,
                            failure
                        );
                        failed_classes.insert(class_name.clone(), failure);
                        break;
                    }
                }
            }
        }

        if !failed_classes.is_empty() {
            sequential = drain_failed_classes(sequential, &failed_classes, &mut results);
            parallel = drain_failed_classes(parallel, &failed_classes, &mut results);
        }

        // Parallel bucket: launch everything, await everything.
        if !parallel.is_empty() {
            debug!("=== Running Parallel Tasks ===");
            let handles: Vec<_> = parallel
                .into_iter()
                .map(|task| tokio::spawn(task.run()))
                .collect();

            let mut abort: Option<ExecutorError> = None;
            for joined in join_all(handles).await {
                match joined {
                    Ok(Ok(output)) => merge_output(&mut results, output),
                    Ok(Err(err)) => {
                        abort.get_or_insert(err);
                    }
                    Err(join_err) => {
                        abort.get_or_insert(ExecutorError::Aborted(format!(
                            "task terminated abnormally: {join_err}"
                        )));
                    }
                }
            }
            if let Some(err) = abort {
                return Err(err);
            }
        }

        // Sequential bucket: strict list order, one full lifecycle at a time.
        if !sequential.is_empty() {
            debug!("=== Running Sequential Tasks ===");
            for task in sequential {
                let output = task.run().await?;
                merge_output(&mut results, output);
            }
        }

        // After-class pass runs unconditionally, suite order. Group wrappers
        // may have registered additional fixtures mid-run.
        let after: Vec<(String, ClassFixtures)> = fixtures.lock().unwrap().clone();
        for (class_name, class_fixtures) in &after {
            for hook in &class_fixtures.after {
                match hook.invoke().await {
                    Ok(()) => {}
                    Err(CaseFailure::Aborted(message)) => {
                        return Err(ExecutorError::Aborted(message))
                    }
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
        }

        Ok(results)
    }

    /// Wrapper task for a `tests`-parallel group: runs the group's classes
    /// sequentially inside (inner parallelism forced to `none`) and returns
    /// the group's result map.
    fn group_wrapper(&self, group: TestGroup, index: usize, fixtures: FixtureRegistry) -> TestTask {
        let group_name = group.display_name(index);
        let registry = self.registry.clone();

        let body: WrapperFn = {
            let group_name = group_name.clone();
            Box::new(move || Box::pin(run_group(registry, group, group_name, fixtures)))
        };

        TestTask::wrapper(group_name.clone(), group_name, body)
    }
}

/// Inner pass of a `tests`-parallel group.
async fn run_group(
    registry: Arc<CaseRegistry>,
    group: TestGroup,
    group_name: String,
    fixtures: FixtureRegistry,
) -> Result<ResultMap, ExecutorError> {
    info!("Running test group '{group_name}'");
    let mut results = ResultMap::new();
    let builder = TaskBuilder::new(registry);

    for entry in &group.classes {
        let config = entry.as_config();
        match builder.build(&config, ParallelMode::None).await {
            Ok(class_tasks) => {
                register_fixtures(&fixtures, &class_tasks.class_name, class_tasks.fixtures);

                // Inner pass is strictly sequential; legacy parallel-hinted
                // tasks run in declaration order alongside the rest.
                for task in class_tasks
                    .sequential
                    .into_iter()
                    .chain(class_tasks.parallel)
                {
                    let output = task.run().await?;
                    merge_output(&mut results, output);
                }
            }
            Err(BuildError::Resolution(err)) => {
                warn!(
                    "Skipping class {} in group '{}': {}",
                    config.name, group_name, err
                );
                mark_unresolved(&mut results, &config, &err);
            }
            Err(BuildError::Provider { method, source }) => {
                return Err(provider_error(method, source));
            }
        }
    }

    Ok(results)
}

/// Merge one task output into the overall result map: maps are splatted in,
/// single results keyed by task name.
pub(crate) fn merge_output(results: &mut ResultMap, output: TaskOutput) {
    match output {
        TaskOutput::Single(name, result) => {
            results.insert(name, result);
        }
        TaskOutput::Map(map) => results.extend(map),
    }
}

fn provider_error(method: String, source: CaseFailure) -> ExecutorError {
    match source {
        CaseFailure::Aborted(message) => ExecutorError::Aborted(message),
        other => ExecutorError::ProviderFailed {
            method,
            source: other,
        },
    }
}

fn register_fixtures(registry: &FixtureRegistry, class_name: &str, fixtures: ClassFixtures) {
    let mut entries = registry.lock().unwrap();
    if let Some(existing) = entries.iter_mut().find(|(name, _)| name == class_name) {
        existing.1 = fixtures;
    } else {
        entries.push((class_name.to_string(), fixtures));
    }
}

/// Pull the leaf tasks of classes whose eager before_class hook failed out
/// of a bucket, recording them as skipped. Wrapper tasks stay: they run the
/// class's before_class hooks themselves and contain the failure.
fn drain_failed_classes(
    tasks: Vec<TestTask>,
    failed: &HashMap<String, CaseFailure>,
    results: &mut ResultMap,
) -> Vec<TestTask> {
    let mut kept = Vec::with_capacity(tasks.len());
    for task in tasks {
        let failure = match &task.body {
            TaskBody::Case(_) => failed.get(&task.result.test_class),
            TaskBody::Wrapper(_) => None,
        };
        match failure {
            Some(failure) => {
                let mut result = task.result;
                result.mark_with(TestStatus::Skipped, failure.clone());
                results.insert(task.name, result);
            }
            None => kept.push(task),
        }
    }
    kept
}

/// Record a class that failed to resolve: its concrete (glob-free) include
/// patterns are the best available stand-in for the selected methods.
fn mark_unresolved(results: &mut ResultMap, config: &ClassConfig, err: &ClassResolutionError) {
    let failure = CaseFailure::Error(err.to_string());
    let concrete: Vec<&String> = config
        .methods
        .include
        .iter()
        .filter(|pattern| !pattern.contains(['*', '?', '[']))
        .collect();

    if concrete.is_empty() {
        let mut result = TestResult::new("<unresolved>", config.name.clone());
        result.mark_with(TestStatus::Skipped, failure);
        results.insert(format!("{}.<unresolved>", config.name), result);
    } else {
        for method_name in concrete {
            let mut result = TestResult::new(method_name.clone(), config.name.clone());
            result.mark_with(TestStatus::Skipped, failure.clone());
            results.insert(format!("{}.{}", config.name, method_name), result);
        }
    }
}

/// Core entry point: load, validate, normalise and execute a suite file.
pub async fn run_suite_file(
    suite_path: impl AsRef<Path>,
    schema_path: impl AsRef<Path>,
    registry: Arc<CaseRegistry>,
) -> anyhow::Result<ResultMap> {
    let loader = crate::suite::SuiteLoader::new(schema_path)?;
    let doc = crate::suite::normalise(loader.load(suite_path)?);

    let executor = TestExecutor::new(registry);
    let results = executor.run_suite(&doc).await?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{ClassDescriptor, Hook, ParamRow, TestCase, TestMethod, Verdict};
    use crate::models::TestListener;
    use crate::suite::normalise;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    type Log = Arc<StdMutex<Vec<String>>>;

    fn new_log() -> Log {
        Arc::new(StdMutex::new(Vec::new()))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    /// Test class whose descriptor is fixed up front.
    struct StaticCase(ClassDescriptor);

    impl TestCase for StaticCase {
        fn descriptor(self: Arc<Self>) -> ClassDescriptor {
            self.0.clone()
        }
    }

    fn registry_with(classes: Vec<(&str, ClassDescriptor)>) -> Arc<CaseRegistry> {
        let mut registry = CaseRegistry::new();
        for (path, descriptor) in classes {
            registry.register(path, move || Arc::new(StaticCase(descriptor.clone())));
        }
        Arc::new(registry)
    }

    fn doc(value: serde_json::Value) -> SuiteDocument {
        normalise(serde_json::from_value(value).unwrap())
    }

    fn logged_method(name: &str, log: &Log) -> TestMethod {
        let log = log.clone();
        let label = name.to_string();
        TestMethod::new(name, move || {
            let log = log.clone();
            let label = label.clone();
            async move {
                log.lock().unwrap().push(label);
                Ok(Verdict::Pass)
            }
        })
    }

    struct RecordingListener {
        events: Log,
    }

    impl TestListener for RecordingListener {
        fn on_test_start(&self, result: &TestResult) {
            self.events
                .lock()
                .unwrap()
                .push(format!("start:{}", result.method_name));
        }

        fn on_test_success(&self, result: &TestResult) {
            self.events
                .lock()
                .unwrap()
                .push(format!("success:{}", result.method_name));
        }

        fn on_test_failure(&self, result: &TestResult) {
            self.events
                .lock()
                .unwrap()
                .push(format!("failure:{}", result.method_name));
        }

        fn on_test_skipped(&self, result: &TestResult) {
            self.events
                .lock()
                .unwrap()
                .push(format!("skipped:{}", result.method_name));
        }
    }

    #[tokio::test]
    async fn test_sequential_tasks_run_in_order() {
        let log = new_log();
        let descriptor = ClassDescriptor::new()
            .with_test(logged_method("t1", &log))
            .with_test(logged_method("t2", &log))
            .with_test(logged_method("t3", &log));
        let registry = registry_with(vec![("seq.Ordered", descriptor)]);
        let suite = doc(json!({"suite": {}, "tests": [{"classes": ["seq.Ordered"]}]}));

        for _ in 0..5 {
            log.lock().unwrap().clear();
            let results = TestExecutor::new(registry.clone())
                .run_suite(&suite)
                .await
                .unwrap();
            assert_eq!(entries(&log), vec!["t1", "t2", "t3"]);
            assert_eq!(results.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_parallel_bucket_completion_barrier() {
        let mut descriptor = ClassDescriptor::new();
        for i in 0..5u64 {
            let delay = Duration::from_millis(5 - i);
            descriptor = descriptor.with_test(TestMethod::new(format!("t{i}"), move || {
                async move {
                    tokio::time::sleep(delay).await;
                    Ok(Verdict::Pass)
                }
            }));
        }
        let registry = registry_with(vec![("par.Barrier", descriptor)]);
        let suite = doc(json!({
            "suite": {"parallel": "methods"},
            "tests": [{"classes": ["par.Barrier"]}]
        }));

        let results = TestExecutor::new(registry).run_suite(&suite).await.unwrap();

        // Exactly one entry per task, regardless of completion order.
        assert_eq!(results.len(), 5);
        for i in 0..5 {
            let result = &results[&format!("par.Barrier.t{i}")];
            assert_eq!(result.status, TestStatus::Success);
        }
    }

    #[tokio::test]
    async fn test_parallel_tasks_overlap() {
        let flag = Arc::new(AtomicBool::new(false));

        let signal_flag = flag.clone();
        let signal = TestMethod::new("signal", move || {
            let flag = signal_flag.clone();
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(Verdict::Pass)
            }
        });

        let observe_flag = flag.clone();
        let observe = TestMethod::new("observe", move || {
            let flag = observe_flag.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                if flag.load(Ordering::SeqCst) {
                    Ok(Verdict::Pass)
                } else {
                    Err(CaseFailure::Assertion("sibling never ran".into()))
                }
            }
        });

        let descriptor = ClassDescriptor::new().with_test(observe).with_test(signal);
        let registry = registry_with(vec![("par.Overlap", descriptor)]);
        let suite = doc(json!({
            "suite": {"parallel": "methods"},
            "tests": [{"classes": ["par.Overlap"]}]
        }));

        let results = TestExecutor::new(registry).run_suite(&suite).await.unwrap();
        assert_eq!(results["par.Overlap.observe"].status, TestStatus::Success);
    }

    #[tokio::test]
    async fn test_abort_propagates_out_of_the_run() {
        let events = new_log();
        let listener = Arc::new(RecordingListener {
            events: events.clone(),
        });
        let log = new_log();

        let descriptor = ClassDescriptor::new()
            .with_listener(listener)
            .with_test(logged_method("t_ok", &log))
            .with_test(TestMethod::new("t_abort", || async {
                Err(CaseFailure::Aborted("termination signal".into()))
            }))
            .with_test(logged_method("t_never", &log));
        let registry = registry_with(vec![("abt.C", descriptor)]);
        let suite = doc(json!({"suite": {}, "tests": [{"classes": ["abt.C"]}]}));

        let err = TestExecutor::new(registry)
            .run_suite(&suite)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Aborted(_)));

        // The aborted task fired its start callback but no terminal one, and
        // the remainder of the bucket never ran.
        let seen = entries(&events);
        assert!(seen.contains(&"start:t_abort".to_string()));
        assert!(!seen.iter().any(|e| e.ends_with(":t_abort") && !e.starts_with("start")));
        assert_eq!(entries(&log), vec!["t_ok"]);
    }

    #[tokio::test]
    async fn test_before_class_failure_skips_class_in_classes_mode() {
        let after_ran = Arc::new(AtomicBool::new(false));
        let after_flag = after_ran.clone();
        let log = new_log();

        let descriptor = ClassDescriptor::new()
            .with_before_class(Hook::new("broken_setup", || async {
                Err(CaseFailure::Error("browser failed to start".into()))
            }))
            .with_after_class(Hook::new("teardown", move || {
                let flag = after_flag.clone();
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
            }))
            .with_test(logged_method("m1", &log))
            .with_test(logged_method("m2", &log));
        let registry = registry_with(vec![("bcf.C", descriptor)]);
        let suite = doc(json!({
            "suite": {"parallel": "classes"},
            "tests": [{"classes": ["bcf.C"]}]
        }));

        let results = TestExecutor::new(registry).run_suite(&suite).await.unwrap();

        assert_eq!(results.len(), 2);
        for name in ["bcf.C.m1", "bcf.C.m2"] {
            let result = &results[name];
            assert_eq!(result.status, TestStatus::Skipped);
            assert_eq!(
                result.caught,
                Some(CaseFailure::Error("browser failed to start".into()))
            );
        }
        assert!(after_ran.load(Ordering::SeqCst));
        assert!(entries(&log).is_empty());
    }

    #[tokio::test]
    async fn test_eager_before_class_failure_skips_leaf_tasks() {
        let after_ran = Arc::new(AtomicBool::new(false));
        let after_flag = after_ran.clone();
        let log = new_log();

        let descriptor = ClassDescriptor::new()
            .with_before_class(Hook::new("broken_setup", || async {
                Err(CaseFailure::Error("no session".into()))
            }))
            .with_after_class(Hook::new("teardown", move || {
                let flag = after_flag.clone();
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
            }))
            .with_test(logged_method("m1", &log))
            .with_test(logged_method("m2", &log));
        let registry = registry_with(vec![("bcn.C", descriptor)]);
        let suite = doc(json!({"suite": {}, "tests": [{"classes": ["bcn.C"]}]}));

        let results = TestExecutor::new(registry).run_suite(&suite).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results["bcn.C.m1"].status, TestStatus::Skipped);
        assert_eq!(results["bcn.C.m2"].status, TestStatus::Skipped);
        assert!(after_ran.load(Ordering::SeqCst));
        assert!(entries(&log).is_empty());
    }

    #[tokio::test]
    async fn test_data_provider_expansion_names() {
        let descriptor = ClassDescriptor::new().with_test(TestMethod::parameterised(
            "method",
            || async {
                Ok(vec![
                    ParamRow::from_value(json!({"name": "x", "v": 1})),
                    ParamRow::from_value(json!({"v": 2})),
                ])
            },
            |row| async move {
                match row.get("v").and_then(|v| v.as_i64()) {
                    Some(v) if v >= 1 => Ok(Verdict::Pass),
                    _ => Err(CaseFailure::Assertion("bad row".into())),
                }
            },
        ));
        let registry = registry_with(vec![("dp.C", descriptor)]);
        let suite = doc(json!({"suite": {}, "tests": [{"classes": ["dp.C"]}]}));

        let results = TestExecutor::new(registry).run_suite(&suite).await.unwrap();

        // Named row labels the case, anonymous rows fall back to the index.
        assert_eq!(results.len(), 2);
        assert_eq!(results["dp.C.method[x]"].status, TestStatus::Success);
        assert_eq!(results["dp.C.method[1]"].status, TestStatus::Success);
    }

    #[tokio::test]
    async fn test_explicit_skip_bypasses_after_hooks() {
        let after_ran = Arc::new(AtomicBool::new(false));
        let after_flag = after_ran.clone();
        let events = new_log();

        let descriptor = ClassDescriptor::new()
            .with_listener(Arc::new(RecordingListener {
                events: events.clone(),
            }))
            .with_after_method(Hook::new("cleanup", move || {
                let flag = after_flag.clone();
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
            }))
            .with_test(TestMethod::new("maybe", || async {
                Ok(Verdict::skipped("dependency missing"))
            }));
        let registry = registry_with(vec![("skp.C", descriptor)]);
        let suite = doc(json!({"suite": {}, "tests": [{"classes": ["skp.C"]}]}));

        let results = TestExecutor::new(registry).run_suite(&suite).await.unwrap();

        assert_eq!(results["skp.C.maybe"].status, TestStatus::Skipped);
        assert!(!after_ran.load(Ordering::SeqCst));
        assert!(entries(&events).contains(&"skipped:maybe".to_string()));
    }

    #[tokio::test]
    async fn test_shared_lock_serialises_parallel_tasks() {
        let lock = Arc::new(tokio::sync::Mutex::new(()));
        let log = new_log();

        let mut descriptor = ClassDescriptor::new();
        for name in ["a", "b"] {
            let log = log.clone();
            let label = name.to_string();
            descriptor = descriptor.with_test(
                TestMethod::new(name, move || {
                    let log = log.clone();
                    let label = label.clone();
                    async move {
                        log.lock().unwrap().push(format!("enter:{label}"));
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        log.lock().unwrap().push(format!("exit:{label}"));
                        Ok(Verdict::Pass)
                    }
                })
                .with_lock(lock.clone()),
            );
        }
        let registry = registry_with(vec![("lck.C", descriptor)]);
        let suite = doc(json!({
            "suite": {"parallel": "methods"},
            "tests": [{"classes": ["lck.C"]}]
        }));

        let results = TestExecutor::new(registry).run_suite(&suite).await.unwrap();
        assert_eq!(results.len(), 2);

        // Each task's enter/exit pair is contiguous: no interleaving.
        let seen = entries(&log);
        assert_eq!(seen.len(), 4);
        for pair in seen.chunks(2) {
            assert_eq!(pair[0].replace("enter", ""), pair[1].replace("exit", ""));
        }
    }

    #[tokio::test]
    async fn test_resolution_failure_is_contained() {
        let log = new_log();
        let descriptor = ClassDescriptor::new().with_test(logged_method("m", &log));
        let registry = registry_with(vec![("known.C", descriptor)]);
        let suite = doc(json!({
            "suite": {},
            "tests": [{"classes": ["known.C", "ghost.D"]}]
        }));

        let results = TestExecutor::new(registry).run_suite(&suite).await.unwrap();

        assert_eq!(results["known.C.m"].status, TestStatus::Success);
        let unresolved = &results["ghost.D.<unresolved>"];
        assert_eq!(unresolved.status, TestStatus::Skipped);
        assert!(unresolved.caught.is_some());
    }

    #[tokio::test]
    async fn test_resolution_failure_records_concrete_includes() {
        let registry = registry_with(vec![]);
        let suite = doc(json!({
            "suite": {},
            "tests": [{"classes": [
                {"name": "ghost.D", "methods": {"include": ["login_ok", "fuzzy_*"]}}
            ]}]
        }));

        let results = TestExecutor::new(registry).run_suite(&suite).await.unwrap();

        // Concrete include patterns stand in for the unknown method list.
        assert_eq!(results.len(), 1);
        assert_eq!(results["ghost.D.login_ok"].status, TestStatus::Skipped);
    }

    #[tokio::test]
    async fn test_selection_filters_and_disabled_methods() {
        let log = new_log();
        let descriptor = ClassDescriptor::new()
            .with_test(logged_method("alpha", &log))
            .with_test(logged_method("beta", &log))
            .with_test(logged_method("broken", &log).disabled())
            .with_test(logged_method("gamma", &log));
        let registry = registry_with(vec![("fil.C", descriptor)]);
        let suite = doc(json!({
            "suite": {},
            "tests": [{"classes": [
                {"name": "fil.C", "methods": {"include": ["a*", "b*"], "exclude": ["beta"]}}
            ]}]
        }));

        let results = TestExecutor::new(registry).run_suite(&suite).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results["fil.C.alpha"].status, TestStatus::Success);
        assert_eq!(entries(&log), vec!["alpha"]);
    }

    #[tokio::test]
    async fn test_tests_mode_runs_groups_as_wrappers() {
        let log = new_log();
        let after_first = Arc::new(AtomicBool::new(false));
        let after_second = Arc::new(AtomicBool::new(false));

        let first_flag = after_first.clone();
        let first = ClassDescriptor::new()
            .with_after_class(Hook::new("teardown", move || {
                let flag = first_flag.clone();
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
            }))
            .with_test(logged_method("one", &log));

        let second_flag = after_second.clone();
        let second = ClassDescriptor::new()
            .with_after_class(Hook::new("teardown", move || {
                let flag = second_flag.clone();
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
            }))
            .with_test(logged_method("two", &log));

        let registry = registry_with(vec![("grp.A", first), ("grp.B", second)]);
        let suite = doc(json!({
            "suite": {"parallel": "tests"},
            "tests": [
                {"name": "first", "classes": ["grp.A"]},
                {"name": "second", "classes": ["grp.B"]}
            ]
        }));

        let results = TestExecutor::new(registry).run_suite(&suite).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results["grp.A.one"].status, TestStatus::Success);
        assert_eq!(results["grp.B.two"].status, TestStatus::Success);
        assert!(after_first.load(Ordering::SeqCst));
        assert!(after_second.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_wrapper_harness_failure_skips_remaining_methods() {
        let log = new_log();
        let descriptor = ClassDescriptor::new()
            .with_test(logged_method("ok_method", &log))
            .with_test(TestMethod::parameterised(
                "bad_provider",
                || async { Err(CaseFailure::Error("provider exploded".into())) },
                |_row| async { Ok(Verdict::Pass) },
            ))
            .with_test(logged_method("tail_method", &log));
        let registry = registry_with(vec![("hrn.C", descriptor)]);
        let suite = doc(json!({
            "suite": {"parallel": "classes"},
            "tests": [{"classes": ["hrn.C"]}]
        }));

        let results = TestExecutor::new(registry).run_suite(&suite).await.unwrap();

        assert_eq!(results["hrn.C.ok_method"].status, TestStatus::Success);
        assert_eq!(results["hrn.C.bad_provider"].status, TestStatus::Skipped);
        assert_eq!(results["hrn.C.tail_method"].status, TestStatus::Skipped);
        assert_eq!(entries(&log), vec!["ok_method"]);
    }

    #[tokio::test]
    async fn test_provider_failure_fatal_in_flat_mode() {
        let descriptor = ClassDescriptor::new().with_test(TestMethod::parameterised(
            "cases",
            || async { Err(CaseFailure::Error("provider exploded".into())) },
            |_row| async { Ok(Verdict::Pass) },
        ));
        let registry = registry_with(vec![("prv.C", descriptor)]);
        let suite = doc(json!({"suite": {}, "tests": [{"classes": ["prv.C"]}]}));

        let err = TestExecutor::new(registry)
            .run_suite(&suite)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::ProviderFailed { .. }));
    }

    #[tokio::test]
    async fn test_before_method_hook_failure_propagates() {
        let descriptor = ClassDescriptor::new()
            .with_before_method(Hook::new("flaky_setup", || async {
                Err(CaseFailure::Error("setup refused".into()))
            }))
            .with_test(TestMethod::new("m", || async { Ok(Verdict::Pass) }));
        let registry = registry_with(vec![("bmh.C", descriptor)]);
        let suite = doc(json!({"suite": {}, "tests": [{"classes": ["bmh.C"]}]}));

        let err = TestExecutor::new(registry)
            .run_suite(&suite)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::HookFailed { .. }));
    }

    #[tokio::test]
    async fn test_after_method_hook_failure_is_logged_only() {
        let descriptor = ClassDescriptor::new()
            .with_after_method(Hook::new("leaky_teardown", || async {
                Err(CaseFailure::Error("teardown grumbled".into()))
            }))
            .with_test(TestMethod::new("m", || async { Ok(Verdict::Pass) }));
        let registry = registry_with(vec![("amh.C", descriptor)]);
        let suite = doc(json!({"suite": {}, "tests": [{"classes": ["amh.C"]}]}));

        let results = TestExecutor::new(registry).run_suite(&suite).await.unwrap();
        assert_eq!(results["amh.C.m"].status, TestStatus::Success);
        assert!(results["amh.C.m"].caught.is_none());
    }

    #[tokio::test]
    async fn test_run_suite_file_end_to_end() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let suite_path = dir.path().join("smoke.json");
        let mut file = std::fs::File::create(&suite_path).unwrap();
        file.write_all(
            br#"{"suite": {}, "tests": [{"classes": ["diagnostics.EngineSmoke"]}]}"#,
        )
        .unwrap();

        let schema = concat!(env!("CARGO_MANIFEST_DIR"), "/schemas/suite_schema.json");
        let registry = Arc::new(crate::diagnostics::default_registry());

        let results = run_suite_file(&suite_path, schema, registry).await.unwrap();
        assert!(results.contains_key("diagnostics.EngineSmoke.scheduler_heartbeat"));
        assert!(results
            .values()
            .all(|result| result.status != TestStatus::Failure));
    }
}
