//! Suite normalisation
//!
//! Pure defaulting pass over a parsed suite document: fills in parallelism
//! and thread-count defaults, and merges duplicate class entries into a
//! canonical form. Performs no I/O and cannot fail.

use std::collections::HashMap;

use super::model::{ClassConfig, ClassEntry, MethodSelector, ParallelMode, SuiteDocument};

/// Suite-level thread count applied when the document omits one.
pub const DEFAULT_SUITE_THREAD_COUNT: usize = 10;

/// Group-level thread count applied when neither the group nor the suite
/// carries one.
pub const DEFAULT_TEST_THREAD_COUNT: usize = 10;

/// Normalise with the standard defaults.
pub fn normalise(doc: SuiteDocument) -> SuiteDocument {
    normalise_with(doc, DEFAULT_SUITE_THREAD_COUNT, DEFAULT_TEST_THREAD_COUNT)
}

/// Apply defaults and canonicalise class lists.
///
/// - `suite.parallel` defaults to `none`, `suite.thread_count` to
///   `default_suite_threads`.
/// - Each group inherits `parallel` from the suite. A sequential group gets
///   `thread_count = 1` unconditionally, overriding any explicit value;
///   otherwise the group inherits `suite.thread_count`, falling back to
///   `default_test_threads`.
/// - Class entries sharing a name are merged: include/exclude lists are
///   unioned, duplicates dropped, first-seen order preserved.
pub fn normalise_with(
    mut doc: SuiteDocument,
    default_suite_threads: usize,
    default_test_threads: usize,
) -> SuiteDocument {
    let suite_parallel = doc.suite.parallel.unwrap_or(ParallelMode::None);
    doc.suite.parallel = Some(suite_parallel);

    let suite_threads = doc.suite.thread_count.unwrap_or(default_suite_threads);
    doc.suite.thread_count = Some(suite_threads);

    for group in &mut doc.tests {
        let parallel = group.parallel.unwrap_or(suite_parallel);
        group.parallel = Some(parallel);

        group.thread_count = if parallel == ParallelMode::None {
            Some(1)
        } else {
            Some(
                group
                    .thread_count
                    .or(doc.suite.thread_count)
                    .unwrap_or(default_test_threads),
            )
        };

        group.classes = normalise_classes(std::mem::take(&mut group.classes));
    }

    doc
}

/// Merge raw class entries by name into canonical `ClassConfig` form.
pub fn normalise_classes(entries: Vec<ClassEntry>) -> Vec<ClassEntry> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, ClassConfig> = HashMap::new();

    for entry in entries {
        let config = entry.into_config();

        let slot = merged.entry(config.name.clone()).or_insert_with(|| {
            order.push(config.name.clone());
            ClassConfig {
                name: config.name.clone(),
                methods: MethodSelector::default(),
            }
        });

        extend_unique(&mut slot.methods.include, config.methods.include);
        extend_unique(&mut slot.methods.exclude, config.methods.exclude);
    }

    order
        .into_iter()
        .map(|name| {
            ClassEntry::Config(
                merged
                    .remove(&name)
                    .unwrap_or_else(|| ClassConfig {
                        name,
                        methods: MethodSelector::default(),
                    }),
            )
        })
        .collect()
}

fn extend_unique(dst: &mut Vec<String>, src: Vec<String>) {
    for item in src {
        if !dst.contains(&item) {
            dst.push(item);
        }
    }
}
