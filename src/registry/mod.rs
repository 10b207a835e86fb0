//! Test-class registry
//!
//! Maps dotted class-path strings to case factories. The registry is
//! populated at program start, so resolving a class by name is a pure map
//! lookup with no dynamic loading involved.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::case::TestCase;

/// Instantiates a registered test class.
pub type CaseFactory = Arc<dyn Fn() -> Arc<dyn TestCase> + Send + Sync>;

/// Failure to map a dotted class path to a registered factory.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClassResolutionError {
    #[error("invalid class path '{0}': expected format module.ClassName")]
    InvalidFormat(String),

    #[error("no module '{module}' is registered (resolving class '{path}')")]
    ModuleNotFound { module: String, path: String },

    #[error("module '{module}' does not define a class named '{class}'")]
    ClassNotFound { module: String, class: String },
}

/// Registry of test-class factories keyed by fully qualified dotted path.
#[derive(Clone, Default)]
pub struct CaseRegistry {
    factories: HashMap<String, CaseFactory>,
}

impl CaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `module.ClassName`. A later registration
    /// under the same path replaces the earlier one.
    pub fn register<T, F>(&mut self, path: impl Into<String>, factory: F)
    where
        T: TestCase + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.factories
            .insert(path.into(), Arc::new(move || factory() as Arc<dyn TestCase>));
    }

    /// Look up the factory for a dotted class path.
    ///
    /// This is a pure lookup; it never instantiates the class. The path must
    /// contain at least one separator splitting the module path from the
    /// class name.
    pub fn resolve(&self, dotted_path: &str) -> Result<&CaseFactory, ClassResolutionError> {
        let (module, class) = dotted_path
            .rsplit_once('.')
            .ok_or_else(|| ClassResolutionError::InvalidFormat(dotted_path.to_string()))?;

        if let Some(factory) = self.factories.get(dotted_path) {
            return Ok(factory);
        }

        let module_known = self
            .factories
            .keys()
            .filter_map(|key| key.rsplit_once('.'))
            .any(|(registered_module, _)| registered_module == module);

        if module_known {
            Err(ClassResolutionError::ClassNotFound {
                module: module.to_string(),
                class: class.to_string(),
            })
        } else {
            Err(ClassResolutionError::ModuleNotFound {
                module: module.to_string(),
                path: dotted_path.to_string(),
            })
        }
    }

    /// Resolve and instantiate in one step.
    pub fn instantiate(&self, dotted_path: &str) -> Result<Arc<dyn TestCase>, ClassResolutionError> {
        let factory = self.resolve(dotted_path)?;
        Ok(factory())
    }

    /// All registered class paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.factories.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }
}
