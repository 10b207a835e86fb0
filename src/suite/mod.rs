//! Suite definition handling
//!
//! Loading, validation and normalisation of declarative suite documents.

mod loader;
mod model;
mod normalise;

pub use loader::{SuiteError, SuiteLoader, DEFAULT_SCHEMA_PATH};
pub use model::{
    ClassConfig, ClassEntry, MethodSelector, ParallelMode, SuiteConfig, SuiteDocument, TestGroup,
};
pub use normalise::{
    normalise, normalise_classes, normalise_with, DEFAULT_SUITE_THREAD_COUNT,
    DEFAULT_TEST_THREAD_COUNT,
};
