//! Suite document model
//!
//! Typed representation of a declarative suite definition. Straight out of
//! the loader the optional fields are exactly what the file said; the
//! normaliser fills in defaults and canonicalises class entries.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Granularity at which concurrent execution is permitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParallelMode {
    None,
    Methods,
    Classes,
    Tests,
}

impl fmt::Display for ParallelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParallelMode::None => write!(f, "none"),
            ParallelMode::Methods => write!(f, "methods"),
            ParallelMode::Classes => write!(f, "classes"),
            ParallelMode::Tests => write!(f, "tests"),
        }
    }
}

/// Root parsed suite document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuiteDocument {
    pub suite: SuiteConfig,
    pub tests: Vec<TestGroup>,
}

/// Suite-level configuration block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<ParallelMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_count: Option<usize>,
}

/// One `<test>` block: a named group of classes with its own parallelism.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<ParallelMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_count: Option<usize>,

    pub classes: Vec<ClassEntry>,
}

impl TestGroup {
    /// Parallelism after normalisation; `none` until normalised.
    pub fn effective_parallel(&self) -> ParallelMode {
        self.parallel.unwrap_or(ParallelMode::None)
    }

    /// Display name for wrapper tasks and logging.
    pub fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("UnnamedTest{index}"))
    }
}

/// Raw class entry: a bare class path or a full configuration object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassEntry {
    Name(String),
    Config(ClassConfig),
}

impl ClassEntry {
    pub fn name(&self) -> &str {
        match self {
            ClassEntry::Name(name) => name,
            ClassEntry::Config(config) => &config.name,
        }
    }

    /// Canonical configuration form of this entry.
    pub fn into_config(self) -> ClassConfig {
        match self {
            ClassEntry::Name(name) => ClassConfig {
                name,
                methods: MethodSelector::default(),
            },
            ClassEntry::Config(config) => config,
        }
    }

    pub fn as_config(&self) -> ClassConfig {
        self.clone().into_config()
    }
}

/// Class selection: dotted path plus method include/exclude globs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassConfig {
    pub name: String,

    #[serde(default)]
    pub methods: MethodSelector,
}

/// Glob-based method selection. Empty include means "all methods".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodSelector {
    #[serde(default, deserialize_with = "string_or_seq")]
    pub include: Vec<String>,

    #[serde(default, deserialize_with = "string_or_seq")]
    pub exclude: Vec<String>,
}

/// Accept a bare scalar where a list of patterns is expected.
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(pattern) => vec![pattern],
        OneOrMany::Many(patterns) => patterns,
    })
}
