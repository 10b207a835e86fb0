//! Test-case capability model
//!
//! Registered test classes describe their methods, lifecycle hooks and
//! listeners through an explicit descriptor table instead of runtime
//! introspection. Bodies, hooks and data providers are all async callables;
//! synchronous code simply returns without awaiting.

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::{TestListener, TestStatus};

/// Failure raised by user-supplied code (bodies, hooks, providers).
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseFailure {
    /// Hard assertion failure raised by the assertion helpers.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// Any other failure raised by a body or hook.
    #[error("{0}")]
    Error(String),

    /// Control-level abort. Never classified into a terminal status; the
    /// scheduler re-raises it past the whole run.
    #[error("aborted: {0}")]
    Aborted(String),
}

/// What a test body reports back to the scheduler.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    /// Ordinary completion, classified as success.
    Pass,

    /// Explicit status form: status and error are copied verbatim onto the
    /// result, bypassing classification. The only way a body can report
    /// `Skipped` from within itself.
    Explicit {
        status: TestStatus,
        error: Option<CaseFailure>,
    },
}

impl Verdict {
    /// Explicit skip with a reason.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Verdict::Explicit {
            status: TestStatus::Skipped,
            error: Some(CaseFailure::Error(reason.into())),
        }
    }
}

/// One parameter row supplied by a data provider.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamRow {
    /// Mapping row; passed to the body as named arguments. A `"name"` entry
    /// labels the expanded test case.
    Named(serde_json::Map<String, Value>),

    /// Positional row.
    Positional(Vec<Value>),
}

impl ParamRow {
    /// Build a row from a JSON value: objects become named rows, arrays
    /// positional rows, any other value a single positional argument.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => ParamRow::Named(map),
            Value::Array(items) => ParamRow::Positional(items),
            other => ParamRow::Positional(vec![other]),
        }
    }

    /// Label used in the expanded case name `method[label]`: the row's own
    /// `"name"` entry when present, otherwise the zero-based row index.
    pub fn label(&self, index: usize) -> String {
        match self {
            ParamRow::Named(map) => map
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| index.to_string()),
            ParamRow::Positional(_) => index.to_string(),
        }
    }

    /// Named argument lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            ParamRow::Named(map) => map.get(key),
            ParamRow::Positional(_) => None,
        }
    }

    /// Positional argument lookup.
    pub fn at(&self, index: usize) -> Option<&Value> {
        match self {
            ParamRow::Positional(items) => items.get(index),
            ParamRow::Named(_) => None,
        }
    }
}

/// Result of a test body invocation.
pub type BodyResult = Result<Verdict, CaseFailure>;

/// Plain zero-argument test body.
pub type BodyFn = Arc<dyn Fn() -> BoxFuture<'static, BodyResult> + Send + Sync>;

/// Parameterised test body, invoked once per provider row.
pub type ParamBodyFn = Arc<dyn Fn(ParamRow) -> BoxFuture<'static, BodyResult> + Send + Sync>;

/// Data provider: zero-argument callable returning the parameter rows.
pub type ProviderFn =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<ParamRow>, CaseFailure>> + Send + Sync>;

type HookFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), CaseFailure>> + Send + Sync>;

/// Named lifecycle hook (before/after, class or method granularity).
#[derive(Clone)]
pub struct Hook {
    name: String,
    func: HookFn,
}

impl Hook {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CaseFailure>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(move || Box::pin(f())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn invoke(&self) -> Result<(), CaseFailure> {
        (self.func)().await
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook").field("name", &self.name).finish()
    }
}

/// Body of a test method as declared in the descriptor.
#[derive(Clone)]
pub enum CaseBody {
    Plain(BodyFn),
    Parameterised(ParamBodyFn),
}

/// One declared test method with its metadata.
#[derive(Clone)]
pub struct TestMethod {
    pub name: String,

    /// Disabled methods stay selectable but are never executed.
    pub enabled: bool,

    /// Legacy per-method flag: under a sequential group this method still
    /// routes to the parallel bucket.
    pub parallel_hint: bool,

    /// Data provider expanding this method into one case per row.
    pub provider: Option<ProviderFn>,

    pub body: CaseBody,

    /// Optional mutual-exclusion lock shared with other tasks that must not
    /// run concurrently with this one.
    pub lock: Option<Arc<Mutex<()>>>,
}

impl TestMethod {
    /// Plain test method.
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BodyResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            enabled: true,
            parallel_hint: false,
            provider: None,
            body: CaseBody::Plain(Arc::new(move || Box::pin(body()))),
            lock: None,
        }
    }

    /// Data-driven test method: `provider` supplies the rows, `body` runs
    /// once per row.
    pub fn parameterised<P, PFut, F, Fut>(name: impl Into<String>, provider: P, body: F) -> Self
    where
        P: Fn() -> PFut + Send + Sync + 'static,
        PFut: Future<Output = Result<Vec<ParamRow>, CaseFailure>> + Send + 'static,
        F: Fn(ParamRow) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BodyResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            enabled: true,
            parallel_hint: false,
            provider: Some(Arc::new(move || Box::pin(provider()))),
            body: CaseBody::Parameterised(Arc::new(move |row| Box::pin(body(row)))),
            lock: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel_hint = true;
        self
    }

    pub fn with_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.lock = Some(lock);
        self
    }
}

impl fmt::Debug for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestMethod")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("parallel_hint", &self.parallel_hint)
            .field("has_provider", &self.provider.is_some())
            .finish()
    }
}

/// Capability table of a registered test class.
#[derive(Clone, Default)]
pub struct ClassDescriptor {
    pub tests: Vec<TestMethod>,
    pub before_class: Vec<Hook>,
    pub after_class: Vec<Hook>,
    pub before_method: Vec<Hook>,
    pub after_method: Vec<Hook>,
    pub listeners: Vec<Arc<dyn TestListener>>,
}

impl ClassDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test(mut self, method: TestMethod) -> Self {
        self.tests.push(method);
        self
    }

    pub fn with_before_class(mut self, hook: Hook) -> Self {
        self.before_class.push(hook);
        self
    }

    pub fn with_after_class(mut self, hook: Hook) -> Self {
        self.after_class.push(hook);
        self
    }

    pub fn with_before_method(mut self, hook: Hook) -> Self {
        self.before_method.push(hook);
        self
    }

    pub fn with_after_method(mut self, hook: Hook) -> Self {
        self.after_method.push(hook);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn TestListener>) -> Self {
        self.listeners.push(listener);
        self
    }
}

/// Contract implemented by every registered test class.
///
/// The engine instantiates the class through its registered factory and asks
/// it for a descriptor; the descriptor's closures capture the instance.
pub trait TestCase: Send + Sync {
    fn descriptor(self: Arc<Self>) -> ClassDescriptor;
}
