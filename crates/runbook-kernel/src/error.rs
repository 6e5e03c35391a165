//! The kernel error taxonomy.
//!
//! Every failure bubbles to the top of the current job invocation; no
//! component recovers silently. Evaluator diagnostics are preserved
//! end-to-end so stderr rendering stays precise.

use std::fmt;

use runbook_types::{BridgeError, RunResult};

use crate::diag::DiagnosticBundle;

/// Which caller-input kind a binder error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindKind {
    Parameter,
    Option,
}

impl fmt::Display for BindKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindKind::Parameter => write!(f, "parameter"),
            BindKind::Option => write!(f, "option"),
        }
    }
}

/// Errors produced by loading, evaluating, and running jobs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One or more load-time diagnostics (parse or decode failures).
    #[error("{0}")]
    Load(DiagnosticBundle),

    /// An expression failed to evaluate. The evaluator's diagnostic bundle
    /// is preserved verbatim.
    #[error(transparent)]
    Eval(#[from] hcl::eval::Errors),

    /// A declared type and an actual type differ.
    #[error("job {job:?}: unexpected type of {what}: want {want}, got {got}")]
    TypeMismatch {
        job: String,
        what: String,
        want: String,
        got: String,
    },

    /// A parameter or option has neither a caller value nor a default.
    #[error("job {job:?}: missing value for {kind} {name:?}")]
    MissingValue {
        job: String,
        kind: BindKind,
        name: String,
    },

    /// A run target resolved to nothing, and there is no root job.
    #[error("command {0:?} not found")]
    UnknownJob(String),

    /// A job invoked itself, directly or through config sources.
    #[error("job cycle detected: {0}")]
    Cycle(String),

    /// A config source failed to produce or decode its YAML.
    #[error("job {job:?}: config {config:?}: source {index}: {message}")]
    ConfigSource {
        job: String,
        config: String,
        index: usize,
        message: String,
    },

    /// A subprocess exited nonzero or failed to spawn. Carries the captured
    /// result so callers can still publish `run.res`.
    #[error("command \"{command}\": exit status {}", .result.exit_status)]
    Subprocess { command: String, result: RunResult },

    /// An assertion evaluated to false.
    #[error(
        "assertion {name:?} failed: this expression must be true, but was false: {expr}, where {bindings}"
    )]
    Assertion {
        name: String,
        expr: String,
        bindings: String,
    },

    /// An assertion failure inside a test case, tagged with the case name.
    #[error("case {case:?}: {source}")]
    Case {
        case: String,
        #[source]
        source: Box<Error>,
    },

    /// A value could not cross between the native and tagged domains.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// A malformed type-constraint expression.
    #[error("invalid type expression: {0}")]
    TypeExpr(String),

    /// Filesystem failure outside of config sources.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// True for assertion failures, including case-wrapped ones. The test
    /// harness uses this to decide what to re-wrap with the case name.
    pub fn is_assertion(&self) -> bool {
        matches!(self, Error::Assertion { .. } | Error::Case { .. })
    }

    /// The captured subprocess result, if this error carries one.
    pub fn subprocess_result(&self) -> Option<&RunResult> {
        match self {
            Error::Subprocess { result, .. } => Some(result),
            _ => None,
        }
    }
}
