//! The typed document schema.
//!
//! Everything here is created by the loader and immutable afterwards.
//! Expression-valued attributes are held unevaluated as [`hcl::Expression`]s;
//! they are evaluated per invocation against that invocation's context.

use std::path::{Path, PathBuf};

use hcl::expr::Expression;

/// A fully decoded document: every job and test from every discovered file,
/// plus the implicit root job carrying the top-level declarations.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// The root job. Its name is the empty string.
    pub root: JobSpec,
    /// Named jobs, in file-then-declaration order.
    pub jobs: Vec<JobSpec>,
    /// Test blocks, in file-then-declaration order.
    pub tests: Vec<TestSpec>,
    /// Source filename to source text, for diagnostic rendering.
    pub sources: Vec<(PathBuf, String)>,
}

/// A named unit of work with typed inputs, composed configuration, optional
/// steps, and one terminal action.
#[derive(Debug, Clone, Default)]
pub struct JobSpec {
    /// Unique among jobs; empty for the root job.
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    /// Accepted by the schema, not enforced. Scheduling is sequential.
    pub concurrency: Option<i64>,
    pub parameters: Vec<ParameterSpec>,
    pub options: Vec<OptionSpec>,
    pub variables: Vec<VariableSpec>,
    pub configs: Vec<ConfigSpec>,
    pub steps: Vec<StepSpec>,
    pub exec: Option<ExecSpec>,
    pub run: Option<RunSpec>,
    pub assert: Vec<AssertSpec>,
    /// The file this job was declared in; `context.sourcedir` derives from it.
    pub source_file: PathBuf,
}

impl JobSpec {
    /// The directory exposed to expressions as `context.sourcedir`.
    pub fn source_dir(&self) -> &Path {
        self.source_file.parent().unwrap_or(Path::new("."))
    }
}

/// A typed caller input, conventionally required.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub type_expr: Expression,
    pub default: Option<Expression>,
    pub description: Option<String>,
}

/// A typed caller input, conventionally optional. `short` is a single-letter
/// CLI alias.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    pub name: String,
    pub type_expr: Expression,
    pub default: Option<Expression>,
    pub description: Option<String>,
    pub short: Option<String>,
}

/// A named expression evaluated once per invocation, in declaration order.
#[derive(Debug, Clone)]
pub struct VariableSpec {
    pub name: String,
    pub type_expr: Option<Expression>,
    pub value: Expression,
}

/// A named value composed from one or more YAML-producing sources.
#[derive(Debug, Clone)]
pub struct ConfigSpec {
    pub name: String,
    pub sources: Vec<SourceSpec>,
}

/// A producer of raw YAML bytes.
#[derive(Debug, Clone)]
pub enum SourceSpec {
    /// Read a file; fall back to `default` if it is absent.
    File {
        path: Expression,
        default: Option<Expression>,
    },
    /// Run another job and take its stdout.
    Job {
        name: String,
        args: Expression,
        format: Option<String>,
    },
    /// An unrecognized source type label. Kept so the composer can report it
    /// as a terminal error at evaluation time.
    Unknown { kind: String },
}

/// A named sub-invocation within a job. `needs` is parsed and preserved but
/// execution is strictly sequential in declaration order.
#[derive(Debug, Clone)]
pub struct StepSpec {
    pub name: String,
    pub run: RunSpec,
    pub needs: Vec<String>,
}

/// An external command: all three attributes are expressions evaluated in
/// the job context.
#[derive(Debug, Clone)]
pub struct ExecSpec {
    pub command: Expression,
    pub args: Expression,
    pub env: Expression,
}

/// An invocation of another declared job, with named argument expressions.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub name: String,
    /// Declaration-ordered argument expressions.
    pub args: Vec<(String, Expression)>,
}

/// A boolean condition evaluated for its side effect of failing loudly.
#[derive(Debug, Clone)]
pub struct AssertSpec {
    pub name: String,
    pub condition: Expression,
}

/// A test block: variables, cases, one run, and assertions.
#[derive(Debug, Clone)]
pub struct TestSpec {
    pub name: String,
    pub variables: Vec<VariableSpec>,
    pub cases: Vec<CaseSpec>,
    pub run: RunSpec,
    pub assert: Vec<AssertSpec>,
    pub source_file: PathBuf,
}

impl TestSpec {
    /// The directory exposed to test expressions as `context.sourcedir`.
    pub fn source_dir(&self) -> &Path {
        self.source_file.parent().unwrap_or(Path::new("."))
    }
}

/// One case of a test: an attribute mapping published under `case.*`.
#[derive(Debug, Clone, Default)]
pub struct CaseSpec {
    pub name: String,
    pub args: Vec<(String, Expression)>,
}
