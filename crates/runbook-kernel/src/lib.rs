//! runbook-kernel: the engine behind the `runbook` job runner.
//!
//! This crate provides:
//!
//! - **Loader**: discovers and parses definition files, decodes the typed schema
//! - **AST**: jobs, parameters, options, variables, configs, steps, tests
//! - **Contexts**: the layered evaluation scopes (`param`, `opt`, `var`,
//!   `conf`, `step`, `run`, `case`, `context`)
//! - **Binder / Vars**: caller-input binding and variable resolution with
//!   exact type checking
//! - **Config composer**: YAML sources (files and job outputs) merged with
//!   override semantics
//! - **Runner**: the job invocation pipeline, steps, and nested runs
//! - **Assertions / Harness**: condition checking with detailed failure
//!   diagnostics, and the `test` block executor
//! - **Shell**: subprocess capture with per-line log hooks

pub mod assert;
pub mod ast;
pub mod binder;
pub mod config;
pub mod context;
pub mod diag;
pub mod error;
pub mod funcs;
pub mod harness;
pub mod loader;
pub mod runner;
pub mod shell;
pub mod typeexpr;
pub mod vars;

pub use ast::Document;
pub use context::EvalScope;
pub use diag::{write_diagnostics, Diagnostic, DiagnosticBundle};
pub use error::{BindKind, Error};
pub use loader::load_dir;
pub use runner::{Runner, ValueMap};
pub use shell::{CaptureOpts, LineSink, ShellCommand};
pub use typeexpr::Type;

// The value domain is re-exported so embedders rarely need runbook-types
// directly.
pub use runbook_types::{RunResult, Value};
