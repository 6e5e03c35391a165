//! runbook CLI entry point.
//!
//! Usage:
//!   runbook run <job> [--<name>=<value>...]   # run one job
//!   runbook test                              # run all test blocks
//!   runbook --chdir <dir> run <job>           # load definitions elsewhere
//!
//! `--<name>=<value>` values parse as expressions where possible (`--n=42`
//! is a number, `--ok=true` a bool) and fall back to literal strings. An
//! option's declared `short` alias is accepted as `-<short>=<value>`.

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context as _, Result};
use runbook_kernel::{load_dir, write_diagnostics, Document, Error, EvalScope, Runner, Value, ValueMap};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let mut args: Vec<String> = env::args().skip(1).collect();

    let mut dir = PathBuf::from(".");
    while args.first().map(String::as_str) == Some("--chdir") {
        args.remove(0);
        if args.is_empty() {
            bail!("--chdir requires a directory argument");
        }
        dir = PathBuf::from(args.remove(0));
    }

    match args.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }

        Some("--version" | "-V") => {
            println!("runbook {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }

        Some("run") => {
            let Some(job) = args.get(1).cloned() else {
                bail!("run requires a job name");
            };
            run_job(&dir, &job, &args[2..])
        }

        Some("test") => run_tests(&dir),

        Some(other) => {
            bail!("unknown command {other:?} (expected \"run\" or \"test\")");
        }
    }
}

fn run_job(dir: &Path, job: &str, flags: &[String]) -> Result<ExitCode> {
    let doc = match load_dir(dir) {
        Ok(doc) => doc,
        Err(e) => return Ok(report(&e)),
    };
    let values = match parse_flags(&doc, job, flags) {
        Ok(values) => values,
        Err(message) => bail!("{message}"),
    };

    let runner = Runner::new(doc);
    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    match runtime.block_on(runner.run(job, &values, &values)) {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) => Ok(report(&e)),
    }
}

fn run_tests(dir: &Path) -> Result<ExitCode> {
    let doc = match load_dir(dir) {
        Ok(doc) => doc,
        Err(e) => return Ok(report(&e)),
    };
    let runner = Runner::new(doc);
    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    match runtime.block_on(runner.run_tests()) {
        Ok(result) => {
            if !result.stdout.is_empty() {
                println!("{}", result.stdout);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report(&e)),
    }
}

/// Turn `--name=value` / `-short=value` flags into the caller value map.
fn parse_flags(doc: &Document, job: &str, flags: &[String]) -> Result<ValueMap, String> {
    let mut values = ValueMap::new();
    for flag in flags {
        let body = flag
            .strip_prefix("--")
            .or_else(|| flag.strip_prefix('-'))
            .ok_or_else(|| format!("unexpected argument {flag:?} (expected --name=value)"))?;
        let Some((name, raw)) = body.split_once('=') else {
            return Err(format!("flag {flag:?} is missing a value (expected --name=value)"));
        };
        let name = resolve_short(doc, job, name);
        values.insert(name, parse_flag_value(raw));
    }
    Ok(values)
}

/// Map a single-letter alias to its option's full name.
fn resolve_short(doc: &Document, job: &str, name: &str) -> String {
    // The job's own options shadow root-job shorts.
    let jobs = doc
        .jobs
        .iter()
        .filter(|j| j.name == job)
        .chain(std::iter::once(&doc.root));
    for j in jobs {
        for opt in &j.options {
            if opt.short.as_deref() == Some(name) {
                return opt.name.clone();
            }
        }
    }
    name.to_string()
}

/// Parse a flag value as an expression (no variables, functions only);
/// anything that fails to parse, evaluate, or bridge is a literal string.
fn parse_flag_value(raw: &str) -> Value {
    if let Ok(body) = hcl::parse(&format!("v = {raw}\n")) {
        if let Some(attr) = body.attributes().next() {
            if let Ok(value) = EvalScope::new().eval(attr.expr()) {
                if let Ok(native) = Value::from_hcl(&value) {
                    return native;
                }
            }
        }
    }
    Value::from(raw)
}

/// Print an error the way its kind wants and map it to an exit code:
/// the child's exit code for subprocess failures, 1 otherwise.
fn report(e: &Error) -> ExitCode {
    match e {
        Error::Load(bundle) => {
            let _ = write_diagnostics(bundle, &mut std::io::stderr());
        }
        other => eprintln!("{other}"),
    }
    if let Some(result) = e.subprocess_result() {
        if (1..=255).contains(&result.exit_status) {
            return ExitCode::from(result.exit_status as u8);
        }
    }
    ExitCode::FAILURE
}

fn print_help() {
    println!(
        "runbook — a declarative job runner

Usage:
  runbook [--chdir <dir>] run <job> [--<name>=<value>...]
  runbook [--chdir <dir>] test
  runbook --help | --version

Flags after the job name bind its parameters and options by name. Values
parse as expressions (numbers, bools, quoted strings) and fall back to
literal strings. RUST_LOG controls diagnostic logging."
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_values_parse_as_expressions() {
        assert_eq!(parse_flag_value("42"), Value::Int(42));
        assert_eq!(parse_flag_value("true"), Value::Bool(true));
        assert_eq!(parse_flag_value("\"quoted\""), Value::String("quoted".into()));
    }

    #[test]
    fn bare_words_fall_back_to_strings() {
        assert_eq!(parse_flag_value("hello"), Value::String("hello".into()));
        assert_eq!(
            parse_flag_value("eu-west-1"),
            Value::String("eu-west-1".into())
        );
    }
}
