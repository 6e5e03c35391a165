//! Configuration loading: discovery, parsing, merging, and schema decode.
//!
//! Discovery collects `*.hcl` files directly beneath the root directory, in
//! sorted order for determinism. Each file parses independently; parse
//! failures across all files are bundled before anything decodes. Decoding
//! walks the parsed bodies into the typed schema of [`crate::ast`] — top-level
//! blocks from all files are unioned into one logical document, and unknown
//! blocks or attributes are diagnostics, never silent drops.

use std::path::{Path, PathBuf};

use hcl::{Block, Body, Structure};
use tracing::debug;

use crate::ast::{
    AssertSpec, CaseSpec, ConfigSpec, Document, ExecSpec, JobSpec, OptionSpec, ParameterSpec,
    RunSpec, SourceSpec, StepSpec, TestSpec, VariableSpec,
};
use crate::diag::DiagnosticBundle;
use crate::error::Error;

/// File suffix for the native block syntax. Discovery is suffix-driven so a
/// second syntax can be registered later.
const HCL_SUFFIX: &str = ".hcl";

/// Load every definition file beneath `dir` into one document.
pub fn load_dir(dir: &Path) -> Result<Document, Error> {
    let files = discover(dir)?;
    debug!(count = files.len(), dir = %dir.display(), "discovered definition files");

    let mut diags = DiagnosticBundle::new();
    if files.is_empty() {
        diags.push(dir, format!("no {HCL_SUFFIX} files found"));
        return Err(Error::Load(diags));
    }

    // Parse everything first; a fatal diagnostic in any file fails the load
    // with the full bundle.
    let mut parsed: Vec<(PathBuf, String, Body)> = Vec::new();
    for file in &files {
        let text = std::fs::read_to_string(file).map_err(|e| Error::Io {
            context: format!("failed to read {}", file.display()),
            source: e,
        })?;
        match hcl::parse(&text) {
            Ok(body) => parsed.push((file.clone(), text, body)),
            Err(e) => diags.push(file, e.to_string()),
        }
    }
    if !diags.is_empty() {
        return Err(Error::Load(diags));
    }

    // Decode each body, unioning top-level blocks across files.
    let mut doc = Document::default();
    doc.root.source_file = files[0].clone();
    for (file, text, body) in parsed {
        decode_top_level(&file, &body, &mut doc, &mut diags);
        doc.sources.push((file, text));
    }

    validate(&doc, &mut diags);
    if !diags.is_empty() {
        return Err(Error::Load(diags));
    }
    Ok(doc)
}

fn discover(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::Io {
        context: format!("failed to list {}", dir.display()),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::Io {
            context: format!("failed to list {}", dir.display()),
            source: e,
        })?;
        let path = entry.path();
        if path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(HCL_SUFFIX))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn decode_top_level(file: &Path, body: &Body, doc: &mut Document, diags: &mut DiagnosticBundle) {
    for structure in body.iter() {
        match structure {
            Structure::Attribute(attr) => match attr.key() {
                "description" => set_string_attr(file, "description", attr.expr(), &mut doc.root.description, diags),
                "version" => set_string_attr(file, "version", attr.expr(), &mut doc.root.version, diags),
                "concurrency" => set_number_attr(file, "concurrency", attr.expr(), &mut doc.root.concurrency, diags),
                other => diags.push(file, format!("unknown top-level attribute {other:?}")),
            },
            Structure::Block(block) => match block.identifier() {
                "job" => {
                    if let Some(job) = decode_job(file, block, diags) {
                        doc.jobs.push(job);
                    }
                }
                "test" => {
                    if let Some(test) = decode_test(file, block, diags) {
                        doc.tests.push(test);
                    }
                }
                _ => decode_job_entity(file, block, &mut doc.root, diags),
            },
        }
    }
}

fn decode_job(file: &Path, block: &Block, diags: &mut DiagnosticBundle) -> Option<JobSpec> {
    let name = require_label(file, block, diags)?;
    let mut job = JobSpec {
        name,
        source_file: file.to_path_buf(),
        ..JobSpec::default()
    };
    for structure in block.body().iter() {
        match structure {
            Structure::Attribute(attr) => match attr.key() {
                "description" => set_string_attr(file, "description", attr.expr(), &mut job.description, diags),
                "version" => set_string_attr(file, "version", attr.expr(), &mut job.version, diags),
                "concurrency" => set_number_attr(file, "concurrency", attr.expr(), &mut job.concurrency, diags),
                other => diags.push(
                    file,
                    format!("job {:?}: unknown attribute {other:?}", job.name),
                ),
            },
            Structure::Block(inner) => decode_job_entity(file, inner, &mut job, diags),
        }
    }
    Some(job)
}

/// Decode a block that can appear either inside a `job` or at the top level
/// (where it belongs to the root job).
fn decode_job_entity(file: &Path, block: &Block, job: &mut JobSpec, diags: &mut DiagnosticBundle) {
    match block.identifier() {
        "parameter" => {
            if let Some(p) = decode_parameter(file, block, diags) {
                job.parameters.push(p);
            }
        }
        "option" => {
            if let Some(o) = decode_option(file, block, diags) {
                job.options.push(o);
            }
        }
        "variable" => {
            if let Some(v) = decode_variable(file, block, diags) {
                job.variables.push(v);
            }
        }
        "config" => {
            if let Some(c) = decode_config(file, block, diags) {
                job.configs.push(c);
            }
        }
        "step" => {
            if let Some(s) = decode_step(file, block, diags) {
                job.steps.push(s);
            }
        }
        "exec" => {
            if job.exec.is_some() {
                diags.push(file, format!("job {:?}: duplicate exec block", job.name));
            } else {
                job.exec = decode_exec(file, block, diags);
            }
        }
        "run" => {
            if job.run.is_some() {
                diags.push(file, format!("job {:?}: duplicate run block", job.name));
            } else {
                job.run = decode_run(file, block, diags);
            }
        }
        "assert" => {
            if let Some(a) = decode_assert(file, block, diags) {
                job.assert.push(a);
            }
        }
        other => diags.push(file, format!("unknown block {other:?}")),
    }
}

fn decode_parameter(file: &Path, block: &Block, diags: &mut DiagnosticBundle) -> Option<ParameterSpec> {
    let name = require_label(file, block, diags)?;
    let mut type_expr = None;
    let mut default = None;
    let mut description = None;
    for structure in block.body().iter() {
        match structure {
            Structure::Attribute(attr) => match attr.key() {
                "type" => type_expr = Some(attr.expr().clone()),
                "default" => default = Some(attr.expr().clone()),
                "description" => set_string_attr(file, "description", attr.expr(), &mut description, diags),
                other => diags.push(
                    file,
                    format!("parameter {name:?}: unknown attribute {other:?}"),
                ),
            },
            Structure::Block(inner) => diags.push(
                file,
                format!("parameter {name:?}: unknown block {:?}", inner.identifier()),
            ),
        }
    }
    let Some(type_expr) = type_expr else {
        diags.push(file, format!("parameter {name:?}: missing type attribute"));
        return None;
    };
    Some(ParameterSpec {
        name,
        type_expr,
        default,
        description,
    })
}

fn decode_option(file: &Path, block: &Block, diags: &mut DiagnosticBundle) -> Option<OptionSpec> {
    let name = require_label(file, block, diags)?;
    let mut type_expr = None;
    let mut default = None;
    let mut description = None;
    let mut short = None;
    for structure in block.body().iter() {
        match structure {
            Structure::Attribute(attr) => match attr.key() {
                "type" => type_expr = Some(attr.expr().clone()),
                "default" => default = Some(attr.expr().clone()),
                "description" => set_string_attr(file, "description", attr.expr(), &mut description, diags),
                "short" => set_string_attr(file, "short", attr.expr(), &mut short, diags),
                other => diags.push(
                    file,
                    format!("option {name:?}: unknown attribute {other:?}"),
                ),
            },
            Structure::Block(inner) => diags.push(
                file,
                format!("option {name:?}: unknown block {:?}", inner.identifier()),
            ),
        }
    }
    let Some(type_expr) = type_expr else {
        diags.push(file, format!("option {name:?}: missing type attribute"));
        return None;
    };
    Some(OptionSpec {
        name,
        type_expr,
        default,
        description,
        short,
    })
}

fn decode_variable(file: &Path, block: &Block, diags: &mut DiagnosticBundle) -> Option<VariableSpec> {
    let name = require_label(file, block, diags)?;
    let mut type_expr = None;
    let mut value = None;
    for structure in block.body().iter() {
        match structure {
            Structure::Attribute(attr) => match attr.key() {
                "type" => type_expr = Some(attr.expr().clone()),
                "value" => value = Some(attr.expr().clone()),
                other => diags.push(
                    file,
                    format!("variable {name:?}: unknown attribute {other:?}"),
                ),
            },
            Structure::Block(inner) => diags.push(
                file,
                format!("variable {name:?}: unknown block {:?}", inner.identifier()),
            ),
        }
    }
    let Some(value) = value else {
        diags.push(file, format!("variable {name:?}: missing value attribute"));
        return None;
    };
    Some(VariableSpec {
        name,
        type_expr,
        value,
    })
}

fn decode_config(file: &Path, block: &Block, diags: &mut DiagnosticBundle) -> Option<ConfigSpec> {
    let name = require_label(file, block, diags)?;
    let mut sources = Vec::new();
    for structure in block.body().iter() {
        match structure {
            Structure::Attribute(attr) => diags.push(
                file,
                format!("config {name:?}: unknown attribute {:?}", attr.key()),
            ),
            Structure::Block(inner) => {
                if inner.identifier() != "source" {
                    diags.push(
                        file,
                        format!("config {name:?}: unknown block {:?}", inner.identifier()),
                    );
                    continue;
                }
                if let Some(source) = decode_source(file, &name, inner, diags) {
                    sources.push(source);
                }
            }
        }
    }
    Some(ConfigSpec { name, sources })
}

fn decode_source(
    file: &Path,
    config: &str,
    block: &Block,
    diags: &mut DiagnosticBundle,
) -> Option<SourceSpec> {
    let kind = require_label(file, block, diags)?;
    match kind.as_str() {
        "file" => {
            let mut path = None;
            let mut default = None;
            for structure in block.body().iter() {
                match structure {
                    Structure::Attribute(attr) => match attr.key() {
                        "path" => path = Some(attr.expr().clone()),
                        "default" => default = Some(attr.expr().clone()),
                        other => diags.push(
                            file,
                            format!("config {config:?}: file source: unknown attribute {other:?}"),
                        ),
                    },
                    Structure::Block(inner) => diags.push(
                        file,
                        format!(
                            "config {config:?}: file source: unknown block {:?}",
                            inner.identifier()
                        ),
                    ),
                }
            }
            let Some(path) = path else {
                diags.push(
                    file,
                    format!("config {config:?}: file source: missing path attribute"),
                );
                return None;
            };
            Some(SourceSpec::File { path, default })
        }
        "job" => {
            let mut name = None;
            let mut args = None;
            let mut format = None;
            for structure in block.body().iter() {
                match structure {
                    Structure::Attribute(attr) => match attr.key() {
                        "name" => set_string_attr(file, "name", attr.expr(), &mut name, diags),
                        "args" => args = Some(attr.expr().clone()),
                        "format" => set_string_attr(file, "format", attr.expr(), &mut format, diags),
                        other => diags.push(
                            file,
                            format!("config {config:?}: job source: unknown attribute {other:?}"),
                        ),
                    },
                    Structure::Block(inner) => diags.push(
                        file,
                        format!(
                            "config {config:?}: job source: unknown block {:?}",
                            inner.identifier()
                        ),
                    ),
                }
            }
            let Some(name) = name else {
                diags.push(
                    file,
                    format!("config {config:?}: job source: missing name attribute"),
                );
                return None;
            };
            let Some(args) = args else {
                diags.push(
                    file,
                    format!("config {config:?}: job source: missing args attribute"),
                );
                return None;
            };
            Some(SourceSpec::Job { name, args, format })
        }
        // Unknown kinds become terminal errors when the config composes.
        other => Some(SourceSpec::Unknown {
            kind: other.to_string(),
        }),
    }
}

fn decode_step(file: &Path, block: &Block, diags: &mut DiagnosticBundle) -> Option<StepSpec> {
    let name = require_label(file, block, diags)?;
    let mut run = None;
    let mut needs = Vec::new();
    for structure in block.body().iter() {
        match structure {
            Structure::Attribute(attr) => match attr.key() {
                "needs" => {
                    if let Some(list) = string_list_literal(attr.expr()) {
                        needs = list;
                    } else {
                        diags.push(
                            file,
                            format!("step {name:?}: needs must be a list of step names"),
                        );
                    }
                }
                other => diags.push(file, format!("step {name:?}: unknown attribute {other:?}")),
            },
            Structure::Block(inner) => {
                if inner.identifier() == "run" {
                    run = decode_run(file, inner, diags);
                } else {
                    diags.push(
                        file,
                        format!("step {name:?}: unknown block {:?}", inner.identifier()),
                    );
                }
            }
        }
    }
    let Some(run) = run else {
        diags.push(file, format!("step {name:?}: missing run block"));
        return None;
    };
    Some(StepSpec { name, run, needs })
}

fn decode_exec(file: &Path, block: &Block, diags: &mut DiagnosticBundle) -> Option<ExecSpec> {
    let mut command = None;
    let mut args = None;
    let mut env = None;
    for structure in block.body().iter() {
        match structure {
            Structure::Attribute(attr) => match attr.key() {
                "command" => command = Some(attr.expr().clone()),
                "args" => args = Some(attr.expr().clone()),
                "env" => env = Some(attr.expr().clone()),
                other => diags.push(file, format!("exec: unknown attribute {other:?}")),
            },
            Structure::Block(inner) => diags.push(
                file,
                format!("exec: unknown block {:?}", inner.identifier()),
            ),
        }
    }
    match (command, args, env) {
        (Some(command), Some(args), Some(env)) => Some(ExecSpec { command, args, env }),
        _ => {
            diags.push(file, "exec: command, args, and env are all required");
            None
        }
    }
}

fn decode_run(file: &Path, block: &Block, diags: &mut DiagnosticBundle) -> Option<RunSpec> {
    let name = require_label(file, block, diags)?;
    let mut args = Vec::new();
    for structure in block.body().iter() {
        match structure {
            Structure::Attribute(attr) => {
                args.push((attr.key().to_string(), attr.expr().clone()));
            }
            Structure::Block(inner) => diags.push(
                file,
                format!("run {name:?}: unknown block {:?}", inner.identifier()),
            ),
        }
    }
    Some(RunSpec { name, args })
}

fn decode_assert(file: &Path, block: &Block, diags: &mut DiagnosticBundle) -> Option<AssertSpec> {
    let name = require_label(file, block, diags)?;
    let mut condition = None;
    for structure in block.body().iter() {
        match structure {
            Structure::Attribute(attr) => match attr.key() {
                "condition" => condition = Some(attr.expr().clone()),
                other => diags.push(
                    file,
                    format!("assert {name:?}: unknown attribute {other:?}"),
                ),
            },
            Structure::Block(inner) => diags.push(
                file,
                format!("assert {name:?}: unknown block {:?}", inner.identifier()),
            ),
        }
    }
    let Some(condition) = condition else {
        diags.push(file, format!("assert {name:?}: missing condition attribute"));
        return None;
    };
    Some(AssertSpec { name, condition })
}

fn decode_test(file: &Path, block: &Block, diags: &mut DiagnosticBundle) -> Option<TestSpec> {
    let name = require_label(file, block, diags)?;
    let mut variables = Vec::new();
    let mut cases = Vec::new();
    let mut run = None;
    let mut assert = Vec::new();
    for structure in block.body().iter() {
        match structure {
            Structure::Attribute(attr) => diags.push(
                file,
                format!("test {name:?}: unknown attribute {:?}", attr.key()),
            ),
            Structure::Block(inner) => match inner.identifier() {
                "variable" => {
                    if let Some(v) = decode_variable(file, inner, diags) {
                        variables.push(v);
                    }
                }
                "case" => {
                    if let Some(c) = decode_case(file, inner, diags) {
                        cases.push(c);
                    }
                }
                "run" => run = decode_run(file, inner, diags),
                "assert" => {
                    if let Some(a) = decode_assert(file, inner, diags) {
                        assert.push(a);
                    }
                }
                other => diags.push(file, format!("test {name:?}: unknown block {other:?}")),
            },
        }
    }
    let Some(run) = run else {
        diags.push(file, format!("test {name:?}: missing run block"));
        return None;
    };
    Some(TestSpec {
        name,
        variables,
        cases,
        run,
        assert,
        source_file: file.to_path_buf(),
    })
}

fn decode_case(file: &Path, block: &Block, diags: &mut DiagnosticBundle) -> Option<CaseSpec> {
    let name = require_label(file, block, diags)?;
    let mut args = Vec::new();
    for structure in block.body().iter() {
        match structure {
            Structure::Attribute(attr) => args.push((attr.key().to_string(), attr.expr().clone())),
            Structure::Block(inner) => diags.push(
                file,
                format!("case {name:?}: unknown block {:?}", inner.identifier()),
            ),
        }
    }
    Some(CaseSpec { name, args })
}

fn require_label(file: &Path, block: &Block, diags: &mut DiagnosticBundle) -> Option<String> {
    match block.labels().first() {
        Some(label) => Some(label.as_str().to_string()),
        None => {
            diags.push(
                file,
                format!("{} block is missing its name label", block.identifier()),
            );
            None
        }
    }
}

fn set_string_attr(
    file: &Path,
    name: &str,
    expr: &hcl::expr::Expression,
    slot: &mut Option<String>,
    diags: &mut DiagnosticBundle,
) {
    match expr {
        hcl::expr::Expression::String(s) => {
            if slot.is_some() {
                diags.push(file, format!("duplicate attribute {name:?}"));
            } else {
                *slot = Some(s.clone());
            }
        }
        _ => diags.push(file, format!("attribute {name:?} must be a string literal")),
    }
}

fn set_number_attr(
    file: &Path,
    name: &str,
    expr: &hcl::expr::Expression,
    slot: &mut Option<i64>,
    diags: &mut DiagnosticBundle,
) {
    match expr {
        hcl::expr::Expression::Number(n) if n.as_i64().is_some() => {
            if slot.is_some() {
                diags.push(file, format!("duplicate attribute {name:?}"));
            } else {
                *slot = n.as_i64();
            }
        }
        _ => diags.push(file, format!("attribute {name:?} must be an integer literal")),
    }
}

fn string_list_literal(expr: &hcl::expr::Expression) -> Option<Vec<String>> {
    match expr {
        hcl::expr::Expression::Array(items) => items
            .iter()
            .map(|item| match item {
                hcl::expr::Expression::String(s) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

/// Post-decode checks: name uniqueness and body-shape constraints.
fn validate(doc: &Document, diags: &mut DiagnosticBundle) {
    let mut seen_jobs = std::collections::HashSet::new();
    for job in &doc.jobs {
        if job.name.is_empty() {
            diags.push(&job.source_file, "the empty job name is reserved for the root job");
        }
        if !seen_jobs.insert(job.name.as_str()) {
            diags.push(&job.source_file, format!("duplicate job {:?}", job.name));
        }
    }
    for job in doc.jobs.iter().chain(std::iter::once(&doc.root)) {
        validate_job(job, diags);
    }
}

fn validate_job(job: &JobSpec, diags: &mut DiagnosticBundle) {
    unique_names(job, "parameter", job.parameters.iter().map(|p| p.name.as_str()), diags);
    unique_names(job, "option", job.options.iter().map(|o| o.name.as_str()), diags);
    unique_names(job, "variable", job.variables.iter().map(|v| v.name.as_str()), diags);
    unique_names(job, "step", job.steps.iter().map(|s| s.name.as_str()), diags);
    if job.exec.is_some() && job.run.is_some() {
        diags.push(
            &job.source_file,
            format!("job {:?}: exec and run are mutually exclusive", job.name),
        );
    }
}

fn unique_names<'a>(
    job: &JobSpec,
    what: &str,
    names: impl Iterator<Item = &'a str>,
    diags: &mut DiagnosticBundle,
) {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name) {
            diags.push(
                &job.source_file,
                format!("job {:?}: duplicate {what} {name:?}", job.name),
            );
        }
    }
}
