//! The job runner.
//!
//! One invocation: resolve the job, build the evaluation context layer by
//! layer (context → param/opt → var → conf), execute steps, then the job
//! body — an external command, a nested run, or assertions. Nested runs and
//! job-sourced configs recurse back into the runner on the caller's stack;
//! an invocation stack guards against cycles.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use runbook_types::{RunResult, Value};
use tracing::debug;

use crate::assert;
use crate::ast::{Document, ExecSpec, JobSpec, RunSpec, StepSpec};
use crate::binder::{bind, BindInput};
use crate::context::{base_context, EvalScope};
use crate::error::{BindKind, Error};
use crate::shell::{self, CaptureOpts, LineSink, ShellCommand};
use crate::vars;

/// Caller-supplied arguments and options.
pub type ValueMap = HashMap<String, Value>;

/// Hard cap on nested invocations, over and above cycle detection.
const MAX_RUN_DEPTH: usize = 64;

/// Executes jobs from a loaded document.
pub struct Runner {
    doc: Document,
    jobs: HashMap<String, JobSpec>,
    stdout: LineSink,
    stderr: LineSink,
    /// Every subprocess invocation, in execution order.
    trace: Mutex<Vec<String>>,
}

impl Runner {
    /// A runner that streams subprocess output to the real stdout/stderr.
    pub fn new(doc: Document) -> Self {
        Self::with_output(
            doc,
            Arc::new(|line: &str| println!("{line}")),
            Arc::new(|line: &str| eprintln!("{line}")),
        )
    }

    /// A runner with caller-supplied line sinks (used by embedders and tests).
    pub fn with_output(doc: Document, stdout: LineSink, stderr: LineSink) -> Self {
        let mut jobs = HashMap::new();
        for job in &doc.jobs {
            jobs.insert(job.name.clone(), job.clone());
        }
        jobs.insert(String::new(), doc.root.clone());
        Self {
            doc,
            jobs,
            stdout,
            stderr,
            trace: Mutex::new(Vec::new()),
        }
    }

    /// The loaded document.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// The commands executed so far, in order.
    pub fn trace_commands(&self) -> Vec<String> {
        self.trace.lock().unwrap().clone()
    }

    /// Run one job by name. An unknown name falls back to the root job.
    pub async fn run(&self, cmd: &str, args: &ValueMap, opts: &ValueMap) -> Result<RunResult, Error> {
        self.run_inner(cmd, args, opts, &[]).await
    }

    /// The boxed re-entry point used by nested runs and job-sourced configs.
    /// Boxing breaks the recursive future cycle.
    pub(crate) fn run_boxed(
        &self,
        cmd: String,
        args: ValueMap,
        opts: ValueMap,
        stack: Vec<String>,
    ) -> Pin<Box<dyn Future<Output = Result<RunResult, Error>> + Send + '_>> {
        Box::pin(async move { self.run_inner(&cmd, &args, &opts, &stack).await })
    }

    async fn run_inner(
        &self,
        cmd: &str,
        args: &ValueMap,
        opts: &ValueMap,
        stack: &[String],
    ) -> Result<RunResult, Error> {
        let job = self
            .jobs
            .get(cmd)
            .or_else(|| self.jobs.get(""))
            .ok_or_else(|| Error::UnknownJob(cmd.to_string()))?;
        debug!(command = cmd, job = %display_name(&job.name), "running job");

        if stack.iter().any(|name| name == &job.name) {
            return Err(Error::Cycle(chain(stack, &job.name)));
        }
        if stack.len() >= MAX_RUN_DEPTH {
            return Err(Error::Cycle(format!(
                "run depth exceeded {MAX_RUN_DEPTH}: {}",
                chain(stack, &job.name)
            )));
        }
        let mut stack = stack.to_vec();
        stack.push(job.name.clone());

        // Layers 1-3: context, then param/opt, then var.
        let base = base_context(job.source_dir());
        let mut scope = EvalScope::new();
        scope.set("context", base.clone());

        let root = &self.doc.root;
        let is_root = job.name.is_empty();

        let param_specs: Vec<BindInput<'_>> = if is_root {
            job.parameters.iter().map(Into::into).collect()
        } else {
            root.parameters
                .iter()
                .map(Into::into)
                .chain(job.parameters.iter().map(Into::into))
                .collect()
        };
        scope.set(
            "param",
            bind(BindKind::Parameter, &job.name, &param_specs, args, &base)?,
        );

        let opt_specs: Vec<BindInput<'_>> = if is_root {
            job.options.iter().map(Into::into).collect()
        } else {
            root.options
                .iter()
                .map(Into::into)
                .chain(job.options.iter().map(Into::into))
                .collect()
        };
        scope.set(
            "opt",
            bind(BindKind::Option, &job.name, &opt_specs, opts, &base)?,
        );

        let var_specs = if is_root {
            job.variables.clone()
        } else {
            let mut specs = root.variables.clone();
            specs.extend(job.variables.iter().cloned());
            specs
        };
        scope.set("var", vars::resolve(&scope, &job.name, &var_specs)?);

        // Layer 4: composed configs.
        let conf = self.compose_configs(&scope, job, &stack).await?;
        scope.set("conf", conf);

        // Steps short-circuit the body: a job with steps is its steps.
        if let Some(result) = self.exec_steps(&mut scope, &job.steps, &stack).await? {
            return Ok(result);
        }

        self.exec_job(job, &mut scope, &stack).await
    }

    /// Execute the job body, then any top-level assertions.
    async fn exec_job(
        &self,
        job: &JobSpec,
        scope: &mut EvalScope,
        stack: &[String],
    ) -> Result<RunResult, Error> {
        let body = if let Some(exec) = &job.exec {
            self.exec_command(&job.name, exec, scope).await
        } else if let Some(run) = &job.run {
            self.exec_run(scope, run, stack).await
        } else if !job.assert.is_empty() {
            for a in &job.assert {
                assert::check(scope, &job.name, a)?;
            }
            return Ok(RunResult::empty());
        } else {
            Ok(RunResult::empty())
        };

        // Assertions always run when present, even after a failed body.
        for a in &job.assert {
            assert::check(scope, &job.name, a)?;
        }

        body
    }

    /// Decode and execute an `exec` body via the subprocess gateway.
    async fn exec_command(
        &self,
        job_name: &str,
        exec: &ExecSpec,
        scope: &EvalScope,
    ) -> Result<RunResult, Error> {
        let command = decode_string(scope, job_name, "exec command", &exec.command)?;
        let args = decode_string_list(scope, job_name, "exec args", &exec.args)?;
        let env = decode_string_map(scope, job_name, "exec env", &exec.env)?;
        self.exec_cmd(ShellCommand { name: command, args, env }, true).await
    }

    async fn exec_cmd(&self, cmd: ShellCommand, log: bool) -> Result<RunResult, Error> {
        self.trace.lock().unwrap().push(cmd.display());

        let opts = if log {
            CaptureOpts {
                log_stdout: Some(self.stdout.clone()),
                log_stderr: Some(self.stderr.clone()),
            }
        } else {
            CaptureOpts::default()
        };

        match shell::capture(&cmd, opts).await {
            Ok(capture) => {
                let result = RunResult {
                    stdout: capture.stdout,
                    stderr: capture.stderr,
                    exit_status: capture.exit_status,
                    noop: false,
                };
                if result.ok() {
                    Ok(result)
                } else {
                    Err(Error::Subprocess {
                        command: cmd.display(),
                        result,
                    })
                }
            }
            Err(e) => Err(Error::Subprocess {
                command: cmd.display(),
                result: RunResult {
                    stdout: String::new(),
                    stderr: e.to_string(),
                    exit_status: 127,
                    noop: false,
                },
            }),
        }
    }

    /// Execute a nested run: decode the arguments, bridge them to native
    /// values, invoke the target, and publish `run = {res, err}` into the
    /// caller's scope before returning.
    pub(crate) async fn exec_run(
        &self,
        scope: &mut EvalScope,
        run: &RunSpec,
        stack: &[String],
    ) -> Result<RunResult, Error> {
        let mut call_args = ValueMap::new();
        for (name, expr) in &run.args {
            let value = scope.eval(expr)?;
            call_args.insert(name.clone(), Value::from_hcl(&value)?);
        }

        let outcome = self
            .run_boxed(run.name.clone(), call_args.clone(), call_args, stack.to_vec())
            .await;

        let res = match &outcome {
            Ok(result) => result.to_hcl(),
            Err(e) => e
                .subprocess_result()
                .map(RunResult::to_hcl)
                .unwrap_or_else(RunResult::absent),
        };
        let err = match &outcome {
            Ok(_) => String::new(),
            Err(e) => e.to_string(),
        };
        let mut fields = hcl::Map::new();
        fields.insert("res".to_string(), res);
        fields.insert("err".to_string(), hcl::Value::from(err));
        scope.set("run", hcl::Value::Object(fields));

        outcome
    }

    /// Run the steps sequentially, publishing each result under
    /// `step.<name>` before the next step starts. Aborts on first error.
    async fn exec_steps(
        &self,
        scope: &mut EvalScope,
        steps: &[StepSpec],
        stack: &[String],
    ) -> Result<Option<RunResult>, Error> {
        let mut results = hcl::Map::new();
        let mut last = None;
        for step in steps {
            let result = self.exec_run(scope, &step.run, stack).await?;

            let mut entry = hcl::Map::new();
            entry.insert("res".to_string(), result.to_hcl());
            entry.insert("err".to_string(), hcl::Value::from(""));
            results.insert(step.name.clone(), hcl::Value::Object(entry));
            scope.set("step", hcl::Value::Object(results.clone()));

            last = Some(result);
        }
        Ok(last)
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "(root)"
    } else {
        name
    }
}

fn chain(stack: &[String], next: &str) -> String {
    stack
        .iter()
        .map(|n| display_name(n))
        .chain(std::iter::once(display_name(next)))
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Render a scalar for the string positions of an exec body. HCL's convert
/// semantics stringify numbers and bools.
fn scalar_string(value: &hcl::Value) -> Option<String> {
    match value {
        hcl::Value::String(s) => Some(s.clone()),
        hcl::Value::Number(n) => Some(n.to_string()),
        hcl::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn decode_string(
    scope: &EvalScope,
    job: &str,
    what: &str,
    expr: &hcl::expr::Expression,
) -> Result<String, Error> {
    let value = scope.eval(expr)?;
    scalar_string(&value).ok_or_else(|| Error::TypeMismatch {
        job: job.to_string(),
        what: what.to_string(),
        want: "string".to_string(),
        got: runbook_types::tagged_type_name(&value).to_string(),
    })
}

fn decode_string_list(
    scope: &EvalScope,
    job: &str,
    what: &str,
    expr: &hcl::expr::Expression,
) -> Result<Vec<String>, Error> {
    let value = scope.eval(expr)?;
    let items = match &value {
        hcl::Value::Array(items) => items,
        _ => {
            return Err(Error::TypeMismatch {
                job: job.to_string(),
                what: what.to_string(),
                want: "list of string".to_string(),
                got: runbook_types::tagged_type_name(&value).to_string(),
            })
        }
    };
    items
        .iter()
        .map(|item| {
            scalar_string(item).ok_or_else(|| Error::TypeMismatch {
                job: job.to_string(),
                what: what.to_string(),
                want: "list of string".to_string(),
                got: format!("list containing {}", runbook_types::tagged_type_name(item)),
            })
        })
        .collect()
}

fn decode_string_map(
    scope: &EvalScope,
    job: &str,
    what: &str,
    expr: &hcl::expr::Expression,
) -> Result<HashMap<String, String>, Error> {
    let value = scope.eval(expr)?;
    let fields = match &value {
        hcl::Value::Object(fields) => fields,
        _ => {
            return Err(Error::TypeMismatch {
                job: job.to_string(),
                what: what.to_string(),
                want: "map of string".to_string(),
                got: runbook_types::tagged_type_name(&value).to_string(),
            })
        }
    };
    fields
        .iter()
        .map(|(key, item)| {
            scalar_string(item)
                .map(|s| (key.clone(), s))
                .ok_or_else(|| Error::TypeMismatch {
                    job: job.to_string(),
                    what: what.to_string(),
                    want: "map of string".to_string(),
                    got: format!("map containing {}", runbook_types::tagged_type_name(item)),
                })
        })
        .collect()
}
