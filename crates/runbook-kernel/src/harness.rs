//! The test harness.
//!
//! Iterates every test block and its cases. Each case gets a fresh context
//! (`context`, then the test's variables as `var`, then the case attributes
//! as `case`), runs the test's target job, and evaluates the assertions.
//! Assertion failures are re-wrapped with the case name; evaluator errors
//! propagate unchanged.

use runbook_types::RunResult;
use tracing::debug;

use crate::assert;
use crate::ast::{CaseSpec, TestSpec};
use crate::context::{base_context, EvalScope};
use crate::error::Error;
use crate::runner::Runner;
use crate::vars;

impl Runner {
    /// Run every test block in the document. The returned result is the one
    /// of the last executed case, with its PASS lines as stdout.
    pub async fn run_tests(&self) -> Result<RunResult, Error> {
        let mut last = RunResult::empty();
        for test in &self.document().tests {
            last = self.exec_test(test).await?;
        }
        Ok(last)
    }

    async fn exec_test(&self, test: &TestSpec) -> Result<RunResult, Error> {
        debug!(test = %test.name, cases = test.cases.len(), "running test");

        // No cases means one implicit empty case.
        let implicit = [CaseSpec::default()];
        let cases: &[CaseSpec] = if test.cases.is_empty() {
            &implicit
        } else {
            &test.cases
        };

        let mut last = RunResult::empty();
        for case in cases {
            last = self.exec_test_case(test, case).await?;
        }
        Ok(last)
    }

    async fn exec_test_case(&self, test: &TestSpec, case: &CaseSpec) -> Result<RunResult, Error> {
        let mut scope = EvalScope::new();
        scope.set("context", base_context(test.source_dir()));
        scope.set("var", vars::resolve(&scope, &test.name, &test.variables)?);

        let mut fields = hcl::Map::new();
        for (name, expr) in &case.args {
            fields.insert(name.clone(), scope.eval(expr)?);
        }
        scope.set("case", hcl::Value::Object(fields));

        let outcome = self.exec_run(&mut scope, &test.run, &[]).await;

        // With assertions present, the run outcome is theirs to judge: the
        // run result (or its absence) is already published under `run`.
        if !test.assert.is_empty() {
            let mut lines = Vec::new();
            for a in &test.assert {
                match assert::check(&scope, &test.name, a) {
                    Ok(()) => lines.push(format!("PASS: {}", a.name)),
                    Err(e) if e.is_assertion() => {
                        return Err(Error::Case {
                            case: case.name.clone(),
                            source: Box::new(e),
                        })
                    }
                    Err(e) => return Err(e),
                }
            }
            return Ok(RunResult::with_stdout(lines.join("\n")));
        }

        outcome
    }
}
