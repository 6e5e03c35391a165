//! End-to-end tests for the job runner: exec bodies, parameter binding,
//! steps, fallback resolution, and the invocation cycle guard.

use std::sync::Arc;

use runbook_kernel::{load_dir, Runner, Value, ValueMap};

/// Write the fixture files, load them, and build a runner with silent sinks.
/// The tempdir must outlive the runner so file sources stay readable.
fn fixture(files: &[(&str, &str)]) -> (tempfile::TempDir, Runner) {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, content) in files {
        std::fs::write(dir.path().join(name), content).expect("write fixture");
    }
    let doc = load_dir(dir.path()).expect("load fixture");
    let runner = Runner::with_output(doc, Arc::new(|_: &str| {}), Arc::new(|_: &str| {}));
    (dir, runner)
}

fn no_args() -> ValueMap {
    ValueMap::new()
}

#[tokio::test]
async fn minimal_exec_captures_stdout() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "hello" {
          exec {
            command = "echo"
            args    = ["hi"]
            env     = {}
          }
        }
        "#,
    )]);

    let result = runner.run("hello", &no_args(), &no_args()).await.unwrap();
    assert_eq!(result.stdout, "hi\n");
    assert_eq!(result.exit_status, 0);
}

#[tokio::test]
async fn parameter_default_applies_when_caller_is_silent() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "greet" {
          parameter "name" {
            type    = string
            default = "world"
          }
          exec {
            command = "echo"
            args    = [param.name]
            env     = {}
          }
        }
        "#,
    )]);

    let result = runner.run("greet", &no_args(), &no_args()).await.unwrap();
    assert_eq!(result.stdout, "world\n");

    let mut args = ValueMap::new();
    args.insert("name".to_string(), Value::from("go"));
    let result = runner.run("greet", &args, &no_args()).await.unwrap();
    assert_eq!(result.stdout, "go\n");
}

#[tokio::test]
async fn missing_parameter_fails() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "greet" {
          parameter "name" {
            type = string
          }
          exec {
            command = "echo"
            args    = [param.name]
            env     = {}
          }
        }
        "#,
    )]);

    let err = runner.run("greet", &no_args(), &no_args()).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "job \"greet\": missing value for parameter \"name\""
    );
}

#[tokio::test]
async fn caller_value_must_match_declared_type() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "count" {
          parameter "n" {
            type = number
          }
          exec {
            command = "echo"
            args    = [param.n]
            env     = {}
          }
        }
        "#,
    )]);

    let mut args = ValueMap::new();
    args.insert("n".to_string(), Value::from("three"));
    let err = runner.run("count", &args, &no_args()).await.unwrap_err();
    assert!(err.to_string().contains("want number, got string"), "{err}");
}

#[tokio::test]
async fn variable_type_mismatch_fails() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "typed" {
          variable "n" {
            type  = number
            value = "not a number"
          }
          exec {
            command = "echo"
            args    = [var.n]
            env     = {}
          }
        }
        "#,
    )]);

    let err = runner.run("typed", &no_args(), &no_args()).await.unwrap_err();
    assert!(err.to_string().contains("variable \"n\""), "{err}");
}

#[tokio::test]
async fn root_parameters_are_visible_to_jobs() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        parameter "region" {
          type    = string
          default = "local"
        }
        job "where" {
          exec {
            command = "echo"
            args    = [param.region]
            env     = {}
          }
        }
        "#,
    )]);

    let result = runner.run("where", &no_args(), &no_args()).await.unwrap();
    assert_eq!(result.stdout, "local\n");
}

#[tokio::test]
async fn unknown_command_falls_back_to_the_root_job() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        exec {
          command = "echo"
          args    = ["root"]
          env     = {}
        }
        "#,
    )]);

    let result = runner.run("no-such-job", &no_args(), &no_args()).await.unwrap();
    assert_eq!(result.stdout, "root\n");
}

#[tokio::test]
async fn steps_share_results_in_order() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "say" {
          parameter "msg" {
            type = string
          }
          exec {
            command = "echo"
            args    = [param.msg]
            env     = {}
          }
        }
        job "relay" {
          step "first" {
            run "say" {
              msg = "x"
            }
          }
          step "second" {
            run "say" {
              msg = trimspace(step.first.res.stdout)
            }
          }
        }
        "#,
    )]);

    let result = runner.run("relay", &no_args(), &no_args()).await.unwrap();
    assert_eq!(result.stdout, "x\n");
    assert_eq!(runner.trace_commands(), ["echo x", "echo x"]);
}

#[tokio::test]
async fn steps_cannot_see_future_steps() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "say" {
          parameter "msg" {
            type = string
          }
          exec {
            command = "echo"
            args    = [param.msg]
            env     = {}
          }
        }
        job "backwards" {
          step "first" {
            run "say" {
              msg = step.second.res.stdout
            }
          }
          step "second" {
            run "say" {
              msg = "later"
            }
          }
        }
        "#,
    )]);

    // `step` is not defined at all while the first step evaluates.
    let err = runner.run("backwards", &no_args(), &no_args()).await.unwrap_err();
    assert!(!runner.trace_commands().iter().any(|c| c.contains("later")), "{err}");
}

#[tokio::test]
async fn failing_step_aborts_the_sequence() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "fail" {
          exec {
            command = "false"
            args    = []
            env     = {}
          }
        }
        job "never" {
          exec {
            command = "echo"
            args    = ["never"]
            env     = {}
          }
        }
        job "pipeline" {
          step "boom" {
            run "fail" {}
          }
          step "after" {
            run "never" {}
          }
        }
        "#,
    )]);

    let err = runner.run("pipeline", &no_args(), &no_args()).await.unwrap_err();
    assert!(err.to_string().contains("exit status 1"), "{err}");
    assert_eq!(runner.trace_commands(), ["false"]);
}

#[tokio::test]
async fn subprocess_failure_carries_the_result() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "fail" {
          exec {
            command = "sh"
            args    = ["-c", "echo said >&2; exit 3"]
            env     = {}
          }
        }
        "#,
    )]);

    let err = runner.run("fail", &no_args(), &no_args()).await.unwrap_err();
    let result = err.subprocess_result().expect("captured result");
    assert_eq!(result.exit_status, 3);
    assert_eq!(result.stderr, "said\n");
}

#[tokio::test]
async fn nested_run_publishes_run_object() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "inner" {
          exec {
            command = "echo"
            args    = ["deep"]
            env     = {}
          }
        }
        job "outer" {
          run "inner" {}
          assert "saw_output" {
            condition = run.res.set && trimspace(run.res.stdout) == "deep"
          }
        }
        "#,
    )]);

    let result = runner.run("outer", &no_args(), &no_args()).await.unwrap();
    assert_eq!(result.stdout, "deep\n");
}

#[tokio::test]
async fn assertions_run_even_after_a_failing_body() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "checked" {
          exec {
            command = "false"
            args    = []
            env     = {}
          }
          assert "always" {
            condition = 1 == 2
          }
        }
        "#,
    )]);

    // The assertion failure wins over the subprocess failure.
    let err = runner.run("checked", &no_args(), &no_args()).await.unwrap_err();
    assert!(err.to_string().contains("assertion \"always\" failed"), "{err}");
}

#[tokio::test]
async fn assert_only_jobs_return_the_empty_result() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "invariants" {
          variable "x" {
            value = 4
          }
          assert "even" {
            condition = var.x % 2 == 0
          }
        }
        "#,
    )]);

    let result = runner.run("invariants", &no_args(), &no_args()).await.unwrap();
    assert_eq!(result.stdout, "");
    assert_eq!(result.exit_status, 0);
}

#[tokio::test]
async fn empty_jobs_return_the_empty_result() {
    let (_dir, runner) = fixture(&[("main.hcl", "job \"nothing\" {}\n")]);
    let result = runner.run("nothing", &no_args(), &no_args()).await.unwrap();
    assert_eq!(result, runbook_kernel::RunResult::empty());
}

#[tokio::test]
async fn self_recursion_is_a_cycle() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "ouroboros" {
          run "ouroboros" {}
        }
        "#,
    )]);

    let err = runner.run("ouroboros", &no_args(), &no_args()).await.unwrap_err();
    assert!(err.to_string().contains("job cycle detected"), "{err}");
    assert!(err.to_string().contains("ouroboros -> ouroboros"), "{err}");
}

#[tokio::test]
async fn mutual_recursion_is_a_cycle() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "ping" {
          run "pong" {}
        }
        job "pong" {
          run "ping" {}
        }
        "#,
    )]);

    let err = runner.run("ping", &no_args(), &no_args()).await.unwrap_err();
    assert!(err.to_string().contains("ping -> pong -> ping"), "{err}");
}

#[tokio::test]
async fn exec_env_is_the_only_environment() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "env" {
          exec {
            command = "sh"
            args    = ["-c", "echo \"$WHO:$HOME\""]
            env     = { WHO = "runbook" }
          }
        }
        "#,
    )]);

    let result = runner.run("env", &no_args(), &no_args()).await.unwrap();
    assert_eq!(result.stdout, "runbook:\n");
}
