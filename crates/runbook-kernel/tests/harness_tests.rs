//! End-to-end tests for the test harness: case expansion, per-case
//! contexts, PASS reporting, and assertion-failure rewrapping.

use std::sync::Arc;

use runbook_kernel::{load_dir, Runner};

fn fixture(files: &[(&str, &str)]) -> (tempfile::TempDir, Runner) {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, content) in files {
        std::fs::write(dir.path().join(name), content).expect("write fixture");
    }
    let doc = load_dir(dir.path()).expect("load fixture");
    let runner = Runner::with_output(doc, Arc::new(|_: &str| {}), Arc::new(|_: &str| {}));
    (dir, runner)
}

#[tokio::test]
async fn cases_run_in_order_and_report_pass_lines() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "double" {
          parameter "n" {
            type = number
          }
          exec {
            command = "printf"
            args    = ["%d", param.n * 2]
            env     = {}
          }
        }
        test "doubling" {
          case "one" {
            n = 1
          }
          case "two" {
            n = 2
          }
          run "double" {
            n = case.n
          }
          assert "doubled" {
            condition = run.res.stdout == tostring(case.n * 2)
          }
        }
        "#,
    )]);

    let result = runner.run_tests().await.unwrap();
    assert_eq!(result.stdout, "PASS: doubled");
    // both cases actually executed the job
    assert_eq!(runner.trace_commands(), ["printf %d 2", "printf %d 4"]);
}

#[tokio::test]
async fn failing_case_is_named_in_the_error() {
    let (_dir, runner) = fixture(&[(
        "main.hcl",
        r#"
        job "double" {
          parameter "n" {
            type = number
          }
          exec {
            command = "printf"
            args    = ["%d", param.n * 2]
            env     = {}
          }
        }
        test "doubling" {
          case "good" {
            n = 1
          }
          case "bad" {
            n = 3
          }
          run "double" {
            n = case.n
          }
          assert "always_two" {
            condition = run.res.stdout == "2"
          }
        }
        "#,
    )]);

    let err = runner.run_tests().await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("case \"bad\""), "{msg}");
    assert!(msg.contains("assertion \"always_two\" failed"), "{msg}");
}

#[tokio::test]
async fn a_test_without_cases_runs_once() {
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
        test "smoke" {
          run "hello" {}
          assert "clean_exit" {
            condition = run.res.exitstatus == 0
          }
        }
        "#,
    )]);

    let result = runner.run_tests().await.unwrap();
    assert_eq!(result.stdout, "PASS: clean_exit");
    assert_eq!(runner.trace_commands(), ["echo hi"]);
}

#[tokio::test]
async fn test_variables_are_visible_to_cases_and_assertions() {
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
        test "greets" {
          variable "expected" {
            value = "hello"
          }
          case "default" {
            msg = var.expected
          }
          run "say" {
            msg = case.msg
          }
          assert "echoed" {
            condition = trimspace(run.res.stdout) == var.expected
          }
        }
        "#,
    )]);

    let result = runner.run_tests().await.unwrap();
    assert_eq!(result.stdout, "PASS: echoed");
}

#[tokio::test]
async fn assertions_judge_a_failing_run() {
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
        test "expected_failure" {
          run "fail" {}
          assert "nonzero" {
            condition = run.res.exitstatus == 1
          }
          assert "error_reported" {
            condition = run.err != ""
          }
        }
        "#,
    )]);

    // The run fails, but the assertions decide the outcome.
    let result = runner.run_tests().await.unwrap();
    assert_eq!(result.stdout, "PASS: nonzero\nPASS: error_reported");
}

#[tokio::test]
async fn evaluator_errors_are_not_rewrapped() {
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
        test "broken" {
          run "hello" {}
          assert "typo" {
            condition = vars.nope == 1
          }
        }
        "#,
    )]);

    let err = runner.run_tests().await.unwrap_err();
    assert!(!err.to_string().contains("case"), "{err}");
}

#[tokio::test]
async fn all_tests_run_and_the_last_result_wins() {
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
        test "first" {
          run "hello" {}
          assert "a" {
            condition = run.res.set
          }
        }
        test "second" {
          run "hello" {}
          assert "b" {
            condition = run.res.set
          }
          assert "c" {
            condition = run.res.exitstatus == 0
          }
        }
        "#,
    )]);

    let result = runner.run_tests().await.unwrap();
    assert_eq!(result.stdout, "PASS: b\nPASS: c");
    assert_eq!(runner.trace_commands().len(), 2);
}
