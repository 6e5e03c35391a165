//! End-to-end tests for assertion failure diagnostics.

use std::sync::Arc;

use runbook_kernel::{load_dir, Runner, ValueMap};

fn fixture(src: &str) -> (tempfile::TempDir, Runner) {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("main.hcl"), src).expect("write fixture");
    let doc = load_dir(dir.path()).expect("load fixture");
    let runner = Runner::with_output(doc, Arc::new(|_: &str| {}), Arc::new(|_: &str| {}));
    (dir, runner)
}

fn no_args() -> ValueMap {
    ValueMap::new()
}

#[tokio::test]
async fn failure_message_quotes_expression_and_values() {
    let (_dir, runner) = fixture(
        r#"
        job "checked" {
          variable "x" {
            value = 1
          }
          assert "eq" {
            condition = var.x == 2
          }
        }
        "#,
    );

    let err = runner.run("checked", &no_args(), &no_args()).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("assertion \"eq\" failed"), "{msg}");
    assert!(
        msg.contains("this expression must be true, but was false"),
        "{msg}"
    );
    assert!(msg.contains("var.x == 2"), "{msg}");
    assert!(msg.contains("var.x=1"), "{msg}");
}

#[tokio::test]
async fn bindings_cover_params_and_vars() {
    let (_dir, runner) = fixture(
        r#"
        job "checked" {
          parameter "limit" {
            type    = number
            default = 10
          }
          variable "count" {
            value = 11
          }
          assert "within_limit" {
            condition = var.count <= param.limit
          }
        }
        "#,
    );

    let err = runner.run("checked", &no_args(), &no_args()).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("var.count=11 (int)"), "{msg}");
    assert!(msg.contains("param.limit=10 (int)"), "{msg}");
}

#[tokio::test]
async fn assertions_can_inspect_composed_config() {
    let (_dir, runner) = fixture(
        r#"
        job "checked" {
          config "c" {
            source "file" {
              path    = "/nonexistent.yaml"
              default = "threshold: 3"
            }
          }
          assert "threshold" {
            condition = conf.c.threshold == 4
          }
        }
        "#,
    );

    let err = runner.run("checked", &no_args(), &no_args()).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("conf.c.threshold == 4"), "{msg}");
    assert!(msg.contains("conf.c.threshold=3 (int)"), "{msg}");
}

#[tokio::test]
async fn first_failing_assertion_wins() {
    let (_dir, runner) = fixture(
        r#"
        job "checked" {
          variable "x" {
            value = 1
          }
          assert "first" {
            condition = var.x == 1
          }
          assert "second" {
            condition = var.x == 2
          }
          assert "third" {
            condition = var.x == 3
          }
        }
        "#,
    );

    let err = runner.run("checked", &no_args(), &no_args()).await.unwrap_err();
    assert!(err.to_string().contains("assertion \"second\" failed"), "{err}");
}

#[tokio::test]
async fn passing_assertions_are_silent() {
    let (_dir, runner) = fixture(
        r#"
        job "checked" {
          variable "name" {
            type  = string
            value = "runbook"
          }
          assert "named" {
            condition = var.name == "runbook"
          }
          assert "long_enough" {
            condition = length(var.name) >= 3
          }
        }
        "#,
    );

    let result = runner.run("checked", &no_args(), &no_args()).await.unwrap();
    assert_eq!(result.stdout, "");
}
