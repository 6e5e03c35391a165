//! RunResult — the structured result of every job invocation.
//!
//! Every job, whether it execs a command, runs another job, or only checks
//! assertions, produces a `RunResult`. Inside the evaluator it appears as an
//! object with an additional `set` field so expressions can distinguish a
//! real result from an absent one.

use serde::{Deserialize, Serialize};

/// The result of running a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Exit status of the terminal command. 0 means success.
    pub exit_status: i64,
    /// True if the job decided nothing needed to be done.
    pub noop: bool,
}

/// Exit status reported for an absent result.
pub const UNSET_EXIT_STATUS: i64 = -127;

impl RunResult {
    /// The empty result returned by jobs with no effectful body.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A result carrying only stdout (used by the test harness report).
    pub fn with_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// True if the terminal command exited cleanly.
    pub fn ok(&self) -> bool {
        self.exit_status == 0
    }

    /// Reflect this result into the evaluator as an object with `set = true`.
    pub fn to_hcl(&self) -> hcl::Value {
        let mut fields = hcl::Map::new();
        fields.insert("stdout".to_string(), hcl::Value::from(self.stdout.clone()));
        fields.insert("stderr".to_string(), hcl::Value::from(self.stderr.clone()));
        fields.insert("exitstatus".to_string(), hcl::Value::from(self.exit_status));
        fields.insert("noop".to_string(), hcl::Value::from(self.noop));
        fields.insert("set".to_string(), hcl::Value::from(true));
        hcl::Value::Object(fields)
    }

    /// The sentinel object representing a result that never materialized,
    /// with `set = false` so assertions can test for it.
    pub fn absent() -> hcl::Value {
        let mut fields = hcl::Map::new();
        fields.insert("stdout".to_string(), hcl::Value::from("<not set>"));
        fields.insert("stderr".to_string(), hcl::Value::from("<not set>"));
        fields.insert("exitstatus".to_string(), hcl::Value::from(UNSET_EXIT_STATUS));
        fields.insert("noop".to_string(), hcl::Value::from(false));
        fields.insert("set".to_string(), hcl::Value::from(false));
        hcl::Value::Object(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(v: &'a hcl::Value, name: &str) -> &'a hcl::Value {
        match v {
            hcl::Value::Object(fields) => &fields[name],
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn empty_result_is_ok() {
        assert!(RunResult::empty().ok());
    }

    #[test]
    fn nonzero_exit_is_not_ok() {
        let res = RunResult {
            exit_status: 2,
            ..RunResult::default()
        };
        assert!(!res.ok());
    }

    #[test]
    fn reflection_sets_set() {
        let res = RunResult::with_stdout("hi\n");
        let v = res.to_hcl();
        assert_eq!(field(&v, "set"), &hcl::Value::from(true));
        assert_eq!(field(&v, "stdout"), &hcl::Value::from("hi\n"));
        assert_eq!(field(&v, "exitstatus"), &hcl::Value::from(0));
    }

    #[test]
    fn absent_reflection_is_unset() {
        let v = RunResult::absent();
        assert_eq!(field(&v, "set"), &hcl::Value::from(false));
        assert_eq!(field(&v, "stdout"), &hcl::Value::from("<not set>"));
        assert_eq!(field(&v, "exitstatus"), &hcl::Value::from(UNSET_EXIT_STATUS));
    }
}
