//! The subprocess gateway.
//!
//! Launches a command with an argument vector and an explicit environment
//! map, captures stdout and stderr, and reports the exit status. Line-logging
//! hooks stream captured output to caller-supplied sinks as lines arrive.
//! The child's environment is cleared first: it sees only the declared map.

use std::collections::HashMap;
use std::io;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

/// A per-line output hook.
pub type LineSink = Arc<dyn Fn(&str) + Send + Sync>;

/// A command to execute.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    pub name: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl ShellCommand {
    /// The `cmd arg1 arg2` form used in traces and error messages.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.args.join(" "))
        }
    }
}

/// Capture options: optional per-line hooks for each stream.
#[derive(Clone, Default)]
pub struct CaptureOpts {
    pub log_stdout: Option<LineSink>,
    pub log_stderr: Option<LineSink>,
}

/// Captured output of a completed command.
#[derive(Debug, Clone)]
pub struct Capture {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i64,
}

/// Run the command to completion, streaming lines to the hooks as they
/// arrive. Spawn failures (e.g. command not found) return the I/O error;
/// a nonzero exit is reported in the capture, not as an error.
pub async fn capture(cmd: &ShellCommand, opts: CaptureOpts) -> io::Result<Capture> {
    debug!(command = %cmd.display(), "spawning subprocess");

    let mut child = Command::new(&cmd.name)
        .args(&cmd.args)
        .env_clear()
        .envs(&cmd.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("stderr not captured"))?;

    let out_task = tokio::spawn(drain(stdout, opts.log_stdout));
    let err_task = tokio::spawn(drain(stderr, opts.log_stderr));

    let status = child.wait().await?;
    let stdout = out_task.await.unwrap_or_default();
    let stderr = err_task.await.unwrap_or_default();

    Ok(Capture {
        stdout,
        stderr,
        exit_status: i64::from(status.code().unwrap_or(-1)),
    })
}

/// Read a stream to EOF, emitting each completed line to the sink while
/// accumulating the raw capture.
async fn drain<R: AsyncRead + Unpin>(mut reader: R, sink: Option<LineSink>) -> String {
    let mut raw: Vec<u8> = Vec::new();
    let mut emitted = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                raw.extend_from_slice(&chunk[..n]);
                if let Some(sink) = &sink {
                    while let Some(pos) = raw[emitted..].iter().position(|&b| b == b'\n') {
                        let line = String::from_utf8_lossy(&raw[emitted..emitted + pos]);
                        sink(line.trim_end_matches('\r'));
                        emitted += pos + 1;
                    }
                }
            }
            Err(_) => break,
        }
    }
    // A final partial line still reaches the sink.
    if let Some(sink) = &sink {
        if emitted < raw.len() {
            let line = String::from_utf8_lossy(&raw[emitted..]);
            sink(&line);
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}
