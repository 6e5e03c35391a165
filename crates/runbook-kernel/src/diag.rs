//! Load-time diagnostics and their stderr rendering.
//!
//! Parse failures from the collaborator parser carry line/column and a
//! source snippet in their display form; decode failures carry the file they
//! came from. Both are collected into a [`DiagnosticBundle`] so a load
//! reports every problem at once instead of stopping at the first.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A single load-time problem, anchored to the file it came from.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Source file the problem was found in.
    pub file: PathBuf,
    /// Human-readable message. Parser messages embed a source snippet.
    pub message: String,
}

impl Diagnostic {
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file.display(), self.message)
    }
}

/// All diagnostics produced by one load.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticBundle(pub Vec<Diagnostic>);

impl DiagnosticBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, file: impl AsRef<Path>, message: impl Into<String>) {
        self.0.push(Diagnostic::new(file.as_ref(), message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for DiagnosticBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for d in &self.0 {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{d}")?;
            first = false;
        }
        Ok(())
    }
}

/// Render diagnostics to a writer, one per line.
pub fn write_diagnostics(bundle: &DiagnosticBundle, out: &mut impl Write) -> std::io::Result<()> {
    for d in &bundle.0 {
        writeln!(out, "error: {d}")?;
    }
    Ok(())
}
