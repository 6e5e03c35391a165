//! Pure data types for runbook — native values, run results, and the bridge
//! into the evaluator's tagged value domain.
//!
//! This crate is a leaf dependency with no async runtime and no I/O. It
//! exists so that embedders can work with runbook's value and result types
//! without pulling the kernel's transitive deps.

pub mod result;
pub mod value;

// Flat re-exports for convenience
pub use result::*;
pub use value::*;
