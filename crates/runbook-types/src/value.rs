//! Native scalar values and the bridge to the evaluator's tagged domain.
//!
//! Caller-supplied arguments and options travel as [`Value`]s; expressions
//! evaluate to [`hcl::Value`]s. The bridge between the two is deliberately
//! narrow: strings, integers, and booleans convert in both directions, and
//! everything else is a terminal error. Structured data flows through the
//! YAML round-trip in the config composer instead.

use serde::{Deserialize, Serialize};

/// A language-native scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
}

impl Value {
    /// The friendly name of this value's type, as used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::String(_) => "string",
        }
    }

    /// Convert into the evaluator's tagged domain.
    pub fn to_hcl(&self) -> hcl::Value {
        match self {
            Value::Bool(b) => hcl::Value::Bool(*b),
            Value::Int(i) => hcl::Value::Number((*i).into()),
            Value::String(s) => hcl::Value::String(s.clone()),
        }
    }

    /// Convert a tagged value back into the native domain.
    ///
    /// Only scalars convert. Numbers must be integral — the native domain
    /// has no float representation.
    pub fn from_hcl(value: &hcl::Value) -> Result<Self, BridgeError> {
        match value {
            hcl::Value::Bool(b) => Ok(Value::Bool(*b)),
            hcl::Value::String(s) => Ok(Value::String(s.clone())),
            hcl::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .ok_or_else(|| BridgeError::NonIntegralNumber(n.to_string())),
            other => Err(BridgeError::Unimplemented(tagged_type_name(other))),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// The friendly name of a tagged value's type.
pub fn tagged_type_name(value: &hcl::Value) -> &'static str {
    match value {
        hcl::Value::Null => "null",
        hcl::Value::Bool(_) => "bool",
        hcl::Value::Number(_) => "number",
        hcl::Value::String(_) => "string",
        hcl::Value::Array(_) => "list",
        hcl::Value::Object(_) => "object",
    }
}

/// Failure to cross the bridge between the native and tagged value domains.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("handler for type {0} not implemented yet")]
    Unimplemented(&'static str),
    #[error("cannot convert non-integral number {0} to a native value")]
    NonIntegralNumber(String),
}
