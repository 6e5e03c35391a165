//! Caller-input binding for parameters and options.
//!
//! Parameters and options are type-checked identically, so one binder serves
//! both. For each spec, in order: take the caller-supplied native value if
//! present, otherwise evaluate the declared default in a context containing
//! only `context`, otherwise fail. Either way the value's type must match
//! the declared constraint exactly.

use std::collections::HashMap;

use hcl::expr::Expression;
use runbook_types::Value;

use crate::ast::{OptionSpec, ParameterSpec};
use crate::context::EvalScope;
use crate::error::{BindKind, Error};
use crate::typeexpr::{implied_type, type_constraint, Type};

/// A borrowed view of a parameter or option spec.
#[derive(Debug, Clone, Copy)]
pub struct BindInput<'a> {
    pub name: &'a str,
    pub type_expr: &'a Expression,
    pub default: Option<&'a Expression>,
}

impl<'a> From<&'a ParameterSpec> for BindInput<'a> {
    fn from(p: &'a ParameterSpec) -> Self {
        Self {
            name: &p.name,
            type_expr: &p.type_expr,
            default: p.default.as_ref(),
        }
    }
}

impl<'a> From<&'a OptionSpec> for BindInput<'a> {
    fn from(o: &'a OptionSpec) -> Self {
        Self {
            name: &o.name,
            type_expr: &o.type_expr,
            default: o.default.as_ref(),
        }
    }
}

/// Bind every spec, in order, producing the object published as `param` or
/// `opt`. Later specs may reuse earlier names; the later binding wins.
pub fn bind(
    kind: BindKind,
    job_name: &str,
    specs: &[BindInput<'_>],
    given: &HashMap<String, Value>,
    base_context: &hcl::Value,
) -> Result<hcl::Value, Error> {
    let mut bound = hcl::Map::new();

    for spec in specs {
        let declared = type_constraint(spec.type_expr)?;

        if let Some(value) = given.get(spec.name) {
            let actual = native_implied(value);
            if !declared.accepts(&actual) {
                return Err(Error::TypeMismatch {
                    job: job_name.to_string(),
                    what: format!("{kind} {:?}", spec.name),
                    want: declared.to_string(),
                    got: actual.to_string(),
                });
            }
            bound.insert(spec.name.to_string(), value.to_hcl());
            continue;
        }

        if let Some(default) = spec.default {
            let mut scope = EvalScope::new();
            scope.set("context", base_context.clone());
            let value = scope.eval(default)?;
            let actual = implied_type(&value);
            if !declared.accepts(&actual) {
                return Err(Error::TypeMismatch {
                    job: job_name.to_string(),
                    what: format!("default for {kind} {:?}", spec.name),
                    want: declared.to_string(),
                    got: actual.to_string(),
                });
            }
            bound.insert(spec.name.to_string(), value);
            continue;
        }

        return Err(Error::MissingValue {
            job: job_name.to_string(),
            kind,
            name: spec.name.to_string(),
        });
    }

    Ok(hcl::Value::Object(bound))
}

/// The declared-type-domain view of a native caller value.
fn native_implied(value: &Value) -> Type {
    match value {
        Value::Bool(_) => Type::Bool,
        Value::Int(_) => Type::Number,
        Value::String(_) => Type::String,
    }
}
