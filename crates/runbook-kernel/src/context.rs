//! Layered evaluation contexts.
//!
//! A job invocation builds its context in layers, each published under a
//! reserved top-level name: `context`, then `param` and `opt`, then `var`,
//! then `conf`, then `step` and `run` as execution proceeds. Test cases use
//! `case` in place of `param`/`opt`. The namespaces are disjoint, so layers
//! add without shadowing.

use std::path::Path;

use hcl::eval::{Context, Evaluate};
use hcl::expr::Expression;

use crate::error::Error;
use crate::funcs;

/// The mutable variable side of an evaluation context. The function catalog
/// is fixed and declared on demand.
#[derive(Debug, Clone, Default)]
pub struct EvalScope {
    vars: hcl::Map<String, hcl::Value>,
}

impl EvalScope {
    /// An empty scope: functions only, no variables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a value under a reserved top-level name, replacing any
    /// previous value for that name.
    pub fn set(&mut self, name: &str, value: hcl::Value) {
        self.vars.insert(name.to_string(), value);
    }

    /// Read back a published value.
    pub fn get(&self, name: &str) -> Option<&hcl::Value> {
        self.vars.get(name)
    }

    /// Materialize the collaborator's evaluation context.
    pub fn context(&self) -> Context<'_> {
        let mut ctx = Context::new();
        funcs::declare(&mut ctx);
        for (name, value) in &self.vars {
            ctx.declare_var(name.as_str(), value.clone());
        }
        ctx
    }

    /// Evaluate an expression against this scope.
    pub fn eval(&self, expr: &Expression) -> Result<hcl::Value, Error> {
        Ok(expr
            .evaluate(&self.context())
            .map_err(hcl::eval::Errors::from)?)
    }
}

/// The base layer: a `context` object carrying the directory the owning
/// block was declared in.
pub fn base_context(source_dir: &Path) -> hcl::Value {
    let mut fields = hcl::Map::new();
    fields.insert(
        "sourcedir".to_string(),
        hcl::Value::from(source_dir.to_string_lossy().into_owned()),
    );
    hcl::Value::Object(fields)
}
