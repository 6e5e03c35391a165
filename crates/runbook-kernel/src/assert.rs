//! The assertion engine.
//!
//! A condition evaluates to a boolean; `true` succeeds silently. On `false`
//! the failure message reconstructs the condition's source text from the
//! parsed expression and lists the value and type of every variable the
//! condition references — resolved against the current scope, bridged to a
//! native value, and silently omitted when either step fails.

use hcl::expr::{Expression, ObjectKey, Operation, TraversalOperator};
use runbook_types::Value;

use crate::ast::AssertSpec;
use crate::context::EvalScope;
use crate::error::Error;

/// Evaluate one assertion against the scope.
pub fn check(scope: &EvalScope, owner: &str, a: &AssertSpec) -> Result<(), Error> {
    let value = scope.eval(&a.condition)?;
    let ok = match value {
        hcl::Value::Bool(b) => b,
        other => {
            return Err(Error::TypeMismatch {
                job: owner.to_string(),
                what: format!("assert {:?} condition", a.name),
                want: "bool".to_string(),
                got: runbook_types::tagged_type_name(&other).to_string(),
            })
        }
    };
    if ok {
        return Ok(());
    }

    let mut refs = Vec::new();
    collect_refs(&a.condition, &mut refs);

    let mut bindings = Vec::new();
    for r in refs {
        let Ok(resolved) = scope.eval(&r) else {
            continue;
        };
        let Ok(native) = Value::from_hcl(&resolved) else {
            continue;
        };
        bindings.push(format!(
            "{}={} ({})",
            expr_text(&r),
            native,
            native.type_name()
        ));
    }

    Err(Error::Assertion {
        name: a.name.clone(),
        expr: expr_text(&a.condition),
        bindings: bindings.join(" "),
    })
}

/// Render an expression back to its source form.
fn expr_text(expr: &Expression) -> String {
    hcl::format::to_string(expr).unwrap_or_else(|_| "<expression>".to_string())
}

/// Collect every variable reference in the expression: bare variables and
/// traversals rooted at one, in order of appearance.
fn collect_refs(expr: &Expression, out: &mut Vec<Expression>) {
    match expr {
        Expression::Variable(_) => out.push(expr.clone()),
        Expression::Traversal(t) => {
            if matches!(t.expr, Expression::Variable(_)) {
                out.push(expr.clone());
            } else {
                collect_refs(&t.expr, out);
            }
            for op in &t.operators {
                if let TraversalOperator::Index(index) = op {
                    collect_refs(index, out);
                }
            }
        }
        Expression::Array(items) => {
            for item in items {
                collect_refs(item, out);
            }
        }
        Expression::Object(fields) => {
            for (key, value) in fields.iter() {
                if let ObjectKey::Expression(key) = key {
                    collect_refs(key, out);
                }
                collect_refs(value, out);
            }
        }
        Expression::Operation(op) => match op.as_ref() {
            Operation::Unary(unary) => collect_refs(&unary.expr, out),
            Operation::Binary(binary) => {
                collect_refs(&binary.lhs_expr, out);
                collect_refs(&binary.rhs_expr, out);
            }
        },
        Expression::Conditional(cond) => {
            collect_refs(&cond.cond_expr, out);
            collect_refs(&cond.true_expr, out);
            collect_refs(&cond.false_expr, out);
        }
        Expression::FuncCall(call) => {
            for arg in &call.args {
                collect_refs(arg, out);
            }
        }
        Expression::Parenthesis(inner) => collect_refs(inner, out),
        _ => {}
    }
}
