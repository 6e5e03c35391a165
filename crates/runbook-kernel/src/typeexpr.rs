//! Type constraints and type inference over the evaluator's value domain.
//!
//! A declared type is written as an expression: bare keywords (`string`,
//! `number`, `bool`, `any`) or constructor calls (`list(string)`,
//! `map(number)`, `object({name = string})`, `tuple([string, number])`,
//! `optional(T)`). The constraint evaluator interprets that expression
//! structurally — no variables are in scope, only the type constructors.
//!
//! Matching is exact: `list(any)` does not accept `list(string)`. The only
//! wildcard is a bare `any` at the top of the constraint.

use std::collections::BTreeMap;
use std::fmt;

use hcl::expr::{Expression, ObjectKey};

use crate::error::Error;

/// A concrete type constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Any,
    String,
    Number,
    Bool,
    List(Box<Type>),
    Set(Box<Type>),
    Map(Box<Type>),
    Tuple(Vec<Type>),
    Object(BTreeMap<String, Type>),
}

impl Type {
    /// Whether a value of type `actual` satisfies this constraint.
    pub fn accepts(&self, actual: &Type) -> bool {
        self == &Type::Any || self == actual
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "any"),
            Type::String => write!(f, "string"),
            Type::Number => write!(f, "number"),
            Type::Bool => write!(f, "bool"),
            Type::List(elem) => write!(f, "list of {elem}"),
            Type::Set(elem) => write!(f, "set of {elem}"),
            Type::Map(elem) => write!(f, "map of {elem}"),
            Type::Tuple(_) => write!(f, "tuple"),
            Type::Object(_) => write!(f, "object"),
        }
    }
}

/// Evaluate a type-constraint expression into a concrete [`Type`].
pub fn type_constraint(expr: &Expression) -> Result<Type, Error> {
    match expr {
        Expression::Variable(var) => match var.as_str() {
            "string" => Ok(Type::String),
            "number" => Ok(Type::Number),
            "bool" => Ok(Type::Bool),
            "any" => Ok(Type::Any),
            other => Err(Error::TypeExpr(format!("unknown type keyword {other:?}"))),
        },
        Expression::Parenthesis(inner) => type_constraint(inner),
        Expression::FuncCall(call) => {
            let name = call.name.to_string();
            match name.as_str() {
                "list" => Ok(Type::List(Box::new(single_arg(&name, &call.args)?))),
                "set" => Ok(Type::Set(Box::new(single_arg(&name, &call.args)?))),
                "map" => Ok(Type::Map(Box::new(single_arg(&name, &call.args)?))),
                // optional(T) relaxes presence, not shape
                "optional" => single_arg(&name, &call.args),
                "tuple" => match call.args.as_slice() {
                    [Expression::Array(elems)] => Ok(Type::Tuple(
                        elems.iter().map(type_constraint).collect::<Result<_, _>>()?,
                    )),
                    _ => Err(Error::TypeExpr(
                        "tuple(...) takes a single list of types".to_string(),
                    )),
                },
                "object" => match call.args.as_slice() {
                    [Expression::Object(fields)] => {
                        let mut out = BTreeMap::new();
                        for (key, value) in fields.iter() {
                            out.insert(object_key_name(key)?, type_constraint(value)?);
                        }
                        Ok(Type::Object(out))
                    }
                    _ => Err(Error::TypeExpr(
                        "object(...) takes a single attribute mapping".to_string(),
                    )),
                },
                other => Err(Error::TypeExpr(format!(
                    "unknown type constructor {other:?}"
                ))),
            }
        }
        other => Err(Error::TypeExpr(format!(
            "expected a type keyword or constructor, got {other:?}"
        ))),
    }
}

fn single_arg(name: &str, args: &[Expression]) -> Result<Type, Error> {
    match args {
        [arg] => type_constraint(arg),
        _ => Err(Error::TypeExpr(format!(
            "{name}(...) takes exactly one type argument"
        ))),
    }
}

fn object_key_name(key: &ObjectKey) -> Result<String, Error> {
    match key {
        ObjectKey::Identifier(ident) => Ok(ident.to_string()),
        ObjectKey::Expression(Expression::String(s)) => Ok(s.clone()),
        other => Err(Error::TypeExpr(format!(
            "object field names must be identifiers, got {other:?}"
        ))),
    }
}

/// Infer the type of an evaluated value.
///
/// An empty array infers `list of any` — there is nothing to infer an
/// element type from. The variables resolver special-cases declared
/// `list(string)` for exactly this reason.
pub fn implied_type(value: &hcl::Value) -> Type {
    match value {
        hcl::Value::Null => Type::Any,
        hcl::Value::Bool(_) => Type::Bool,
        hcl::Value::Number(_) => Type::Number,
        hcl::Value::String(_) => Type::String,
        hcl::Value::Array(elems) => {
            let mut types = elems.iter().map(implied_type);
            match types.next() {
                None => Type::List(Box::new(Type::Any)),
                Some(first) => {
                    if types.all(|t| t == first) {
                        Type::List(Box::new(first))
                    } else {
                        Type::Tuple(elems.iter().map(implied_type).collect())
                    }
                }
            }
        }
        hcl::Value::Object(fields) => Type::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), implied_type(v)))
                .collect(),
        ),
    }
}
