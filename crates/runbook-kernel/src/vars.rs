//! The variables resolver.
//!
//! Variables evaluate in declaration order against a scope that already
//! holds `param`, `opt`, and `context` (or just `context` inside tests).
//! A declared type must match the evaluated value's type exactly.

use hcl::expr::Expression;

use crate::ast::VariableSpec;
use crate::context::EvalScope;
use crate::error::Error;
use crate::typeexpr::{implied_type, type_constraint, Type};

/// Resolve every variable and return the object published as `var`.
pub fn resolve(scope: &EvalScope, job_name: &str, specs: &[VariableSpec]) -> Result<hcl::Value, Error> {
    let mut fields = hcl::Map::new();

    for spec in specs {
        let declared = match &spec.type_expr {
            Some(expr) => Some(type_constraint(expr)?),
            None => None,
        };

        // A declared list(string) is decoded element-wise: inference cannot
        // tell list(string) from an empty list literal, so prove each element
        // is a string and accept the rebuilt list directly.
        let value = if declared == Some(Type::List(Box::new(Type::String))) {
            decode_string_list(scope, job_name, &spec.name, &spec.value)?
        } else {
            let value = scope.eval(&spec.value)?;
            if let Some(declared) = &declared {
                let actual = implied_type(&value);
                if !declared.accepts(&actual) {
                    return Err(Error::TypeMismatch {
                        job: job_name.to_string(),
                        what: format!("variable {:?}", spec.name),
                        want: declared.to_string(),
                        got: actual.to_string(),
                    });
                }
            }
            value
        };

        fields.insert(spec.name.clone(), value);
    }

    Ok(hcl::Value::Object(fields))
}

fn decode_string_list(
    scope: &EvalScope,
    job_name: &str,
    var_name: &str,
    expr: &Expression,
) -> Result<hcl::Value, Error> {
    let value = scope.eval(expr)?;
    let items = match value {
        hcl::Value::Array(items) => items,
        other => {
            return Err(Error::TypeMismatch {
                job: job_name.to_string(),
                what: format!("variable {var_name:?}"),
                want: Type::List(Box::new(Type::String)).to_string(),
                got: implied_type(&other).to_string(),
            })
        }
    };
    for item in &items {
        if !matches!(item, hcl::Value::String(_)) {
            return Err(Error::TypeMismatch {
                job: job_name.to_string(),
                what: format!("variable {var_name:?}"),
                want: Type::List(Box::new(Type::String)).to_string(),
                got: format!("list containing {}", implied_type(item)),
            });
        }
    }
    Ok(hcl::Value::Array(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, type_src: Option<&str>, value_src: &str) -> VariableSpec {
        let expr = |src: &str| {
            let body = hcl::parse(&format!("v = {src}\n")).unwrap();
            body.attributes().next().unwrap().expr().clone()
        };
        VariableSpec {
            name: name.to_string(),
            type_expr: type_src.map(expr),
            value: expr(value_src),
        }
    }

    fn field<'a>(v: &'a hcl::Value, name: &str) -> &'a hcl::Value {
        match v {
            hcl::Value::Object(fields) => &fields[name],
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn resolves_in_declaration_order() {
        let scope = EvalScope::new();
        let specs = [
            var("a", Some("number"), "1"),
            var("b", None, "2"),
        ];
        let vars = resolve(&scope, "x", &specs).unwrap();
        assert_eq!(field(&vars, "a"), &hcl::Value::from(1));
        assert_eq!(field(&vars, "b"), &hcl::Value::from(2));
    }

    #[test]
    fn sees_params_from_the_scope() {
        let mut scope = EvalScope::new();
        let mut param = hcl::Map::new();
        param.insert("name".to_string(), hcl::Value::from("go"));
        scope.set("param", hcl::Value::Object(param));

        let specs = [var("shout", Some("string"), "upper(param.name)")];
        let vars = resolve(&scope, "x", &specs).unwrap();
        assert_eq!(field(&vars, "shout"), &hcl::Value::from("GO"));
    }

    #[test]
    fn declared_type_must_match_exactly() {
        let scope = EvalScope::new();
        let specs = [var("n", Some("number"), r#""nope""#)];
        let err = resolve(&scope, "x", &specs).unwrap_err();
        assert!(err.to_string().contains("variable \"n\""), "{err}");
        assert!(err.to_string().contains("want number, got string"), "{err}");
    }

    #[test]
    fn empty_list_narrows_to_list_of_string() {
        let scope = EvalScope::new();
        let specs = [var("names", Some("list(string)"), "[]")];
        let vars = resolve(&scope, "x", &specs).unwrap();
        assert_eq!(field(&vars, "names"), &hcl::Value::Array(vec![]));
    }

    #[test]
    fn string_list_elements_are_checked() {
        let scope = EvalScope::new();
        let specs = [var("names", Some("list(string)"), r#"["a", 2]"#)];
        let err = resolve(&scope, "x", &specs).unwrap_err();
        assert!(err.to_string().contains("list containing number"), "{err}");
    }

    #[test]
    fn untyped_variables_accept_anything() {
        let scope = EvalScope::new();
        let specs = [var("mixed", None, r#"["a", 2]"#)];
        assert!(resolve(&scope, "x", &specs).is_ok());
    }
}
