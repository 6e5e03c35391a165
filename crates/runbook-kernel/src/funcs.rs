//! The expression function catalog.
//!
//! A fixed set of pure functions declared into every evaluation context.
//! Directory-relative behavior is not baked in here — jobs reach their own
//! directory through `context.sourcedir`.

use std::path::PathBuf;

use hcl::eval::{Context, FuncArgs, FuncDef, ParamType};
use hcl::Value;

/// Declare the full catalog into an evaluation context.
pub fn declare(ctx: &mut Context<'_>) {
    ctx.declare_func(
        "upper",
        FuncDef::builder().param(ParamType::String).build(upper),
    );
    ctx.declare_func(
        "lower",
        FuncDef::builder().param(ParamType::String).build(lower),
    );
    ctx.declare_func(
        "trimspace",
        FuncDef::builder().param(ParamType::String).build(trimspace),
    );
    ctx.declare_func(
        "split",
        FuncDef::builder()
            .param(ParamType::String)
            .param(ParamType::String)
            .build(split),
    );
    ctx.declare_func(
        "join",
        FuncDef::builder()
            .param(ParamType::String)
            .param(ParamType::Array(Box::new(ParamType::String)))
            .build(join),
    );
    ctx.declare_func(
        "length",
        FuncDef::builder().param(ParamType::Any).build(length),
    );
    ctx.declare_func(
        "tostring",
        FuncDef::builder().param(ParamType::Any).build(tostring),
    );
    ctx.declare_func(
        "tonumber",
        FuncDef::builder().param(ParamType::Any).build(tonumber),
    );
    ctx.declare_func(
        "abspath",
        FuncDef::builder().param(ParamType::String).build(abspath),
    );
}

fn upper(args: FuncArgs) -> Result<Value, String> {
    match &args[0] {
        Value::String(s) => Ok(Value::from(s.to_uppercase())),
        other => Err(format!("upper: expected string, got {other}")),
    }
}

fn lower(args: FuncArgs) -> Result<Value, String> {
    match &args[0] {
        Value::String(s) => Ok(Value::from(s.to_lowercase())),
        other => Err(format!("lower: expected string, got {other}")),
    }
}

fn trimspace(args: FuncArgs) -> Result<Value, String> {
    match &args[0] {
        Value::String(s) => Ok(Value::from(s.trim())),
        other => Err(format!("trimspace: expected string, got {other}")),
    }
}

fn split(args: FuncArgs) -> Result<Value, String> {
    match (&args[0], &args[1]) {
        (Value::String(sep), Value::String(s)) => Ok(Value::Array(
            s.split(sep.as_str()).map(Value::from).collect(),
        )),
        _ => Err("split: expected (separator, string)".to_string()),
    }
}

fn join(args: FuncArgs) -> Result<Value, String> {
    match (&args[0], &args[1]) {
        (Value::String(sep), Value::Array(items)) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => parts.push(s.clone()),
                    other => return Err(format!("join: expected string element, got {other}")),
                }
            }
            Ok(Value::from(parts.join(sep)))
        }
        _ => Err("join: expected (separator, list of strings)".to_string()),
    }
}

fn length(args: FuncArgs) -> Result<Value, String> {
    let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(fields) => fields.len(),
        other => return Err(format!("length: not a collection or string: {other}")),
    };
    Ok(Value::from(len as i64))
}

fn tostring(args: FuncArgs) -> Result<Value, String> {
    match &args[0] {
        Value::String(s) => Ok(Value::from(s.clone())),
        Value::Number(n) => Ok(Value::from(n.to_string())),
        Value::Bool(b) => Ok(Value::from(b.to_string())),
        Value::Null => Ok(Value::from("null")),
        other => Err(format!("tostring: cannot convert {other}")),
    }
}

fn tonumber(args: FuncArgs) -> Result<Value, String> {
    match &args[0] {
        Value::Number(n) => Ok(Value::Number(n.clone())),
        Value::String(s) => {
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Value::from(i));
            }
            let f: f64 = s
                .parse()
                .map_err(|_| format!("tonumber: cannot parse {s:?} as a number"))?;
            hcl::Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| format!("tonumber: {s:?} is not a finite number"))
        }
        other => Err(format!("tonumber: cannot convert {other}")),
    }
}

fn abspath(args: FuncArgs) -> Result<Value, String> {
    match &args[0] {
        Value::String(s) => {
            let path = PathBuf::from(s);
            let abs = if path.is_absolute() {
                path
            } else {
                std::env::current_dir()
                    .map_err(|e| format!("abspath: {e}"))?
                    .join(path)
            };
            Ok(Value::from(abs.to_string_lossy().into_owned()))
        }
        other => Err(format!("abspath: expected string, got {other}")),
    }
}
