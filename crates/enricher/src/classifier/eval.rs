//! Rule evaluation.
//!
//! `&&` and `||` short-circuit: a builtin on the right of a false `&&` is
//! never called, so its side effect on the result does not happen.

use std::borrow::Cow;
use std::fmt;

use ironflow_core::types::Boundary;
use regex::Regex;

use super::ClassifierContext;
use super::ast::{Call, CmpOp, Expr, Field, Pattern};
use super::builtins::{self, Builtin};
use super::result::ClassifierResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Value<'a> {
    Str(Cow<'a, str>),
    Int(i64),
    Bool(bool),
}

impl Value<'_> {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Runtime failure: the rule evaluates to false.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("type mismatch: {0}")]
    Type(String),

    #[error("invalid regex {pattern:?}: {reason}")]
    Regex { pattern: String, reason: String },

    #[error("format: {0}")]
    Format(String),

    #[error("field {0} is not available")]
    MissingField(&'static str),
}

/// Evaluate a whole rule; anything but a boolean is an error.
pub(crate) fn eval_rule(
    expr: &Expr,
    ctx: &ClassifierContext<'_>,
    result: &mut ClassifierResult,
) -> Result<bool, EvalError> {
    match eval(expr, ctx, result)? {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::Type(format!(
            "rule must evaluate to bool, got {}",
            other.type_name()
        ))),
    }
}

fn eval<'a>(
    expr: &'a Expr,
    ctx: &ClassifierContext<'a>,
    result: &mut ClassifierResult,
) -> Result<Value<'a>, EvalError> {
    match expr {
        Expr::Str(s) => Ok(Value::Str(Cow::Borrowed(s))),
        Expr::Int(i) => Ok(Value::Int(*i)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Field(field) => field_value(*field, ctx),
        Expr::Not(inner) => Ok(Value::Bool(!eval_bool(inner, ctx, result, "!")?)),
        Expr::And(left, right) => {
            if !eval_bool(left, ctx, result, "&&")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval_bool(right, ctx, result, "&&")?))
        }
        Expr::Or(left, right) => {
            if eval_bool(left, ctx, result, "||")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval_bool(right, ctx, result, "||")?))
        }
        Expr::Compare(op, left, right) => {
            let left = eval(left, ctx, result)?;
            let right = eval(right, ctx, result)?;
            compare(*op, &left, &right).map(Value::Bool)
        }
        Expr::Matches(input, pattern) => {
            let input = eval_str(input, ctx, result, "matches")?;
            let matched = match pattern {
                Pattern::Compiled(regex) => regex.is_match(&input),
                Pattern::Dynamic(pattern) => {
                    let pattern = eval_str(pattern, ctx, result, "matches")?;
                    compile(&pattern)?.is_match(&input)
                }
            };
            Ok(Value::Bool(matched))
        }
        Expr::Call(call) => eval_call(call, ctx, result),
    }
}

fn eval_bool(
    expr: &Expr,
    ctx: &ClassifierContext<'_>,
    result: &mut ClassifierResult,
    op: &str,
) -> Result<bool, EvalError> {
    match eval(expr, ctx, result)? {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::Type(format!(
            "{op} expects bool, got {}",
            other.type_name()
        ))),
    }
}

fn eval_str<'a>(
    expr: &'a Expr,
    ctx: &ClassifierContext<'a>,
    result: &mut ClassifierResult,
    what: &str,
) -> Result<Cow<'a, str>, EvalError> {
    match eval(expr, ctx, result)? {
        Value::Str(s) => Ok(s),
        other => Err(EvalError::Type(format!(
            "{what} expects string, got {}",
            other.type_name()
        ))),
    }
}

fn field_value<'a>(field: Field, ctx: &ClassifierContext<'a>) -> Result<Value<'a>, EvalError> {
    let exporter = &ctx.exporter;
    if !field.is_interface() {
        return Ok(match field {
            Field::ExporterName => Value::Str(Cow::Borrowed(exporter.name)),
            _ => Value::Str(Cow::Owned(exporter.ip.to_canonical().to_string())),
        });
    }
    let iface = ctx
        .interface
        .as_ref()
        .ok_or(EvalError::MissingField("Interface"))?;
    Ok(match field {
        Field::InterfaceIndex => Value::Int(i64::from(iface.index)),
        Field::InterfaceName => Value::Str(Cow::Borrowed(iface.name)),
        Field::InterfaceDescription => Value::Str(Cow::Borrowed(iface.description)),
        Field::InterfaceSpeed => Value::Int(i64::try_from(iface.speed).unwrap_or(i64::MAX)),
        _ => Value::Int(i64::from(iface.vlan)),
    })
}

fn compare(op: CmpOp, left: &Value<'_>, right: &Value<'_>) -> Result<bool, EvalError> {
    let mismatch = || {
        EvalError::Type(format!(
            "invalid operation: {} {} {}",
            left.type_name(),
            op.symbol(),
            right.type_name()
        ))
    };
    match op {
        CmpOp::Eq | CmpOp::Ne => {
            let equal = match (left, right) {
                (Value::Str(a), Value::Str(b)) => a == b,
                (Value::Int(a), Value::Int(b)) => a == b,
                (Value::Bool(a), Value::Bool(b)) => a == b,
                _ => return Err(mismatch()),
            };
            Ok(equal == (op == CmpOp::Eq))
        }
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let (Value::Int(a), Value::Int(b)) = (left, right) else {
                return Err(mismatch());
            };
            Ok(match op {
                CmpOp::Lt => a < b,
                CmpOp::Le => a <= b,
                CmpOp::Gt => a > b,
                _ => a >= b,
            })
        }
        CmpOp::StartsWith | CmpOp::EndsWith | CmpOp::Contains => {
            let (Value::Str(a), Value::Str(b)) = (left, right) else {
                return Err(mismatch());
            };
            Ok(match op {
                CmpOp::StartsWith => a.starts_with(b.as_ref()),
                CmpOp::EndsWith => a.ends_with(b.as_ref()),
                _ => a.contains(b.as_ref()),
            })
        }
    }
}

fn eval_call<'a>(
    call: &'a Call,
    ctx: &ClassifierContext<'a>,
    result: &mut ClassifierResult,
) -> Result<Value<'a>, EvalError> {
    match call.builtin {
        Builtin::Classify(tag) => {
            let value = eval_str(&call.args[0], ctx, result, "Classify")?;
            result.set_tag(tag, &value);
            Ok(Value::Bool(true))
        }
        Builtin::ClassifyRegex(tag) => {
            let input = eval_str(&call.args[0], ctx, result, "ClassifyRegex")?;
            let template = eval_str(&call.args[2], ctx, result, "ClassifyRegex")?;
            let expanded = match &call.regex {
                Some(regex) => builtins::expand_regex(regex, &input, &template),
                None => {
                    let pattern = eval_str(&call.args[1], ctx, result, "ClassifyRegex")?;
                    builtins::expand_regex(&compile(&pattern)?, &input, &template)
                }
            };
            if expanded.is_empty() {
                return Ok(Value::Bool(false));
            }
            result.set_tag(tag, &expanded);
            Ok(Value::Bool(true))
        }
        Builtin::ClassifyExternal => {
            result.set_boundary(Boundary::External);
            Ok(Value::Bool(true))
        }
        Builtin::ClassifyInternal => {
            result.set_boundary(Boundary::Internal);
            Ok(Value::Bool(true))
        }
        Builtin::SetName => {
            let name = eval_str(&call.args[0], ctx, result, "SetName")?;
            result.set_name(&name);
            Ok(Value::Bool(true))
        }
        Builtin::SetDescription => {
            let description = eval_str(&call.args[0], ctx, result, "SetDescription")?;
            result.set_description(&description);
            Ok(Value::Bool(true))
        }
        Builtin::Reject => {
            result.reject();
            Ok(Value::Bool(true))
        }
        Builtin::Format => {
            let template = eval_str(&call.args[0], ctx, result, "Format")?;
            let args = call.args[1..]
                .iter()
                .map(|arg| eval(arg, ctx, result))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Str(Cow::Owned(builtins::format(&template, &args)?)))
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, EvalError> {
    Regex::new(pattern).map_err(|e| EvalError::Regex {
        pattern: pattern.to_owned(),
        reason: e.to_string(),
    })
}
