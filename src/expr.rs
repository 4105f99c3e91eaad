use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::EngineError;
use crate::path::get_path;
use crate::registry::{self, ExprOp};
use crate::value::{as_number, compare, deep_eq, number, render, truthy};

/// Evaluate an expression against a context document.
///
/// A string starting with `$` is a field reference resolved by path (`Null`
/// when absent). A single-key mapping whose key names a registered expression
/// operator dispatches into the operator table, with the payload auto-wrapped
/// into an argument list if it is not one already; a mapping whose key is not
/// registered falls back to the literal mapping un-evaluated. Everything else
/// is a literal returned unchanged.
///
/// # Errors
/// Propagates whatever a dispatched operator raises; the literal fallback for
/// unknown operator names is deliberate and not an error.
pub fn evaluate(expr: &Value, context: &Value) -> Result<Value, EngineError> {
    match expr {
        Value::String(s) => {
            if let Some(path) = s.strip_prefix('$') {
                return Ok(get_path(context, path).cloned().unwrap_or(Value::Null));
            }
            Ok(expr.clone())
        }
        Value::Object(map) if map.len() == 1 => {
            if let Some((name, payload)) = map.iter().next()
                && let Some(op) = registry::expr_op(name)
            {
                let args = match payload {
                    Value::Array(items) => items.as_slice(),
                    other => std::slice::from_ref(other),
                };
                return op(args, context);
            }
            Ok(expr.clone())
        }
        _ => Ok(expr.clone()),
    }
}

/// Curried adapter over [`evaluate`].
pub fn expression(expr: Value) -> impl Fn(&Value) -> Result<Value, EngineError> {
    move |context| evaluate(&expr, context)
}

fn eval_args(args: &[Value], context: &Value) -> Result<Vec<Value>, EngineError> {
    args.iter().map(|a| evaluate(a, context)).collect()
}

fn numeric_args(op: &str, args: &[Value], context: &Value) -> Result<Vec<f64>, EngineError> {
    eval_args(args, context)?
        .iter()
        .map(|v| {
            as_number(v)
                .ok_or_else(|| EngineError::TypeMismatch(format!("{op}: non-numeric operand {v}")))
        })
        .collect()
}

// Evaluate every argument and flatten one array level across the results, so
// `{$max: ['$a', '$b']}` and `{$max: '$scores'}` both reduce over a flat list.
fn flat_args(args: &[Value], context: &Value) -> Result<Vec<Value>, EngineError> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match evaluate(arg, context)? {
            Value::Array(items) => out.extend(items),
            v => out.push(v),
        }
    }
    Ok(out)
}

fn flat_numbers(op: &str, args: &[Value], context: &Value) -> Result<Vec<f64>, EngineError> {
    flat_args(args, context)?
        .iter()
        .map(|v| {
            as_number(v)
                .ok_or_else(|| EngineError::TypeMismatch(format!("{op}: non-numeric operand {v}")))
        })
        .collect()
}

fn pair<'a>(op: &str, args: &'a [Value]) -> Result<(&'a Value, &'a Value), EngineError> {
    if args.len() == 2 {
        Ok((&args[0], &args[1]))
    } else {
        Err(EngineError::BadArgument(format!("{op} expects exactly two operands")))
    }
}

fn fold_op(name: &'static str, seed: f64, fold: fn(f64, f64) -> f64) -> (String, ExprOp) {
    let op: ExprOp = Arc::new(move |args, context| {
        Ok(number(numeric_args(name, args, context)?.into_iter().fold(seed, fold)))
    });
    (name.to_string(), op)
}

fn seedless_fold_op(name: &'static str, fold: fn(f64, f64) -> f64) -> (String, ExprOp) {
    let op: ExprOp = Arc::new(move |args, context| {
        let mut ns = numeric_args(name, args, context)?.into_iter();
        let first = ns
            .next()
            .ok_or_else(|| EngineError::BadArgument(format!("{name} expects at least one operand")))?;
        Ok(number(ns.fold(first, fold)))
    });
    (name.to_string(), op)
}

fn compare_op(name: &'static str, accept: fn(Ordering) -> bool) -> (String, ExprOp) {
    let op: ExprOp = Arc::new(move |args, context| {
        let (a, b) = pair(name, args)?;
        let (a, b) = (evaluate(a, context)?, evaluate(b, context)?);
        Ok(Value::Bool(compare(&a, &b).is_some_and(accept)))
    });
    (name.to_string(), op)
}

fn extreme_op(name: &'static str, keep: Ordering) -> (String, ExprOp) {
    let op: ExprOp = Arc::new(move |args, context| {
        let mut best: Option<Value> = None;
        for v in flat_args(args, context)? {
            if v.is_null() {
                continue;
            }
            best = Some(match best {
                None => v,
                Some(b) => {
                    if compare(&v, &b) == Some(keep) {
                        v
                    } else {
                        b
                    }
                }
            });
        }
        Ok(best.unwrap_or(Value::Null))
    });
    (name.to_string(), op)
}

fn membership(args: &[Value], context: &Value, op: &str) -> Result<bool, EngineError> {
    let (needle, haystack) = pair(op, args)?;
    let needle = evaluate(needle, context)?;
    let haystack = evaluate(haystack, context)?;
    let items = match &haystack {
        Value::Array(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    };
    Ok(items.iter().any(|x| deep_eq(x, &needle)))
}

pub(crate) fn builtin_ops() -> HashMap<String, ExprOp> {
    let mut ops: HashMap<String, ExprOp> = HashMap::new();

    ops.extend([
        fold_op("$add", 0.0, |a, b| a + b),
        fold_op("$multiply", 1.0, |a, b| a * b),
        seedless_fold_op("$subtract", |a, b| a - b),
        seedless_fold_op("$divide", |a, b| a / b),
    ]);
    ops.insert(
        "$concat".into(),
        Arc::new(|args, context| {
            let parts = eval_args(args, context)?;
            Ok(Value::String(parts.iter().map(render).collect()))
        }),
    );
    ops.extend([
        extreme_op("$min", Ordering::Less),
        extreme_op("$max", Ordering::Greater),
    ]);
    ops.insert(
        "$sum".into(),
        Arc::new(|args, context| {
            Ok(number(flat_numbers("$sum", args, context)?.into_iter().sum()))
        }),
    );
    ops.insert(
        "$avg".into(),
        Arc::new(|args, context| {
            let ns = flat_numbers("$avg", args, context)?;
            if ns.is_empty() {
                return Ok(Value::Null);
            }
            #[allow(clippy::cast_precision_loss)]
            let len = ns.len() as f64;
            Ok(number(ns.into_iter().sum::<f64>() / len))
        }),
    );
    ops.insert(
        "$cond".into(),
        Arc::new(|args, context| {
            let [condition, when_true, when_false] = args else {
                return Err(EngineError::BadArgument(
                    "$cond expects [condition, then, else]".into(),
                ));
            };
            if truthy(&evaluate(condition, context)?) {
                evaluate(when_true, context)
            } else {
                evaluate(when_false, context)
            }
        }),
    );
    ops.insert(
        "$eq".into(),
        Arc::new(|args, context| {
            let (a, b) = pair("$eq", args)?;
            Ok(Value::Bool(deep_eq(&evaluate(a, context)?, &evaluate(b, context)?)))
        }),
    );
    ops.insert(
        "$ne".into(),
        Arc::new(|args, context| {
            let (a, b) = pair("$ne", args)?;
            Ok(Value::Bool(!deep_eq(&evaluate(a, context)?, &evaluate(b, context)?)))
        }),
    );
    ops.extend([
        compare_op("$gt", |o| o == Ordering::Greater),
        compare_op("$gte", |o| o != Ordering::Less),
        compare_op("$lt", |o| o == Ordering::Less),
        compare_op("$lte", |o| o != Ordering::Greater),
    ]);
    ops.insert(
        "$in".into(),
        Arc::new(|args, context| Ok(Value::Bool(membership(args, context, "$in")?))),
    );
    ops.insert(
        "$nin".into(),
        Arc::new(|args, context| Ok(Value::Bool(!membership(args, context, "$nin")?))),
    );
    ops.insert(
        "$and".into(),
        Arc::new(|args, context| {
            for arg in args {
                if !truthy(&evaluate(arg, context)?) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }),
    );
    ops.insert(
        "$or".into(),
        Arc::new(|args, context| {
            for arg in args {
                if truthy(&evaluate(arg, context)?) {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }),
    );
    ops.insert(
        "$not".into(),
        Arc::new(|args, context| {
            let [arg] = args else {
                return Err(EngineError::BadArgument("$not expects one operand".into()));
            };
            Ok(Value::Bool(!truthy(&evaluate(arg, context)?)))
        }),
    );
    ops.insert(
        "$switch".into(),
        Arc::new(|args, context| {
            let spec = args.first().and_then(Value::as_object).ok_or_else(|| {
                EngineError::BadArgument("$switch expects {branches, default?}".into())
            })?;
            let branches = spec.get("branches").and_then(Value::as_array).ok_or_else(|| {
                EngineError::BadArgument("$switch requires a branches list".into())
            })?;
            for branch in branches {
                let (Some(case), Some(then)) =
                    (get_path(branch, "case"), get_path(branch, "then"))
                else {
                    return Err(EngineError::BadArgument(
                        "$switch branches need case and then".into(),
                    ));
                };
                if truthy(&evaluate(case, context)?) {
                    return evaluate(then, context);
                }
            }
            match spec.get("default") {
                Some(default) => evaluate(default, context),
                None => Err(EngineError::BadArgument(
                    "$switch: no branch matched and no default given".into(),
                )),
            }
        }),
    );

    ops
}
