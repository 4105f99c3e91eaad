use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;

use crate::errors::EngineError;
use crate::path::get_path;
use crate::registry::{self, FilterOp};
use crate::value::{NULL, as_number, compare, deep_eq, truthy, type_name};

/// Evaluate a query against one document.
///
/// A mapping query matches iff every entry matches: `$`-prefixed keys
/// dispatch into the filter-operator table against the current value, other
/// keys descend by path and match recursively. A non-mapping query is an
/// implicit deep-equality test.
///
/// # Errors
/// Returns `UnknownFilterOperator` for an unregistered operator key, and
/// whatever the operator itself raises for a malformed operand.
pub fn matches(query: &Value, doc: &Value) -> Result<bool, EngineError> {
    matches_value(query, Some(doc))
}

/// Curried adapter over [`matches`] for iterator chains.
pub fn filter(query: Value) -> impl Fn(&Value) -> Result<bool, EngineError> {
    move |doc| matches(&query, doc)
}

pub(crate) fn matches_value(query: &Value, value: Option<&Value>) -> Result<bool, EngineError> {
    if let Value::Object(clauses) = query {
        for (key, operand) in clauses {
            let hit = if key.starts_with('$') {
                let op = registry::filter_op(key)
                    .ok_or_else(|| EngineError::UnknownFilterOperator(key.clone()))?;
                op(operand, value)?
            } else {
                matches_value(operand, value.and_then(|v| get_path(v, key)))?
            };
            if !hit {
                return Ok(false);
            }
        }
        return Ok(true);
    }
    Ok(value.is_some_and(|v| deep_eq(v, query)))
}

// Host predicates backing `$where`. A query names a predicate by string and
// the predicate sees the current value; registration is last-wins like the
// operator tables.
type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

static PREDICATES: Lazy<RwLock<HashMap<String, Predicate>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register a named host predicate usable as `{"$where": "name"}`.
pub fn register_predicate<F>(name: &str, pred: F)
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    log::info!("registering $where predicate {name}");
    PREDICATES.write().insert(name.to_string(), Arc::new(pred));
}

fn as_slice(operand: &Value) -> &[Value] {
    match operand {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    }
}

fn sub_queries<'a>(op: &str, operand: &'a Value) -> Result<&'a [Value], EngineError> {
    match operand {
        Value::Array(items) => Ok(items),
        _ => Err(EngineError::BadArgument(format!("{op} expects a list of queries"))),
    }
}

fn ordering_op(
    name: &'static str,
    accept: fn(Ordering) -> bool,
) -> (String, FilterOp) {
    let op: FilterOp = Arc::new(move |operand, value| {
        Ok(value.and_then(|v| compare(v, operand)).is_some_and(accept))
    });
    (name.to_string(), op)
}

pub(crate) fn builtin_ops() -> HashMap<String, FilterOp> {
    let mut ops: HashMap<String, FilterOp> = HashMap::new();

    ops.insert(
        "$eq".into(),
        Arc::new(|operand, value| Ok(value.is_some_and(|v| deep_eq(v, operand)))),
    );
    ops.insert(
        "$ne".into(),
        Arc::new(|operand, value| Ok(!value.is_some_and(|v| deep_eq(v, operand)))),
    );
    ops.extend([
        ordering_op("$gt", |o| o == Ordering::Greater),
        ordering_op("$gte", |o| o != Ordering::Less),
        ordering_op("$lt", |o| o == Ordering::Less),
        ordering_op("$lte", |o| o != Ordering::Greater),
    ]);
    ops.insert(
        "$in".into(),
        Arc::new(|operand, value| {
            Ok(value.is_some_and(|v| as_slice(operand).iter().any(|x| deep_eq(x, v))))
        }),
    );
    ops.insert(
        "$nin".into(),
        Arc::new(|operand, value| {
            Ok(!value.is_some_and(|v| as_slice(operand).iter().any(|x| deep_eq(x, v))))
        }),
    );
    ops.insert(
        "$and".into(),
        Arc::new(|operand, value| {
            for clause in sub_queries("$and", operand)? {
                if !matches_value(clause, value)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }),
    );
    ops.insert(
        "$or".into(),
        Arc::new(|operand, value| {
            for clause in sub_queries("$or", operand)? {
                if matches_value(clause, value)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }),
    );
    ops.insert("$not".into(), Arc::new(|operand, value| Ok(!matches_value(operand, value)?)));
    #[cfg(feature = "regex")]
    ops.insert(
        "$regex".into(),
        Arc::new(|operand, value| {
            let Value::String(pattern) = operand else {
                return Err(EngineError::BadArgument("$regex pattern must be a string".into()));
            };
            let re = regex::Regex::new(pattern)
                .map_err(|e| EngineError::BadArgument(format!("$regex: {e}")))?;
            Ok(matches!(value, Some(Value::String(s)) if re.is_match(s)))
        }),
    );
    ops.insert(
        "$expr".into(),
        Arc::new(|operand, value| {
            Ok(truthy(&crate::expr::evaluate(operand, value.unwrap_or(&NULL))?))
        }),
    );
    ops.insert(
        "$exists".into(),
        Arc::new(|operand, value| {
            let want = operand.as_bool().ok_or_else(|| {
                EngineError::BadArgument("$exists expects a boolean operand".into())
            })?;
            Ok(value.is_some() == want)
        }),
    );
    ops.insert(
        "$type".into(),
        Arc::new(|operand, value| {
            let Value::String(tag) = operand else {
                return Err(EngineError::BadArgument("$type expects a type name".into()));
            };
            Ok(value.is_some_and(|v| type_name(v) == tag))
        }),
    );
    ops.insert(
        "$mod".into(),
        Arc::new(|operand, value| {
            let pair = operand.as_array().filter(|a| a.len() == 2).ok_or_else(|| {
                EngineError::BadArgument("$mod expects [divisor, remainder]".into())
            })?;
            let (Some(div), Some(rem)) = (as_number(&pair[0]), as_number(&pair[1])) else {
                return Err(EngineError::BadArgument("$mod operands must be numeric".into()));
            };
            #[allow(clippy::float_cmp)]
            let hit = value.and_then(as_number).is_some_and(|n| n % div == rem);
            Ok(hit)
        }),
    );
    ops.insert(
        "$elemMatch".into(),
        Arc::new(|operand, value| {
            let Some(v) = value else { return Ok(false) };
            for item in as_slice(v) {
                if matches_value(operand, Some(item))? {
                    return Ok(true);
                }
            }
            Ok(false)
        }),
    );
    ops.insert(
        "$all".into(),
        Arc::new(|operand, value| {
            let wanted = sub_queries("$all", operand)?;
            let Some(Value::Array(items)) = value else { return Ok(false) };
            for clause in wanted {
                let mut hit = false;
                for item in items {
                    if matches_value(clause, Some(item))? {
                        hit = true;
                        break;
                    }
                }
                if !hit {
                    return Ok(false);
                }
            }
            Ok(true)
        }),
    );
    ops.insert(
        "$size".into(),
        Arc::new(|operand, value| {
            let want = operand.as_u64().ok_or_else(|| {
                EngineError::BadArgument("$size expects a non-negative integer".into())
            })?;
            Ok(matches!(value, Some(Value::Array(items)) if items.len() as u64 == want))
        }),
    );
    ops.insert(
        "$where".into(),
        Arc::new(|operand, value| {
            let Value::String(name) = operand else {
                return Err(EngineError::BadArgument("$where expects a predicate name".into()));
            };
            let pred = PREDICATES
                .read()
                .get(name)
                .cloned()
                .ok_or_else(|| EngineError::UnknownPredicate(name.clone()))?;
            Ok(value.is_some_and(|v| pred(v)))
        }),
    );

    ops
}
