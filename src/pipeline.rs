use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::EngineError;
use crate::expr;
use crate::filter;
use crate::path::{get_path, set_path, unset_path};
use crate::registry::{self, StageOp};
use crate::value::{NULL, compare, deep_eq};

/// Run a pipeline over a materialized document sequence, folding the stages
/// left to right. Each stage is dispatched by its single key into the
/// stage-operator table; per-document stages are mapped over the sequence
/// with dropped (`None`) results removed, whole-sequence stages replace the
/// sequence with their return value. The input slice is never mutated.
///
/// # Errors
/// Returns `UnknownStageOperator` for an unregistered stage name before any
/// document is touched, `BadArgument` for a malformed stage mapping, and
/// whatever the stage itself raises. Any error aborts the whole pipeline.
pub fn aggregate(pipeline: &[Value], docs: &[Value]) -> Result<Vec<Value>, EngineError> {
    let mut current: Vec<Value> = docs.to_vec();
    for stage in pipeline {
        let (name, args) = single_entry(stage, "pipeline stage")?;
        let op = registry::stage_op(name)
            .ok_or_else(|| EngineError::UnknownStageOperator(name.to_string()))?;
        log::debug!("stage {name}: {} documents in", current.len());
        current = match op {
            StageOp::PerDoc(f) => {
                let mut out = Vec::with_capacity(current.len());
                for doc in &current {
                    if let Some(kept) = f(args, doc)? {
                        out.push(kept);
                    }
                }
                out
            }
            StageOp::Sequence(f) => f(args, current)?,
        };
    }
    Ok(current)
}

fn single_entry<'a>(v: &'a Value, what: &str) -> Result<(&'a str, &'a Value), EngineError> {
    if let Value::Object(map) = v
        && map.len() == 1
        && let Some((key, payload)) = map.iter().next()
    {
        return Ok((key.as_str(), payload));
    }
    Err(EngineError::BadArgument(format!("{what} must be a mapping with exactly one key")))
}

fn spec_object<'a>(op: &str, spec: &'a Value) -> Result<&'a Map<String, Value>, EngineError> {
    spec.as_object()
        .ok_or_else(|| EngineError::BadArgument(format!("{op} expects a mapping")))
}

fn count_arg(op: &str, spec: &Value) -> Result<usize, EngineError> {
    spec.as_u64()
        .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
        .ok_or_else(|| EngineError::BadArgument(format!("{op} expects a non-negative integer")))
}

fn is_literal(spec: &Value, n: f64) -> bool {
    crate::value::as_number(spec) == Some(n)
}

fn project(spec: &Value, doc: &Value) -> Result<Value, EngineError> {
    let fields = spec_object("$project", spec)?;
    let excluded: Vec<&String> =
        fields.iter().filter(|(_, v)| is_literal(v, 0.0)).map(|(k, _)| k).collect();
    if !excluded.is_empty() {
        // Exclusion mode: pass the document through minus the 0-valued keys.
        let mut out = doc.clone();
        for key in excluded {
            out = unset_path(&out, key);
        }
        return Ok(out);
    }
    // Inclusion mode: build fresh, one key per spec entry. A literal 1 copies
    // the field by path; anything else is an expression.
    let mut out = Map::new();
    for (key, v) in fields {
        if is_literal(v, 1.0) {
            if let Some(found) = get_path(doc, key) {
                out.insert(key.clone(), found.clone());
            }
        } else {
            out.insert(key.clone(), expr::evaluate(v, doc)?);
        }
    }
    Ok(Value::Object(out))
}

fn add_fields(spec: &Value, doc: &Value) -> Result<Value, EngineError> {
    let fields = spec_object("$addFields", spec)?;
    let mut out = doc.as_object().cloned().unwrap_or_default();
    // The original document is the evaluation context throughout, so fields
    // added in this stage cannot reference each other.
    for (key, e) in fields {
        out.insert(key.clone(), expr::evaluate(e, doc)?);
    }
    Ok(Value::Object(out))
}

fn sort(spec: &Value, mut docs: Vec<Value>) -> Result<Vec<Value>, EngineError> {
    let keys = spec_object("$sort", spec)?;
    let (field, direction) = match (keys.iter().next(), keys.len()) {
        (Some((field, d)), 1) => (field.as_str(), d),
        _ => {
            return Err(EngineError::BadArgument(
                "$sort expects exactly one {field: direction} entry".into(),
            ));
        }
    };
    let descending = match direction.as_i64() {
        Some(1) => false,
        Some(-1) => true,
        _ => {
            return Err(EngineError::BadArgument("$sort direction must be 1 or -1".into()));
        }
    };
    docs.sort_by(|a, b| {
        let ord = match (get_path(a, field), get_path(b, field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
        };
        if descending { ord.reverse() } else { ord }
    });
    Ok(docs)
}

fn group(spec: &Value, docs: Vec<Value>) -> Result<Vec<Value>, EngineError> {
    let fields = spec_object("$group", spec)?;
    let id_expr = fields
        .get("_id")
        .ok_or_else(|| EngineError::BadArgument("$group requires an _id expression".into()))?;
    // Validate accumulator shapes up front: one operator name per field.
    let mut accumulators: Vec<(&String, &String, &Value)> = Vec::new();
    for (field, def) in fields {
        if field == "_id" {
            continue;
        }
        match def.as_object() {
            Some(m) if m.len() == 1 => {
                if let Some((op_name, inner)) = m.iter().next() {
                    accumulators.push((field, op_name, inner));
                }
            }
            _ => {
                return Err(EngineError::BadArgument(format!(
                    "$group accumulator {field} must name exactly one operator"
                )));
            }
        }
    }

    // Partition by structurally-compared key, first-encounter order.
    struct Bucket {
        key: Value,
        collected: Vec<Vec<Value>>,
    }
    let mut buckets: Vec<Bucket> = Vec::new();
    for doc in &docs {
        let key = if id_expr.is_null() {
            Value::Null
        } else {
            expr::evaluate(id_expr, doc)?
        };
        let slot = match buckets.iter().position(|b| deep_eq(&b.key, &key)) {
            Some(i) => i,
            None => {
                buckets.push(Bucket { key, collected: vec![Vec::new(); accumulators.len()] });
                buckets.len() - 1
            }
        };
        for (i, (_, _, inner)) in accumulators.iter().enumerate() {
            buckets[slot].collected[i].push(expr::evaluate(inner, doc)?);
        }
    }

    // Reduce each collected column with the named expression operator, the
    // collected values standing in as its argument list.
    let mut out = Vec::with_capacity(buckets.len());
    for bucket in buckets {
        let mut doc = Map::new();
        doc.insert("_id".into(), bucket.key);
        for (i, (field, op_name, _)) in accumulators.iter().enumerate() {
            let op = registry::expr_op(op_name).ok_or_else(|| {
                EngineError::BadArgument(format!("$group: unknown accumulator operator {op_name}"))
            })?;
            doc.insert((*field).clone(), op(&bucket.collected[i], &NULL)?);
        }
        out.push(Value::Object(doc));
    }
    Ok(out)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnwindSpec {
    path: String,
    #[serde(default)]
    include_array_index: Option<String>,
    #[serde(default)]
    preserve_null_and_empty_arrays: bool,
}

fn unwind_spec(args: &Value) -> Result<UnwindSpec, EngineError> {
    match args {
        Value::String(path) => Ok(UnwindSpec {
            path: path.clone(),
            include_array_index: None,
            preserve_null_and_empty_arrays: false,
        }),
        other => serde_json::from_value(other.clone())
            .map_err(|e| EngineError::BadArgument(format!("$unwind: {e}"))),
    }
}

fn with_index(doc: Value, field: Option<&String>, index: Value) -> Value {
    match (doc, field) {
        (Value::Object(mut map), Some(field)) => {
            map.insert(field.clone(), index);
            Value::Object(map)
        }
        (doc, _) => doc,
    }
}

fn unwind(args: &Value, docs: Vec<Value>) -> Result<Vec<Value>, EngineError> {
    let spec = unwind_spec(args)?;
    let path = spec
        .path
        .strip_prefix('$')
        .ok_or_else(|| EngineError::BadArgument("$unwind path must be a $-field reference".into()))?;
    let index_field = spec.include_array_index.as_ref();
    let mut out = Vec::with_capacity(docs.len());
    for doc in &docs {
        match get_path(doc, path) {
            Some(Value::Array(items)) if !items.is_empty() => {
                for (i, item) in items.iter().enumerate() {
                    let rebuilt = set_path(doc, path, item.clone());
                    out.push(with_index(rebuilt, index_field, Value::from(i as u64)));
                }
            }
            Some(Value::Null) => {
                if spec.preserve_null_and_empty_arrays {
                    let rebuilt = set_path(doc, path, Value::Null);
                    out.push(with_index(rebuilt, index_field, Value::Null));
                }
            }
            None | Some(Value::Array(_)) => {
                // Absent field or empty array: the path key disappears.
                if spec.preserve_null_and_empty_arrays {
                    let rebuilt = unset_path(doc, path);
                    out.push(with_index(rebuilt, index_field, Value::Null));
                }
            }
            Some(_) => {
                // Scalar values pass through as a single document.
                out.push(with_index(doc.clone(), index_field, Value::Null));
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupSpec {
    from: Vec<Value>,
    #[serde(default)]
    local_field: Option<String>,
    #[serde(default)]
    foreign_field: Option<String>,
    #[serde(rename = "as")]
    as_field: String,
    #[serde(default, rename = "let")]
    let_vars: Option<Map<String, Value>>,
    #[serde(default)]
    pipeline: Option<Vec<Value>>,
}

// Typed substitution of `$$name` bindings into a correlated sub-pipeline:
// walk the literal pipeline tree and splice in the already-evaluated values,
// resolving any trailing path against the bound value.
fn substitute(node: &Value, bindings: &HashMap<String, Value>) -> Value {
    match node {
        Value::String(s) => {
            if let Some(token) = s.strip_prefix("$$") {
                let (name, rest) = match token.split_once('.') {
                    Some((name, rest)) => (name, Some(rest)),
                    None => (token, None),
                };
                if let Some(bound) = bindings.get(name) {
                    return match rest {
                        None => bound.clone(),
                        Some(rest) => get_path(bound, rest).cloned().unwrap_or(Value::Null),
                    };
                }
            }
            node.clone()
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| substitute(v, bindings)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter().map(|(k, v)| (k.clone(), substitute(v, bindings))).collect(),
        ),
        _ => node.clone(),
    }
}

fn lookup(args: &Value, docs: Vec<Value>) -> Result<Vec<Value>, EngineError> {
    let spec: LookupSpec = serde_json::from_value(args.clone())
        .map_err(|e| EngineError::BadArgument(format!("$lookup: {e}")))?;
    let mut out = Vec::with_capacity(docs.len());
    for doc in &docs {
        let joined: Vec<Value> = if let (Some(local_field), Some(foreign_field)) =
            (&spec.local_field, &spec.foreign_field)
        {
            let local = get_path(doc, local_field).unwrap_or(&NULL);
            spec.from
                .iter()
                .filter(|f| deep_eq(get_path(f, foreign_field).unwrap_or(&NULL), local))
                .cloned()
                .collect()
        } else if let Some(pipeline) = &spec.pipeline {
            let mut bindings = HashMap::new();
            if let Some(vars) = &spec.let_vars {
                for (name, e) in vars {
                    bindings.insert(name.clone(), expr::evaluate(e, doc)?);
                }
            }
            let substituted: Vec<Value> =
                pipeline.iter().map(|stage| substitute(stage, &bindings)).collect();
            aggregate(&substituted, &spec.from)?
        } else {
            return Err(EngineError::BadArgument(
                "$lookup requires localField/foreignField or a pipeline".into(),
            ));
        };
        // The original document is always extended, never replaced.
        let mut extended = doc.as_object().cloned().unwrap_or_default();
        extended.insert(spec.as_field.clone(), Value::Array(joined));
        out.push(Value::Object(extended));
    }
    Ok(out)
}

pub(crate) fn builtin_stages() -> HashMap<String, StageOp> {
    let mut ops: HashMap<String, StageOp> = HashMap::new();

    ops.insert(
        "$match".into(),
        StageOp::per_doc(|query, doc| {
            Ok(filter::matches(query, doc)?.then(|| doc.clone()))
        }),
    );
    ops.insert("$project".into(), StageOp::per_doc(|spec, doc| project(spec, doc).map(Some)));
    ops.insert(
        "$addFields".into(),
        StageOp::per_doc(|spec, doc| add_fields(spec, doc).map(Some)),
    );
    ops.insert("$sort".into(), StageOp::sequence(sort));
    ops.insert("$group".into(), StageOp::sequence(group));
    ops.insert(
        "$skip".into(),
        StageOp::sequence(|spec, docs| {
            let n = count_arg("$skip", spec)?;
            Ok(docs.into_iter().skip(n).collect())
        }),
    );
    ops.insert(
        "$limit".into(),
        StageOp::sequence(|spec, docs| {
            let n = count_arg("$limit", spec)?;
            Ok(docs.into_iter().take(n).collect())
        }),
    );
    ops.insert(
        "$count".into(),
        StageOp::sequence(|spec, docs| {
            let Value::String(name) = spec else {
                return Err(EngineError::BadArgument("$count expects a field name".into()));
            };
            let mut doc = Map::new();
            doc.insert(name.clone(), Value::from(docs.len() as u64));
            Ok(vec![Value::Object(doc)])
        }),
    );
    ops.insert("$unwind".into(), StageOp::sequence(unwind));
    ops.insert("$lookup".into(), StageOp::sequence(lookup));

    ops
}
