use serde_json::{Map, Value};

/// Resolve a dot-delimited path against a document. Resolution short-circuits
/// to `None` the moment an intermediate is missing or not a container; array
/// segments are read by numeric index.
#[must_use]
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = doc;
    for seg in path.split('.') {
        cur = step(cur, seg)?;
    }
    Some(cur)
}

/// `get_path` over pre-split segments.
#[must_use]
pub fn get_parts<'a>(doc: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    let mut cur = doc;
    for seg in parts {
        cur = step(cur, seg)?;
    }
    Some(cur)
}

fn step<'a>(cur: &'a Value, seg: &str) -> Option<&'a Value> {
    match cur {
        Value::Object(map) => map.get(seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Copy-on-write path write: returns a new document with exactly the
/// addressed slot replaced. Missing intermediates are created as arrays when
/// the following segment parses as a non-negative integer, as objects
/// otherwise; a scalar in the way is replaced by a fresh container. Array
/// indexes beyond the current length append.
#[must_use]
pub fn set_path(doc: &Value, path: &str, value: Value) -> Value {
    let parts: Vec<&str> = path.split('.').collect();
    set_parts(doc, &parts, value)
}

/// `set_path` over pre-split segments.
#[must_use]
pub fn set_parts(doc: &Value, parts: &[&str], value: Value) -> Value {
    let Some((head, rest)) = parts.split_first() else {
        return value;
    };
    match doc {
        Value::Object(map) => {
            let slot = if rest.is_empty() {
                value
            } else {
                descend(map.get(*head), rest, value)
            };
            let mut out = map.clone();
            out.insert((*head).to_string(), slot);
            Value::Object(out)
        }
        Value::Array(items) => {
            let idx = head.parse::<usize>().ok();
            let slot = if rest.is_empty() {
                value
            } else {
                descend(idx.and_then(|i| items.get(i)), rest, value)
            };
            let mut out = items.clone();
            match idx {
                Some(i) if i < out.len() => out[i] = slot,
                _ => out.push(slot),
            }
            Value::Array(out)
        }
        _ => {
            let slot =
                if rest.is_empty() { value } else { descend(None, rest, value) };
            let mut out = Map::new();
            out.insert((*head).to_string(), slot);
            Value::Object(out)
        }
    }
}

fn descend(child: Option<&Value>, rest: &[&str], value: Value) -> Value {
    match child {
        Some(v @ (Value::Object(_) | Value::Array(_))) => set_parts(v, rest, value),
        _ if rest[0].parse::<usize>().is_ok() => {
            set_parts(&Value::Array(Vec::new()), rest, value)
        }
        _ => set_parts(&Value::Object(Map::new()), rest, value),
    }
}

/// Copy-on-write removal of the addressed slot. Paths through missing or
/// scalar intermediates leave the document unchanged.
#[must_use]
pub fn unset_path(doc: &Value, path: &str) -> Value {
    let parts: Vec<&str> = path.split('.').collect();
    unset_parts(doc, &parts)
}

fn unset_parts(doc: &Value, parts: &[&str]) -> Value {
    let Some((head, rest)) = parts.split_first() else {
        return doc.clone();
    };
    match doc {
        Value::Object(map) => {
            let mut out = map.clone();
            if rest.is_empty() {
                out.remove(*head);
            } else if let Some(child) = map.get(*head) {
                out.insert((*head).to_string(), unset_parts(child, rest));
            }
            Value::Object(out)
        }
        Value::Array(items) => match head.parse::<usize>() {
            Ok(i) if i < items.len() => {
                let mut out = items.clone();
                if rest.is_empty() {
                    out.remove(i);
                } else {
                    out[i] = unset_parts(&items[i], rest);
                }
                Value::Array(out)
            }
            _ => doc.clone(),
        },
        _ => doc.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_descends_objects_and_arrays() {
        let doc = json!({"a": {"b": [{"c": 7}]}});
        assert_eq!(get_path(&doc, "a.b.0.c"), Some(&json!(7)));
        assert_eq!(get_path(&doc, "a.x.c"), None);
        assert_eq!(get_parts(&doc, &["a", "b"]), Some(&json!([{"c": 7}])));
    }

    #[test]
    fn set_replaces_without_mutating_the_input() {
        let doc = json!({"a": {"b": 1}, "k": [1, 2]});
        let out = set_path(&doc, "a.b", json!(9));
        assert_eq!(out, json!({"a": {"b": 9}, "k": [1, 2]}));
        assert_eq!(doc, json!({"a": {"b": 1}, "k": [1, 2]}));
    }

    #[test]
    fn set_creates_intermediates_by_next_segment() {
        assert_eq!(set_path(&json!({}), "a.0", json!("x")), json!({"a": ["x"]}));
        assert_eq!(set_path(&json!({}), "a.b", json!("x")), json!({"a": {"b": "x"}}));
    }

    #[test]
    fn unset_removes_nested_slots() {
        let doc = json!({"a": {"b": 1, "c": 2}});
        assert_eq!(unset_path(&doc, "a.b"), json!({"a": {"c": 2}}));
        assert_eq!(unset_path(&doc, "a.x.y"), doc);
    }
}
