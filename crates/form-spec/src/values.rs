//! Read/write helpers over the JSON value tree addressed by [`FieldPath`].

use serde_json::{Map, Value};

use crate::error::{FormError, FormResult};
use crate::path::{FieldPath, Segment};

pub type FormValues = Value;

pub fn get<'a>(values: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    path.segments()
        .try_fold(values, |current, segment| match segment {
            Segment::Key(key) => current.as_object()?.get(key),
            Segment::Index(index) => match current {
                Value::Array(items) => items.get(index),
                Value::Object(map) => map.get(&index.to_string()),
                _ => None,
            },
        })
}

/// Value at `path`, treating a missing path as `null`.
pub fn get_or_null<'a>(values: &'a Value, path: &FieldPath) -> &'a Value {
    get(values, path).unwrap_or(&Value::Null)
}

/// Writes `value`, creating intermediate objects and arrays. An index may
/// address an existing item or the slot right after the last one.
pub fn set(values: &mut Value, path: &FieldPath, value: Value) -> FormResult<()> {
    let segments = path.segments().collect::<Vec<_>>();
    let mut current = values;
    for (position, segment) in segments.iter().enumerate() {
        let next_is_index = matches!(segments.get(position + 1), Some(Segment::Index(_)));
        if current.is_null() {
            *current = match segment {
                Segment::Key(_) => Value::Object(Map::new()),
                Segment::Index(_) => Value::Array(Vec::new()),
            };
        }
        let slot = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => {
                map.entry(key.to_string()).or_insert(Value::Null)
            }
            (Segment::Index(index), Value::Array(items)) => {
                if *index > items.len() {
                    return Err(FormError::ValueShape {
                        path: path.clone(),
                        reason: format!(
                            "index {} is past the end (length {})",
                            index,
                            items.len()
                        ),
                    });
                }
                if *index == items.len() {
                    items.push(Value::Null);
                }
                &mut items[*index]
            }
            (Segment::Index(index), Value::Object(map)) => {
                map.entry(index.to_string()).or_insert(Value::Null)
            }
            (_, other) => {
                return Err(FormError::ValueShape {
                    path: path.clone(),
                    reason: format!("cannot descend into {}", kind_name(other)),
                });
            }
        };
        if position + 1 == segments.len() {
            *slot = value;
            return Ok(());
        }
        if slot.is_null() && next_is_index {
            *slot = Value::Array(Vec::new());
        }
        current = slot;
    }
    Ok(())
}

pub fn array_mut<'a>(values: &'a mut Value, path: &FieldPath) -> FormResult<&'a mut Vec<Value>> {
    if get(values, path).is_none() {
        set(values, path, Value::Array(Vec::new()))?;
    }
    let mut current = values;
    for segment in path.segments() {
        current = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map
                .get_mut(key)
                .ok_or_else(|| FormError::NotAnArray(path.clone()))?,
            (Segment::Index(index), Value::Array(items)) => items
                .get_mut(index)
                .ok_or_else(|| FormError::NotAnArray(path.clone()))?,
            _ => return Err(FormError::NotAnArray(path.clone())),
        };
    }
    current
        .as_array_mut()
        .ok_or_else(|| FormError::NotAnArray(path.clone()))
}

/// Paths of every scalar leaf below `root` (or of `root` itself when scalar).
/// Empty objects and arrays contribute no leaves.
pub fn leaf_paths(value: &Value, root: Option<&FieldPath>) -> Vec<FieldPath> {
    let mut out = Vec::new();
    collect_leaves(value, root.map(|path| path.as_str().to_string()), &mut out);
    out
}

fn collect_leaves(value: &Value, prefix: Option<String>, out: &mut Vec<FieldPath>) {
    let child = |key: &str| match &prefix {
        Some(prefix) => format!("{prefix}.{key}"),
        None => key.to_string(),
    };
    match value {
        Value::Object(map) => {
            for (key, child_value) in map {
                collect_leaves(child_value, Some(child(key)), out);
            }
        }
        Value::Array(items) => {
            for (index, child_value) in items.iter().enumerate() {
                collect_leaves(child_value, Some(child(&index.to_string())), out);
            }
        }
        _ => {
            if let Some(raw) = prefix
                && let Ok(path) = FieldPath::parse(&raw)
            {
                out.push(path);
            }
        }
    }
}

/// Emptiness as seen by the `required` rule.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(_) => false,
    }
}

/// Removes every path in `excluded` from a copy of `values`.
pub fn without(values: &Value, excluded: &[FieldPath]) -> Value {
    let mut copy = values.clone();
    for path in excluded {
        remove(&mut copy, path);
    }
    copy
}

fn remove(values: &mut Value, path: &FieldPath) {
    let segments = path.segments().collect::<Vec<_>>();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut current = values;
    for segment in parents {
        let next = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get_mut(*key),
            (Segment::Index(index), Value::Array(items)) => items.get_mut(*index),
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => return,
        }
    }
    match (last, current) {
        (Segment::Key(key), Value::Object(map)) => {
            map.remove(*key);
        }
        (Segment::Index(index), Value::Array(items)) => {
            if let Some(slot) = items.get_mut(*index) {
                *slot = Value::Null;
            }
        }
        _ => {}
    }
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
