use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::array::FieldArrayEntry;
use crate::error::ErrorMap;
use crate::meta::{FieldMeta, FieldStatus, FormState};
use crate::path::FieldPath;
use crate::session::FormSession;
use crate::values;

/// One row of the inspection panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSnapshot {
    pub path: FieldPath,
    pub value: Value,
    pub default: Value,
    pub meta: FieldMeta,
    pub status: FieldStatus,
    pub registered: bool,
}

/// Read-only copy of everything a developer panel shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub form_id: String,
    pub state: FormState,
    pub values: Value,
    pub default_values: Value,
    pub fields: Vec<FieldSnapshot>,
    pub arrays: BTreeMap<FieldPath, Vec<FieldArrayEntry>>,
    pub errors: ErrorMap,
}

impl FormSession {
    pub fn snapshot(&self) -> Snapshot {
        let fields = self
            .meta
            .iter()
            .map(|(path, meta)| FieldSnapshot {
                path: path.clone(),
                value: values::get_or_null(&self.values, path).clone(),
                default: values::get_or_null(&self.defaults, path).clone(),
                meta: meta.clone(),
                status: meta.status(),
                registered: self.registry.contains(path),
            })
            .collect();
        let arrays = self
            .field_array_paths()
            .into_iter()
            .filter_map(|path| {
                let entries = self.fields(&path).ok()?;
                Some((path, entries))
            })
            .collect();

        Snapshot {
            form_id: self.id.clone(),
            state: self.form_state(),
            values: self.values.clone(),
            default_values: self.defaults.clone(),
            fields,
            arrays,
            errors: self.errors(),
        }
    }
}

/// Render the snapshot as a JSON value keyed the way the panel consumes it.
pub fn render_json(snapshot: &Snapshot) -> Value {
    let fields = snapshot
        .fields
        .iter()
        .map(|field| {
            let mut map = Map::new();
            map.insert("path".into(), Value::String(field.path.to_string()));
            map.insert("value".into(), field.value.clone());
            map.insert("status".into(), Value::String(field.status.as_str().into()));
            map.insert("touched".into(), Value::Bool(field.meta.touched));
            map.insert("dirty".into(), Value::Bool(field.meta.dirty));
            map.insert("disabled".into(), Value::Bool(field.meta.disabled));
            map.insert("registered".into(), Value::Bool(field.registered));
            if field.meta.validating {
                map.insert("validating".into(), Value::Bool(true));
            }
            if let Some(error) = &field.meta.error {
                map.insert(
                    "error".into(),
                    json!({ "type": error.kind.code(), "message": error.message }),
                );
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    let arrays = snapshot
        .arrays
        .iter()
        .map(|(path, entries)| {
            let ids = entries
                .iter()
                .map(|entry| Value::String(entry.id.to_string()))
                .collect::<Vec<_>>();
            (path.to_string(), Value::Array(ids))
        })
        .collect::<Map<_, _>>();

    json!({
        "form_id": snapshot.form_id,
        "state": snapshot.state,
        "values": snapshot.values,
        "fields": fields,
        "arrays": arrays,
        "error_count": snapshot.errors.len(),
    })
}

/// Render the snapshot as human-friendly text.
pub fn render_text(snapshot: &Snapshot) -> String {
    let state = &snapshot.state;
    let mut lines = Vec::new();
    lines.push(format!("Form: {}", snapshot.form_id));
    lines.push(format!(
        "State: {} {} (submitted {} times)",
        if state.is_valid { "valid" } else { "invalid" },
        if state.is_dirty { "dirty" } else { "pristine" },
        state.submit_count
    ));
    if state.is_validating {
        lines.push("Async validation in flight.".to_string());
    }

    lines.push("Fields:".to_string());
    for field in &snapshot.fields {
        let mut entry = format!(
            " - {} = {} [{}]",
            field.path,
            value_to_display(&field.value),
            field.status.as_str()
        );
        if field.meta.dirty {
            entry.push_str(" [dirty]");
        }
        if field.meta.touched {
            entry.push_str(" [touched]");
        }
        if field.meta.disabled {
            entry.push_str(" [disabled]");
        }
        if let Some(error) = &field.meta.error {
            entry.push_str(&format!(" ! {}", error.message));
        }
        lines.push(entry);
    }

    for (path, entries) in &snapshot.arrays {
        lines.push(format!("Array {} ({} entries)", path, entries.len()));
    }

    if snapshot.errors.is_empty() {
        lines.push("No errors.".to_string());
    } else {
        lines.push(format!("Errors: {}", snapshot.errors.len()));
    }

    lines.join("\n")
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
