use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FormError, FormResult};
use crate::path::FieldPath;
use crate::spec::field::FieldRules;

/// When a field is validated before the first submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    OnBlur,
    OnChange,
    #[default]
    OnSubmit,
    /// First blur, then every change.
    OnTouched,
    All,
}

/// When a field is validated again after a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RevalidateMode {
    #[default]
    OnChange,
    OnBlur,
    OnSubmit,
}

/// A field declaration inside a [`FormSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldSpec {
    pub path: FieldPath,
    #[serde(flatten)]
    pub rules: FieldRules,
}

/// An item field relative to each entry of a field array, e.g. `number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ItemFieldSpec {
    pub path: String,
    #[serde(flatten)]
    pub rules: FieldRules,
}

fn default_min_entries() -> usize {
    1
}

fn default_values() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldArraySpec {
    pub path: FieldPath,
    /// Removing below this count fails; `0` allows an empty array.
    #[serde(default = "default_min_entries")]
    pub min_entries: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item_fields: Vec<ItemFieldSpec>,
}

/// Top-level form definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormSpec {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_values")]
    pub default_values: Value,
    #[serde(default)]
    pub mode: ValidationMode,
    #[serde(default)]
    pub revalidate_mode: RevalidateMode,
    /// Glob patterns over field paths, e.g. `social.*`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arrays: Vec<FieldArraySpec>,
}

impl FormSpec {
    pub fn from_json(raw: &str) -> FormResult<Self> {
        serde_json::from_str(raw).map_err(FormError::Spec)
    }

    pub fn schema() -> Value {
        serde_json::to_value(schemars::schema_for!(FormSpec)).unwrap_or(Value::Null)
    }
}
