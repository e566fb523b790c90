use serde::{Deserialize, Serialize};

use crate::error::FieldError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub touched: bool,
    pub dirty: bool,
    /// At least one validation pass covered the field since the last reset.
    pub validated: bool,
    /// An async validation is in flight.
    pub validating: bool,
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FieldError>,
}

impl FieldMeta {
    pub fn status(&self) -> FieldStatus {
        match (self.validated, &self.error) {
            (true, None) => FieldStatus::Valid,
            (true, Some(_)) => FieldStatus::Invalid,
            // manual errors count as a verdict as well
            (false, Some(_)) => FieldStatus::Invalid,
            (false, None) if self.touched => FieldStatus::Touched,
            (false, None) => FieldStatus::Pristine,
        }
    }

    pub(crate) fn clear(&mut self) {
        let disabled = self.disabled;
        *self = FieldMeta {
            disabled,
            ..FieldMeta::default()
        };
    }
}

/// Per-field lifecycle: `Pristine -> Touched -> Valid | Invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Pristine,
    Touched,
    Valid,
    Invalid,
}

impl FieldStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldStatus::Pristine => "pristine",
            FieldStatus::Touched => "touched",
            FieldStatus::Valid => "valid",
            FieldStatus::Invalid => "invalid",
        }
    }
}

/// Form-level flags derived from the field meta and the submission lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    pub is_dirty: bool,
    pub is_valid: bool,
    pub is_validating: bool,
    pub is_submitting: bool,
    pub is_submitted: bool,
    pub is_submit_successful: bool,
    pub submit_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SubmitState {
    pub(crate) is_submitting: bool,
    pub(crate) is_submitted: bool,
    pub(crate) is_submit_successful: bool,
    pub(crate) submit_count: u32,
}
