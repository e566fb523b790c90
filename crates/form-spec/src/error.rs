use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::FieldPath;

/// Misuse of the session API. Validation failures never surface here; they are
/// stored as [`FieldError`] on the field meta.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid field path '{0}'")]
    InvalidPath(String),
    #[error("field '{path}' is already registered as {existing}, cannot register as {requested}")]
    ConflictingRegistration {
        path: FieldPath,
        existing: String,
        requested: String,
    },
    #[error("field '{0}' is not registered")]
    UnknownField(FieldPath),
    #[error("invalid pattern for '{path}': {source}")]
    InvalidPattern {
        path: FieldPath,
        #[source]
        source: regex::Error,
    },
    #[error("invalid disabled field pattern: {0}")]
    InvalidGlob(#[source] globset::Error),
    #[error("value at '{0}' is not an array")]
    NotAnArray(FieldPath),
    #[error("'{0}' is not a declared field array")]
    UnknownFieldArray(FieldPath),
    #[error("index {index} is out of bounds for '{path}' (length {len})")]
    IndexOutOfBounds {
        path: FieldPath,
        index: usize,
        len: usize,
    },
    #[error("'{path}' must keep at least {min} entries")]
    MinEntries { path: FieldPath, min: usize },
    #[error("cannot write '{path}': {reason}")]
    ValueShape { path: FieldPath, reason: String },
    #[error("failed to parse form spec: {0}")]
    Spec(#[source] serde_json::Error),
}

pub type FormResult<T> = Result<T, FormError>;

/// Which rule rejected a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorKind {
    Required,
    MinLength,
    MaxLength,
    Min,
    Max,
    Pattern,
    Custom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rule: Option<String>,
    },
    Coercion,
    Async,
    Manual,
}

impl ErrorKind {
    pub fn code(&self) -> &str {
        match self {
            ErrorKind::Required => "required",
            ErrorKind::MinLength => "min_length",
            ErrorKind::MaxLength => "max_length",
            ErrorKind::Min => "min",
            ErrorKind::Max => "max",
            ErrorKind::Pattern => "pattern",
            ErrorKind::Custom { rule: Some(rule) } => rule,
            ErrorKind::Custom { rule: None } => "validate",
            ErrorKind::Coercion => "coercion",
            ErrorKind::Async => "async",
            ErrorKind::Manual => "manual",
        }
    }
}

/// The single error shown for a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FieldError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub type ErrorMap = BTreeMap<FieldPath, FieldError>;
