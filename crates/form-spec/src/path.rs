use std::fmt::{Display, Formatter};
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FormError;

/// Dot separated address into the value tree, e.g. `phNumbers.0.number`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct FieldPath(String);

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, FormError> {
        if raw.is_empty() || raw.split('.').any(str::is_empty) {
            return Err(FormError::InvalidPath(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = Segment<'_>> {
        self.0.split('.').map(|segment| match segment.parse::<usize>() {
            Ok(index) if segment.bytes().all(|byte| byte.is_ascii_digit()) => {
                Segment::Index(index)
            }
            _ => Segment::Key(segment),
        })
    }

    pub fn depth(&self) -> usize {
        self.0.split('.').count()
    }

    /// Appends a relative path (which may itself contain dots).
    pub fn join(&self, relative: &str) -> Result<Self, FormError> {
        Self::parse(&format!("{}.{}", self.0, relative))
    }

    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}.{}", self.0, index))
    }

    /// True when `self` equals `prefix` or lies underneath it.
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0 == prefix.0
            || (self.0.len() > prefix.0.len()
                && self.0.starts_with(&prefix.0)
                && self.0.as_bytes()[prefix.0.len()] == b'.')
    }

    /// True when one of the two paths contains the other.
    pub fn overlaps(&self, other: &FieldPath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }

    /// Splits `array.N.rest` into `(N, rest)` for paths below `array`.
    pub fn array_position(&self, array: &FieldPath) -> Option<(usize, Option<&str>)> {
        if !self.starts_with(array) || self.0.len() == array.0.len() {
            return None;
        }
        let tail = &self.0[array.0.len() + 1..];
        let (head, rest) = match tail.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (tail, None),
        };
        if !head.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        head.parse().ok().map(|index| (index, rest))
    }

    /// Rebuilds `array.N.rest` with a new index.
    pub fn with_array_index(&self, array: &FieldPath, index: usize) -> Option<Self> {
        let (_, rest) = self.array_position(array)?;
        Some(match rest {
            Some(rest) => Self(format!("{}.{}.{}", array.0, index, rest)),
            None => array.index(index),
        })
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FieldPath {
    type Err = FormError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for FieldPath {
    type Error = FormError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Anything the session API accepts as a path.
pub trait IntoFieldPath {
    fn into_field_path(self) -> Result<FieldPath, FormError>;
}

impl IntoFieldPath for FieldPath {
    fn into_field_path(self) -> Result<FieldPath, FormError> {
        Ok(self)
    }
}

impl IntoFieldPath for &FieldPath {
    fn into_field_path(self) -> Result<FieldPath, FormError> {
        Ok(self.clone())
    }
}

impl IntoFieldPath for &str {
    fn into_field_path(self) -> Result<FieldPath, FormError> {
        FieldPath::parse(self)
    }
}

impl IntoFieldPath for String {
    fn into_field_path(self) -> Result<FieldPath, FormError> {
        FieldPath::parse(&self)
    }
}

impl IntoFieldPath for &String {
    fn into_field_path(self) -> Result<FieldPath, FormError> {
        FieldPath::parse(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
