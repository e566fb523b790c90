use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expr::Expr;
use crate::path::FieldPath;

/// How raw input is coerced before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueAs {
    #[default]
    Text,
    Number,
    Date,
}

impl ValueAs {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueAs::Text => "text",
            ValueAs::Number => "number",
            ValueAs::Date => "date",
        }
    }
}

/// A rule parameter paired with the message shown when it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Rule<T> {
    pub value: T,
    pub message: String,
}

/// Declarative custom check; passes when the condition holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Check {
    NotEqual { value: Value },
    NotOneOf { values: Vec<Value> },
    NotStartsWith { prefix: String },
    NotEndsWith { suffix: String },
    NotContains { needle: String },
    /// Evaluated against the whole form, e.g. to compare two fields.
    Expr { expr: Expr },
}

impl Check {
    pub fn passes(&self, value: &Value, form: &Value) -> bool {
        let text = value.as_str().unwrap_or_default();
        match self {
            Check::NotEqual { value: rejected } => value != rejected,
            Check::NotOneOf { values } => !values.contains(value),
            Check::NotStartsWith { prefix } => !text.starts_with(prefix.as_str()),
            Check::NotEndsWith { suffix } => !text.ends_with(suffix.as_str()),
            Check::NotContains { needle } => !text.contains(needle.as_str()),
            Check::Expr { expr } => expr.evaluate(form),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CheckRule {
    #[serde(flatten)]
    pub check: Check,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NamedCheck {
    pub name: String,
    #[serde(flatten)]
    pub check: Check,
    pub message: String,
}

/// Declarative registration options for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct FieldRules {
    /// Message shown when the value is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<Rule<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<Rule<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Rule<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Rule<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Rule<String>>,
    #[serde(default)]
    pub value_as: ValueAs,
    #[serde(default)]
    pub disabled: bool,
    /// Disables the field while the expression holds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_if: Option<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<CheckRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validate_named: Vec<NamedCheck>,
}

impl FieldRules {
    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }

    pub fn min_length(mut self, value: usize, message: impl Into<String>) -> Self {
        self.min_length = Some(Rule {
            value,
            message: message.into(),
        });
        self
    }

    pub fn max_length(mut self, value: usize, message: impl Into<String>) -> Self {
        self.max_length = Some(Rule {
            value,
            message: message.into(),
        });
        self
    }

    pub fn min(mut self, value: f64, message: impl Into<String>) -> Self {
        self.min = Some(Rule {
            value,
            message: message.into(),
        });
        self
    }

    pub fn max(mut self, value: f64, message: impl Into<String>) -> Self {
        self.max = Some(Rule {
            value,
            message: message.into(),
        });
        self
    }

    pub fn pattern(mut self, regex: impl Into<String>, message: impl Into<String>) -> Self {
        self.pattern = Some(Rule {
            value: regex.into(),
            message: message.into(),
        });
        self
    }

    pub fn value_as(mut self, kind: ValueAs) -> Self {
        self.value_as = kind;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn disabled_if(mut self, expr: Expr) -> Self {
        self.disabled_if = Some(expr);
        self
    }

    pub fn check(mut self, check: Check, message: impl Into<String>) -> Self {
        self.validate = Some(CheckRule {
            check,
            message: message.into(),
        });
        self
    }

    pub fn named_check(
        mut self,
        name: impl Into<String>,
        check: Check,
        message: impl Into<String>,
    ) -> Self {
        self.validate_named.push(NamedCheck {
            name: name.into(),
            check,
            message: message.into(),
        });
        self
    }

    /// Paths whose values feed `disabled_if`.
    pub fn dependencies(&self) -> Vec<FieldPath> {
        let mut deps = self
            .disabled_if
            .as_ref()
            .map(Expr::dependencies)
            .unwrap_or_default();
        for named in &self.validate_named {
            if let Check::Expr { expr } = &named.check {
                deps.extend(expr.dependencies());
            }
        }
        if let Some(CheckRule {
            check: Check::Expr { expr },
            ..
        }) = &self.validate
        {
            deps.extend(expr.dependencies());
        }
        deps.sort();
        deps.dedup();
        deps
    }
}
