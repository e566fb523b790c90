use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use regex::Regex;
use serde_json::Value;

use crate::coerce::{Coerced, coerce};
use crate::error::{ErrorKind, FieldError};
use crate::message::MessageRenderer;
use crate::path::FieldPath;
use crate::spec::field::{FieldRules, ValueAs};
use crate::values;

/// Custom rule: `(field value, form values) -> Ok | Err(message)`.
pub type ValidateFn = Rc<dyn Fn(&Value, &Value) -> Result<(), String>>;
pub type AsyncValidateFn = Rc<dyn Fn(Value, Value) -> LocalBoxFuture<'static, Result<(), String>>>;
pub type DeriveFn = Rc<dyn Fn(&Value) -> FieldRules>;

#[derive(Clone)]
pub(crate) struct Derived {
    pub(crate) deps: Vec<FieldPath>,
    pub(crate) compute: DeriveFn,
}

/// Everything a field can be registered with: declarative rules plus
/// programmatic validators.
#[derive(Clone, Default)]
pub struct FieldOptions {
    pub rules: FieldRules,
    pub(crate) validate: Option<ValidateFn>,
    pub(crate) validate_named: Vec<(String, ValidateFn)>,
    pub(crate) validate_async: Option<AsyncValidateFn>,
    pub(crate) derived: Option<Derived>,
}

impl FieldOptions {
    pub fn new(rules: FieldRules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Rules recomputed from live values whenever one of `deps` changes.
    pub fn derived<F>(deps: Vec<FieldPath>, compute: F) -> Self
    where
        F: Fn(&Value) -> FieldRules + 'static,
    {
        Self {
            derived: Some(Derived {
                deps,
                compute: Rc::new(compute),
            }),
            ..Self::default()
        }
    }

    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<(), String> + 'static,
    {
        self.validate = Some(Rc::new(validator));
        self
    }

    pub fn validate_named<F>(mut self, name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<(), String> + 'static,
    {
        self.validate_named.push((name.into(), Rc::new(validator)));
        self
    }

    pub fn validate_async<F>(mut self, validator: F) -> Self
    where
        F: Fn(Value, Value) -> LocalBoxFuture<'static, Result<(), String>> + 'static,
    {
        self.validate_async = Some(Rc::new(validator));
        self
    }

    pub fn has_async(&self) -> bool {
        self.validate_async.is_some()
    }

    /// Rules in force for the given form values.
    pub fn effective_rules(&self, form: &Value) -> FieldRules {
        let mut rules = match &self.derived {
            Some(derived) => (derived.compute)(form),
            None => self.rules.clone(),
        };
        if let Some(expr) = &rules.disabled_if
            && expr.evaluate(form)
        {
            rules.disabled = true;
        }
        rules
    }

    pub fn dependencies(&self) -> Vec<FieldPath> {
        let mut deps = self.rules.dependencies();
        if let Some(derived) = &self.derived {
            deps.extend(derived.deps.iter().cloned());
        }
        deps.sort();
        deps.dedup();
        deps
    }

    /// Value kind declared at registration; derived options report the
    /// kind of their static rules.
    pub fn value_as(&self) -> ValueAs {
        self.rules.value_as
    }
}

impl From<FieldRules> for FieldOptions {
    fn from(rules: FieldRules) -> Self {
        Self::new(rules)
    }
}

impl Debug for FieldOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldOptions")
            .field("rules", &self.rules)
            .field("validate", &self.validate.is_some())
            .field(
                "validate_named",
                &self
                    .validate_named
                    .iter()
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("validate_async", &self.validate_async.is_some())
            .field("derived", &self.derived.is_some())
            .finish()
    }
}

/// Inputs for one synchronous evaluation.
pub(crate) struct Evaluation<'a> {
    pub(crate) path: &'a FieldPath,
    pub(crate) options: &'a FieldOptions,
    pub(crate) rules: &'a FieldRules,
    pub(crate) pattern: Option<&'a Regex>,
    pub(crate) form: &'a Value,
    pub(crate) messages: &'a MessageRenderer,
}

impl Evaluation<'_> {
    /// Runs the synchronous rules in precedence order and returns the first
    /// failure.
    pub(crate) fn run(&self, raw: &Value) -> Result<(), FieldError> {
        let coerced = coerce(self.rules.value_as, raw);
        let invalid = coerced.is_invalid();
        let value = match coerced {
            Coerced::Value(value) | Coerced::Invalid(value) => value,
        };

        if values::is_empty(&value) {
            if let Some(message) = &self.rules.required {
                return Err(self.fail(ErrorKind::Required, message, &value));
            }
        } else if invalid {
            let message = format!("Enter a valid {}", self.rules.value_as.as_str());
            return Err(self.fail(ErrorKind::Coercion, &message, &value));
        }

        if let Some(text) = value.as_str().filter(|text| !text.is_empty()) {
            let length = text.chars().count();
            if let Some(rule) = &self.rules.min_length
                && length < rule.value
            {
                return Err(self.fail(ErrorKind::MinLength, &rule.message, &value));
            }
            if let Some(rule) = &self.rules.max_length
                && length > rule.value
            {
                return Err(self.fail(ErrorKind::MaxLength, &rule.message, &value));
            }
        }

        if let Some(number) = value.as_f64() {
            if let Some(rule) = &self.rules.min
                && number < rule.value
            {
                return Err(self.fail(ErrorKind::Min, &rule.message, &value));
            }
            if let Some(rule) = &self.rules.max
                && number > rule.value
            {
                return Err(self.fail(ErrorKind::Max, &rule.message, &value));
            }
        }

        if let (Some(regex), Some(rule), Some(text)) =
            (self.pattern, &self.rules.pattern, value.as_str())
            && !text.is_empty()
            && !regex.is_match(text)
        {
            return Err(self.fail(ErrorKind::Pattern, &rule.message, &value));
        }

        if let Some(check) = &self.rules.validate
            && !check.check.passes(&value, self.form)
        {
            return Err(self.fail(ErrorKind::Custom { rule: None }, &check.message, &value));
        }
        if let Some(validator) = &self.options.validate
            && let Err(message) = validator(&value, self.form)
        {
            return Err(self.fail(ErrorKind::Custom { rule: None }, &message, &value));
        }

        for named in &self.rules.validate_named {
            if !named.check.passes(&value, self.form) {
                let kind = ErrorKind::Custom {
                    rule: Some(named.name.clone()),
                };
                return Err(self.fail(kind, &named.message, &value));
            }
        }
        for (name, validator) in &self.options.validate_named {
            if let Err(message) = validator(&value, self.form) {
                let kind = ErrorKind::Custom {
                    rule: Some(name.clone()),
                };
                return Err(self.fail(kind, &message, &value));
            }
        }

        Ok(())
    }

    fn fail(&self, kind: ErrorKind, template: &str, value: &Value) -> FieldError {
        FieldError::new(kind, self.messages.render(template, self.path, value))
    }
}
