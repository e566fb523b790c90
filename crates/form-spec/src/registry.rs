use std::collections::{BTreeMap, BTreeSet};

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde_json::Value;

use crate::array::remap_keys;
use crate::error::{FormError, FormResult};
use crate::path::FieldPath;
use crate::rules::FieldOptions;
use crate::spec::field::{FieldRules, ValueAs};

pub(crate) struct RegisteredField {
    pub(crate) options: FieldOptions,
    pub(crate) effective: FieldRules,
    pub(crate) pattern: Option<Regex>,
    /// Set through `set_disabled`; wins over rules and globs.
    pub(crate) disabled_override: Option<bool>,
}

/// Registered fields, the dependency edges between them and the statically
/// disabled path patterns.
pub(crate) struct Registry {
    fields: BTreeMap<FieldPath, RegisteredField>,
    /// source path -> fields whose rules read it
    dependents: BTreeMap<FieldPath, BTreeSet<FieldPath>>,
    disabled_globs: GlobSet,
}

impl Registry {
    pub(crate) fn new(disabled_fields: &[String]) -> FormResult<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in disabled_fields {
            builder.add(Glob::new(pattern).map_err(FormError::InvalidGlob)?);
        }
        Ok(Self {
            fields: BTreeMap::new(),
            dependents: BTreeMap::new(),
            disabled_globs: builder.build().map_err(FormError::InvalidGlob)?,
        })
    }

    /// Inserts or updates a registration. Changing the value kind of an
    /// existing registration is rejected.
    pub(crate) fn register(
        &mut self,
        path: &FieldPath,
        options: FieldOptions,
        form: &Value,
    ) -> FormResult<()> {
        if let Some(existing) = self.fields.get(path)
            && existing.options.value_as() != options.value_as()
        {
            return Err(FormError::ConflictingRegistration {
                path: path.clone(),
                existing: existing.options.value_as().as_str().to_string(),
                requested: options.value_as().as_str().to_string(),
            });
        }
        if options.value_as() != ValueAs::Text
            && matches!(
                crate::values::get(form, path),
                Some(Value::Object(_) | Value::Array(_))
            )
        {
            return Err(FormError::ConflictingRegistration {
                path: path.clone(),
                existing: "nested value".into(),
                requested: options.value_as().as_str().to_string(),
            });
        }

        let effective = options.effective_rules(form);
        let pattern = compile_pattern(path, &effective)?;
        self.drop_edges(path);
        for source in options.dependencies() {
            self.dependents
                .entry(source)
                .or_default()
                .insert(path.clone());
        }
        let disabled_override = self
            .fields
            .get(path)
            .and_then(|field| field.disabled_override);
        self.fields.insert(
            path.clone(),
            RegisteredField {
                options,
                effective,
                pattern,
                disabled_override,
            },
        );
        Ok(())
    }

    pub(crate) fn unregister(&mut self, path: &FieldPath) -> Option<RegisteredField> {
        self.drop_edges(path);
        self.fields.remove(path)
    }

    fn drop_edges(&mut self, dependent: &FieldPath) {
        for targets in self.dependents.values_mut() {
            targets.remove(dependent);
        }
        self.dependents.retain(|_, targets| !targets.is_empty());
    }

    pub(crate) fn get(&self, path: &FieldPath) -> Option<&RegisteredField> {
        self.fields.get(path)
    }

    pub(crate) fn contains(&self, path: &FieldPath) -> bool {
        self.fields.contains_key(path)
    }

    pub(crate) fn paths(&self) -> Vec<FieldPath> {
        self.fields.keys().cloned().collect()
    }

    pub(crate) fn value_as(&self, path: &FieldPath) -> ValueAs {
        self.fields
            .get(path)
            .map(|field| field.effective.value_as)
            .unwrap_or_default()
    }

    pub(crate) fn is_disabled(&self, path: &FieldPath) -> bool {
        let field = self.fields.get(path);
        if let Some(flag) = field.and_then(|field| field.disabled_override) {
            return flag;
        }
        field.is_some_and(|field| field.effective.disabled)
            || self.disabled_globs.is_match(path.as_str())
    }

    pub(crate) fn set_disabled(&mut self, path: &FieldPath, disabled: bool) -> FormResult<()> {
        let field = self
            .fields
            .get_mut(path)
            .ok_or_else(|| FormError::UnknownField(path.clone()))?;
        field.disabled_override = Some(disabled);
        Ok(())
    }

    /// Fields whose rules depend on a value at `changed`.
    pub(crate) fn dependents_of(&self, changed: &FieldPath) -> BTreeSet<FieldPath> {
        self.dependents
            .iter()
            .filter(|(source, _)| source.overlaps(changed))
            .flat_map(|(_, targets)| targets.iter().cloned())
            .collect()
    }

    /// Recomputes the effective rules of one field against live values.
    pub(crate) fn recompute(&mut self, path: &FieldPath, form: &Value) {
        let Some(field) = self.fields.get_mut(path) else {
            return;
        };
        let effective = field.options.effective_rules(form);
        field.pattern = match compile_pattern(path, &effective) {
            Ok(pattern) => pattern,
            Err(error) => {
                tracing::warn!(%path, %error, "ignoring derived pattern");
                None
            }
        };
        field.effective = effective;
    }

    pub(crate) fn recompute_all(&mut self, form: &Value) {
        for path in self.paths() {
            self.recompute(&path, form);
        }
    }

    /// Renumbers registrations and edges below a field array.
    pub(crate) fn remap(&mut self, array: &FieldPath, mapping: &[Option<usize>]) {
        remap_keys(&mut self.fields, array, mapping);
        remap_keys(&mut self.dependents, array, mapping);
        for targets in self.dependents.values_mut() {
            let moved = targets
                .iter()
                .filter(|target| target.array_position(array).is_some())
                .cloned()
                .collect::<Vec<_>>();
            for target in moved {
                targets.remove(&target);
                if let Some((old, _)) = target.array_position(array)
                    && let Some(Some(new)) = mapping.get(old)
                    && let Some(renamed) = target.with_array_index(array, *new)
                {
                    targets.insert(renamed);
                }
            }
        }
        self.dependents.retain(|_, targets| !targets.is_empty());
    }

    /// Drops registrations for array entries at or above `len`.
    pub(crate) fn truncate_array(&mut self, array: &FieldPath, len: usize) {
        let stale = self
            .fields
            .keys()
            .filter(|path| {
                path.array_position(array)
                    .is_some_and(|(index, _)| index >= len)
            })
            .cloned()
            .collect::<Vec<_>>();
        for path in stale {
            self.unregister(&path);
        }
    }
}

fn compile_pattern(path: &FieldPath, rules: &FieldRules) -> FormResult<Option<Regex>> {
    rules
        .pattern
        .as_ref()
        .map(|rule| {
            Regex::new(&rule.value).map_err(|source| FormError::InvalidPattern {
                path: path.clone(),
                source,
            })
        })
        .transpose()
}
