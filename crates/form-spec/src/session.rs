use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::array::{FieldArrayOptions, FieldArrays};
use crate::binding::FieldBinding;
use crate::coerce::coerce;
use crate::error::{ErrorKind, ErrorMap, FieldError, FormResult};
use crate::message::MessageRenderer;
use crate::meta::{FieldMeta, FieldStatus, FormState, SubmitState};
use crate::notify::{ChangeKind, Notification, Notifier, Subscription, Watch};
use crate::path::{FieldPath, IntoFieldPath};
use crate::registry::Registry;
use crate::rules::FieldOptions;
use crate::spec::form::{FormSpec, RevalidateMode, ValidationMode};
use crate::values;

/// Session-wide configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub id: String,
    pub default_values: Value,
    pub mode: ValidationMode,
    pub revalidate_mode: RevalidateMode,
    /// Glob patterns over field paths that start out disabled.
    pub disabled_fields: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id: "form".into(),
            default_values: Value::Object(Map::new()),
            mode: ValidationMode::default(),
            revalidate_mode: RevalidateMode::default(),
            disabled_fields: Vec::new(),
        }
    }
}

/// Options for programmatic writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetValueOptions {
    pub should_touch: bool,
    pub should_validate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Change,
    Blur,
}

/// One form being edited: values, per-field meta, registered rules, field
/// arrays and subscribers.
pub struct FormSession {
    pub(crate) id: String,
    pub(crate) mode: ValidationMode,
    pub(crate) revalidate_mode: RevalidateMode,
    pub(crate) defaults: Value,
    pub(crate) values: Value,
    pub(crate) meta: BTreeMap<FieldPath, FieldMeta>,
    pub(crate) registry: Registry,
    pub(crate) arrays: FieldArrays,
    pub(crate) tickets: BTreeMap<FieldPath, u64>,
    pub(crate) next_ticket: u64,
    pub(crate) notifier: Notifier,
    pub(crate) messages: MessageRenderer,
    pub(crate) submit_state: SubmitState,
}

impl FormSession {
    pub fn new(config: SessionConfig) -> FormResult<Self> {
        let registry = Registry::new(&config.disabled_fields)?;
        let mut session = Self {
            id: config.id,
            mode: config.mode,
            revalidate_mode: config.revalidate_mode,
            values: config.default_values.clone(),
            defaults: config.default_values,
            meta: BTreeMap::new(),
            registry,
            arrays: FieldArrays::new(),
            tickets: BTreeMap::new(),
            next_ticket: 0,
            notifier: Notifier::default(),
            messages: MessageRenderer::new(),
            submit_state: SubmitState::default(),
        };
        session.init_meta();
        tracing::debug!(form = %session.id, fields = session.meta.len(), "form session started");
        Ok(session)
    }

    /// Builds a session and registers every field and field array of `spec`.
    pub fn from_spec(spec: &FormSpec) -> FormResult<Self> {
        let mut session = Self::new(SessionConfig {
            id: spec.id.clone(),
            default_values: spec.default_values.clone(),
            mode: spec.mode,
            revalidate_mode: spec.revalidate_mode,
            disabled_fields: spec.disabled_fields.clone(),
        })?;
        for field in &spec.fields {
            session.register(&field.path, FieldOptions::new(field.rules.clone()))?;
        }
        for array in &spec.arrays {
            let mut options = FieldArrayOptions::new().min_entries(array.min_entries);
            for item in &array.item_fields {
                options = options.item_field(&item.path, FieldOptions::new(item.rules.clone()));
            }
            session.use_field_array(&array.path, options)?;
        }
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    pub fn get_values(&self) -> &Value {
        &self.values
    }

    pub fn default_values(&self) -> &Value {
        &self.defaults
    }

    pub fn get_value(&self, path: impl IntoFieldPath) -> Option<&Value> {
        let path = path.into_field_path().ok()?;
        values::get(&self.values, &path)
    }

    pub fn field_meta(&self, path: impl IntoFieldPath) -> Option<&FieldMeta> {
        let path = path.into_field_path().ok()?;
        self.meta.get(&path)
    }

    pub fn field_status(&self, path: impl IntoFieldPath) -> Option<FieldStatus> {
        self.field_meta(path).map(FieldMeta::status)
    }

    pub fn field_error(&self, path: impl IntoFieldPath) -> Option<&FieldError> {
        self.field_meta(path).and_then(|meta| meta.error.as_ref())
    }

    pub fn is_registered(&self, path: impl IntoFieldPath) -> bool {
        path.into_field_path()
            .is_ok_and(|path| self.registry.contains(&path))
    }

    pub fn is_disabled(&self, path: impl IntoFieldPath) -> bool {
        path.into_field_path()
            .is_ok_and(|path| self.registry.is_disabled(&path))
    }

    pub fn registered_paths(&self) -> Vec<FieldPath> {
        self.registry.paths()
    }

    pub(crate) fn meta_entries(&self) -> &BTreeMap<FieldPath, FieldMeta> {
        &self.meta
    }

    /// Current error per field.
    pub fn errors(&self) -> ErrorMap {
        self.meta
            .iter()
            .filter_map(|(path, meta)| meta.error.clone().map(|error| (path.clone(), error)))
            .collect()
    }

    pub fn form_state(&self) -> FormState {
        FormState {
            is_dirty: self.values != self.defaults,
            is_valid: self.meta.values().all(|meta| meta.error.is_none()),
            is_validating: self.meta.values().any(|meta| meta.validating),
            is_submitting: self.submit_state.is_submitting,
            is_submitted: self.submit_state.is_submitted,
            is_submit_successful: self.submit_state.is_submit_successful,
            submit_count: self.submit_state.submit_count,
        }
    }

    /// Registers a field (or updates its rules in place) and returns its binding.
    pub fn register(
        &mut self,
        path: impl IntoFieldPath,
        options: impl Into<FieldOptions>,
    ) -> FormResult<FieldBinding> {
        let path = path.into_field_path()?;
        let options = options.into();
        self.batch(ChangeKind::Register, |session| {
            session
                .registry
                .register(&path, options, &session.values)?;
            session.ensure_meta(&path);
            session.sync_disabled(&path);
            session.notifier.mark(&path);
            tracing::debug!(form = %session.id, %path, "registered field");
            Ok(FieldBinding::new(path.clone()))
        })
    }

    /// Drops a field's rules and error; its value stays in place.
    pub fn unregister(&mut self, path: impl IntoFieldPath) -> FormResult<bool> {
        let path = path.into_field_path()?;
        Ok(self.batch(ChangeKind::Register, |session| {
            let removed = session.registry.unregister(&path).is_some();
            session.invalidate_tickets(&path);
            if let Some(meta) = session.meta.get_mut(&path) {
                meta.error = None;
                meta.disabled = false;
            }
            session.notifier.mark(&path);
            removed
        }))
    }

    /// Raw user input, coerced according to the field's `value_as`.
    pub fn input(&mut self, path: impl IntoFieldPath, raw: impl Into<Value>) -> FormResult<()> {
        let path = path.into_field_path()?;
        let raw = raw.into();
        self.batch(ChangeKind::Input, |session| {
            let value = coerce(session.registry.value_as(&path), &raw).into_value();
            tracing::trace!(form = %session.id, %path, "input");
            session.write_value(&path, value)?;
            if session.validates_on(&path, Trigger::Change) {
                let _ = session.validate_field(&path);
            }
            Ok(())
        })
    }

    /// Focus left the field.
    pub fn blur(&mut self, path: impl IntoFieldPath) -> FormResult<()> {
        let path = path.into_field_path()?;
        self.batch(ChangeKind::Blur, |session| {
            session.ensure_meta(&path).touched = true;
            session.notifier.mark(&path);
            if session.validates_on(&path, Trigger::Blur) {
                let _ = session.validate_field(&path);
            }
        });
        Ok(())
    }

    pub fn set_value(
        &mut self,
        path: impl IntoFieldPath,
        value: impl Into<Value>,
        options: SetValueOptions,
    ) -> FormResult<()> {
        let path = path.into_field_path()?;
        let value = value.into();
        self.batch(ChangeKind::SetValue, |session| {
            session.write_value(&path, value)?;
            if options.should_touch {
                session.ensure_meta(&path).touched = true;
            }
            if options.should_validate {
                let _ = session.validate_field(&path);
            }
            Ok(())
        })
    }

    /// Enables or disables a registered field at runtime.
    pub fn set_disabled(&mut self, path: impl IntoFieldPath, disabled: bool) -> FormResult<()> {
        let path = path.into_field_path()?;
        self.batch(ChangeKind::Validation, |session| {
            session.registry.set_disabled(&path, disabled)?;
            session.sync_disabled(&path);
            if !disabled && session.meta.get(&path).is_some_and(|meta| meta.validated) {
                let _ = session.validate_field(&path);
            }
            Ok(())
        })
    }

    pub fn set_error(&mut self, path: impl IntoFieldPath, message: impl Into<String>) -> FormResult<()> {
        let path = path.into_field_path()?;
        let message = message.into();
        self.batch(ChangeKind::Validation, |session| {
            session.ensure_meta(&path).error = Some(FieldError::new(ErrorKind::Manual, message));
            session.notifier.mark(&path);
        });
        Ok(())
    }

    /// Clears the error of one field, or of every field when `path` is `None`.
    pub fn clear_errors(&mut self, path: Option<&FieldPath>) {
        self.batch(ChangeKind::Validation, |session| {
            let targets = session
                .meta
                .keys()
                .filter(|key| path.is_none_or(|path| key.starts_with(path)))
                .cloned()
                .collect::<Vec<_>>();
            for key in targets {
                if let Some(meta) = session.meta.get_mut(&key)
                    && meta.error.take().is_some()
                {
                    session.notifier.mark(&key);
                }
            }
        });
    }

    /// Restores the default values and clears every meta entry.
    pub fn reset(&mut self) -> FormResult<()> {
        self.batch(ChangeKind::Reset, |session| {
            session.values = session.defaults.clone();
            session.tickets.clear();
            session.submit_state = SubmitState::default();
            session.meta.clear();
            session.registry.recompute_all(&session.values);
            session.reset_arrays()?;
            session.init_meta();
            session.notifier.mark_state();
            tracing::debug!(form = %session.id, "form reset");
            Ok(())
        })
    }

    /// Replaces the defaults, then resets.
    pub fn reset_with(&mut self, defaults: Value) -> FormResult<()> {
        self.defaults = defaults;
        self.reset()
    }

    /// Restores one field (or subtree) to its default value and meta.
    pub fn reset_field(&mut self, path: impl IntoFieldPath) -> FormResult<()> {
        let path = path.into_field_path()?;
        self.batch(ChangeKind::Reset, |session| {
            let default = values::get_or_null(&session.defaults, &path).clone();
            session.write_value(&path, default)?;
            for (key, meta) in session.meta.iter_mut() {
                if key.starts_with(&path) {
                    meta.clear();
                }
            }
            Ok(())
        })
    }

    pub fn subscribe<F>(&mut self, watch: Watch, callback: F) -> Subscription
    where
        F: FnMut(&Notification<'_>) + 'static,
    {
        self.notifier.subscribe(watch, Box::new(callback))
    }

    /// Subscribes to value changes below the given paths.
    pub fn watch<F>(&mut self, paths: Vec<FieldPath>, callback: F) -> Subscription
    where
        F: FnMut(&Notification<'_>) + 'static,
    {
        self.subscribe(Watch::Paths(paths), callback)
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.notifier.unsubscribe(subscription)
    }

    pub fn subscriber_count(&self) -> usize {
        self.notifier.subscriber_count()
    }

    /// Runs `f` as one event: observers get a single notification at the end.
    pub(crate) fn batch<R>(&mut self, kind: ChangeKind, f: impl FnOnce(&mut Self) -> R) -> R {
        self.notifier.open(kind);
        let result = f(self);
        self.close_batch();
        result
    }

    pub(crate) fn close_batch(&mut self) {
        if self.notifier.close() {
            let state = self.form_state();
            self.notifier.dispatch(&self.values, state);
        }
    }

    pub(crate) fn ensure_meta(&mut self, path: &FieldPath) -> &mut FieldMeta {
        let dirty = self.is_path_dirty(path);
        self.meta.entry(path.clone()).or_insert_with(|| FieldMeta {
            dirty,
            ..FieldMeta::default()
        })
    }

    fn is_path_dirty(&self, path: &FieldPath) -> bool {
        values::get_or_null(&self.values, path) != values::get_or_null(&self.defaults, path)
    }

    /// Meta for every default leaf and registered path.
    pub(crate) fn init_meta(&mut self) {
        let mut paths = values::leaf_paths(&self.values, None);
        paths.extend(self.registry.paths());
        for path in paths {
            self.ensure_meta(&path);
        }
        let keys = self.meta.keys().cloned().collect::<Vec<_>>();
        for key in keys {
            self.sync_disabled(&key);
        }
    }

    /// Creates meta for every leaf below `path`.
    pub(crate) fn ensure_leaf_meta(&mut self, path: &FieldPath) {
        let leaves = values::get(&self.values, path)
            .map(|value| values::leaf_paths(value, Some(path)))
            .unwrap_or_default();
        for leaf in leaves {
            self.ensure_meta(&leaf);
            self.sync_disabled(&leaf);
        }
    }

    pub(crate) fn refresh_dirty(&mut self, path: &FieldPath) {
        let keys = self
            .meta
            .keys()
            .filter(|key| key.overlaps(path))
            .cloned()
            .collect::<Vec<_>>();
        for key in keys {
            let dirty = self.is_path_dirty(&key);
            if let Some(meta) = self.meta.get_mut(&key) {
                meta.dirty = dirty;
            }
        }
    }

    /// Stores a value and propagates its consequences: meta, dirty flags,
    /// stale async results and dependent rules.
    pub(crate) fn write_value(&mut self, path: &FieldPath, value: Value) -> FormResult<()> {
        let scalar = !value.is_object() && !value.is_array();
        values::set(&mut self.values, path, value)?;
        self.invalidate_tickets(path);
        self.sync_field_arrays(path)?;
        if scalar {
            self.ensure_meta(path);
        }
        self.ensure_leaf_meta(path);
        self.refresh_dirty(path);
        self.notifier.mark(path);
        self.refresh_dependents(path);
        Ok(())
    }

    /// Recomputes rules of fields that read `changed`.
    pub(crate) fn refresh_dependents(&mut self, changed: &FieldPath) {
        for dependent in self.registry.dependents_of(changed) {
            if dependent == *changed {
                continue;
            }
            self.registry.recompute(&dependent, &self.values);
            self.sync_disabled(&dependent);
            let revalidate = !self.registry.is_disabled(&dependent)
                && self.meta.get(&dependent).is_some_and(|meta| meta.validated);
            if revalidate {
                let _ = self.validate_field(&dependent);
            }
            tracing::trace!(%changed, %dependent, "recomputed dependent rules");
            self.notifier.mark(&dependent);
        }
    }

    /// Mirrors the effective disabled flag into the meta; disabling clears the
    /// error and drops in-flight async results.
    pub(crate) fn sync_disabled(&mut self, path: &FieldPath) {
        let disabled = self.registry.is_disabled(path);
        let meta = self.ensure_meta(path);
        let changed = meta.disabled != disabled;
        meta.disabled = disabled;
        if disabled {
            meta.error = None;
            meta.validating = false;
        }
        if changed {
            if disabled {
                self.tickets.remove(path);
            }
            self.notifier.mark(path);
        }
    }

    pub(crate) fn invalidate_tickets(&mut self, path: &FieldPath) {
        let stale = self
            .tickets
            .keys()
            .filter(|key| key.overlaps(path))
            .cloned()
            .collect::<Vec<_>>();
        for key in stale {
            self.tickets.remove(&key);
            if let Some(meta) = self.meta.get_mut(&key) {
                meta.validating = false;
            }
        }
    }

    pub(crate) fn validates_on(&self, path: &FieldPath, trigger: Trigger) -> bool {
        if self.submit_state.submit_count > 0 {
            return match self.revalidate_mode {
                RevalidateMode::OnChange => trigger == Trigger::Change,
                RevalidateMode::OnBlur => trigger == Trigger::Blur,
                RevalidateMode::OnSubmit => false,
            };
        }
        match self.mode {
            ValidationMode::OnBlur => trigger == Trigger::Blur,
            ValidationMode::OnChange => trigger == Trigger::Change,
            ValidationMode::OnSubmit => false,
            ValidationMode::OnTouched => {
                trigger == Trigger::Blur
                    || self.meta.get(path).is_some_and(|meta| meta.touched)
            }
            ValidationMode::All => true,
        }
    }
}
