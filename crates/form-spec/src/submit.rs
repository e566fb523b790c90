use serde_json::Value;

use crate::error::ErrorMap;
use crate::notify::ChangeKind;
use crate::path::FieldPath;
use crate::session::FormSession;
use crate::values;

/// How a submission ended; the matching callback has already run.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Valid(Value),
    Invalid(ErrorMap),
}

impl SubmitOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, SubmitOutcome::Valid(_))
    }

    pub fn errors(&self) -> Option<&ErrorMap> {
        match self {
            SubmitOutcome::Valid(_) => None,
            SubmitOutcome::Invalid(errors) => Some(errors),
        }
    }
}

impl FormSession {
    /// Validates every field, then calls `on_valid` with the submitted values
    /// or `on_invalid` with the error map.
    pub fn submit<V, I>(&mut self, on_valid: V, on_invalid: I) -> SubmitOutcome
    where
        V: FnOnce(&Value),
        I: FnOnce(&ErrorMap),
    {
        self.begin_submit();
        self.batch(ChangeKind::Submitted, |session| {
            let errors = session.validate_all_fields();
            session.finish_submit(errors, on_valid, on_invalid)
        })
    }

    /// Like [`FormSession::submit`], but also awaits async validators of the
    /// fields whose synchronous rules pass.
    pub async fn submit_async<V, I>(&mut self, on_valid: V, on_invalid: I) -> SubmitOutcome
    where
        V: FnOnce(&Value),
        I: FnOnce(&ErrorMap),
    {
        self.begin_submit();
        self.notifier.open(ChangeKind::Submitted);
        self.validate_all_fields();
        for path in self.async_paths() {
            if self.field_error(&path).is_some() {
                continue;
            }
            if let Some(pending) = self.begin_async_validation(&path) {
                let outcome = pending.run().await;
                self.apply_async_outcome(outcome);
            }
        }
        let errors = self.errors();
        let outcome = self.finish_submit(errors, on_valid, on_invalid);
        self.close_batch();
        outcome
    }

    /// Current values without disabled fields, as handed to `on_valid`.
    pub fn submitted_values(&self) -> Value {
        let disabled = self
            .meta_entries()
            .iter()
            .filter(|(_, meta)| meta.disabled)
            .map(|(path, _)| path.clone())
            .chain(
                self.registered_paths()
                    .into_iter()
                    .filter(|path| self.registry.is_disabled(path)),
            )
            .collect::<Vec<FieldPath>>();
        values::without(&self.values, &disabled)
    }

    fn begin_submit(&mut self) {
        self.batch(ChangeKind::Submitting, |session| {
            session.submit_state.is_submitting = true;
            session.notifier.mark_state();
        });
    }

    fn finish_submit<V, I>(&mut self, errors: ErrorMap, on_valid: V, on_invalid: I) -> SubmitOutcome
    where
        V: FnOnce(&Value),
        I: FnOnce(&ErrorMap),
    {
        self.submit_state.submit_count = self.submit_state.submit_count.saturating_add(1);
        self.submit_state.is_submitted = true;
        let outcome = if errors.is_empty() {
            self.submit_state.is_submit_successful = true;
            let submitted = self.submitted_values();
            on_valid(&submitted);
            SubmitOutcome::Valid(submitted)
        } else {
            self.submit_state.is_submit_successful = false;
            on_invalid(&errors);
            SubmitOutcome::Invalid(errors)
        };
        self.submit_state.is_submitting = false;
        self.notifier.mark_state();
        tracing::debug!(
            form = %self.id,
            valid = outcome.is_valid(),
            submit_count = self.submit_state.submit_count,
            "form submitted"
        );
        outcome
    }
}
