use futures::future::LocalBoxFuture;

use crate::coerce::coerce;
use crate::error::{ErrorKind, ErrorMap, FieldError};
use crate::notify::ChangeKind;
use crate::path::FieldPath;
use crate::rules::Evaluation;
use crate::session::FormSession;
use crate::values;

/// An async validation that has been dispatched but not applied yet.
pub struct PendingValidation {
    path: FieldPath,
    ticket: u64,
    future: LocalBoxFuture<'static, Result<(), String>>,
}

impl PendingValidation {
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub async fn run(self) -> AsyncOutcome {
        let result = self.future.await;
        AsyncOutcome {
            path: self.path,
            ticket: self.ticket,
            result,
        }
    }
}

/// Resolved async validation, to be handed back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncOutcome {
    pub path: FieldPath,
    pub ticket: u64,
    pub result: Result<(), String>,
}

impl FormSession {
    /// Validates one field now, regardless of the trigger mode.
    pub fn validate(&mut self, path: &FieldPath) -> Result<(), FieldError> {
        self.batch(ChangeKind::Validation, |session| session.validate_field(path))
    }

    /// Validates every registered field and returns the resulting errors.
    pub fn validate_all(&mut self) -> ErrorMap {
        self.batch(ChangeKind::Validation, |session| session.validate_all_fields())
    }

    pub(crate) fn validate_field(&mut self, path: &FieldPath) -> Result<(), FieldError> {
        if self.registry.is_disabled(path) {
            self.sync_disabled(path);
            return Ok(());
        }
        let result = {
            let Some(field) = self.registry.get(path) else {
                return Ok(());
            };
            Evaluation {
                path,
                options: &field.options,
                rules: &field.effective,
                pattern: field.pattern.as_ref(),
                form: &self.values,
                messages: &self.messages,
            }
            .run(values::get_or_null(&self.values, path))
        };

        let meta = self.ensure_meta(path);
        meta.validated = true;
        meta.error = result.clone().err();
        if result.is_err() {
            self.invalidate_tickets(path);
        }
        self.notifier.mark(path);
        tracing::trace!(%path, valid = result.is_ok(), "validated field");
        result
    }

    pub(crate) fn validate_all_fields(&mut self) -> ErrorMap {
        let registered = self.registry.paths();
        for path in &registered {
            let _ = self.validate_field(path);
        }
        // errors on unregistered paths were set by hand; a full pass replaces them
        let manual = self
            .meta
            .iter()
            .filter(|(path, meta)| meta.error.is_some() && !self.registry.contains(path))
            .map(|(path, _)| path.clone())
            .collect::<Vec<_>>();
        for path in manual {
            if let Some(meta) = self.meta.get_mut(&path) {
                meta.error = None;
            }
            self.notifier.mark(&path);
        }
        self.errors()
    }

    /// Runs the synchronous rules and, when they pass, dispatches the field's
    /// async validator. Returns `None` when there is nothing to await.
    pub fn begin_async_validation(&mut self, path: &FieldPath) -> Option<PendingValidation> {
        self.batch(ChangeKind::Validation, |session| {
            let validator = session
                .registry
                .get(path)
                .and_then(|field| field.options.validate_async.clone())?;
            session.validate_field(path).ok()?;
            if session.registry.is_disabled(path) {
                return None;
            }

            session.next_ticket += 1;
            let ticket = session.next_ticket;
            session.tickets.insert(path.clone(), ticket);
            session.ensure_meta(path).validating = true;
            session.notifier.mark(path);

            let raw = values::get_or_null(&session.values, path);
            let value = coerce(session.registry.value_as(path), raw).into_value();
            let future = validator(value, session.values.clone());
            tracing::trace!(%path, ticket, "dispatched async validation");
            Some(PendingValidation {
                path: path.clone(),
                ticket,
                future,
            })
        })
    }

    /// Applies a resolved async validation unless its input has been
    /// superseded. Returns whether the outcome was applied.
    pub fn apply_async_outcome(&mut self, outcome: AsyncOutcome) -> bool {
        if self.tickets.get(&outcome.path) != Some(&outcome.ticket) {
            tracing::debug!(path = %outcome.path, ticket = outcome.ticket, "discarding stale async validation");
            return false;
        }
        self.batch(ChangeKind::Validation, |session| {
            session.tickets.remove(&outcome.path);
            let error = outcome.result.err().map(|message| {
                let value = values::get_or_null(&session.values, &outcome.path);
                FieldError::new(
                    ErrorKind::Async,
                    session.messages.render(&message, &outcome.path, value),
                )
            });
            let meta = session.ensure_meta(&outcome.path);
            meta.validating = false;
            meta.validated = true;
            meta.error = error;
            session.notifier.mark(&outcome.path);
            true
        })
    }

    /// Sync rules followed by the async validator, awaited in place.
    pub async fn validate_async(&mut self, path: &FieldPath) -> Result<(), FieldError> {
        if let Some(pending) = self.begin_async_validation(path) {
            let outcome = pending.run().await;
            self.apply_async_outcome(outcome);
        }
        match self.meta.get(path).and_then(|meta| meta.error.clone()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Registered, enabled fields that carry an async validator.
    pub(crate) fn async_paths(&self) -> Vec<FieldPath> {
        self.registry
            .paths()
            .into_iter()
            .filter(|path| {
                !self.registry.is_disabled(path)
                    && self
                        .registry
                        .get(path)
                        .is_some_and(|field| field.options.has_async())
            })
            .collect()
    }
}
