use serde_json::Value;

use crate::error::{FieldError, FormResult};
use crate::meta::FieldMeta;
use crate::notify::{Notification, Subscription, Watch};
use crate::path::FieldPath;
use crate::session::{FormSession, SetValueOptions};

/// Handle returned by [`FormSession::register`]. It holds only the path, so
/// it stays valid across borrows of the session and can be stored by UI code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    path: FieldPath,
}

impl FieldBinding {
    pub(crate) fn new(path: FieldPath) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn value<'a>(&self, session: &'a FormSession) -> Option<&'a Value> {
        session.get_value(&self.path)
    }

    /// Change handler.
    pub fn input(&self, session: &mut FormSession, raw: impl Into<Value>) -> FormResult<()> {
        session.input(&self.path, raw)
    }

    /// Blur handler.
    pub fn blur(&self, session: &mut FormSession) -> FormResult<()> {
        session.blur(&self.path)
    }

    pub fn set(
        &self,
        session: &mut FormSession,
        value: impl Into<Value>,
        options: SetValueOptions,
    ) -> FormResult<()> {
        session.set_value(&self.path, value, options)
    }

    pub fn validate(&self, session: &mut FormSession) -> Result<(), FieldError> {
        session.validate(&self.path)
    }

    pub fn error<'a>(&self, session: &'a FormSession) -> Option<&'a FieldError> {
        session.field_error(&self.path)
    }

    pub fn meta<'a>(&self, session: &'a FormSession) -> Option<&'a FieldMeta> {
        session.field_meta(&self.path)
    }

    pub fn subscribe<F>(&self, session: &mut FormSession, callback: F) -> Subscription
    where
        F: FnMut(&Notification<'_>) + 'static,
    {
        session.subscribe(Watch::Paths(vec![self.path.clone()]), callback)
    }
}
