#![allow(missing_docs)]

pub mod array;
pub mod binding;
pub mod coerce;
pub mod error;
pub mod expr;
pub mod inspect;
pub mod message;
pub mod meta;
pub mod notify;
pub mod path;
mod registry;
pub mod rules;
pub mod session;
pub mod spec;
pub mod submit;
pub mod validation;
pub mod values;

pub use array::{EntryId, FieldArrayEntry, FieldArrayOptions};
pub use binding::FieldBinding;
pub use coerce::{Coerced, coerce};
pub use error::{ErrorKind, ErrorMap, FieldError, FormError, FormResult};
pub use expr::Expr;
pub use inspect::{FieldSnapshot, Snapshot, render_json, render_text};
pub use meta::{FieldMeta, FieldStatus, FormState};
pub use notify::{ChangeKind, Notification, Subscription, Watch};
pub use path::{FieldPath, IntoFieldPath, Segment};
pub use rules::{AsyncValidateFn, DeriveFn, FieldOptions, ValidateFn};
pub use session::{FormSession, SessionConfig, SetValueOptions};
pub use spec::{
    Check, CheckRule, FieldArraySpec, FieldRules, FieldSpec, FormSpec, ItemFieldSpec, NamedCheck,
    RevalidateMode, Rule, ValidationMode, ValueAs,
};
pub use submit::SubmitOutcome;
pub use validation::{AsyncOutcome, PendingValidation};
pub use values::FormValues;
