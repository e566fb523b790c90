pub mod field;
pub mod form;

pub use field::{Check, CheckRule, FieldRules, NamedCheck, Rule, ValueAs};
pub use form::{
    FieldArraySpec, FieldSpec, FormSpec, ItemFieldSpec, RevalidateMode, ValidationMode,
};
