use serde_json::json;

use form_spec::{
    Check, ErrorKind, FieldOptions, FieldPath, FieldRules, FieldStatus, FormError, FormSession,
    FormSpec, SessionConfig, SetValueOptions, ValidationMode, ValueAs,
};

fn fixture(name: &str) -> &'static str {
    match name {
        "youtube_form" => include_str!("../tests/fixtures/youtube_form.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn youtube_session() -> FormSession {
    let spec = FormSpec::from_json(fixture("youtube_form")).expect("deserialize");
    FormSession::from_spec(&spec).expect("session")
}

fn path(raw: &str) -> FieldPath {
    FieldPath::parse(raw).expect("path")
}

fn session_with_mode(mode: ValidationMode) -> FormSession {
    FormSession::new(SessionConfig {
        default_values: json!({ "username": "", "email": "" }),
        mode,
        ..SessionConfig::default()
    })
    .expect("session")
}

#[test]
fn required_username_fails_on_blur() {
    let mut session = youtube_session();
    session.input("username", "").expect("input");
    assert!(session.field_error("username").is_none());

    session.blur("username").expect("blur");
    let error = session.field_error("username").expect("error");
    assert_eq!(error.kind, ErrorKind::Required);
    assert_eq!(error.message, "Username is required");
    assert_eq!(session.field_status("username"), Some(FieldStatus::Invalid));
    assert!(!session.form_state().is_valid);
}

#[test]
fn email_pattern_runs_before_custom_check() {
    let mut session = youtube_session();
    session.input("email", "not-an-email").expect("input");
    session.blur("email").expect("blur");
    let error = session.field_error("email").expect("error");
    assert_eq!(error.kind, ErrorKind::Pattern);
    assert_eq!(error.message, "Invalid email format");

    session.input("email", "admin@example.com").expect("input");
    session.blur("email").expect("blur");
    let error = session.field_error("email").expect("error");
    assert_eq!(error.kind, ErrorKind::Custom { rule: None });
    assert_eq!(error.message, "Enter a different email address");

    session.input("email", "someone@example.com").expect("input");
    session.blur("email").expect("blur");
    assert!(session.field_error("email").is_none());
}

#[test]
fn short_email_address_is_accepted() {
    let mut session = youtube_session();
    session.input("email", "a@b.co").expect("input");
    session.blur("email").expect("blur");
    assert!(session.field_error("email").is_none());
    assert_eq!(session.field_status("email"), Some(FieldStatus::Valid));
}

#[test]
fn empty_optional_email_skips_pattern() {
    let mut session = youtube_session();
    assert!(session.validate(&path("email")).is_ok());
}

#[test]
fn named_channel_rules_report_their_name() {
    let mut session = youtube_session();
    session.input("channel", "a very bad channel").expect("input");
    let error = session.validate(&path("channel")).expect_err("blacklisted");
    assert_eq!(
        error.kind,
        ErrorKind::Custom {
            rule: Some("notBlackListed".into())
        }
    );
    assert_eq!(error.message, "This channel is not supported");

    session.input("channel", "admin channel").expect("input");
    let error = session.validate(&path("channel")).expect_err("admin");
    assert_eq!(error.kind.code(), "notAdmin");
    assert_eq!(error.message, "Enter another channel");
}

#[test]
fn first_failing_rule_wins() {
    let mut session = session_with_mode(ValidationMode::OnSubmit);
    session
        .register(
            "username",
            FieldRules::default()
                .required("Required")
                .min_length(3, "Too short")
                .pattern("^[a-z]+$", "Lowercase only"),
        )
        .expect("register");

    let error = session.validate(&path("username")).expect_err("empty");
    assert_eq!(error.kind, ErrorKind::Required);

    session.input("username", "AB").expect("input");
    let error = session.validate(&path("username")).expect_err("short");
    assert_eq!(error.kind, ErrorKind::MinLength);

    session.input("username", "ABCD").expect("input");
    let error = session.validate(&path("username")).expect_err("pattern");
    assert_eq!(error.kind, ErrorKind::Pattern);
    assert_eq!(session.errors().len(), 1);
}

#[test]
fn programmatic_named_rules_short_circuit_in_order() {
    let mut session = session_with_mode(ValidationMode::OnChange);
    let options = FieldOptions::new(FieldRules::default())
        .validate_named("noSpaces", |value, _| {
            if value.as_str().unwrap_or_default().contains(' ') {
                Err("No spaces".into())
            } else {
                Ok(())
            }
        })
        .validate_named("short", |value, _| {
            if value.as_str().unwrap_or_default().len() > 5 {
                Err("At most five characters".into())
            } else {
                Ok(())
            }
        });
    session.register("username", options).expect("register");

    session.input("username", "has spaces in it").expect("input");
    let error = session.field_error("username").expect("error");
    assert_eq!(error.kind.code(), "noSpaces");

    session.input("username", "nospacesbutlong").expect("input");
    let error = session.field_error("username").expect("error");
    assert_eq!(error.message, "At most five characters");
}

#[test]
fn custom_validate_sees_the_whole_form() {
    let mut session = session_with_mode(ValidationMode::OnChange);
    session
        .register(
            "email",
            FieldOptions::new(FieldRules::default()).validate(|value, form| {
                if value == &form["username"] {
                    Err("Email must differ from the username".into())
                } else {
                    Ok(())
                }
            }),
        )
        .expect("register");
    session.input("username", "same").expect("input");
    session.input("email", "same").expect("input");
    assert_eq!(
        session.field_error("email").map(|error| error.message.as_str()),
        Some("Email must differ from the username")
    );
}

#[test]
fn number_input_is_coerced() {
    let mut session = youtube_session();
    session.input("age", "42").expect("input");
    assert_eq!(session.get_value("age"), Some(&json!(42)));
    assert!(session.validate(&path("age")).is_ok());

    session.input("age", "4.5").expect("input");
    assert_eq!(session.get_value("age"), Some(&json!(4.5)));
}

#[test]
fn unparsable_number_is_a_coercion_error() {
    let mut session = youtube_session();
    session.input("age", "forty").expect("input");
    let error = session.validate(&path("age")).expect_err("coercion");
    assert_eq!(error.kind, ErrorKind::Coercion);
    assert_eq!(error.message, "Enter a valid number");
}

#[test]
fn empty_number_input_hits_required() {
    let mut session = youtube_session();
    session.input("age", "").expect("input");
    assert_eq!(session.get_value("age"), Some(&json!(null)));
    let error = session.validate(&path("age")).expect_err("required");
    assert_eq!(error.kind, ErrorKind::Required);
    assert_eq!(error.message, "Age is required");
}

#[test]
fn dates_are_normalized_or_rejected() {
    let mut session = youtube_session();
    session.input("dob", "1990-05-17T08:30:00Z").expect("input");
    assert_eq!(session.get_value("dob"), Some(&json!("1990-05-17")));

    session.input("dob", "2024-02-30").expect("input");
    let error = session.validate(&path("dob")).expect_err("invalid date");
    assert_eq!(error.kind, ErrorKind::Coercion);
    assert_eq!(error.message, "Enter a valid date");
}

#[test]
fn min_and_max_apply_to_numbers() {
    let mut session = session_with_mode(ValidationMode::OnChange);
    session
        .register(
            "age",
            FieldRules::default()
                .value_as(ValueAs::Number)
                .min(18.0, "Adults only")
                .max(120.0, "Check the age"),
        )
        .expect("register");
    session.input("age", "12").expect("input");
    assert_eq!(session.field_error("age").map(|e| e.kind.clone()), Some(ErrorKind::Min));
    session.input("age", "130").expect("input");
    assert_eq!(session.field_error("age").map(|e| e.kind.clone()), Some(ErrorKind::Max));
    session.input("age", "30").expect("input");
    assert!(session.field_error("age").is_none());
}

#[test]
fn on_change_mode_validates_every_input() {
    let mut session = session_with_mode(ValidationMode::OnChange);
    session
        .register("username", FieldRules::default().required("Required"))
        .expect("register");
    session.input("username", "bob").expect("input");
    assert_eq!(session.field_status("username"), Some(FieldStatus::Valid));
    session.input("username", "").expect("input");
    assert_eq!(session.field_status("username"), Some(FieldStatus::Invalid));
}

#[test]
fn on_submit_mode_waits_for_submission() {
    let mut session = session_with_mode(ValidationMode::OnSubmit);
    session
        .register("username", FieldRules::default().required("Required"))
        .expect("register");
    session.input("username", "").expect("input");
    session.blur("username").expect("blur");
    assert_eq!(session.field_status("username"), Some(FieldStatus::Touched));

    let outcome = session.submit(|_| {}, |_| {});
    assert!(!outcome.is_valid());

    // revalidates on change once submitted
    session.input("username", "bob").expect("input");
    assert_eq!(session.field_status("username"), Some(FieldStatus::Valid));
}

#[test]
fn on_touched_mode_validates_changes_after_first_blur() {
    let mut session = session_with_mode(ValidationMode::OnTouched);
    session
        .register("username", FieldRules::default().required("Required"))
        .expect("register");
    session.input("username", "").expect("input");
    assert!(session.field_error("username").is_none());
    session.blur("username").expect("blur");
    assert!(session.field_error("username").is_some());
    session.input("username", "bob").expect("input");
    assert!(session.field_error("username").is_none());
}

#[test]
fn set_value_can_touch_and_validate() {
    let mut session = youtube_session();
    session
        .set_value(
            "username",
            "",
            SetValueOptions {
                should_touch: true,
                should_validate: true,
            },
        )
        .expect("set value");
    let meta = session.field_meta("username").expect("meta");
    assert!(meta.touched);
    assert!(meta.dirty);
    assert_eq!(
        meta.error.as_ref().map(|error| error.message.as_str()),
        Some("Username is required")
    );
}

#[test]
fn message_templates_see_path_and_value() {
    let mut session = session_with_mode(ValidationMode::OnChange);
    session
        .register(
            "username",
            FieldRules::default().check(
                Check::NotOneOf {
                    values: vec![json!("root"), json!("admin")],
                },
                "{{path}} cannot be '{{value}}'",
            ),
        )
        .expect("register");
    session.input("username", "root").expect("input");
    assert_eq!(
        session.field_error("username").map(|error| error.message.as_str()),
        Some("username cannot be 'root'")
    );
}

#[test]
fn derived_rules_follow_their_dependencies() {
    let mut session = FormSession::new(SessionConfig {
        default_values: json!({ "plan": "free", "company": "" }),
        mode: ValidationMode::OnChange,
        ..SessionConfig::default()
    })
    .expect("session");
    session
        .register(
            "company",
            FieldOptions::derived(vec![path("plan")], |form| {
                if form["plan"] == json!("business") {
                    FieldRules::default().required("Company is required")
                } else {
                    FieldRules::default()
                }
            }),
        )
        .expect("register");

    assert!(session.validate(&path("company")).is_ok());
    session.input("plan", "business").expect("input");
    // already validated, so the dependent is revalidated with its new rules
    assert_eq!(
        session.field_error("company").map(|error| error.kind.clone()),
        Some(ErrorKind::Required)
    );
    session.input("plan", "free").expect("input");
    assert!(session.field_error("company").is_none());
}

#[test]
fn validate_all_reports_every_failing_field() {
    let mut session = youtube_session();
    session.input("username", "").expect("input");
    session.input("email", "nope").expect("input");
    let errors = session.validate_all();
    let failing = errors.keys().map(FieldPath::as_str).collect::<Vec<_>>();
    assert_eq!(failing, vec!["email", "username"]);
}

#[test]
fn disabled_required_field_is_exempt() {
    let mut session = youtube_session();
    assert!(session.is_disabled("social.twitter"));
    assert!(session.validate(&path("social.twitter")).is_ok());
    assert!(!session.validate_all().contains_key(&path("social.twitter")));

    session.input("channel", "rust streams").expect("input");
    assert!(!session.is_disabled("social.twitter"));
    let error = session.validate(&path("social.twitter")).expect_err("required");
    assert_eq!(error.message, "Field is required");

    // disabling again drops the error
    session.input("channel", "").expect("input");
    assert!(session.field_error("social.twitter").is_none());
    assert!(session.field_meta("social.twitter").expect("meta").disabled);
}

#[test]
fn disabled_field_globs_apply_at_start() {
    let mut session = FormSession::new(SessionConfig {
        default_values: json!({ "social": { "twitter": "", "facebook": "" } }),
        disabled_fields: vec!["social.*".into()],
        ..SessionConfig::default()
    })
    .expect("session");
    session
        .register("social.facebook", FieldRules::default().required("Required"))
        .expect("register");
    assert!(session.is_disabled("social.facebook"));
    assert!(session.validate_all().is_empty());

    session.set_disabled("social.facebook", false).expect("enable");
    assert_eq!(session.validate_all().len(), 1);
}

#[test]
fn set_disabled_requires_registration() {
    let mut session = youtube_session();
    assert!(matches!(
        session.set_disabled("unknown", true),
        Err(FormError::UnknownField(_))
    ));
}

#[test]
fn manual_errors_are_replaced_by_a_full_pass() {
    let mut session = youtube_session();
    session.set_error("server", "Backend rejected the form").expect("set error");
    session.set_error("username", "Name already taken").expect("set error");
    assert_eq!(session.field_status("username"), Some(FieldStatus::Invalid));
    assert_eq!(
        session.field_error("username").map(|error| error.kind.clone()),
        Some(ErrorKind::Manual)
    );

    assert!(session.validate_all().is_empty());
    assert!(session.field_error("server").is_none());
}

#[test]
fn clear_errors_targets_a_subtree_or_everything() {
    let mut session = youtube_session();
    session.set_error("social.facebook", "bad").expect("set error");
    session.set_error("username", "bad").expect("set error");
    session.clear_errors(Some(&path("social")));
    assert!(session.field_error("social.facebook").is_none());
    assert!(session.field_error("username").is_some());
    session.clear_errors(None);
    assert!(session.errors().is_empty());
}

#[test]
fn registration_misuse_is_an_error() {
    let mut session = youtube_session();
    assert!(matches!(
        session.register("age", FieldRules::default()),
        Err(FormError::ConflictingRegistration { .. })
    ));
    assert!(matches!(
        session.register("social", FieldRules::default().value_as(ValueAs::Number)),
        Err(FormError::ConflictingRegistration { .. })
    ));
    assert!(matches!(
        session.register("email", FieldRules::default().pattern("(", "broken")),
        Err(FormError::InvalidPattern { .. })
    ));
    assert!(matches!(
        session.register("social..twitter", FieldRules::default()),
        Err(FormError::InvalidPath(_))
    ));
}

#[test]
fn reregistering_updates_rules_in_place() {
    let mut session = youtube_session();
    session
        .register("social.facebook", FieldRules::default().required("Facebook is required"))
        .expect("register");
    let error = session.validate(&path("social.facebook")).expect_err("required");
    assert_eq!(error.message, "Facebook is required");

    session
        .register("social.facebook", FieldRules::default())
        .expect("re-register");
    assert!(session.validate(&path("social.facebook")).is_ok());
}
