use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use form_spec::{
    ChangeKind, FieldPath, FieldRules, FieldStatus, FormError, FormSession, FormSpec,
    SessionConfig, Watch,
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

#[test]
fn meta_exists_for_every_default_leaf() {
    let session = youtube_session();
    for leaf in [
        "username",
        "email",
        "channel",
        "social.twitter",
        "social.facebook",
        "phoneNumbers.0",
        "phoneNumbers.1",
        "phNumbers.0.number",
        "age",
        "dob",
    ] {
        let meta = session.field_meta(leaf).expect(leaf);
        assert!(!meta.dirty, "{leaf} starts clean");
        assert!(!meta.touched, "{leaf} starts untouched");
    }
    assert_eq!(session.field_status("username"), Some(FieldStatus::Pristine));
    let state = session.form_state();
    assert!(!state.is_dirty);
    assert!(state.is_valid);
    assert_eq!(state.submit_count, 0);
}

#[test]
fn dirty_tracks_the_default_value() {
    let mut session = youtube_session();
    session.input("username", "Bob").expect("input");
    assert!(session.field_meta("username").expect("meta").dirty);
    assert!(session.form_state().is_dirty);

    session.input("username", "User").expect("input");
    assert!(!session.field_meta("username").expect("meta").dirty);
    assert!(!session.form_state().is_dirty);
}

#[test]
fn blur_marks_touched() {
    let mut session = FormSession::new(SessionConfig {
        default_values: json!({ "username": "" }),
        ..SessionConfig::default()
    })
    .expect("session");
    session.blur("username").expect("blur");
    assert!(session.field_meta("username").expect("meta").touched);
    assert_eq!(session.field_status("username"), Some(FieldStatus::Touched));
}

#[test]
fn unknown_paths_get_meta_on_first_write() {
    let mut session = youtube_session();
    session.input("nickname", "bobby").expect("input");
    let meta = session.field_meta("nickname").expect("meta");
    assert!(meta.dirty);
    assert_eq!(session.get_value("nickname"), Some(&json!("bobby")));
}

#[test]
fn invalid_paths_are_rejected() {
    let mut session = youtube_session();
    assert!(matches!(
        session.input("social..twitter", "x"),
        Err(FormError::InvalidPath(_))
    ));
    assert!(matches!(
        session.input("username.first", "x"),
        Err(FormError::ValueShape { .. })
    ));
    assert_eq!(session.get_value("username"), Some(&json!("User")));
}

#[test]
fn reset_restores_defaults_and_clears_meta() {
    let mut session = youtube_session();
    session.input("username", "").expect("input");
    session.blur("username").expect("blur");
    session.input("channel", "rust streams").expect("input");
    session.submit(|_| {}, |_| {});

    session.reset().expect("reset");
    assert_eq!(session.get_values(), session.default_values());
    assert!(session.errors().is_empty());
    let meta = session.field_meta("username").expect("meta");
    assert!(!meta.touched && !meta.dirty && !meta.validated);
    assert!(session.is_disabled("social.twitter"));
    let state = session.form_state();
    assert!(!state.is_submitted);
    assert_eq!(state.submit_count, 0);
}

#[test]
fn reset_is_idempotent() {
    let mut session = youtube_session();
    session.input("email", "someone@example.com").expect("input");
    session.reset().expect("first reset");
    let values = session.get_values().clone();
    let state = session.form_state();
    let statuses = session
        .registered_paths()
        .into_iter()
        .map(|path| (path.clone(), session.field_meta(&path).cloned()))
        .collect::<Vec<_>>();

    session.reset().expect("second reset");
    assert_eq!(session.get_values(), &values);
    assert_eq!(session.form_state(), state);
    for (path, meta) in statuses {
        assert_eq!(session.field_meta(&path).cloned(), meta);
    }
}

#[test]
fn reset_with_replaces_the_defaults() {
    let mut session = youtube_session();
    let mut defaults = session.default_values().clone();
    defaults["username"] = json!("Returning user");
    session.reset_with(defaults).expect("reset");
    assert_eq!(session.get_value("username"), Some(&json!("Returning user")));
    assert!(!session.form_state().is_dirty);
}

#[test]
fn reset_field_restores_one_subtree() {
    let mut session = youtube_session();
    session.input("social.facebook", "fb").expect("input");
    session.blur("social.facebook").expect("blur");
    session.input("username", "Bob").expect("input");

    session.reset_field("social").expect("reset field");
    assert_eq!(session.get_value("social.facebook"), Some(&json!("")));
    assert!(!session.field_meta("social.facebook").expect("meta").touched);
    assert!(session.field_meta("username").expect("meta").dirty);
}

#[test]
fn each_event_notifies_subscribers_once() {
    let mut session = youtube_session();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    session.subscribe(Watch::All, move |notification| {
        sink.borrow_mut()
            .push((notification.kind, notification.paths.len()));
    });

    // channel drives the disabled state of social.twitter
    session.input("channel", "rust streams").expect("input");
    session.blur("channel").expect("blur");

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], (ChangeKind::Input, 2));
    assert_eq!(seen[1].0, ChangeKind::Blur);
}

#[test]
fn watch_filters_by_path() {
    let mut session = youtube_session();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    session.watch(vec![path("social")], move |notification| {
        sink.borrow_mut()
            .push(notification.values["social"]["facebook"].clone());
    });

    session.input("username", "Bob").expect("input");
    session.input("social.facebook", "fb").expect("input");
    session.reset().expect("reset");
    assert_eq!(*seen.borrow(), vec![json!("fb"), json!("")]);
}

#[test]
fn unsubscribe_stops_delivery() {
    let mut session = youtube_session();
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    let subscription = session.subscribe(Watch::All, move |_| *sink.borrow_mut() += 1);
    session.input("username", "Bob").expect("input");
    assert!(session.unsubscribe(subscription));
    assert!(!session.unsubscribe(subscription));
    session.input("username", "Alice").expect("input");
    assert_eq!(*count.borrow(), 1);
    assert_eq!(session.subscriber_count(), 0);
}

#[test]
fn bindings_read_and_write_through_the_session() {
    let mut session = FormSession::new(SessionConfig {
        default_values: json!({ "username": "" }),
        mode: form_spec::ValidationMode::OnBlur,
        ..SessionConfig::default()
    })
    .expect("session");
    let username = session
        .register("username", FieldRules::default().required("Username is required"))
        .expect("register");
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    let subscription = username.subscribe(&mut session, move |_| *sink.borrow_mut() += 1);

    username.input(&mut session, "bob").expect("input");
    assert_eq!(username.value(&session), Some(&json!("bob")));
    username.input(&mut session, "").expect("input");
    username.blur(&mut session).expect("blur");
    assert_eq!(
        username.error(&session).map(|error| error.message.as_str()),
        Some("Username is required")
    );
    assert!(username.meta(&session).expect("meta").touched);
    assert_eq!(*count.borrow(), 3);
    assert!(session.unsubscribe(subscription));
}

#[test]
fn unregister_keeps_the_value_but_drops_rules() {
    let mut session = youtube_session();
    session.input("username", "").expect("input");
    session.blur("username").expect("blur");
    assert!(session.field_error("username").is_some());

    assert!(session.unregister("username").expect("unregister"));
    assert!(!session.is_registered("username"));
    assert!(session.field_error("username").is_none());
    assert_eq!(session.get_value("username"), Some(&json!("")));
    assert!(session.validate_all().is_empty());
}
