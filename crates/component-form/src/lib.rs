use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use form_spec::{
    ErrorMap, FieldPath, FormError, FormSession, FormSpec, SetValueOptions, SubmitOutcome,
    render_json as form_render_json, render_text as form_render_text,
};

const DEFAULT_SPEC: &str = include_str!("../../form-spec/tests/fixtures/youtube_form.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config/{0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("form '{0}' is not available")]
    FormUnavailable(String),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error("failed to parse event script: {0}")]
    ScriptParse(#[source] serde_json::Error),
    #[error("form session error: {0}")]
    Form(#[from] FormError),
    #[error("event {index} ({event}) failed: {source}")]
    Event {
        index: usize,
        event: &'static str,
        #[source]
        source: FormError,
    },
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    form_spec_json: Option<String>,
}

/// One step of a replayed editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Input {
        path: FieldPath,
        value: Value,
    },
    Blur {
        path: FieldPath,
    },
    SetValue {
        path: FieldPath,
        value: Value,
        #[serde(default)]
        touch: bool,
        #[serde(default)]
        validate: bool,
    },
    SetDisabled {
        path: FieldPath,
        disabled: bool,
    },
    SetError {
        path: FieldPath,
        message: String,
    },
    ClearErrors {
        #[serde(default)]
        path: Option<FieldPath>,
    },
    Append {
        path: FieldPath,
        value: Value,
    },
    Prepend {
        path: FieldPath,
        value: Value,
    },
    Insert {
        path: FieldPath,
        index: usize,
        value: Value,
    },
    Remove {
        path: FieldPath,
        index: usize,
    },
    Swap {
        path: FieldPath,
        a: usize,
        b: usize,
    },
    Move {
        path: FieldPath,
        from: usize,
        to: usize,
    },
    /// Validates one field, or all of them when `path` is omitted.
    Validate {
        #[serde(default)]
        path: Option<FieldPath>,
    },
    Submit,
    Reset,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::Input { .. } => "input",
            SessionEvent::Blur { .. } => "blur",
            SessionEvent::SetValue { .. } => "set_value",
            SessionEvent::SetDisabled { .. } => "set_disabled",
            SessionEvent::SetError { .. } => "set_error",
            SessionEvent::ClearErrors { .. } => "clear_errors",
            SessionEvent::Append { .. } => "append",
            SessionEvent::Prepend { .. } => "prepend",
            SessionEvent::Insert { .. } => "insert",
            SessionEvent::Remove { .. } => "remove",
            SessionEvent::Swap { .. } => "swap",
            SessionEvent::Move { .. } => "move",
            SessionEvent::Validate { .. } => "validate",
            SessionEvent::Submit => "submit",
            SessionEvent::Reset => "reset",
        }
    }
}

fn load_form_spec(config_json: &str) -> Result<FormSpec, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    let spec_json = config.form_spec_json.as_deref().unwrap_or(DEFAULT_SPEC);

    serde_json::from_str(spec_json).map_err(ComponentError::ConfigParse)
}

fn ensure_form(form_id: &str, config_json: &str) -> Result<FormSpec, ComponentError> {
    let spec = load_form_spec(config_json)?;
    if spec.id != form_id {
        Err(ComponentError::FormUnavailable(form_id.to_string()))
    } else {
        Ok(spec)
    }
}

fn parse_values(values_json: &str) -> Result<Value, ComponentError> {
    if values_json.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(values_json).map_err(ComponentError::ConfigParse)
}

fn parse_script(script_json: &str) -> Result<Vec<SessionEvent>, ComponentError> {
    if script_json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(script_json).map_err(ComponentError::ScriptParse)
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn respond_string(result: Result<String, ComponentError>) -> String {
    match result {
        Ok(value) => value,
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

/// Overlays `values` onto `defaults`; objects merge key by key, anything else
/// replaces the default.
fn merge_values(defaults: &Value, values: &Value) -> Value {
    match (defaults, values) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let next = match base.get(key) {
                    Some(existing) => merge_values(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

fn errors_value(errors: &ErrorMap) -> Result<Value, ComponentError> {
    serde_json::to_value(errors).map_err(ComponentError::JsonEncode)
}

fn outcome_value(outcome: &SubmitOutcome) -> Result<Value, ComponentError> {
    Ok(match outcome {
        SubmitOutcome::Valid(values) => json!({
            "valid": true,
            "values": values,
            "errors": {},
        }),
        SubmitOutcome::Invalid(errors) => json!({
            "valid": false,
            "values": Value::Null,
            "errors": errors_value(errors)?,
        }),
    })
}

/// Applies one event; submissions report their outcome.
fn apply_event(
    session: &mut FormSession,
    event: SessionEvent,
) -> Result<Option<SubmitOutcome>, FormError> {
    match event {
        SessionEvent::Input { path, value } => session.input(path, value)?,
        SessionEvent::Blur { path } => session.blur(path)?,
        SessionEvent::SetValue {
            path,
            value,
            touch,
            validate,
        } => session.set_value(
            path,
            value,
            SetValueOptions {
                should_touch: touch,
                should_validate: validate,
            },
        )?,
        SessionEvent::SetDisabled { path, disabled } => session.set_disabled(path, disabled)?,
        SessionEvent::SetError { path, message } => session.set_error(path, message)?,
        SessionEvent::ClearErrors { path } => session.clear_errors(path.as_ref()),
        SessionEvent::Append { path, value } => {
            session.append(path, value)?;
        }
        SessionEvent::Prepend { path, value } => {
            session.prepend(path, value)?;
        }
        SessionEvent::Insert { path, index, value } => {
            session.insert(path, index, value)?;
        }
        SessionEvent::Remove { path, index } => {
            session.remove(path, index)?;
        }
        SessionEvent::Swap { path, a, b } => session.swap(path, a, b)?,
        SessionEvent::Move { path, from, to } => session.move_entry(path, from, to)?,
        SessionEvent::Validate { path: Some(path) } => {
            let _ = session.validate(&path);
        }
        SessionEvent::Validate { path: None } => {
            session.validate_all();
        }
        SessionEvent::Submit => return Ok(Some(session.submit(|_| {}, |_| {}))),
        SessionEvent::Reset => session.reset()?,
    }
    Ok(None)
}

/// Builds a session for the form and runs the script against it.
fn run_script(
    form_id: &str,
    config_json: &str,
    script_json: &str,
) -> Result<(FormSession, Vec<Value>), ComponentError> {
    let spec = ensure_form(form_id, config_json)?;
    let events = parse_script(script_json)?;
    let mut session = FormSession::from_spec(&spec)?;
    let mut submissions = Vec::new();
    for (index, event) in events.into_iter().enumerate() {
        let name = event.name();
        tracing::debug!(form = %form_id, index, event = name, "replaying event");
        if let Some(outcome) = apply_event(&mut session, event).map_err(|source| {
            ComponentError::Event {
                index,
                event: name,
                source,
            }
        })? {
            submissions.push(outcome_value(&outcome)?);
        }
    }
    Ok((session, submissions))
}

pub fn describe(form_id: &str, config_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        serde_json::to_value(spec).map_err(ComponentError::JsonEncode)
    }))
}

/// JSON Schema of the form spec format.
pub fn get_spec_schema() -> String {
    respond(Ok(FormSpec::schema()))
}

/// Validates a complete set of values as if it were submitted; keys missing
/// from `values_json` keep their defaults.
pub fn validate_values(form_id: &str, config_json: &str, values_json: &str) -> String {
    let result = ensure_form(form_id, config_json).and_then(|spec| {
        let values = parse_values(values_json)?;
        let mut session = FormSession::from_spec(&spec)?;
        session.reset_with(merge_values(&spec.default_values, &values))?;
        let outcome = session.submit(|_| {}, |_| {});
        tracing::debug!(form = %form_id, valid = outcome.is_valid(), "validated values");
        outcome_value(&outcome)
    });
    respond(result)
}

/// Replays an event script and reports every submission plus the final
/// snapshot.
pub fn replay(form_id: &str, config_json: &str, script_json: &str) -> String {
    let result = run_script(form_id, config_json, script_json).map(|(session, submissions)| {
        json!({
            "form_id": session.id(),
            "submissions": submissions,
            "state": session.form_state(),
            "values": session.get_values(),
            "snapshot": form_render_json(&session.snapshot()),
        })
    });
    respond(result)
}

pub fn snapshot_json(form_id: &str, config_json: &str, script_json: &str) -> String {
    respond(
        run_script(form_id, config_json, script_json)
            .map(|(session, _)| form_render_json(&session.snapshot())),
    )
}

pub fn snapshot_text(form_id: &str, config_json: &str, script_json: &str) -> String {
    respond_string(
        run_script(form_id, config_json, script_json)
            .map(|(session, _)| form_render_text(&session.snapshot())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn describe_returns_spec_json() {
        let payload = describe("youtube-form", "");
        let spec: Value = serde_json::from_str(&payload).expect("valid json");
        assert_eq!(spec["id"], "youtube-form");
        assert_eq!(spec["mode"], "on_blur");
    }

    #[test]
    fn describe_rejects_unknown_form() {
        let payload = describe("other-form", "");
        let parsed: Value = serde_json::from_str(&payload).expect("json");
        assert_eq!(parsed["error"], "form 'other-form' is not available");
    }

    #[test]
    fn spec_schema_lists_properties() {
        let schema: Value = serde_json::from_str(&get_spec_schema()).expect("json");
        assert!(
            schema["properties"]
                .as_object()
                .expect("properties")
                .contains_key("default_values")
        );
    }

    #[test]
    fn validate_values_reports_valid_defaults() {
        let result = validate_values("youtube-form", "", "{}");
        let parsed: Value = serde_json::from_str(&result).expect("json");
        assert_eq!(parsed["valid"], true);
        assert_eq!(parsed["values"]["username"], "User");
        assert!(parsed["values"]["social"].get("twitter").is_none());
    }

    #[test]
    fn validate_values_reports_errors() {
        let values = json!({
            "username": "",
            "channel": "admin channel",
            "phNumbers": [{ "number": "1" }, { "number": "2" }]
        });
        let result = validate_values("youtube-form", "", &values.to_string());
        let parsed: Value = serde_json::from_str(&result).expect("json");
        assert_eq!(parsed["valid"], false);
        assert_eq!(parsed["errors"]["username"]["kind"]["type"], "required");
        assert_eq!(parsed["errors"]["channel"]["message"], "Enter another channel");
        assert_eq!(parsed["errors"]["social.twitter"]["message"], "Field is required");
    }

    #[test]
    fn replay_runs_events_in_order() {
        let script = json!([
            { "event": "input", "path": "channel", "value": "rust streams" },
            { "event": "input", "path": "social.twitter", "value": "@rust" },
            { "event": "append", "path": "phNumbers", "value": { "number": "555" } },
            { "event": "swap", "path": "phNumbers", "a": 0, "b": 1 },
            { "event": "submit" }
        ]);
        let result = replay("youtube-form", "", &script.to_string());
        let parsed: Value = serde_json::from_str(&result).expect("json");
        assert_eq!(parsed["submissions"][0]["valid"], true);
        assert_eq!(parsed["values"]["phNumbers"][0]["number"], "555");
        assert_eq!(parsed["state"]["submit_count"], 1);
        assert_eq!(
            parsed["snapshot"]["arrays"]["phNumbers"]
                .as_array()
                .map(Vec::len),
            Some(2)
        );
    }

    #[test]
    fn replayed_submissions_match_validate_values() {
        let script = json!([
            { "event": "input", "path": "username", "value": "" },
            { "event": "submit" }
        ]);
        let replayed: Value =
            serde_json::from_str(&replay("youtube-form", "", &script.to_string())).expect("json");
        let validated: Value = serde_json::from_str(&validate_values(
            "youtube-form",
            "",
            &json!({ "username": "" }).to_string(),
        ))
        .expect("json");
        assert_eq!(replayed["submissions"][0], validated);
        assert_eq!(validated["values"], Value::Null);
        assert_eq!(validated["errors"]["username"]["message"], "Username is required");
    }

    #[test]
    fn replay_appends_after_replacing_an_array() {
        let script = json!([
            { "event": "set_value", "path": "phNumbers", "value": [] },
            { "event": "append", "path": "phNumbers", "value": { "number": "9" } }
        ]);
        let parsed: Value =
            serde_json::from_str(&replay("youtube-form", "", &script.to_string())).expect("json");
        assert_eq!(parsed["values"]["phNumbers"], json!([{ "number": "9" }]));
        assert_eq!(
            parsed["snapshot"]["arrays"]["phNumbers"]
                .as_array()
                .map(Vec::len),
            Some(1)
        );
    }

    #[test]
    fn replay_reports_the_failing_event() {
        let script = json!([
            { "event": "blur", "path": "username" },
            { "event": "remove", "path": "phNumbers", "index": 0 }
        ]);
        let result = replay("youtube-form", "", &script.to_string());
        let parsed: Value = serde_json::from_str(&result).expect("json");
        let error = parsed["error"].as_str().expect("error");
        assert!(error.starts_with("event 1 (remove) failed"));
    }

    #[test]
    fn replay_rejects_unknown_events() {
        let result = replay("youtube-form", "", r#"[{ "event": "explode" }]"#);
        let parsed: Value = serde_json::from_str(&result).expect("json");
        assert!(
            parsed["error"]
                .as_str()
                .unwrap_or_default()
                .starts_with("failed to parse event script")
        );
    }

    #[test]
    fn snapshot_text_outputs_summary() {
        let script = json!([{ "event": "set_value", "path": "username", "value": "", "touch": true, "validate": true }]);
        let output = snapshot_text("youtube-form", "", &script.to_string());
        assert!(output.contains("Form: youtube-form"));
        assert!(output.contains("Username is required"));
    }

    #[test]
    fn custom_spec_comes_from_config() {
        let spec = json!({
            "id": "tiny",
            "title": "Tiny",
            "mode": "on_change",
            "default_values": { "name": "" },
            "fields": [{ "path": "name", "required": "Name is required" }]
        });
        let config = json!({ "form_spec_json": spec.to_string() });
        let output = snapshot_json("tiny", &config.to_string(), r#"[{ "event": "input", "path": "name", "value": "" }]"#);
        let parsed: Value = serde_json::from_str(&output).expect("json");
        assert_eq!(parsed["form_id"], "tiny");
        assert_eq!(parsed["error_count"], 1);
    }
}
