use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use component_form::{get_spec_schema, replay, snapshot_json, snapshot_text, validate_values};
use form_spec::FormSpec;
use serde_json::{Value, json};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Headless form session driver",
    long_about = "Validates values, replays editing sessions and inspects form state for a FormSpec"
)]
struct Cli {
    /// Log session events to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a set of values as if the form were submitted.
    Validate {
        /// Path to the FormSpec JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Path to the values JSON file; missing keys keep their defaults.
        #[arg(long, value_name = "VALUES")]
        values: PathBuf,
    },
    /// Replay a JSON event script and print submissions and the final state.
    Replay {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// JSON array of session events.
        #[arg(long, value_name = "SCRIPT")]
        script: PathBuf,
    },
    /// Print the inspection snapshot, optionally after replaying a script.
    Inspect {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        #[arg(long, value_name = "SCRIPT")]
        script: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the JSON Schema of the FormSpec format.
    Schema,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Validate { spec, values } => run_validate(&spec, &values),
        Command::Replay { spec, script } => run_replay(&spec, &script),
        Command::Inspect {
            spec,
            script,
            format,
        } => run_inspect(&spec, script.as_deref(), format),
        Command::Schema => run_schema(),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Reads and checks a spec file; returns its id and the component config.
fn load_spec(spec_path: &Path) -> CliResult<(String, String)> {
    let spec_json = fs::read_to_string(spec_path)?;
    let spec = FormSpec::from_json(&spec_json)?;
    tracing::debug!(form = %spec.id, fields = spec.fields.len(), "loaded form spec");
    let config = json!({ "form_spec_json": spec_json }).to_string();
    Ok((spec.id, config))
}

fn read_optional(path: Option<&Path>) -> CliResult<String> {
    match path {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => Ok(String::new()),
    }
}

/// Component responses carry failures as `{"error": ...}`.
fn parse_response(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(error.to_string().into());
    }
    Ok(value)
}

fn run_validate(spec_path: &Path, values_path: &Path) -> CliResult<()> {
    let (form_id, config) = load_spec(spec_path)?;
    let values_json = fs::read_to_string(values_path)?;
    let result = parse_response(&validate_values(&form_id, &config, &values_json))?;

    let valid = result["valid"].as_bool().unwrap_or(false);
    println!(
        "Validation result: {}",
        if valid { "valid" } else { "invalid" }
    );
    describe_errors(&result["errors"]);

    if valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_errors(errors: &Value) {
    let Some(errors) = errors.as_object().filter(|errors| !errors.is_empty()) else {
        return;
    };
    println!("Errors:");
    for (path, error) in errors {
        println!(
            "  {} - {}",
            path,
            error["message"].as_str().unwrap_or("<no message>")
        );
    }
}

fn run_replay(spec_path: &Path, script_path: &Path) -> CliResult<()> {
    let (form_id, config) = load_spec(spec_path)?;
    let script = fs::read_to_string(script_path)?;
    let result = parse_response(&replay(&form_id, &config, &script))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn run_inspect(spec_path: &Path, script_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
    let (form_id, config) = load_spec(spec_path)?;
    let script = read_optional(script_path)?;
    match format {
        OutputFormat::Json => {
            let snapshot = parse_response(&snapshot_json(&form_id, &config, &script))?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        OutputFormat::Text => {
            let text = snapshot_text(&form_id, &config, &script);
            // text rendering only falls back to JSON on failure
            if text.starts_with('{') {
                parse_response(&text)?;
            }
            println!("{}", text);
        }
    }
    Ok(())
}

fn run_schema() -> CliResult<()> {
    let schema = parse_response(&get_spec_schema())?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
