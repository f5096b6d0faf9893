//! Filters available inside action tokens

use super::resolver::parse_bool;
use minijinja::value::Value;
use minijinja::{Error, ErrorKind, State};

/// Register the custom filters with a minijinja Environment
pub fn register_filters(env: &mut minijinja::Environment) {
    env.add_filter("shell_escape", filter_shell_escape);
    env.add_filter("json", filter_json);
    env.add_filter("flag", filter_flag);
    env.add_filter("strftime", filter_strftime);
}

/// Quote a value for interpolation into a `shell` action
///
/// `it's here` becomes `'it'\''s here'`; plain words pass through.
fn filter_shell_escape(_state: &State, value: Value) -> Result<Value, Error> {
    let s = value.to_string();
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '='));
    if plain {
        return Ok(Value::from(s));
    }

    Ok(Value::from(format!("'{}'", s.replace('\'', "'\\''"))))
}

/// Serialize a value to compact JSON
fn filter_json(_state: &State, value: Value) -> Result<Value, Error> {
    serde_json::to_string(&value)
        .map(Value::from)
        .map_err(|e| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("JSON serialization failed: {}", e),
            )
        })
}

/// Interpret a value the way `disabled` and `continue_on_error` are interpreted
fn filter_flag(_state: &State, value: Value) -> Result<Value, Error> {
    if value.is_undefined() || value.is_none() {
        return Ok(Value::from(false));
    }
    if let Some(b) = value.as_str().map(parse_bool) {
        return Ok(Value::from(b));
    }
    Ok(Value::from(value.is_true()))
}

/// Format `"now"` or an RFC3339 timestamp
///
/// Example: `print;started {{ "now" | strftime("%H:%M:%S") }}`
fn filter_strftime(_state: &State, value: Value, format: &str) -> Result<Value, Error> {
    let input = value.as_str().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            "strftime expects \"now\" or an RFC3339 string",
        )
    })?;

    let datetime = if input == "now" {
        chrono::Utc::now()
    } else {
        chrono::DateTime::parse_from_rfc3339(input)
            .map_err(|e| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("failed to parse datetime '{}': {}", input, e),
                )
            })?
            .with_timezone(&chrono::Utc)
    };

    Ok(Value::from(datetime.format(format).to_string()))
}
