//! Decoding of resolved action strings
//!
//! An action string is resolved once per visit, then split on `;` into an
//! operator (lower-cased) and positional arguments and decoded into a
//! [`Command`]. The raw string is kept only for diagnostics.

use super::error::EngineError;
use std::time::Duration;

/// A decoded action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `for;<var>;<from>;<to>`
    For { variable: String, from: i64, to: i64 },
    /// `next`
    Next,
    /// `end`
    End,
    /// `error;<message>`
    Error { message: String },
    /// `print;<text>`
    Print { text: String },
    /// `goto;<label>`
    Goto { label: String },
    /// `wait;<n>`, `wait-seconds;<n>`, `wait-minutes;<n>`
    Wait { duration: Duration },
    /// Anything else: a registered handler
    Invoke { name: String, args: Vec<String> },
}

/// Operator names the engine interprets itself
pub const BUILTIN_OPERATORS: &[&str] = &[
    "for",
    "next",
    "end",
    "error",
    "print",
    "goto",
    "wait",
    "wait-seconds",
    "wait-minutes",
];

impl Command {
    /// Decode a resolved action string
    pub fn parse(resolved: &str) -> Result<Self, EngineError> {
        let (operator, args) = split_action(resolved);

        match operator.as_str() {
            "for" => {
                require_args("for", &args, 3)?;
                Ok(Command::For {
                    variable: args[0].trim().to_string(),
                    from: parse_int("for", &args[1])?,
                    to: parse_int("for", &args[2])?,
                })
            }
            "next" => Ok(Command::Next),
            "end" => Ok(Command::End),
            "error" => Ok(Command::Error {
                message: args.join(";"),
            }),
            "print" => Ok(Command::Print {
                text: args.join(";"),
            }),
            "goto" => {
                require_args("goto", &args, 1)?;
                Ok(Command::Goto {
                    label: args[0].trim().to_string(),
                })
            }
            "wait" | "wait-seconds" => {
                require_args("wait-seconds wait", &args, 1)?;
                let seconds = parse_count("wait-seconds wait", &args[0])?;
                Ok(Command::Wait {
                    duration: Duration::from_secs(seconds),
                })
            }
            "wait-minutes" => {
                require_args("wait-minutes", &args, 1)?;
                let minutes = parse_count("wait-minutes", &args[0])?;
                Ok(Command::Wait {
                    duration: Duration::from_secs(minutes.saturating_mul(60)),
                })
            }
            _ => Ok(Command::Invoke {
                name: operator,
                args,
            }),
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &str {
        match self {
            Command::For { .. } => "for",
            Command::Next => "next",
            Command::End => "end",
            Command::Error { .. } => "error",
            Command::Print { .. } => "print",
            Command::Goto { .. } => "goto",
            Command::Wait { .. } => "wait",
            Command::Invoke { name, .. } => name,
        }
    }
}

/// What happens when a handler fails and errors are not swallowed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailDirective {
    /// Stop the run with the handler's error
    End,
    /// Continue at the labelled action
    Goto { label: String },
}

impl FailDirective {
    /// Decode a resolved `fail` string; empty means `End`
    pub fn parse(resolved: &str) -> Result<Self, EngineError> {
        let (operator, args) = split_action(resolved);
        match operator.as_str() {
            "" | "end" => Ok(FailDirective::End),
            "goto" => {
                require_args("goto", &args, 1)?;
                Ok(FailDirective::Goto {
                    label: args[0].trim().to_string(),
                })
            }
            _ => Err(EngineError::InvalidFailDirective {
                directive: resolved.to_string(),
            }),
        }
    }
}

/// Split `name;arg;...` into a lower-cased operator and raw arguments
pub fn split_action(resolved: &str) -> (String, Vec<String>) {
    let mut parts = resolved.split(';');
    let operator = parts.next().unwrap_or_default().trim().to_lowercase();
    let args = parts.map(str::to_string).collect();
    (operator, args)
}

fn require_args(command: &str, args: &[String], expected: usize) -> Result<(), EngineError> {
    if args.len() < expected {
        return Err(EngineError::NotEnoughArgs {
            command: command.to_string(),
            expected: expected + 1,
            found: args.len() + 1,
        });
    }
    Ok(())
}

fn parse_int(command: &str, value: &str) -> Result<i64, EngineError> {
    value
        .trim()
        .parse()
        .map_err(|_| EngineError::InvalidInteger {
            command: command.to_string(),
            value: value.to_string(),
        })
}

fn parse_count(command: &str, value: &str) -> Result<u64, EngineError> {
    value
        .trim()
        .parse()
        .map_err(|_| EngineError::InvalidInteger {
            command: command.to_string(),
            value: value.to_string(),
        })
}
