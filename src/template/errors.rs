//! Token resolution errors

use std::fmt;
use thiserror::Error;

/// Where in a token string resolution failed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}:{}", self.line, self.column)
    }
}

/// Errors raised while resolving a token against the model
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Token references a name the model does not have
    #[error("undefined variable '{name}' in '{token}'{}", .suggestion.as_ref().map(|s| format!(", did you mean '{}'?", s)).unwrap_or_default())]
    UndefinedVariable {
        name: String,
        token: String,
        suggestion: Option<String>,
    },

    /// Token is not a valid template
    #[error("syntax error at {location} in '{token}': {message}")]
    SyntaxError {
        message: String,
        token: String,
        location: SourceLocation,
    },

    /// A filter rejected its input
    #[error("filter '{filter}' failed: {message}")]
    FilterError { filter: String, message: String },

    /// Anything else minijinja reports
    #[error("template error: {0}")]
    Internal(#[from] minijinja::Error),
}

impl TemplateError {
    /// Undefined-variable error with a suggestion drawn from `known`
    pub fn undefined_variable(
        name: impl Into<String>,
        token: impl Into<String>,
        known: &[&str],
    ) -> Self {
        let name = name.into();
        let suggestion = suggest_correction(&name, known);
        Self::UndefinedVariable {
            name,
            token: token.into(),
            suggestion,
        }
    }

    pub fn syntax(message: impl Into<String>, token: impl Into<String>, line: usize) -> Self {
        Self::SyntaxError {
            message: message.into(),
            token: token.into(),
            location: SourceLocation { line, column: 0 },
        }
    }

    pub fn filter(filter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FilterError {
            filter: filter.into(),
            message: message.into(),
        }
    }
}

/// Closest candidate to `typo` within an edit distance of half its length (min 2)
pub fn suggest_correction(typo: &str, candidates: &[&str]) -> Option<String> {
    let max_distance = (typo.chars().count() / 2).max(2);

    candidates
        .iter()
        .map(|candidate| (edit_distance(typo, candidate), *candidate))
        .filter(|(distance, _)| *distance <= max_distance)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate.to_string())
}

/// Levenshtein distance, two rows at a time
fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}
