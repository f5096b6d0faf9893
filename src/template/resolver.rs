//! Token resolution contract consumed by the engine

use super::errors::TemplateError;
use super::model::Model;

/// Resolves token strings against the run model
///
/// The engine calls this for every `action`, `disabled`, `continue_on_error`
/// and `fail` string before interpreting it.
pub trait TokenResolver: Send + Sync {
    /// Resolve a token to its final text
    fn resolve(&self, token: &str, model: &Model) -> Result<String, TemplateError>;

    /// Resolve a token and interpret the result as a flag
    fn resolve_bool(&self, token: &str, model: &Model) -> Result<bool, TemplateError> {
        if token.trim().is_empty() {
            return Ok(false);
        }
        self.resolve(token, model).map(|s| parse_bool(&s))
    }
}

/// Flag conversion used for `disabled` and `continue_on_error`
///
/// `true`, `yes`, `y`, `on` and `1` (any case, surrounding whitespace ignored)
/// are true; everything else, including the empty string, is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "y" | "on" | "1"
    )
}

/// Resolver that returns tokens untouched
///
/// Useful for manifests without template expressions and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralResolver;

impl TokenResolver for LiteralResolver {
    fn resolve(&self, token: &str, _model: &Model) -> Result<String, TemplateError> {
        Ok(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" TRUE "));
        assert!(parse_bool("yes"));
        assert!(parse_bool("1"));
        assert!(parse_bool("On"));
        assert!(!parse_bool(""));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("maybe"));
    }

    #[test]
    fn test_literal_resolver() {
        let model = Model::new();
        let resolver = LiteralResolver;
        assert_eq!(resolver.resolve("for;i;0;3", &model).unwrap(), "for;i;0;3");
        assert!(resolver.resolve_bool("true", &model).unwrap());
        assert!(!resolver.resolve_bool("", &model).unwrap());
    }
}
