//! minijinja-backed token resolver

use super::errors::TemplateError;
use super::filters;
use super::model::Model;
use super::resolver::TokenResolver;
use minijinja::Environment;

/// Template rendering engine
///
/// Wraps minijinja with the custom filters and strict undefined handling, so a
/// typo in a token fails the action instead of silently rendering empty.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        filters::register_filters(&mut env);
        Self { env }
    }

    /// Render a token string against the model
    ///
    /// ```ignore
    /// let engine = TemplateEngine::new();
    /// let mut model = Model::new();
    /// model.set_var("target", "prod");
    ///
    /// let action = engine.render("print;deploying {{ target }}", &model)?;
    /// assert_eq!(action, "print;deploying prod");
    /// ```
    pub fn render(&self, token: &str, model: &Model) -> Result<String, TemplateError> {
        if !has_template_syntax(token) {
            return Ok(token.to_string());
        }

        self.env
            .render_str(token, model.to_value())
            .map_err(|e| convert_minijinja_error(e, token, model))
    }

    /// Check that a token is syntactically valid without rendering it
    pub fn validate(&self, token: &str) -> Result<(), TemplateError> {
        if !has_template_syntax(token) {
            return Ok(());
        }
        let mut env = self.env.clone();
        env.add_template_owned("__validate__", token.to_string())
            .map_err(|e| TemplateError::syntax(e.to_string(), token, e.line().unwrap_or(0)))
    }
}

impl TokenResolver for TemplateEngine {
    fn resolve(&self, token: &str, model: &Model) -> Result<String, TemplateError> {
        self.render(token, model)
    }
}

/// True if the token contains an expression, statement or comment block
pub fn has_template_syntax(token: &str) -> bool {
    token.contains("{{") || token.contains("{%") || token.contains("{#")
}

fn convert_minijinja_error(err: minijinja::Error, token: &str, model: &Model) -> TemplateError {
    match err.kind() {
        minijinja::ErrorKind::UndefinedError => {
            let name = extract_var_from_error(&err.to_string());
            TemplateError::undefined_variable(name, token, &model.known_variables())
        }
        minijinja::ErrorKind::SyntaxError => {
            TemplateError::syntax(err.to_string(), token, err.line().unwrap_or(0))
        }
        minijinja::ErrorKind::UnknownFilter => TemplateError::filter(
            err.detail().unwrap_or("unknown").to_string(),
            err.to_string(),
        ),
        _ => TemplateError::Internal(err),
    }
}

/// Pull the offending name out of messages like "undefined value ... `vars.foo`"
fn extract_var_from_error(msg: &str) -> String {
    msg.split('`')
        .nth(1)
        .map(|name| name.rsplit('.').next().unwrap_or(name).to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
