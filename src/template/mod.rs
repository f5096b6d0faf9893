//! Token resolution for actionflow
//!
//! Every action string, `disabled` flag, `continue_on_error` flag and `fail`
//! directive passes through a [`TokenResolver`] before the engine interprets
//! it. The default resolver is a minijinja [`TemplateEngine`].
//!
//! # Example
//!
//! ```ignore
//! use actionflow::template::{Model, TemplateEngine, TokenResolver};
//!
//! let engine = TemplateEngine::new();
//! let mut model = Model::new();
//! model.set_var("count", 3);
//!
//! let action = engine.resolve("for;i;1;{{ count }}", &model)?;
//! assert_eq!(action, "for;i;1;3");
//! ```

mod engine;
mod errors;
mod filters;
mod model;
mod resolver;

pub use engine::{TemplateEngine, has_template_syntax};
pub use errors::{SourceLocation, TemplateError, suggest_correction};
pub use model::Model;
pub use resolver::{LiteralResolver, TokenResolver, parse_bool};
