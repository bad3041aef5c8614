//! Expression Evaluator (§2 item 1, §4.1): `$.path`, `{{ }}` templates,
//! `fn.x(...)` builtins, and deep-object substitution against a per-execution
//! context.

pub mod builtins;
pub mod context;
pub mod path;
pub mod template;
pub mod transform;

pub use context::ExpressionContext;
pub use path::resolve_path;
pub use template::{resolve_object, resolve_string};
