//! Template compiler.
//!
//! Compiles component template markup into a standalone ES module:
//!
//! ```text
//! import { createVNode as _createVNode, ... } from "vue"
//!
//! export function render(_ctx, _cache) {
//!   return _createVNode("div", null, ...)
//! }
//! ```
//!
//! Expressions are scoped through `_ctx` at compile time, so the output never
//! evaluates strings at runtime and contains no `with` block. Runtime helpers
//! are imported from `vue` as a bare specifier; the caller rewrites it like
//! any other import.

mod codegen;
mod expr;
mod parser;

pub use expr::{prefix_expression, prefix_statements};
pub use parser::{parse_template, Attr, Element, TemplateNode};

use crate::compiler::CompilerError;

/// Render module for components without a template.
pub const EMPTY_RENDER_MODULE: &str = "export function render() {\n  return null\n}\n";

/// Compile template markup into a render module.
pub fn compile_template(source: &str) -> Result<String, CompilerError> {
    let roots = parse_template(source)?;
    codegen::Codegen::new().generate(&roots)
}

pub(crate) use codegen::js_string;
