//! Parser/printer service for JavaScript modules.
//!
//! The rest of toyvite never calls SWC directly: it parses through
//! [`parse_module`] / [`parse_expression`], edits the returned AST, and prints
//! it back with [`print_module`].
//!
//! ## Usage
//!
//! ```ignore
//! use toyvite_core::compiler::{parse_module, print_module};
//!
//! let mut parsed = parse_module("/main.js", "import { ref } from 'vue';")?;
//! // ... mutate parsed.module ...
//! let code = print_module(&parsed)?;
//! ```

pub mod swc;

pub use swc::{parse_expression, parse_module, print_module, ParsedExpression, ParsedModule};

use std::fmt;

/// Error raised by the parser or the code emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerError {
    /// Error code.
    pub code: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// 1-based line of the offending token, when known.
    pub line: Option<usize>,
    /// 0-based column of the offending token, when known.
    pub column: Option<usize>,
}

impl CompilerError {
    /// Create a new compiler error.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Create a parse error.
    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new("COMPILER_PARSE_ERROR", message)
    }

    /// Create an emit error.
    #[must_use]
    pub fn emit_error(message: impl Into<String>) -> Self {
        Self::new("COMPILER_EMIT_ERROR", message)
    }

    /// Attach a source position.
    #[must_use]
    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let (Some(line), Some(col)) = (self.line, self.column) {
            write!(f, " at {line}:{col}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompilerError {}
