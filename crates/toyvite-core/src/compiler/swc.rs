//! SWC-backed parsing and printing.
//!
//! Every call builds its own `SourceMap` and comment store, so parsed modules
//! are independent of each other and safe to produce on any thread.

use super::CompilerError;
use swc_common::{
    comments::SingleThreadedComments, sync::Lrc, BytePos, FileName, SourceMap, Spanned,
};
use swc_ecma_ast::{EsVersion, Expr, Module, ModuleItem, Stmt};
use swc_ecma_codegen::{text_writer::JsWriter, Emitter};
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax};

/// A parsed module together with the state needed to print it again.
pub struct ParsedModule {
    /// The module AST. Edit it in place before calling [`print_module`].
    pub module: Module,
    cm: Lrc<SourceMap>,
    comments: SingleThreadedComments,
    start_pos: BytePos,
}

impl ParsedModule {
    /// Byte offset of `pos` within the source text that was parsed.
    #[must_use]
    pub fn offset(&self, pos: BytePos) -> usize {
        (pos.0 - self.start_pos.0) as usize
    }
}

/// A single parsed expression.
pub struct ParsedExpression {
    pub expr: Box<Expr>,
    start_pos: BytePos,
}

impl ParsedExpression {
    /// Byte offset of `pos` within the original expression text.
    #[must_use]
    pub fn offset(&self, pos: BytePos) -> usize {
        // One byte for the opening parenthesis added by `parse_expression`.
        (pos.0 - self.start_pos.0) as usize - 1
    }
}

fn syntax() -> Syntax {
    Syntax::Es(EsSyntax::default())
}

/// Parse `source` as an ES module.
pub fn parse_module(name: &str, source: &str) -> Result<ParsedModule, CompilerError> {
    let cm: Lrc<SourceMap> = Lrc::default();
    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom(name.to_string())),
        source.to_string(),
    );
    let comments = SingleThreadedComments::default();

    let module = {
        let lexer = Lexer::new(
            syntax(),
            EsVersion::EsNext,
            StringInput::from(&*fm),
            Some(&comments),
        );
        let mut parser = Parser::new_from(lexer);
        let module = parser
            .parse_module()
            .map_err(|e| describe(&cm, name, &e))?;
        if let Some(e) = parser.take_errors().first() {
            return Err(describe(&cm, name, e));
        }
        module
    };

    Ok(ParsedModule {
        module,
        cm,
        comments,
        start_pos: fm.start_pos,
    })
}

/// Parse `source` as a single expression.
///
/// The text is wrapped in parentheses first so that object literals parse as
/// expressions rather than blocks.
pub fn parse_expression(source: &str) -> Result<ParsedExpression, CompilerError> {
    let wrapped = format!("({source})");
    let parsed = parse_module("expression", &wrapped)?;
    let start_pos = parsed.start_pos;

    let mut body = parsed.module.body;
    match (body.pop(), body.is_empty()) {
        (Some(ModuleItem::Stmt(Stmt::Expr(stmt))), true) => Ok(ParsedExpression {
            expr: stmt.expr,
            start_pos,
        }),
        _ => Err(CompilerError::parse_error(format!(
            "Expected a single expression: {source}"
        ))),
    }
}

/// Print a module back to source text.
pub fn print_module(parsed: &ParsedModule) -> Result<String, CompilerError> {
    let mut buf = Vec::new();

    {
        let writer = JsWriter::new(parsed.cm.clone(), "\n", &mut buf, None);

        let mut emitter = Emitter {
            cfg: swc_ecma_codegen::Config::default().with_target(EsVersion::EsNext),
            cm: parsed.cm.clone(),
            comments: Some(&parsed.comments),
            wr: writer,
        };

        emitter
            .emit_module(&parsed.module)
            .map_err(|e| CompilerError::emit_error(format!("Failed to emit: {e}")))?;
    }

    String::from_utf8(buf)
        .map_err(|e| CompilerError::emit_error(format!("Invalid UTF-8 output: {e}")))
}

fn describe(cm: &SourceMap, name: &str, e: &swc_ecma_parser::error::Error) -> CompilerError {
    let loc = cm.lookup_char_pos(e.span().lo);
    CompilerError::parse_error(format!("{name}: {:?}", e.kind())).at(loc.line, loc.col.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_print_roundtrip() {
        let parsed = parse_module("/main.js", "const x = 1;\nexport default x;\n").unwrap();
        let code = print_module(&parsed).unwrap();
        assert!(code.contains("const x = 1;"));
        assert!(code.contains("export default x;"));
    }

    #[test]
    fn test_comments_survive_printing() {
        let parsed = parse_module("/main.js", "// keep me\nconst x = 1;\n").unwrap();
        let code = print_module(&parsed).unwrap();
        assert!(code.contains("// keep me"));
    }

    #[test]
    fn test_parse_error_has_position() {
        let Err(err) = parse_module("/broken.js", "const x = {") else {
            panic!("expected a parse error");
        };
        assert_eq!(err.code, "COMPILER_PARSE_ERROR");
        assert!(err.message.contains("/broken.js"));
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn test_offsets_are_relative_to_source() {
        let parsed = parse_module("/main.js", "let a;\nexport default a;").unwrap();
        let lo = match &parsed.module.body[1] {
            ModuleItem::ModuleDecl(decl) => decl.span().lo,
            ModuleItem::Stmt(_) => panic!("expected export"),
        };
        assert_eq!(parsed.offset(lo), 7);
    }

    #[test]
    fn test_parse_expression_object_literal() {
        let parsed = parse_expression("{ active: isActive }").unwrap();
        assert!(matches!(*parsed.expr, Expr::Paren(_)));
    }

    #[test]
    fn test_parse_expression_rejects_statements() {
        assert!(parse_expression("a; b").is_err());
    }
}
