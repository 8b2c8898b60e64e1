//! Template expression scoping.
//!
//! Render functions receive the component proxy as `_ctx`, so every free
//! identifier in a template expression is rewritten to a property access on
//! it (`count + 1` → `_ctx.count + 1`). Identifiers bound inside the
//! expression, `v-for` aliases, `$event` and well-known globals are left
//! alone. The edits are spliced into the original text so the author's
//! formatting survives.

use crate::compiler::{parse_expression, parse_module, CompilerError};
use swc_common::BytePos;
use swc_ecma_ast::{
    ArrowExpr, Expr, Function, Ident, ObjectPatProp, Pat, Prop, SimpleAssignTarget, VarDeclarator,
};
use swc_ecma_visit::{Visit, VisitWith};

/// Names that resolve globally inside templates.
const GLOBALS: &[&str] = &[
    "Infinity",
    "undefined",
    "NaN",
    "isFinite",
    "isNaN",
    "parseFloat",
    "parseInt",
    "decodeURI",
    "decodeURIComponent",
    "encodeURI",
    "encodeURIComponent",
    "Math",
    "Number",
    "Date",
    "Array",
    "Object",
    "Boolean",
    "String",
    "RegExp",
    "Map",
    "Set",
    "JSON",
    "Intl",
    "BigInt",
    "console",
    "Error",
    "Symbol",
];

/// Prefix free identifiers of a single expression.
///
/// `scope` lists names bound by enclosing template constructs.
pub fn prefix_expression(source: &str, scope: &[String]) -> Result<String, CompilerError> {
    let parsed = parse_expression(source)?;
    let mut prefixer = Prefixer::new(scope);
    parsed.expr.visit_with(&mut prefixer);

    let edits = prefixer
        .edits
        .into_iter()
        .map(|(pos, text)| (parsed.offset(pos), text))
        .collect();
    Ok(splice(source, edits))
}

/// Prefix free identifiers of a statement list, e.g. an inline handler.
pub fn prefix_statements(source: &str, scope: &[String]) -> Result<String, CompilerError> {
    let parsed = parse_module("handler", source)?;
    let mut prefixer = Prefixer::new(scope);
    parsed.module.visit_with(&mut prefixer);

    let edits = prefixer
        .edits
        .into_iter()
        .map(|(pos, text)| (parsed.offset(pos), text))
        .collect();
    Ok(splice(source, edits))
}

fn splice(source: &str, mut edits: Vec<(usize, String)>) -> String {
    edits.sort_by(|a, b| b.0.cmp(&a.0));
    let mut out = source.to_string();
    for (offset, text) in edits {
        if offset <= out.len() && out.is_char_boundary(offset) {
            out.insert_str(offset, &text);
        }
    }
    out
}

struct Prefixer<'a> {
    scope: &'a [String],
    locals: Vec<Vec<String>>,
    edits: Vec<(BytePos, String)>,
}

impl<'a> Prefixer<'a> {
    fn new(scope: &'a [String]) -> Self {
        Self {
            scope,
            locals: vec![Vec::new()],
            edits: Vec::new(),
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        GLOBALS.contains(&name)
            || self.scope.iter().any(|s| s == name)
            || self.locals.iter().flatten().any(|s| s == name)
    }

    fn reference(&mut self, id: &Ident) {
        if !self.is_bound(&id.sym) {
            self.edits.push((id.span.lo, "_ctx.".to_string()));
        }
    }

    fn with_frame(&mut self, names: Vec<String>, f: impl FnOnce(&mut Self)) {
        self.locals.push(names);
        f(self);
        self.locals.pop();
    }
}

impl Visit for Prefixer<'_> {
    fn visit_expr(&mut self, n: &Expr) {
        if let Expr::Ident(id) = n {
            self.reference(id);
        } else {
            n.visit_children_with(self);
        }
    }

    fn visit_prop(&mut self, n: &Prop) {
        match n {
            // `{ count }` → `{ count: _ctx.count }`
            Prop::Shorthand(id) if !self.is_bound(&id.sym) => {
                self.edits.push((id.span.hi, format!(": _ctx.{}", id.sym)));
            }
            Prop::Shorthand(_) => {}
            _ => n.visit_children_with(self),
        }
    }

    fn visit_simple_assign_target(&mut self, n: &SimpleAssignTarget) {
        if let SimpleAssignTarget::Ident(binding) = n {
            self.reference(&binding.id);
        } else {
            n.visit_children_with(self);
        }
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        let mut names = Vec::new();
        for param in &n.params {
            binding_names(param, &mut names);
        }
        self.with_frame(names, |this| n.body.visit_with(this));
    }

    fn visit_function(&mut self, n: &Function) {
        let mut names = Vec::new();
        for param in &n.params {
            binding_names(&param.pat, &mut names);
        }
        self.with_frame(names, |this| n.body.visit_with(this));
    }

    fn visit_var_declarator(&mut self, n: &VarDeclarator) {
        let mut names = Vec::new();
        binding_names(&n.name, &mut names);
        if let Some(frame) = self.locals.last_mut() {
            frame.extend(names);
        }
        n.init.visit_with(self);
    }
}

/// Names bound by a parameter or declaration pattern.
fn binding_names(pat: &Pat, out: &mut Vec<String>) {
    match pat {
        Pat::Ident(binding) => out.push(binding.id.sym.to_string()),
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                binding_names(elem, out);
            }
        }
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => binding_names(&kv.value, out),
                    ObjectPatProp::Assign(assign) => out.push(assign.key.sym.to_string()),
                    ObjectPatProp::Rest(rest) => binding_names(&rest.arg, out),
                }
            }
        }
        Pat::Rest(rest) => binding_names(&rest.arg, out),
        Pat::Assign(assign) => binding_names(&assign.left, out),
        Pat::Expr(_) | Pat::Invalid(_) => {}
    }
}

/// Names introduced by a `v-for` alias such as `item`, `(item, index)` or
/// `({ id, name }, i)`.
pub fn alias_names(alias: &str) -> Result<Vec<String>, CompilerError> {
    let alias = alias.trim();
    let params = if alias.starts_with('(') {
        alias.to_string()
    } else {
        format!("({alias})")
    };

    let parsed = parse_expression(&format!("{params} => 0"))?;
    let mut names = Vec::new();
    let mut expr = &*parsed.expr;
    while let Expr::Paren(paren) = expr {
        expr = &paren.expr;
    }
    match expr {
        Expr::Arrow(arrow) => {
            for param in &arrow.params {
                binding_names(param, &mut names);
            }
            Ok(names)
        }
        _ => Err(CompilerError::parse_error(format!("invalid v-for alias: {alias}"))),
    }
}
