//! Import rewriting for unbundled dev serving.
//!
//! Browsers only resolve specifiers that start with `/`, `./` or `../`. Every
//! other specifier names a package (`vue`, `@vue/shared`) and is rewritten to
//! the library root, e.g. `vue` → `/node_modules/vue`.
//!
//! Rewriting works on the SWC AST: the visitor gets `&mut` access to each
//! import/export source literal and replaces it in the tree, which is then
//! printed back. Sources with nothing to rewrite are returned verbatim.

use crate::compiler::{parse_module, print_module};
use crate::error::Error;
use swc_ecma_ast::{CallExpr, Callee, ExportAll, Expr, ImportDecl, Lit, Module, NamedExport, Str};
use swc_ecma_visit::{VisitMut, VisitMutWith};

/// URL namespace under which third-party packages are served.
pub const LIBRARY_ROOT: &str = "/node_modules/";

/// Specifiers the browser can resolve on its own.
#[must_use]
pub fn is_legal_specifier(specifier: &str) -> bool {
    specifier.starts_with('/') || specifier.starts_with("./") || specifier.starts_with("../")
}

/// Full URLs are not package names and are left alone.
fn is_url(specifier: &str) -> bool {
    ["http://", "https://", "data:", "blob:"]
        .iter()
        .any(|scheme| specifier.starts_with(scheme))
}

/// A non-empty specifier naming a package.
#[must_use]
pub fn is_bare_specifier(specifier: &str) -> bool {
    !specifier.is_empty() && !is_legal_specifier(specifier) && !is_url(specifier)
}

/// Import rewriter for dev server module serving.
#[derive(Debug, Clone)]
pub struct ImportRewriter {
    library_root: String,
}

impl Default for ImportRewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportRewriter {
    /// Create a rewriter targeting [`LIBRARY_ROOT`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            library_root: LIBRARY_ROOT.to_string(),
        }
    }

    /// Rewrite the specifier if it is bare.
    #[must_use]
    pub fn rewrite_specifier(&self, specifier: &str) -> Option<String> {
        is_bare_specifier(specifier).then(|| format!("{}{specifier}", self.library_root))
    }

    /// Rewrite bare specifiers in `code`.
    ///
    /// `file` names the module in parse errors. The source must be a valid ES
    /// module; applying this twice yields the same text as applying it once.
    pub fn rewrite(&self, file: &str, code: &str) -> Result<String, Error> {
        let mut parsed =
            parse_module(file, code).map_err(|e| Error::parse(file, e.to_string()))?;

        if self.rewrite_module(&mut parsed.module) == 0 {
            return Ok(code.to_string());
        }

        print_module(&parsed).map_err(|e| Error::parse(file, e.to_string()))
    }

    /// Rewrite bare specifiers in place. Returns how many were changed.
    pub fn rewrite_module(&self, module: &mut Module) -> usize {
        let mut visitor = SpecifierVisitor {
            rewriter: self,
            rewritten: 0,
        };
        module.visit_mut_with(&mut visitor);
        visitor.rewritten
    }
}

struct SpecifierVisitor<'a> {
    rewriter: &'a ImportRewriter,
    rewritten: usize,
}

impl SpecifierVisitor<'_> {
    fn rewrite_source(&mut self, src: &mut Str) {
        let Some(rewritten) = self.rewriter.rewrite_specifier(&src.value) else {
            return;
        };

        // Keep the author's quote style when it can be reused safely.
        let quote = src
            .raw
            .as_ref()
            .and_then(|raw| raw.chars().next())
            .filter(|c| *c == '\'' || *c == '"')
            .unwrap_or('"');
        src.raw = if rewritten.contains(quote) || rewritten.contains('\\') {
            None
        } else {
            Some(format!("{quote}{rewritten}{quote}").into())
        };
        src.value = rewritten.into();
        self.rewritten += 1;
    }
}

impl VisitMut for SpecifierVisitor<'_> {
    fn visit_mut_import_decl(&mut self, n: &mut ImportDecl) {
        self.rewrite_source(&mut n.src);
    }

    fn visit_mut_export_all(&mut self, n: &mut ExportAll) {
        self.rewrite_source(&mut n.src);
    }

    fn visit_mut_named_export(&mut self, n: &mut NamedExport) {
        if let Some(src) = &mut n.src {
            self.rewrite_source(src);
        }
    }

    fn visit_mut_call_expr(&mut self, n: &mut CallExpr) {
        n.visit_mut_children_with(self);

        if !matches!(n.callee, Callee::Import(_)) {
            return;
        }
        if let Some(arg) = n.args.first_mut() {
            if arg.spread.is_none() {
                if let Expr::Lit(Lit::Str(src)) = &mut *arg.expr {
                    self.rewrite_source(src);
                }
            }
        }
    }
}
