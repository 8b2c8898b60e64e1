//! Single-file component splitting.
//!
//! One `.vue` file is served as two modules under the same path:
//!
//! - `/App.vue` is the script module. The component options object is bound
//!   to `__script`, the render function is imported from the render module
//!   and attached, and `__script` becomes the default export.
//! - `/App.vue?type=template` is the render module compiled from the
//!   template block.
//!
//! Both modules go through the import rewriter.

use crate::compiler::parse_module;
use crate::dev::classify::TEMPLATE_QUERY;
use crate::dev::rewrite::ImportRewriter;
use crate::dev::sfc::parse_component;
use crate::dev::template::{compile_template, js_string, EMPTY_RENDER_MODULE};
use crate::error::Error;
use swc_common::Spanned;
use swc_ecma_ast::{DefaultDecl, ExportSpecifier, ModuleDecl, ModuleExportName, ModuleItem, NamedExport};

/// Local binding that holds the component options in the script module.
pub const SCRIPT_BINDING: &str = "__script";

/// Which of the two modules a component request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentPart {
    Script,
    Render,
}

impl ComponentPart {
    /// `type=template` selects the render module; anything else the script.
    #[must_use]
    pub fn from_query(query_type: Option<&str>) -> Self {
        match query_type {
            Some(TEMPLATE_QUERY) => Self::Render,
            _ => Self::Script,
        }
    }
}

/// Produce the script or render module for component `source`.
///
/// `request_path` is the component's URL path without a query string; the
/// script module imports its render module from that path.
pub fn split_component(
    request_path: &str,
    source: &str,
    query_type: Option<&str>,
) -> Result<String, Error> {
    let descriptor = parse_component(request_path, source)?;
    let rewriter = ImportRewriter::new();

    match ComponentPart::from_query(query_type) {
        ComponentPart::Render => match &descriptor.template {
            Some(template) => {
                let module = compile_template(template.content)
                    .map_err(|e| Error::parse(request_path, format!("template: {e}")))?;
                rewriter.rewrite(request_path, &module)
            }
            None => Ok(EMPTY_RENDER_MODULE.to_string()),
        },
        ComponentPart::Script => {
            let bound = match &descriptor.script {
                Some(script) => bind_default_export(request_path, script.content)?,
                None => format!("const {SCRIPT_BINDING} = {{}}\n"),
            };
            let mut module = rewriter.rewrite(request_path, &bound)?;
            if !module.ends_with('\n') {
                module.push('\n');
            }

            let render_url = js_string(&format!("{request_path}?type={TEMPLATE_QUERY}"))
                .map_err(|e| Error::parse(request_path, e.to_string()))?;
            module.push_str(&format!(
                "import {{ render as __render }} from {render_url}\n"
            ));
            if descriptor.template.is_some() {
                module.push_str(&format!("{SCRIPT_BINDING}.render = __render\n"));
            } else {
                // The script may bring its own render function.
                module.push_str(&format!(
                    "if (!{SCRIPT_BINDING}.render) {SCRIPT_BINDING}.render = __render\n"
                ));
            }
            module.push_str(&format!("export default {SCRIPT_BINDING}\n"));
            Ok(module)
        }
    }
}

/// Turn `export default <value>` into `const __script = <value>`.
///
/// A named default function or class stays a declaration so the rest of the
/// script can refer to it; `const __script = <name>` is appended instead. A
/// script without a default export gets an empty options object.
fn bind_default_export(file: &str, code: &str) -> Result<String, Error> {
    let parsed = parse_module(file, code).map_err(|e| Error::parse(file, e.to_string()))?;

    let mut target = None;
    for item in &parsed.module.body {
        let ModuleItem::ModuleDecl(decl) = item else {
            continue;
        };
        match decl {
            ModuleDecl::ExportDefaultExpr(_) => {
                target = Some((parsed.offset(decl.span().lo), None));
            }
            ModuleDecl::ExportDefaultDecl(export) => {
                let name = match &export.decl {
                    DefaultDecl::Class(class) => class.ident.as_ref(),
                    DefaultDecl::Fn(function) => function.ident.as_ref(),
                    DefaultDecl::TsInterfaceDecl(_) => None,
                };
                target = Some((
                    parsed.offset(decl.span().lo),
                    name.map(|ident| ident.sym.to_string()),
                ));
            }
            ModuleDecl::ExportNamed(named) if exports_default(named) => {
                return Err(Error::parse(
                    file,
                    "`export { ... as default }` is not supported in components; use `export default`",
                ));
            }
            _ => {}
        }
    }

    let Some((start, name)) = target else {
        return Ok(with_binding(code.to_string(), "{}"));
    };

    let after_export = code[start..]
        .strip_prefix("export")
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix("default"))
        .ok_or_else(|| Error::parse(file, "could not locate `export default`"))?;
    let end = code.len() - after_export.len();

    Ok(match name {
        Some(name) => with_binding(
            format!("{}{}", &code[..start], code[end..].trim_start()),
            &name,
        ),
        None => format!("{}const {SCRIPT_BINDING} ={}", &code[..start], &code[end..]),
    })
}

/// Append `const __script = <value>` on its own line.
fn with_binding(mut code: String, value: &str) -> String {
    if !code.is_empty() && !code.ends_with('\n') {
        code.push('\n');
    }
    code.push_str(&format!("const {SCRIPT_BINDING} = {value}\n"));
    code
}

fn exports_default(named: &NamedExport) -> bool {
    named.specifiers.iter().any(|specifier| match specifier {
        ExportSpecifier::Named(n) => {
            let exported = n.exported.as_ref().unwrap_or(&n.orig);
            match exported {
                ModuleExportName::Ident(ident) => &*ident.sym == "default",
                ModuleExportName::Str(s) => &*s.value == "default",
            }
        }
        ExportSpecifier::Default(_) => true,
        ExportSpecifier::Namespace(_) => false,
    })
}
