//! Node tree → render module source.

use super::expr::{alias_names, prefix_expression, prefix_statements};
use super::parser::{Attr, Element, TemplateNode};
use crate::compiler::CompilerError;
use regex_lite::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Runtime helpers a render module may import from `vue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Helper {
    ResolveComponent,
    CreateVNode,
    CreateTextVNode,
    CreateCommentVNode,
    ToDisplayString,
    Fragment,
    RenderList,
    RenderSlot,
    WithDirectives,
    VShow,
    WithModifiers,
    WithKeys,
}

impl Helper {
    fn name(self) -> &'static str {
        match self {
            Self::ResolveComponent => "resolveComponent",
            Self::CreateVNode => "createVNode",
            Self::CreateTextVNode => "createTextVNode",
            Self::CreateCommentVNode => "createCommentVNode",
            Self::ToDisplayString => "toDisplayString",
            Self::Fragment => "Fragment",
            Self::RenderList => "renderList",
            Self::RenderSlot => "renderSlot",
            Self::WithDirectives => "withDirectives",
            Self::VShow => "vShow",
            Self::WithModifiers => "withModifiers",
            Self::WithKeys => "withKeys",
        }
    }
}

/// Event modifiers handled by `withModifiers`; any other modifier except
/// `once`, `capture` and `passive` is treated as a key filter.
const SYSTEM_MODIFIERS: &[&str] = &[
    "stop", "prevent", "self", "ctrl", "shift", "alt", "meta", "left", "middle", "right", "exact",
];

/// Directives the compiler ignores entirely.
const IGNORED_DIRECTIVES: &[&str] = &["v-cloak", "v-once"];

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// `save`, `form.submit`, `items[0]`: usable directly as a handler or a
/// v-model target.
fn is_simple_path(value: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(
        &RE,
        r#"^[A-Za-z_$][\w$]*(?:\s*\.\s*[A-Za-z_$][\w$]*|\[(?:'[^']*'|"[^"]*"|\d+|[A-Za-z_$][\w$]*)\])*$"#,
    )
    .is_some_and(|re| re.is_match(value))
}

fn is_function_expression(value: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(
        &RE,
        r"^\s*(?:async\s+)?(?:[A-Za-z_$][\w$]*|\([^)]*\))\s*=>|^\s*(?:async\s+)?function(?:\s+[\w$]+)?\s*\(",
    )
    .is_some_and(|re| re.is_match(value))
}

fn is_identifier(value: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"^[A-Za-z_$][\w$]*$").is_some_and(|re| re.is_match(value))
}

/// Split a `v-for` value into its alias and source expression.
fn split_for(value: &str) -> Option<(&str, &str)> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let captures = cached(&RE, r"^\s*([\s\S]*?)\s+(?:in|of)\s+([\s\S]*\S)\s*$")?.captures(value)?;
    Some((captures.get(1)?.as_str().trim(), captures.get(2)?.as_str()))
}

/// A generated child: either a text run or a vnode expression.
enum Child {
    Text(String),
    Node(String),
}

/// Generates the render module for a parsed template.
#[derive(Default)]
pub struct Codegen {
    helpers: BTreeSet<Helper>,
    components: Vec<String>,
    scope: Vec<String>,
}

impl Codegen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a complete ES module exporting `render`.
    pub fn generate(mut self, roots: &[TemplateNode]) -> Result<String, CompilerError> {
        let mut children = self.children(roots)?;
        let root = match children.len() {
            0 => "null".to_string(),
            1 if matches!(children[0], Child::Node(_)) => match children.pop() {
                Some(Child::Node(node)) => node,
                _ => "null".to_string(),
            },
            _ => {
                let items = self.child_exprs(children);
                let fragment = self.helper(Helper::Fragment);
                self.vnode(fragment, None, Some(format!("[{}]", items.join(", "))))
            }
        };

        let mut body = String::new();
        for tag in std::mem::take(&mut self.components) {
            let resolve = self.helper(Helper::ResolveComponent);
            body.push_str(&format!(
                "  const {} = {resolve}({})\n",
                component_binding(&tag),
                js_string(&tag)?
            ));
        }
        body.push_str(&format!("  return {root}\n"));

        let mut out = String::new();
        if !self.helpers.is_empty() {
            let imports: Vec<String> = self
                .helpers
                .iter()
                .map(|h| format!("{} as _{}", h.name(), h.name()))
                .collect();
            out.push_str(&format!("import {{ {} }} from \"vue\"\n\n", imports.join(", ")));
        }
        out.push_str("export function render(_ctx, _cache) {\n");
        out.push_str(&body);
        out.push_str("}\n");
        Ok(out)
    }

    fn helper(&mut self, helper: Helper) -> String {
        self.helpers.insert(helper);
        format!("_{}", helper.name())
    }

    fn expr(&self, source: &str) -> Result<String, CompilerError> {
        prefix_expression(source, &self.scope)
            .map_err(|e| CompilerError::parse_error(format!("invalid expression `{source}`: {}", e.message)))
    }

    fn vnode(&mut self, tag: String, props: Option<String>, children: Option<String>) -> String {
        let create = self.helper(Helper::CreateVNode);
        match (props, children) {
            (None, None) => format!("{create}({tag})"),
            (Some(props), None) => format!("{create}({tag}, {props})"),
            (props, Some(children)) => format!(
                "{create}({tag}, {}, {children})",
                props.as_deref().unwrap_or("null")
            ),
        }
    }

    fn children(&mut self, nodes: &[TemplateNode]) -> Result<Vec<Child>, CompilerError> {
        let mut out = Vec::new();
        let mut i = 0;

        while i < nodes.len() {
            match &nodes[i] {
                TemplateNode::Text(_) | TemplateNode::Interpolation(_) => {
                    let start = i;
                    while i < nodes.len() && !matches!(nodes[i], TemplateNode::Element(_)) {
                        i += 1;
                    }
                    out.push(Child::Text(self.text_run(&nodes[start..i])?));
                }
                TemplateNode::Element(el) if el.has_attr("v-if") => {
                    let mut branches = vec![el];
                    i += 1;
                    loop {
                        let mut next = i;
                        while next < nodes.len() && nodes[next].is_whitespace() {
                            next += 1;
                        }
                        match nodes.get(next) {
                            Some(TemplateNode::Element(branch))
                                if branch.has_attr("v-else-if") || branch.has_attr("v-else") =>
                            {
                                branches.push(branch);
                                i = next + 1;
                                if branch.has_attr("v-else") {
                                    break;
                                }
                            }
                            _ => break,
                        }
                    }
                    out.push(Child::Node(self.conditional(&branches)?));
                }
                TemplateNode::Element(el) if el.has_attr("v-else-if") || el.has_attr("v-else") => {
                    return Err(CompilerError::parse_error(format!(
                        "<{}> has v-else/v-else-if without an adjacent v-if",
                        el.tag
                    )));
                }
                TemplateNode::Element(el) => {
                    out.push(Child::Node(self.element(el)?));
                    i += 1;
                }
            }
        }

        Ok(out)
    }

    fn child_exprs(&mut self, children: Vec<Child>) -> Vec<String> {
        children
            .into_iter()
            .map(|child| match child {
                Child::Text(run) => {
                    let create = self.helper(Helper::CreateTextVNode);
                    format!("{create}({run})")
                }
                Child::Node(node) => node,
            })
            .collect()
    }

    fn text_run(&mut self, nodes: &[TemplateNode]) -> Result<String, CompilerError> {
        let mut parts = Vec::new();
        for node in nodes {
            match node {
                TemplateNode::Text(text) => parts.push(js_string(text)?),
                TemplateNode::Interpolation(source) => {
                    let value = self.expr(source)?;
                    let display = self.helper(Helper::ToDisplayString);
                    parts.push(format!("{display}({value})"));
                }
                TemplateNode::Element(_) => {}
            }
        }
        Ok(parts.join(" + "))
    }

    /// `v-if` / `v-else-if` / `v-else` chain as nested ternaries.
    fn conditional(&mut self, branches: &[&Element]) -> Result<String, CompilerError> {
        let (last, rest) = match branches.split_last() {
            Some((last, rest)) if last.has_attr("v-else") => (self.element(last)?, rest),
            _ => {
                let comment = self.helper(Helper::CreateCommentVNode);
                (format!("{comment}(\"v-if\", true)"), branches)
            }
        };

        let mut out = last;
        for branch in rest.iter().rev() {
            let condition = branch
                .attr("v-if")
                .or_else(|| branch.attr("v-else-if"))
                .and_then(|attr| attr.value.as_deref())
                .ok_or_else(|| {
                    CompilerError::parse_error(format!("<{}> has an empty v-if condition", branch.tag))
                })?;
            let condition = self.expr(condition)?;
            let node = self.element(branch)?;
            out = format!("({condition}) ? {node} : {out}");
        }
        Ok(out)
    }

    fn element(&mut self, el: &Element) -> Result<String, CompilerError> {
        let Some(attr) = el.attr("v-for") else {
            return self.plain_element(el);
        };

        let value = attr.value.as_deref().unwrap_or_default();
        let (alias, source) = split_for(value)
            .ok_or_else(|| CompilerError::parse_error(format!("invalid v-for expression: {value}")))?;
        let source = self.expr(source)?;
        let names = alias_names(alias)?;
        let params = if alias.starts_with('(') {
            alias.to_string()
        } else {
            format!("({alias})")
        };

        let depth = self.scope.len();
        self.scope.extend(names);
        let item = self.plain_element(el);
        self.scope.truncate(depth);
        let item = item?;

        let render_list = self.helper(Helper::RenderList);
        let fragment = self.helper(Helper::Fragment);
        Ok(self.vnode(
            fragment,
            None,
            Some(format!("{render_list}({source}, {params} => {item})")),
        ))
    }

    fn plain_element(&mut self, el: &Element) -> Result<String, CompilerError> {
        match el.tag.as_str() {
            "template" => {
                let children = self.children(&el.children)?;
                let items = self.child_exprs(children);
                let fragment = self.helper(Helper::Fragment);
                return Ok(self.vnode(fragment, None, Some(format!("[{}]", items.join(", ")))));
            }
            "slot" => return self.slot(el),
            "component" => {
                return Err(CompilerError::parse_error("<component :is> is not supported"));
            }
            _ => {}
        }

        let component = is_component(&el.tag);
        let props = self.props(el, component)?;
        let tag = if component {
            if !self.components.contains(&el.tag) {
                self.components.push(el.tag.clone());
            }
            component_binding(&el.tag)
        } else {
            js_string(&el.tag)?
        };

        let children = if el.has_attr("v-html") || el.has_attr("v-text") {
            None
        } else {
            let mut children = self.children(&el.children)?;
            if component {
                if children.is_empty() {
                    None
                } else {
                    let items = self.child_exprs(children);
                    Some(format!("{{ default: () => [{}] }}", items.join(", ")))
                }
            } else if children.len() == 1 && matches!(children[0], Child::Text(_)) {
                match children.pop() {
                    Some(Child::Text(run)) => Some(run),
                    _ => None,
                }
            } else if children.is_empty() {
                None
            } else {
                let items = self.child_exprs(children);
                Some(format!("[{}]", items.join(", ")))
            }
        };

        let vnode = self.vnode(tag, props, children);

        match el.attr("v-show") {
            Some(attr) => {
                let value = attr.value.as_deref().ok_or_else(|| {
                    CompilerError::parse_error(format!("<{}> has an empty v-show", el.tag))
                })?;
                let condition = self.expr(value)?;
                let with_directives = self.helper(Helper::WithDirectives);
                let v_show = self.helper(Helper::VShow);
                Ok(format!("{with_directives}({vnode}, [[{v_show}, {condition}]])"))
            }
            None => Ok(vnode),
        }
    }

    /// `<slot name="x">fallback</slot>` → `renderSlot($slots, "x", props, fallback)`.
    fn slot(&mut self, el: &Element) -> Result<String, CompilerError> {
        let name = el
            .attr("name")
            .and_then(|attr| attr.value.as_deref())
            .unwrap_or("default");
        let name = js_string(name)?;

        let props_el = Element {
            tag: el.tag.clone(),
            attrs: el.attrs.iter().filter(|a| a.name != "name").cloned().collect(),
            children: Vec::new(),
        };
        let props = self.props(&props_el, false)?;

        let children = self.children(&el.children)?;
        let fallback = if children.is_empty() {
            None
        } else {
            let items = self.child_exprs(children);
            Some(format!("() => [{}]", items.join(", ")))
        };

        let render_slot = self.helper(Helper::RenderSlot);
        Ok(match (props, fallback) {
            (None, None) => format!("{render_slot}(_ctx.$slots, {name})"),
            (props, None) => format!(
                "{render_slot}(_ctx.$slots, {name}, {})",
                props.as_deref().unwrap_or("{}")
            ),
            (props, Some(fallback)) => format!(
                "{render_slot}(_ctx.$slots, {name}, {}, {fallback})",
                props.as_deref().unwrap_or("{}")
            ),
        })
    }

    fn props(&mut self, el: &Element, component: bool) -> Result<Option<String>, CompilerError> {
        let mut entries: Vec<String> = Vec::new();
        let mut classes: Vec<String> = Vec::new();
        let mut styles: Vec<String> = Vec::new();
        let mut events: Vec<(String, String)> = Vec::new();

        for attr in &el.attrs {
            let name = attr.name.as_str();
            let value = attr.value.as_deref();

            match name {
                "v-if" | "v-else-if" | "v-else" | "v-for" | "v-show" => continue,
                _ if IGNORED_DIRECTIVES.contains(&name) => continue,
                "v-html" => {
                    let value = self.expr(required(el, name, value)?)?;
                    entries.push(format!("innerHTML: {value}"));
                    continue;
                }
                "v-text" => {
                    let value = self.expr(required(el, name, value)?)?;
                    let display = self.helper(Helper::ToDisplayString);
                    entries.push(format!("textContent: {display}({value})"));
                    continue;
                }
                "v-bind" => {
                    let value = self.expr(required(el, name, value)?)?;
                    entries.push(format!("...({value})"));
                    continue;
                }
                _ => {}
            }

            if let Some(arg) = name.strip_prefix("v-model") {
                let modifiers: Vec<&str> = arg.split('.').skip(1).collect();
                self.model(el, component, required(el, name, value)?, &modifiers, &mut entries, &mut events)?;
            } else if let Some(arg) = name.strip_prefix(':').or_else(|| name.strip_prefix("v-bind:")) {
                let mut parts = arg.split('.');
                let prop = parts.next().unwrap_or_default();
                let camel = parts.any(|m| m == "camel");
                let prop = if camel { camelize(prop) } else { prop.to_string() };
                let expr = match value {
                    Some(value) => self.expr(value)?,
                    // `:id` is shorthand for `:id="id"`.
                    None => self.expr(&camelize(&prop))?,
                };
                match prop.as_str() {
                    "class" => classes.push(expr),
                    "style" => styles.push(expr),
                    _ => entries.push(format!("{}: {expr}", self.prop_key(&prop)?)),
                }
            } else if let Some(arg) = name.strip_prefix('@').or_else(|| name.strip_prefix("v-on:")) {
                let mut parts = arg.split('.');
                let event = parts.next().unwrap_or_default();
                if event.starts_with('[') {
                    return Err(CompilerError::parse_error(format!(
                        "dynamic event names are not supported: {name}"
                    )));
                }
                let modifiers: Vec<&str> = parts.collect();
                let (key, handler) = self.event(event, value, &modifiers)?;
                events.push((key, handler));
            } else if name.starts_with("v-") || name.starts_with('#') {
                return Err(CompilerError::parse_error(format!(
                    "unsupported directive {name} on <{}>",
                    el.tag
                )));
            } else {
                let literal = js_string(value.unwrap_or_default())?;
                match name {
                    "class" => classes.push(literal),
                    "style" => styles.push(literal),
                    _ => entries.push(format!("{}: {literal}", self.prop_key(name)?)),
                }
            }
        }

        for (key, parts) in [("class", classes), ("style", styles)] {
            match parts.len() {
                0 => {}
                1 => entries.push(format!("{key}: {}", parts[0])),
                _ => entries.push(format!("{key}: [{}]", parts.join(", "))),
            }
        }

        // Handlers for the same event are merged into an array.
        let mut merged: Vec<(String, Vec<String>)> = Vec::new();
        for (key, handler) in events {
            match merged.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, handlers)) => handlers.push(handler),
                None => merged.push((key, vec![handler])),
            }
        }
        for (key, handlers) in merged {
            let key = self.prop_key(&key)?;
            if handlers.len() == 1 {
                entries.push(format!("{key}: {}", handlers[0]));
            } else {
                entries.push(format!("{key}: [{}]", handlers.join(", ")));
            }
        }

        Ok((!entries.is_empty()).then(|| format!("{{ {} }}", entries.join(", "))))
    }

    fn event(
        &mut self,
        event: &str,
        value: Option<&str>,
        modifiers: &[&str],
    ) -> Result<(String, String), CompilerError> {
        let mut key = handler_key(event);
        let mut handler = self.handler(value)?;

        let mut system = Vec::new();
        let mut keys = Vec::new();
        for &modifier in modifiers {
            match modifier {
                "once" | "capture" | "passive" => key.push_str(&capitalize(modifier)),
                _ if SYSTEM_MODIFIERS.contains(&modifier) => system.push(js_string(modifier)?),
                _ => keys.push(js_string(modifier)?),
            }
        }
        if !system.is_empty() {
            let with_modifiers = self.helper(Helper::WithModifiers);
            handler = format!("{with_modifiers}({handler}, [{}])", system.join(", "));
        }
        if !keys.is_empty() {
            let with_keys = self.helper(Helper::WithKeys);
            handler = format!("{with_keys}({handler}, [{}])", keys.join(", "));
        }
        Ok((key, handler))
    }

    /// Handler paths and function expressions are used as-is; anything else
    /// is inline code wrapped in a `$event` arrow.
    fn handler(&mut self, value: Option<&str>) -> Result<String, CompilerError> {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok("() => {}".to_string());
        };

        if is_simple_path(value) || is_function_expression(value) {
            return self.expr(value);
        }

        self.scope.push("$event".to_string());
        let inline = match prefix_expression(value, &self.scope) {
            Ok(expr) => Ok(format!("$event => ({expr})")),
            Err(_) => prefix_statements(value, &self.scope)
                .map(|stmts| format!("$event => {{ {stmts} }}"))
                .map_err(|e| {
                    CompilerError::parse_error(format!("invalid handler `{value}`: {}", e.message))
                }),
        };
        self.scope.pop();
        inline
    }

    fn model(
        &mut self,
        el: &Element,
        component: bool,
        value: &str,
        modifiers: &[&str],
        entries: &mut Vec<String>,
        events: &mut Vec<(String, String)>,
    ) -> Result<(), CompilerError> {
        if !is_simple_path(value.trim()) {
            return Err(CompilerError::parse_error(format!(
                "v-model value must be a property path: {value}"
            )));
        }
        let target = self.expr(value.trim())?;

        if component {
            entries.push(format!("modelValue: {target}"));
            events.push((
                "onUpdate:modelValue".to_string(),
                format!("$event => ({target} = $event)"),
            ));
            return Ok(());
        }

        let input_type = el
            .attr("type")
            .and_then(|attr| attr.value.as_deref())
            .unwrap_or("text");

        match (el.tag.as_str(), input_type) {
            ("input", "checkbox") => {
                entries.push(format!("checked: {target}"));
                events.push((
                    "onChange".to_string(),
                    format!("$event => ({target} = $event.target.checked)"),
                ));
            }
            ("input", "radio") => {
                let own = match el.attr(":value").and_then(|a| a.value.as_deref()) {
                    Some(expr) => self.expr(expr)?,
                    None => js_string(el.attr("value").and_then(|a| a.value.as_deref()).unwrap_or("on"))?,
                };
                entries.push(format!("checked: {target} === {own}"));
                events.push((
                    "onChange".to_string(),
                    format!("$event => ({target} = {own})"),
                ));
            }
            ("input" | "textarea" | "select", _) => {
                let mut read = "$event.target.value".to_string();
                if modifiers.contains(&"trim") {
                    read = format!("{read}.trim()");
                }
                if modifiers.contains(&"number") {
                    read = format!("Number({read})");
                }
                let event = if el.tag == "select" || modifiers.contains(&"lazy") {
                    "onChange"
                } else {
                    "onInput"
                };
                entries.push(format!("value: {target}"));
                events.push((event.to_string(), format!("$event => ({target} = {read})")));
            }
            _ => {
                return Err(CompilerError::parse_error(format!(
                    "v-model is not supported on <{}>",
                    el.tag
                )));
            }
        }
        Ok(())
    }

    fn prop_key(&self, name: &str) -> Result<String, CompilerError> {
        if let Some(dynamic) = name.strip_prefix('[').and_then(|n| n.strip_suffix(']')) {
            return Ok(format!("[{}]", self.expr(dynamic)?));
        }
        if is_identifier(name) {
            Ok(name.to_string())
        } else {
            js_string(name)
        }
    }
}

fn required<'a>(el: &Element, name: &str, value: Option<&'a str>) -> Result<&'a str, CompilerError> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        CompilerError::parse_error(format!("{name} on <{}> requires a value", el.tag))
    })
}

/// Uppercase first letter or a hyphenated name marks a component.
fn is_component(tag: &str) -> bool {
    tag.starts_with(|c: char| c.is_ascii_uppercase()) || tag.contains('-')
}

fn component_binding(tag: &str) -> String {
    let name: String = tag
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("_component_{name}")
}

/// `my-event` → `onMyEvent`, `update:value` → `onUpdate:value`.
fn handler_key(event: &str) -> String {
    format!("on{}", capitalize(&camelize(event)))
}

fn camelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// JSON string literals are valid JavaScript string literals.
pub(crate) fn js_string(value: &str) -> Result<String, CompilerError> {
    serde_json::to_string(value)
        .map_err(|e| CompilerError::emit_error(format!("failed to encode string literal: {e}")))
}
