//! Template markup → node tree.

use crate::compiler::CompilerError;
use crate::dev::sfc::{find_tag_end, parse_attrs};
use memchr::{memchr, memmem};

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateNode {
    Element(Element),
    Text(String),
    /// Expression inside `{{ }}`, trimmed.
    Interpolation(String),
}

impl TemplateNode {
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<Attr>,
    pub children: Vec<TemplateNode>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&Attr> {
        self.attrs.iter().find(|attr| attr.name == name)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }
}

/// Parse template markup into root nodes, condensing whitespace.
pub fn parse_template(source: &str) -> Result<Vec<TemplateNode>, CompilerError> {
    let bytes = source.as_bytes();
    let mut stack: Vec<Element> = vec![Element::default()];
    let mut pos = 0;

    while pos < bytes.len() {
        let Some(lt) = next_markup(bytes, pos) else {
            push_text(&mut stack, &source[pos..])?;
            break;
        };
        if lt > pos {
            push_text(&mut stack, &source[pos..lt])?;
        }
        let rest = &source[lt..];

        if rest.starts_with("<!--") {
            let end = memmem::find(&bytes[lt..], b"-->")
                .ok_or_else(|| CompilerError::parse_error("unclosed comment in template"))?;
            pos = lt + end + 3;
            continue;
        }

        if let Some(close) = rest.strip_prefix("</") {
            let end = memchr(b'>', close.as_bytes())
                .ok_or_else(|| CompilerError::parse_error("unclosed end tag in template"))?;
            let name = close[..end].trim();
            if stack.len() < 2 {
                return Err(CompilerError::parse_error(format!(
                    "unexpected end tag </{name}>"
                )));
            }
            let element = stack
                .pop()
                .ok_or_else(|| CompilerError::parse_error("template parser stack underflow"))?;
            if element.tag != name {
                return Err(CompilerError::parse_error(format!(
                    "end tag </{name}> does not match <{}>",
                    element.tag
                )));
            }
            append(&mut stack, TemplateNode::Element(element))?;
            pos = lt + 2 + end + 1;
            continue;
        }

        let name_len = rest[1..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')))
            .unwrap_or(rest.len() - 1);
        if name_len == 0 || !rest.as_bytes()[1].is_ascii_alphabetic() {
            // A lone '<' is plain text.
            push_text(&mut stack, "<")?;
            pos = lt + 1;
            continue;
        }

        let tag = &rest[1..=name_len];
        let name_end = lt + 1 + name_len;
        let tag_end = find_tag_end(bytes, name_end)
            .ok_or_else(|| CompilerError::parse_error(format!("unclosed start tag <{tag}>")))?;
        let self_closing = bytes[tag_end - 1] == b'/';
        let attr_end = if self_closing { tag_end - 1 } else { tag_end };

        let attrs = parse_attrs(&source[name_end..attr_end])
            .into_iter()
            .map(|(name, value)| Attr {
                name: name.to_string(),
                value: value.map(decode_entities),
            })
            .collect();

        let element = Element {
            tag: tag.to_string(),
            attrs,
            children: Vec::new(),
        };
        if self_closing || VOID_ELEMENTS.contains(&tag) {
            append(&mut stack, TemplateNode::Element(element))?;
        } else {
            stack.push(element);
        }
        pos = tag_end + 1;
    }

    if let [_, .., open] = stack.as_slice() {
        return Err(CompilerError::parse_error(format!(
            "element <{}> is missing its end tag",
            open.tag
        )));
    }
    let mut root = stack
        .pop()
        .ok_or_else(|| CompilerError::parse_error("template parser stack underflow"))?;

    condense(&mut root.children, false);
    Ok(root.children)
}

/// Position of the next `<` at or after `pos` that is not inside a closed
/// `{{ }}`. After an unclosed `{{` the rest is text, which `push_text` rejects.
fn next_markup(bytes: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let lt = pos + memchr(b'<', &bytes[pos..])?;
        let Some(open) = memmem::find(&bytes[pos..lt], b"{{") else {
            return Some(lt);
        };
        let body = pos + open + 2;
        let close = memmem::find(&bytes[body..], b"}}")?;
        pos = body + close + 2;
    }
}

fn append(stack: &mut [Element], node: TemplateNode) -> Result<(), CompilerError> {
    stack
        .last_mut()
        .map(|parent| parent.children.push(node))
        .ok_or_else(|| CompilerError::parse_error("template parser stack underflow"))
}

/// Split raw text into text and `{{ }}` nodes.
fn push_text(stack: &mut [Element], raw: &str) -> Result<(), CompilerError> {
    let mut rest = raw;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            append(stack, TemplateNode::Text(decode_entities(&rest[..open])))?;
        }
        let after = &rest[open + 2..];
        let close = after.find("}}").ok_or_else(|| {
            CompilerError::parse_error(format!("unclosed interpolation: {{{{{after}"))
        })?;
        append(stack, TemplateNode::Interpolation(after[..close].trim().to_string()))?;
        rest = &after[close + 2..];
    }

    if !rest.is_empty() {
        append(stack, TemplateNode::Text(decode_entities(rest)))?;
    }
    Ok(())
}

/// Merge adjacent text, drop insignificant whitespace and collapse runs of
/// whitespace to a single space. `<pre>` content is left alone.
fn condense(children: &mut Vec<TemplateNode>, preserve: bool) {
    let mut merged: Vec<TemplateNode> = Vec::with_capacity(children.len());
    for node in children.drain(..) {
        if let (Some(TemplateNode::Text(prev)), TemplateNode::Text(text)) = (merged.last_mut(), &node) {
            prev.push_str(text);
            continue;
        }
        merged.push(node);
    }

    if !preserve {
        let len = merged.len();
        let keep: Vec<bool> = (0..len)
            .map(|i| {
                let TemplateNode::Text(text) = &merged[i] else {
                    return true;
                };
                if !text.trim().is_empty() {
                    return true;
                }
                let prev_is_element = i > 0 && matches!(merged[i - 1], TemplateNode::Element(_));
                let next_is_element =
                    i + 1 < len && matches!(merged[i + 1], TemplateNode::Element(_));
                // Edge whitespace and newlines between elements are layout only.
                !(i == 0
                    || i + 1 == len
                    || (prev_is_element && next_is_element && text.contains('\n')))
            })
            .collect();

        let mut flags = keep.into_iter();
        merged.retain(|_| flags.next().unwrap_or(true));

        for node in &mut merged {
            if let TemplateNode::Text(text) = node {
                *text = collapse_whitespace(text);
            }
        }
    }

    for node in &mut merged {
        if let TemplateNode::Element(element) = node {
            let preserve = preserve || element.tag == "pre";
            condense(&mut element.children, preserve);
        }
    }

    *children = merged;
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Decode the character references templates commonly use.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &TemplateNode) -> &Element {
        match node {
            TemplateNode::Element(element) => element,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_nested_elements() {
        let nodes = parse_template("<div class=\"app\"><p>Hello</p><br></div>").unwrap();
        assert_eq!(nodes.len(), 1);
        let div = element(&nodes[0]);
        assert_eq!(div.tag, "div");
        assert_eq!(div.attr("class").and_then(|a| a.value.as_deref()), Some("app"));
        assert_eq!(div.children.len(), 2);
        assert_eq!(element(&div.children[1]).tag, "br");
    }

    #[test]
    fn test_interpolation() {
        let nodes = parse_template("<p>Count: {{ count }}!</p>").unwrap();
        let p = element(&nodes[0]);
        assert_eq!(
            p.children,
            vec![
                TemplateNode::Text("Count: ".to_string()),
                TemplateNode::Interpolation("count".to_string()),
                TemplateNode::Text("!".to_string()),
            ]
        );
    }

    #[test]
    fn test_interpolation_containing_angle_brackets() {
        let nodes = parse_template("<p>{{ a < b }}</p><span>{{ count<max ? 'ok' : 'full' }}</span>").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(
            element(&nodes[0]).children,
            vec![TemplateNode::Interpolation("a < b".to_string())]
        );
        assert_eq!(
            element(&nodes[1]).children,
            vec![TemplateNode::Interpolation("count<max ? 'ok' : 'full'".to_string())]
        );
    }

    #[test]
    fn test_unclosed_interpolation_before_tag_is_error() {
        assert!(parse_template("<p>{{ a < b</p>").is_err());
    }

    #[test]
    fn test_whitespace_condensing() {
        let nodes = parse_template("\n  <ul>\n    <li>a</li>\n    <li>b   c</li>\n  </ul>\n").unwrap();
        assert_eq!(nodes.len(), 1);
        let ul = element(&nodes[0]);
        assert_eq!(ul.children.len(), 2);
        assert_eq!(
            element(&ul.children[1]).children,
            vec![TemplateNode::Text("b c".to_string())]
        );
    }

    #[test]
    fn test_space_between_inline_elements_is_kept() {
        let nodes = parse_template("<p><b>a</b> <i>b</i></p>").unwrap();
        assert_eq!(element(&nodes[0]).children.len(), 3);
    }

    #[test]
    fn test_pre_keeps_whitespace() {
        let nodes = parse_template("<pre>  a\n  b</pre>").unwrap();
        assert_eq!(
            element(&nodes[0]).children,
            vec![TemplateNode::Text("  a\n  b".to_string())]
        );
    }

    #[test]
    fn test_comments_dropped() {
        let nodes = parse_template("<div><!-- note --><span/></div>").unwrap();
        assert_eq!(element(&nodes[0]).children.len(), 1);
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#39;d&#x27;"), "a & b <c> 'd'");
        assert_eq!(decode_entities("AT&T"), "AT&T");
    }

    #[test]
    fn test_attribute_values_decoded() {
        let nodes = parse_template("<p v-if=\"a &amp;&amp; b\" title=\"x &amp; y\"></p>").unwrap();
        let p = element(&nodes[0]);
        assert_eq!(p.attr("v-if").and_then(|a| a.value.as_deref()), Some("a && b"));
        assert_eq!(p.attr("title").and_then(|a| a.value.as_deref()), Some("x & y"));
    }

    #[test]
    fn test_mismatched_end_tag() {
        let err = parse_template("<div><span></div>").unwrap_err();
        assert!(err.message.contains("does not match"));
    }

    #[test]
    fn test_stray_end_tag() {
        let err = parse_template("<p></p></div>").unwrap_err();
        assert!(err.message.contains("unexpected end tag"));
    }

    #[test]
    fn test_missing_end_tag() {
        let err = parse_template("<div><span></span>").unwrap_err();
        assert!(err.message.contains("missing its end tag"));
    }

    #[test]
    fn test_unclosed_interpolation() {
        assert!(parse_template("<p>{{ count </p>").is_err());
    }
}
