//! Single-file component parsing.
//!
//! Splits a `.vue` file into its top-level blocks:
//!
//! ```text
//! <template> ... </template>   at most one, may nest <template> tags
//! <script> ... </script>       at most one, plain JavaScript
//! <style> ... </style>         any number, carried but not transformed
//! ```
//!
//! Custom blocks and HTML comments between blocks are skipped. Block contents
//! borrow from the source, so a descriptor lives exactly as long as the text
//! read for the current request.

use crate::error::Error;
use memchr::{memchr, memmem};

/// Maximum component file size in bytes (10 MB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// One top-level block of a component file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfcBlock<'a> {
    /// Text between the opening and closing tag.
    pub content: &'a str,
    /// Attributes of the opening tag; boolean attributes have no value.
    pub attrs: Vec<(&'a str, Option<&'a str>)>,
    /// Byte offset of `content` within the file.
    pub offset: usize,
}

impl<'a> SfcBlock<'a> {
    /// Value of attribute `name`: `Some(None)` for a bare boolean attribute.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<Option<&'a str>> {
        self.attrs
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }

    #[must_use]
    pub fn lang(&self) -> Option<&'a str> {
        self.attr("lang").flatten()
    }
}

/// Parsed form of a component file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentDescriptor<'a> {
    pub template: Option<SfcBlock<'a>>,
    pub script: Option<SfcBlock<'a>>,
    pub styles: Vec<SfcBlock<'a>>,
}

/// Parse component `source`. `file` names the component in errors.
pub fn parse_component<'a>(file: &str, source: &'a str) -> Result<ComponentDescriptor<'a>, Error> {
    if source.len() > MAX_FILE_SIZE {
        return Err(Error::parse(
            file,
            format!("file too large: {} bytes (max: {MAX_FILE_SIZE})", source.len()),
        ));
    }

    let bytes = source.as_bytes();
    let mut descriptor = ComponentDescriptor::default();
    let mut pointer = 0;

    while let Some(rel) = memchr(b'<', &bytes[pointer..]) {
        let start = pointer + rel;
        let rest = &source[start..];

        if rest.starts_with("<!--") {
            let end = memmem::find(&bytes[start..], b"-->")
                .ok_or_else(|| Error::parse(file, format!("unclosed comment at byte {start}")))?;
            pointer = start + end + 3;
            continue;
        }

        let name_len = rest[1..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap_or(rest.len() - 1);
        if name_len == 0 {
            return Err(Error::parse(
                file,
                format!("unexpected '<' outside of a block at byte {start}"),
            ));
        }
        let name = &rest[1..=name_len];

        let tag_end = find_tag_end(bytes, start + 1 + name_len)
            .ok_or_else(|| Error::parse(file, format!("unclosed <{name}> tag at byte {start}")))?;
        let self_closing = bytes[tag_end - 1] == b'/';
        let attr_end = if self_closing { tag_end - 1 } else { tag_end };
        let attrs = parse_attrs(&source[start + 1 + name_len..attr_end]);

        let content_start = tag_end + 1;
        let (content, next) = if self_closing {
            ("", content_start)
        } else {
            let close = if name == "template" {
                find_template_close(bytes, content_start)
            } else {
                let closing = format!("</{name}>");
                memmem::find(&bytes[content_start..], closing.as_bytes())
                    .map(|pos| (content_start + pos, closing.len()))
            };
            let (end, close_len) = close
                .ok_or_else(|| Error::parse(file, format!("unclosed <{name}> block at byte {start}")))?;
            (&source[content_start..end], end + close_len)
        };

        let block = SfcBlock {
            content,
            attrs,
            offset: content_start,
        };

        match name {
            "template" => {
                if descriptor.template.is_some() {
                    return Err(Error::parse(file, "multiple <template> blocks"));
                }
                if let Some(lang) = block.lang().filter(|lang| *lang != "html") {
                    return Err(Error::parse(
                        file,
                        format!("unsupported template lang \"{lang}\""),
                    ));
                }
                descriptor.template = Some(block);
            }
            "script" => {
                if block.attr("setup").is_some() {
                    return Err(Error::parse(file, "<script setup> is not supported"));
                }
                if descriptor.script.is_some() {
                    return Err(Error::parse(file, "multiple <script> blocks"));
                }
                if let Some(lang) = block.lang().filter(|lang| !matches!(*lang, "js" | "javascript")) {
                    return Err(Error::parse(file, format!("unsupported script lang \"{lang}\"")));
                }
                descriptor.script = Some(block);
            }
            "style" => descriptor.styles.push(block),
            _ => {}
        }

        pointer = next;
    }

    Ok(descriptor)
}

/// Finds the closing `>` of a tag, handling quoted attributes.
pub(crate) fn find_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut quote = None;

    for (i, &byte) in bytes[start..].iter().enumerate() {
        match (byte, quote) {
            (b'"' | b'\'', None) => quote = Some(byte),
            (b, Some(q)) if b == q => quote = None,
            (b'>', None) => return Some(start + i),
            _ => {}
        }
    }

    None
}

/// Finds the `</template>` matching an already-open `<template>`, skipping
/// nested template tags. Returns the close tag position and its length.
fn find_template_close(bytes: &[u8], start: usize) -> Option<(usize, usize)> {
    const OPEN: &[u8] = b"<template";
    const CLOSE: &[u8] = b"</template>";

    let mut depth = 1usize;
    let mut pos = start;

    loop {
        let next_close = memmem::find(&bytes[pos..], CLOSE).map(|p| pos + p)?;
        let next_open = memmem::find(&bytes[pos..], OPEN)
            .map(|p| pos + p)
            .filter(|&p| p < next_close);

        match next_open {
            Some(open) => {
                let after = bytes.get(open + OPEN.len()).copied();
                let is_tag = matches!(after, Some(b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/'));
                let self_closing = is_tag
                    && find_tag_end(bytes, open + OPEN.len())
                        .is_some_and(|end| bytes[end - 1] == b'/');
                if is_tag && !self_closing {
                    depth += 1;
                }
                pos = open + OPEN.len();
            }
            None => {
                depth -= 1;
                if depth == 0 {
                    return Some((next_close, CLOSE.len()));
                }
                pos = next_close + CLOSE.len();
            }
        }
    }
}

/// Parse the attribute section of an opening tag.
pub(crate) fn parse_attrs(input: &str) -> Vec<(&str, Option<&str>)> {
    let mut attrs = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        let name_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' {
            i += 1;
        }
        if name_start == i {
            break;
        }
        let name = &input[name_start..i];

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            let value = match bytes.get(i) {
                Some(&q @ (b'"' | b'\'')) => {
                    let value_start = i + 1;
                    let end = memchr(q, &bytes[value_start..]).map_or(bytes.len(), |p| value_start + p);
                    i = (end + 1).min(bytes.len());
                    &input[value_start..end]
                }
                _ => {
                    let value_start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    &input[value_start..i]
                }
            };
            attrs.push((name, Some(value)));
        } else {
            attrs.push((name, None));
        }
    }

    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = r#"<template>
  <div>{{ msg }}</div>
</template>

<script>
export default { data() { return { msg: 'hi' } } }
</script>

<style scoped>
div { color: red; }
</style>
"#;

    #[test]
    fn test_parse_all_blocks() {
        let descriptor = parse_component("/App.vue", APP).unwrap();
        let template = descriptor.template.unwrap();
        assert_eq!(template.content.trim(), "<div>{{ msg }}</div>");
        let script = descriptor.script.unwrap();
        assert!(script.content.contains("export default"));
        assert_eq!(descriptor.styles.len(), 1);
        assert_eq!(descriptor.styles[0].attr("scoped"), Some(None));
    }

    #[test]
    fn test_offset_points_at_content() {
        let descriptor = parse_component("/App.vue", APP).unwrap();
        let script = descriptor.script.unwrap();
        assert_eq!(&APP[script.offset..script.offset + script.content.len()], script.content);
    }

    #[test]
    fn test_nested_templates() {
        let source = "<template><div><template v-if=\"ok\"><p>a</p></template><template v-else>b</template></div></template>";
        let descriptor = parse_component("/Nested.vue", source).unwrap();
        assert_eq!(
            descriptor.template.unwrap().content,
            "<div><template v-if=\"ok\"><p>a</p></template><template v-else>b</template></div>"
        );
    }

    #[test]
    fn test_missing_sections() {
        let descriptor = parse_component("/OnlyScript.vue", "<script>export default {}</script>").unwrap();
        assert!(descriptor.template.is_none());
        assert!(descriptor.script.is_some());

        let descriptor = parse_component("/OnlyTemplate.vue", "<template><p/></template>").unwrap();
        assert!(descriptor.script.is_none());
        assert!(descriptor.template.is_some());
    }

    #[test]
    fn test_comments_and_custom_blocks_skipped() {
        let source = "<!-- <script>nope</script> -->\n<i18n>{ \"en\": {} }</i18n>\n<template><p>x</p></template>";
        let descriptor = parse_component("/C.vue", source).unwrap();
        assert!(descriptor.script.is_none());
        assert_eq!(descriptor.template.unwrap().content, "<p>x</p>");
    }

    #[test]
    fn test_script_containing_template_string() {
        let source = "<script>\nconst html = '<b>bold</b>';\nexport default {}\n</script>";
        let descriptor = parse_component("/C.vue", source).unwrap();
        assert!(descriptor.script.unwrap().content.contains("<b>bold</b>"));
    }

    #[test]
    fn test_unclosed_block_is_error() {
        let err = parse_component("/Bad.vue", "<template><div></div>").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("unclosed <template>"));
    }

    #[test]
    fn test_duplicate_script_is_error() {
        let err = parse_component("/Bad.vue", "<script></script><script></script>").unwrap_err();
        assert!(err.to_string().contains("multiple <script>"));
    }

    #[test]
    fn test_script_setup_is_error() {
        let err = parse_component("/Bad.vue", "<script setup>const a = 1</script>").unwrap_err();
        assert!(err.to_string().contains("<script setup>"));
    }

    #[test]
    fn test_typescript_is_error() {
        let err = parse_component("/Bad.vue", "<script lang=\"ts\">let a: number</script>").unwrap_err();
        assert!(err.to_string().contains("unsupported script lang"));
    }

    #[test]
    fn test_stray_angle_bracket_is_error() {
        assert!(parse_component("/Bad.vue", "< template>").is_err());
    }

    #[test]
    fn test_parse_attrs() {
        let attrs = parse_attrs(r#" lang="js" scoped data-x='1' flag=bare"#);
        assert_eq!(
            attrs,
            vec![
                ("lang", Some("js")),
                ("scoped", None),
                ("data-x", Some("1")),
                ("flag", Some("bare")),
            ]
        );
    }

    #[test]
    fn test_find_tag_end_skips_quoted_angle() {
        let source = br#"<div title="a > b">"#;
        assert_eq!(find_tag_end(source, 1), Some(source.len() - 1));
    }
}
