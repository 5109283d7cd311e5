//! Minimal hOCR markup reader.
//!
//! OCR engines emit well-formed XHTML, so a full HTML parser is not
//! needed: a forgiving tag scanner that tracks an open-element stack and
//! decodes entities covers every hOCR producer we care about. Unknown
//! and mismatched closing tags are dropped rather than treated as
//! errors.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Elements that never hold content and take no closing tag.
const VOID_TAGS: [&str; 8] = ["meta", "br", "img", "hr", "link", "input", "area", "base"];

#[derive(Debug)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug)]
pub struct Element {
    pub tag: String,
    attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn new(tag: String, attrs: Vec<(String, String)>) -> Self {
        Self {
            tag,
            attrs,
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.collect_text(out),
            }
        }
    }

    /// All descendant elements whose class attribute equals `class`,
    /// in document order.
    pub fn find_class<'a>(&'a self, class: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if let Node::Element(e) = child {
                if e.attr("class") == Some(class) {
                    out.push(e);
                }
                e.find_class(class, out);
            }
        }
    }

    pub fn first_class(&self, class: &str) -> Option<&Element> {
        let mut found = Vec::new();
        self.find_class(class, &mut found);
        found.first().copied()
    }
}

/// A parsed hOCR document.
#[derive(Debug)]
pub struct HocrDoc {
    root: Element,
}

static CHARSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^text/html;\s*charset=([A-Za-z0-9-]+)$").unwrap());

impl HocrDoc {
    /// Parse markup text into a tree under a synthetic root.
    pub fn parse(input: &str) -> Self {
        let mut stack = vec![Element::new(String::new(), Vec::new())];
        let bytes = input.as_bytes();
        let mut pos = 0usize;

        while pos < bytes.len() {
            if bytes[pos] == b'<' {
                if bytes[pos..].starts_with(b"<!--") {
                    pos = match find_sub(bytes, b"-->", pos + 4) {
                        Some(p) => p + 3,
                        None => bytes.len(),
                    };
                } else if bytes[pos..].starts_with(b"<!") || bytes[pos..].starts_with(b"<?") {
                    pos = skip_past(bytes, b'>', pos);
                } else if bytes[pos..].starts_with(b"</") {
                    let end = skip_past(bytes, b'>', pos);
                    let name = input[pos + 2..end - 1].trim().to_ascii_lowercase();
                    close_tag(&mut stack, &name);
                    pos = end;
                } else {
                    let end = skip_past(bytes, b'>', pos);
                    let inner = &input[pos + 1..end - 1];
                    let self_closing = inner.ends_with('/');
                    let inner = inner.trim_end_matches('/');
                    let (tag, attrs) = parse_tag(inner);
                    if self_closing || VOID_TAGS.contains(&tag.as_str()) {
                        let elem = Element::new(tag, attrs);
                        push_child(&mut stack, Node::Element(elem));
                    } else {
                        stack.push(Element::new(tag, attrs));
                    }
                    pos = end;
                }
            } else {
                let next = find_sub(bytes, b"<", pos).unwrap_or(bytes.len());
                let raw = &input[pos..next];
                // Whitespace-only nodes are kept: inter-word gaps count
                // when line text is matched against character boxes.
                if !raw.is_empty() {
                    push_child(
                        &mut stack,
                        Node::Text(html_escape::decode_html_entities(raw).into_owned()),
                    );
                }
                pos = next;
            }
        }

        // Unterminated elements collapse into their parents.
        while stack.len() > 1 {
            if let Some(elem) = stack.pop() {
                push_child(&mut stack, Node::Element(elem));
            }
        }
        let root = stack
            .pop()
            .unwrap_or_else(|| Element::new(String::new(), Vec::new()));
        Self { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Character set declared by a Content-Type meta element.
    pub fn charset(&self) -> Option<String> {
        let mut metas = Vec::new();
        collect_tag(&self.root, "meta", &mut metas);
        for meta in metas {
            if meta
                .attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case("content-type"))
                && let Some(content) = meta.attr("content")
                && let Some(caps) = CHARSET_RE.captures(content.trim())
            {
                return Some(caps[1].to_string());
            }
        }
        None
    }

    /// All OCR line elements in document order.
    pub fn ocr_lines(&self) -> Vec<&Element> {
        let mut lines = Vec::new();
        self.root.find_class("ocr_line", &mut lines);
        lines
    }
}

/// Decode raw file bytes: UTF-8 when valid, Latin-1 otherwise.
///
/// Returns the text and whether the fallback was taken, so the caller
/// can surface a diagnostic.
pub fn decode_bytes(bytes: &[u8]) -> (Cow<'_, str>, bool) {
    match std::str::from_utf8(bytes) {
        Ok(s) => (Cow::Borrowed(s), false),
        Err(_) => (
            Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
            true,
        ),
    }
}

fn push_child(stack: &mut Vec<Element>, node: Node) {
    if let Some(top) = stack.last_mut() {
        top.children.push(node);
    }
}

fn close_tag(stack: &mut Vec<Element>, name: &str) {
    if !stack.iter().skip(1).any(|e| e.tag == name) {
        return;
    }
    while stack.len() > 1 {
        let done = stack
            .last()
            .is_some_and(|e| e.tag == name);
        if let Some(elem) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(Node::Element(elem));
            }
        }
        if done {
            break;
        }
    }
}

fn parse_tag(inner: &str) -> (String, Vec<(String, String)>) {
    let tag_end = inner.find(char::is_whitespace).unwrap_or(inner.len());
    let tag = inner[..tag_end].to_ascii_lowercase();
    let mut attrs = Vec::new();
    let mut rest = inner[tag_end..].trim_start();

    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();
        let mut value = String::new();
        if let Some(stripped) = rest.strip_prefix('=') {
            let v = stripped.trim_start();
            let (raw, after) = if let Some(q) = v.strip_prefix(['"', '\'']) {
                let quote = v.chars().next().unwrap_or('"');
                match q.find(quote) {
                    Some(end) => (&q[..end], &q[end + 1..]),
                    None => (q, ""),
                }
            } else {
                let end = v.find(char::is_whitespace).unwrap_or(v.len());
                (&v[..end], &v[end..])
            };
            value = html_escape::decode_html_entities(raw).into_owned();
            rest = after.trim_start();
        }
        if !name.is_empty() {
            attrs.push((name, value));
        } else {
            break;
        }
    }
    (tag, attrs)
}

fn collect_tag<'a>(elem: &'a Element, tag: &str, out: &mut Vec<&'a Element>) {
    for child in &elem.children {
        if let Node::Element(e) = child {
            if e.tag == tag {
                out.push(e);
            }
            collect_tag(e, tag, out);
        }
    }
}

fn find_sub(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn skip_past(bytes: &[u8], stop: u8, from: usize) -> usize {
    match bytes[from..].iter().position(|&b| b == stop) {
        Some(p) => from + p + 1,
        None => bytes.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta http-equiv="Content-Type" content="text/html; charset=utf-8" />
</head>
<body>
<div class='ocr_page'>
<span class='ocr_line' title="bbox 100 200 900 260">
<span class='ocrx_word' title='bbox 100 200 300 260'>Hello</span>
<span class='ocrx_word' title='bbox 340 200 900 260'>w&#246;rld</span>
</span>
</div>
</body>
</html>"#;

    #[test]
    fn finds_lines_and_words() {
        let doc = HocrDoc::parse(SAMPLE);
        let lines = doc.ocr_lines();
        assert_eq!(lines.len(), 1);
        let mut words = Vec::new();
        lines[0].find_class("ocrx_word", &mut words);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text(), "Hello");
        assert_eq!(words[1].text(), "wörld");
    }

    #[test]
    fn reads_charset_declaration() {
        let doc = HocrDoc::parse(SAMPLE);
        assert_eq!(doc.charset().as_deref(), Some("utf-8"));
    }

    #[test]
    fn title_attribute_survives() {
        let doc = HocrDoc::parse(SAMPLE);
        let lines = doc.ocr_lines();
        assert_eq!(lines[0].attr("title"), Some("bbox 100 200 900 260"));
    }

    #[test]
    fn latin1_fallback_decodes_every_byte() {
        let (text, fell_back) = decode_bytes(&[b'a', 0xE9, b'b']);
        assert!(fell_back);
        assert_eq!(text, "a\u{e9}b");
    }

    #[test]
    fn mismatched_close_tags_are_ignored() {
        let doc = HocrDoc::parse("<div><span class='ocr_line' title='bbox 0 0 1 1'>x</em></span></div>");
        assert_eq!(doc.ocr_lines().len(), 1);
    }
}
