//! Document outline parsed from a plain-text table of contents.
//!
//! Each input line describes one outline entry:
//!
//! ```text
//! <indent>"Title" "page ref" [0|-|1|+]
//! ```
//!
//! The indent (spaces or tabs, never mixed within one file) sets the
//! nesting level. The optional third field marks the entry as unfolded
//! by default. Lines starting with `#` are comments.
//!
//! The tree is stored as an arena of nodes addressed by index; parent
//! and sibling links are plain indices, so the logically doubly-linked
//! structure has no ownership cycles.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{QuireError, Result};

/// One outline entry. Index 0 is a synthetic always-open root that never
/// renders; real entries start at 1.
#[derive(Debug)]
pub struct OutlineNode {
    pub title: String,
    /// Page key this entry points at, matched against page labels.
    pub page_ref: String,
    pub open: bool,
    pub parent: Option<usize>,
    pub prev: Option<usize>,
    pub next: Option<usize>,
    pub children: Vec<usize>,
    indent: i64,
}

impl OutlineNode {
    fn root() -> Self {
        Self {
            title: String::new(),
            page_ref: String::new(),
            open: true,
            parent: None,
            prev: None,
            next: None,
            children: Vec::new(),
            indent: -1,
        }
    }
}

/// The parsed outline tree.
#[derive(Debug)]
pub struct Outline {
    nodes: Vec<OutlineNode>,
}

static LINE_PARTS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""[^"]*"|\S+"#).unwrap());

impl Outline {
    pub fn parse(text: &str) -> Result<Self> {
        let mut nodes = vec![OutlineNode::root()];
        let mut prev = 0usize;
        let mut indent_char: Option<u8> = None;

        for (lineno, line) in text.lines().enumerate() {
            let lineno = lineno + 1;
            if line.starts_with('#') {
                continue;
            }
            let parts: Vec<&str> = LINE_PARTS_RE.find_iter(line).map(|m| m.as_str()).collect();
            if parts.len() < 2 {
                continue;
            }
            let title = parts[0].trim_matches('"').to_string();
            let page_ref = parts[1].trim_matches('"').to_string();
            let open = parts.get(2).is_some_and(|&f| f == "+" || f == "1");

            let mut indent = 0i64;
            for &b in line.as_bytes() {
                if b != b' ' && b != b'\t' {
                    break;
                }
                match indent_char {
                    None => indent_char = Some(b),
                    Some(c) if c != b => {
                        return Err(QuireError::InconsistentIndent(lineno));
                    }
                    _ => {}
                }
                indent += 1;
            }

            // An entry shallower than its predecessor climbs the
            // previous-sibling chain until the levels match.
            if indent < nodes[prev].indent {
                prev = prev_sibling(&nodes, prev, indent).ok_or(QuireError::BadIndent(lineno))?;
            }

            let idx = nodes.len();
            let node = if indent == nodes[prev].indent {
                let parent = nodes[prev].parent.unwrap_or(0);
                nodes[parent].children.push(idx);
                nodes[prev].next = Some(idx);
                OutlineNode {
                    title,
                    page_ref,
                    open,
                    parent: Some(parent),
                    prev: Some(prev),
                    next: None,
                    children: Vec::new(),
                    indent,
                }
            } else {
                nodes[prev].children.push(idx);
                OutlineNode {
                    title,
                    page_ref,
                    open,
                    parent: Some(prev),
                    prev: None,
                    next: None,
                    children: Vec::new(),
                    indent,
                }
            };
            nodes.push(node);
            prev = idx;
        }

        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[OutlineNode] {
        &self.nodes
    }

    /// Number of real entries, excluding the synthetic root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Number of descendants visible when this node is unfolded: all
    /// direct children, plus the visible descendants of children that
    /// are themselves open. A closed child contributes 1.
    pub fn visible_count(&self, idx: usize) -> i64 {
        let node = &self.nodes[idx];
        let mut cnt = node.children.len() as i64;
        for &child in &node.children {
            if self.nodes[child].open && !self.nodes[child].children.is_empty() {
                cnt += self.visible_count(child);
            }
        }
        cnt
    }
}

fn prev_sibling(nodes: &[OutlineNode], mut at: usize, indent: i64) -> Option<usize> {
    while nodes[at].indent > indent {
        at = nodes[at].parent?;
    }
    (nodes[at].indent == indent).then_some(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_list() {
        let toc = Outline::parse("\"One\" \"1\"\n\"Two\" \"2\"\n").unwrap();
        assert_eq!(toc.len(), 2);
        assert_eq!(toc.nodes()[1].title, "One");
        assert_eq!(toc.nodes()[1].next, Some(2));
        assert_eq!(toc.nodes()[2].prev, Some(1));
        assert_eq!(toc.visible_count(0), 2);
    }

    #[test]
    fn nesting_and_reparenting() {
        let text = "\"A\" \"1\"\n  \"A1\" \"2\"\n  \"A2\" \"3\"\n\"B\" \"4\"\n";
        let toc = Outline::parse(text).unwrap();
        assert_eq!(toc.nodes()[1].children, vec![2, 3]);
        assert_eq!(toc.nodes()[4].title, "B");
        assert_eq!(toc.nodes()[4].parent, Some(0));
        assert_eq!(toc.nodes()[1].next, Some(4));
    }

    #[test]
    fn visible_count_ignores_closed_subtrees() {
        // Two open children with one grandchild each, one closed child
        // with two grandchildren: 2*2 + 1 = 5.
        let text = "\"A\" \"1\" +\n  \"A1\" \"2\"\n\"B\" \"3\" +\n  \"B1\" \"4\"\n\"C\" \"5\"\n  \"C1\" \"6\"\n  \"C2\" \"7\"\n";
        let toc = Outline::parse(text).unwrap();
        assert_eq!(toc.visible_count(0), 5);
    }

    #[test]
    fn mixed_indent_characters_fail() {
        let text = "\"A\" \"1\"\n \"A1\" \"2\"\n\t\"A2\" \"3\"\n";
        assert!(matches!(
            Outline::parse(text),
            Err(QuireError::InconsistentIndent(3))
        ));
    }

    #[test]
    fn orphan_indent_fails() {
        let text = "\"A\" \"1\"\n    \"A1\" \"2\"\n  \"B\" \"3\"\n";
        assert!(matches!(Outline::parse(text), Err(QuireError::BadIndent(3))));
    }

    #[test]
    fn comments_and_blank_lines_skipped() {
        let toc = Outline::parse("# heading\n\n\"A\" \"1\"\n").unwrap();
        assert_eq!(toc.len(), 1);
    }
}
