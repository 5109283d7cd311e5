//! Document information entries parsed from a metadata text file.
//!
//! One `Key: "value"` pair per line, `#` comments allowed. Only the
//! standard info keys Title, Author, Subject and Keywords are accepted;
//! anything else is ignored.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

const INFO_KEYS: [&str; 4] = ["Title", "Author", "Subject", "Keywords"];

static PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^/?([A-Za-z]+)[ \t]*:[ \t]+"(.*)""#).unwrap());

/// Parse metadata text into an ordered key/value map.
pub fn parse_meta(text: &str) -> IndexMap<String, String> {
    let mut ret = IndexMap::new();
    for line in text.lines() {
        if line.starts_with('#') {
            continue;
        }
        if let Some(caps) = PAIR_RE.captures(line) {
            let key = &caps[1];
            if INFO_KEYS.contains(&key) {
                ret.insert(key.to_string(), caps[2].to_string());
            }
        }
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_keys_collected() {
        let text = "# book info\nTitle: \"A Book\"\nAuthor: \"Someone\"\nBinding: \"cloth\"\n";
        let meta = parse_meta(text);
        assert_eq!(meta.get("Title").map(String::as_str), Some("A Book"));
        assert_eq!(meta.get("Author").map(String::as_str), Some("Someone"));
        assert!(!meta.contains_key("Binding"));
    }

    #[test]
    fn slash_prefix_and_spacing_accepted() {
        let meta = parse_meta("/Subject:\t\"Scanning\"\n");
        assert_eq!(meta.get("Subject").map(String::as_str), Some("Scanning"));
    }
}
