//! Page numbering ranges for the /PageLabels number tree.
//!
//! The specification string mirrors PDF 32000-1 section 12.4.2: ranges
//! are separated with semicolons, each one holding the physical number
//! of its first page, a colon, then an optional prefix, a percent sign,
//! an optional numeric start value and a single style letter. For
//! example `0:Title %D;2:%R;18:%16D` numbers two unnumbered title pages,
//! then Roman numerals, then Arabic numbering starting at 16.

use std::sync::LazyLock;

use regex::Regex;

/// Numbering style letter from the range specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    Decimal,
    RomanUpper,
    RomanLower,
    AlphaUpper,
    AlphaLower,
}

impl LabelStyle {
    fn from_letter(s: &str) -> Option<Self> {
        match s {
            "D" => Some(Self::Decimal),
            "R" => Some(Self::RomanUpper),
            "r" => Some(Self::RomanLower),
            "A" => Some(Self::AlphaUpper),
            "a" => Some(Self::AlphaLower),
            _ => None,
        }
    }

    /// Style name for the /S entry.
    pub fn pdf_name(self) -> &'static str {
        match self {
            Self::Decimal => "D",
            Self::RomanUpper => "R",
            Self::RomanLower => "r",
            Self::AlphaUpper => "A",
            Self::AlphaLower => "a",
        }
    }
}

/// One numbering range, starting at a physical page index.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRange {
    pub first: usize,
    pub prefix: Option<String>,
    pub start: Option<i64>,
    pub style: Option<LabelStyle>,
}

/// Ordered page-label ranges parsed from a `-L` specification string.
#[derive(Debug, Default)]
pub struct PageLabels {
    ranges: Vec<LabelRange>,
}

static FORMAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^%]*)%?(\d*)([DRrAa]?)").unwrap());

impl PageLabels {
    /// Parse a specification string. Range descriptions without a
    /// leading page number are dropped silently, like any other field
    /// that fails to match.
    pub fn parse(spec: &str) -> Self {
        let mut ranges = Vec::new();
        for descr in spec.split(';') {
            let mut fields = descr.splitn(2, ':');
            let Some(first) = fields.next().and_then(|f| f.trim().parse::<usize>().ok()) else {
                continue;
            };
            let mut rng = LabelRange {
                first,
                prefix: None,
                start: None,
                style: None,
            };
            if let Some(fmt) = fields.next()
                && let Some(caps) = FORMAT_RE.captures(fmt)
            {
                if !caps[1].is_empty() {
                    rng.prefix = Some(caps[1].to_string());
                }
                if !caps[2].is_empty() {
                    rng.start = caps[2].parse().ok();
                }
                rng.style = LabelStyle::from_letter(&caps[3]);
            }
            ranges.push(rng);
        }
        Self { ranges }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[LabelRange] {
        &self.ranges
    }

    pub fn get(&self, idx: usize) -> Option<&LabelRange> {
        self.ranges.get(idx)
    }

    /// Label displayed for physical page `page_idx`, which must lie in
    /// range `rng_id`.
    pub fn page_label(&self, rng_id: usize, page_idx: usize) -> String {
        let Some(rng) = self.ranges.get(rng_id) else {
            return (page_idx + 1).to_string();
        };
        let start = rng.start.unwrap_or(1);
        let pnum = page_idx as i64 - rng.first as i64 + start;
        let prefix = rng.prefix.as_deref().unwrap_or("");
        let snum = match rng.style {
            Some(style) => styled(pnum, style),
            None => String::new(),
        };
        format!("{prefix}{snum}")
    }
}

fn styled(pnum: i64, style: LabelStyle) -> String {
    match style {
        LabelStyle::Decimal => pnum.to_string(),
        LabelStyle::RomanUpper => int_to_roman(pnum),
        LabelStyle::RomanLower => int_to_roman(pnum).to_lowercase(),
        LabelStyle::AlphaUpper => int_to_alpha(pnum),
        LabelStyle::AlphaLower => int_to_alpha(pnum).to_lowercase(),
    }
}

const ROMAN_PAIRS: [(i64, &str); 13] = [
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

fn int_to_roman(mut num: i64) -> String {
    let mut res = String::new();
    for (val, sym) in ROMAN_PAIRS {
        while num >= val {
            res.push_str(sym);
            num -= val;
        }
    }
    res
}

/// Bijective base-26: 1 to A, 26 to Z, 27 to AA and so on.
fn int_to_alpha(mut num: i64) -> String {
    let mut out = Vec::new();
    while num > 0 {
        num -= 1;
        out.push(b'A' + (num % 26) as u8);
        num /= 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_ranges() {
        let labels = PageLabels::parse("0:Title %D;2:%R;18:%16D");
        assert_eq!(labels.len(), 3);
        assert_eq!(
            labels.get(0),
            Some(&LabelRange {
                first: 0,
                prefix: Some("Title ".into()),
                start: None,
                style: Some(LabelStyle::Decimal),
            })
        );
        assert_eq!(labels.get(2).and_then(|r| r.start), Some(16));
    }

    #[test]
    fn decimal_offset_lookup() {
        let labels = PageLabels::parse("18:%D");
        assert_eq!(labels.page_label(0, 20), "3");
    }

    #[test]
    fn roman_lookup() {
        let labels = PageLabels::parse("2:%R");
        assert_eq!(labels.page_label(0, 5), "IV");
        assert_eq!(labels.page_label(0, 2), "I");
    }

    #[test]
    fn prefix_without_style_renders_no_number() {
        let labels = PageLabels::parse("0:Cover %");
        assert_eq!(labels.page_label(0, 0), "Cover ");
    }

    #[test]
    fn alpha_is_bijective_base26() {
        assert_eq!(int_to_alpha(1), "A");
        assert_eq!(int_to_alpha(26), "Z");
        assert_eq!(int_to_alpha(27), "AA");
        assert_eq!(int_to_alpha(52), "AZ");
        assert_eq!(int_to_alpha(703), "AAA");
    }

    #[test]
    fn roman_subtractive_pairs() {
        assert_eq!(int_to_roman(1994), "MCMXCIV");
        assert_eq!(int_to_roman(9), "IX");
        assert_eq!(int_to_roman(40), "XL");
    }
}
