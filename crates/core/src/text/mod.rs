//! Invisible text layer composition from hOCR markup.
//!
//! OCR geometry drives the layout: for every recognized line an
//! invisible (render mode 3) text run is positioned and horizontally
//! stretched so its glyphs cover the same span as the printed ink.
//! Selecting text in a viewer then highlights the right pixels, and
//! extraction reproduces the OCR reading order.

pub mod hocr;

use std::sync::LazyLock;

use regex::Regex;

use crate::font::{FontEncoder, TIMES_HEADER, line_width};
use crate::text::hocr::{Element, HocrDoc};

/// Reference size the invisible text is nominally set at; the text
/// matrix rescales it per line.
const FONT_SIZE: f64 = 10.0;

static BBOX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"bbox((?:\s+\d+){4})").unwrap());
static X_BBOXES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"x_bboxes([-\s\d]+)").unwrap());

/// One word-sized run of text with its bounding box in points.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrUnit {
    pub text: String,
    pub bbox: [f64; 4],
}

/// Bounding box from an element's `title` attribute, scaled from pixels
/// to points per axis. Returns all zeros when no box is declared.
pub(crate) fn element_coordinates(elem: &Element, xscale: f64, yscale: f64) -> [f64; 4] {
    let Some(title) = elem.attr("title") else {
        return [0.0; 4];
    };
    let Some(caps) = BBOX_RE.captures(title) else {
        return [0.0; 4];
    };
    let coords: Vec<f64> = caps[1]
        .split_whitespace()
        .filter_map(|t| t.parse().ok())
        .collect();
    if coords.len() != 4 {
        return [0.0; 4];
    }
    [
        coords[0] * xscale,
        coords[1] * yscale,
        coords[2] * xscale,
        coords[3] * yscale,
    ]
}

fn element_text(elem: &Element) -> String {
    elem.text().trim().to_string()
}

/// Split one OCR line into word units, preferring explicit word boxes,
/// then per-character boxes, then the whole line.
pub(crate) fn ocr_units(
    line: &Element,
    lbbox: [f64; 4],
    xscale: f64,
    yscale: f64,
) -> Vec<OcrUnit> {
    let mut units = Vec::new();

    let mut words = Vec::new();
    line.find_class("ocrx_word", &mut words);
    if !words.is_empty() {
        for word in words {
            let bbox = element_coordinates(word, xscale, yscale);
            if bbox == [0.0; 4] {
                continue;
            }
            units.push(OcrUnit {
                text: element_text(word),
                bbox,
            });
        }
    } else if let Some(cinfo) = line.first_class("ocr_cinfo")
        && let Some(title) = cinfo.attr("title")
        && let Some(caps) = X_BBOXES_RE.captures(title)
    {
        let coords: Vec<i64> = caps[1]
            .split_whitespace()
            .filter_map(|t| t.parse().ok())
            .collect();
        units = rebuild_words_from_char_boxes(&element_text(line), &coords, xscale, yscale);
    }

    if units.is_empty() {
        let ltxt = element_text(line);
        if !ltxt.is_empty() {
            units.push(OcrUnit {
                text: ltxt,
                bbox: lbbox,
            });
        }
    }

    if let Some(last) = units.last_mut()
        && last.text.ends_with('-')
    {
        // A line-end hyphen is only a typesetting artifact; a soft
        // hyphen lets text extraction rejoin the word.
        last.text.pop();
        last.text.push('\u{00AD}');
    }

    units.retain(|u| !u.text.is_empty());
    units
}

/// Regroup per-character boxes into words.
///
/// Character-info markup gives one box per glyph, with an all-negative
/// box standing for a word gap. Some producers strip the whitespace
/// characters themselves from the text, so a negative box is taken as a
/// word boundary even when the current character is not a space: the
/// character then starts the next word and consumes the following box.
/// When the character count exceeds the box count the geometry cannot
/// be trusted and no units are produced (the caller falls back to the
/// whole line).
fn rebuild_words_from_char_boxes(
    ltxt: &str,
    coords: &[i64],
    xscale: f64,
    yscale: f64,
) -> Vec<OcrUnit> {
    let mut units = Vec::new();
    let charcnt = ltxt.chars().count();
    if charcnt > coords.len() / 4 {
        return units;
    }

    let scaled = |i: usize| -> [f64; 4] {
        let at = |k: usize| coords.get(i * 4 + k).copied().unwrap_or(0) as f64;
        [
            at(0) * xscale,
            at(1) * yscale,
            at(2) * xscale,
            at(3) * yscale,
        ]
    };

    let mut i = 0usize;
    let mut wtxt = String::new();
    let mut bbox = [-1.0f64; 4];
    for uc in ltxt.chars() {
        let cbbox = scaled(i);
        if cbbox[0] >= 0.0 {
            if cbbox[0] < bbox[0] || bbox[0] < 0.0 {
                bbox[0] = cbbox[0];
            }
            if cbbox[1] < bbox[1] || bbox[1] < 0.0 {
                bbox[1] = cbbox[1];
            }
            if cbbox[2] > bbox[2] || bbox[2] < 0.0 {
                bbox[2] = cbbox[2];
            }
            if cbbox[3] > bbox[3] || bbox[3] < 0.0 {
                bbox[3] = cbbox[3];
            }
            wtxt.push(uc);
        } else {
            units.push(OcrUnit {
                text: std::mem::take(&mut wtxt),
                bbox,
            });
            bbox = [-1.0; 4];
            if !uc.is_whitespace() {
                wtxt.push(uc);
                i += 1;
                bbox = scaled(i);
            }
        }
        i += 1;
    }
    if !wtxt.is_empty() {
        units.push(OcrUnit { text: wtxt, bbox });
    }
    units
}

/// Render the invisible text layer for one page as a content stream
/// fragment (`BT ... ET`).
///
/// `pheight` is the page height in points; the scale factors map source
/// pixels to points. Characters are routed through `fonts`, growing the
/// shared bucket list as new characters appear.
pub fn compose_text_layer(
    doc: &HocrDoc,
    pheight: f64,
    xscale: f64,
    yscale: f64,
    fonts: &mut FontEncoder,
) -> String {
    let mut ret = String::from(" BT 3 Tr ");
    let mut cur_bucket: Option<usize> = None;

    for line in doc.ocr_lines() {
        let lbbox = element_coordinates(line, xscale, yscale);
        if lbbox[2] - lbbox[0] <= 0.0 || lbbox[3] - lbbox[1] <= 0.0 {
            continue;
        }
        let units = ocr_units(line, lbbox, xscale, yscale);
        if units.is_empty() {
            continue;
        }

        let mut ink_width = 0.0;
        let mut ltxt = String::new();
        for unit in &units {
            ltxt.push_str(&unit.text);
            ink_width += unit.bbox[2] - unit.bbox[0];
        }
        let ratio = ink_width / line_width(&ltxt, FONT_SIZE);
        let mut pos = lbbox[0];
        let mut posdiff = 0i64;

        let baseline =
            pheight - lbbox[3] - TIMES_HEADER.descent as f64 * FONT_SIZE / 1000.0 * ratio;
        ret.push_str(&format!(
            "{ratio:.6} {:.6} {:.6} {ratio:.6} {:.6} {baseline:.6} Tm ",
            0.0, 0.0, lbbox[0],
        ));
        let mut in_txt = false;
        let mut txt8 = String::new();

        for (i, unit) in units.iter().enumerate() {
            if i > 0 {
                posdiff = ((pos - unit.bbox[0]) * 1000.0 / FONT_SIZE / ratio) as i64;
            }
            pos = unit.bbox[0] + line_width(&unit.text, FONT_SIZE) * ratio;
            txt8.clear();

            for c in unit.text.chars() {
                let (bucket, code) = fonts.encode(c, cur_bucket);
                if cur_bucket != Some(bucket) {
                    if in_txt {
                        if posdiff != 0 {
                            ret.push_str(&format!("{posdiff} "));
                        }
                        if !txt8.is_empty() {
                            ret.push_str(&format!("<{txt8}> "));
                        }
                        ret.push_str("] TJ ");
                    }
                    cur_bucket = Some(bucket);
                    ret.push_str(&format!("/Fnt{} {} Tf ", bucket + 1, FONT_SIZE as i64));
                    txt8.clear();
                    posdiff = 0;
                    in_txt = false;
                }
                if !in_txt {
                    ret.push_str("[ ");
                    in_txt = true;
                }
                txt8.push_str(&format!("{code:02X}"));
            }

            if !txt8.is_empty() {
                if posdiff != 0 {
                    ret.push_str(&format!("{posdiff} "));
                }
                ret.push_str(&format!("<{txt8}> "));
            }
        }
        if in_txt {
            ret.push_str("] TJ ");
        }
    }

    ret.push_str("ET ");
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> HocrDoc {
        HocrDoc::parse(&format!("<html><body>{body}</body></html>"))
    }

    #[test]
    fn word_boxes_win_over_line_text() {
        let d = doc(concat!(
            "<span class='ocr_line' title='bbox 0 0 400 40'>",
            "<span class='ocrx_word' title='bbox 0 0 180 40'>first</span> ",
            "<span class='ocrx_word' title='bbox 200 0 400 40'>second</span>",
            "</span>"
        ));
        let line = d.ocr_lines()[0];
        let lbbox = element_coordinates(line, 1.0, 1.0);
        let units = ocr_units(line, lbbox, 1.0, 1.0);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text, "first");
        assert_eq!(units[1].bbox, [200.0, 0.0, 400.0, 40.0]);
    }

    #[test]
    fn per_axis_scaling() {
        let d = doc("<span class='ocr_line' title='bbox 10 20 30 40'>x</span>");
        let bbox = element_coordinates(d.ocr_lines()[0], 0.5, 0.25);
        assert_eq!(bbox, [5.0, 5.0, 15.0, 10.0]);
    }

    #[test]
    fn char_boxes_group_into_words() {
        // "ab cd": boxes for a, b, gap, c, d.
        let coords: Vec<i64> = vec![
            0, 0, 10, 10, 10, 0, 20, 10, -1, -1, -1, -1, 30, 0, 40, 10, 40, 0, 50, 10,
        ];
        let units = rebuild_words_from_char_boxes("ab cd", &coords, 1.0, 1.0);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text, "ab");
        assert_eq!(units[0].bbox, [0.0, 0.0, 20.0, 10.0]);
        assert_eq!(units[1].text, "cd");
        assert_eq!(units[1].bbox, [30.0, 0.0, 50.0, 10.0]);
    }

    #[test]
    fn stripped_whitespace_is_recovered() {
        // Producer dropped the space from the text but kept the gap box:
        // "abc" with boxes a, b, gap, c. The gap splits the word anyway.
        let coords: Vec<i64> = vec![
            0, 0, 10, 10, 10, 0, 20, 10, -1, -1, -1, -1, 30, 0, 40, 10,
        ];
        let units = rebuild_words_from_char_boxes("abc", &coords, 1.0, 1.0);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text, "ab");
        assert_eq!(units[1].text, "c");
        assert_eq!(units[1].bbox, [30.0, 0.0, 40.0, 10.0]);
    }

    #[test]
    fn more_chars_than_boxes_falls_back_to_line() {
        let d = doc("<span class='ocr_line' title='bbox 0 0 100 10'><span class='ocr_cinfo' title='x_bboxes 0 0 5 10'>toolong</span></span>");
        let line = d.ocr_lines()[0];
        let units = ocr_units(line, element_coordinates(line, 1.0, 1.0), 1.0, 1.0);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "toolong");
        assert_eq!(units[0].bbox, [0.0, 0.0, 100.0, 10.0]);
    }

    #[test]
    fn trailing_hyphen_becomes_soft_hyphen() {
        let d = doc(concat!(
            "<span class='ocr_line' title='bbox 0 0 100 10'>",
            "<span class='ocrx_word' title='bbox 0 0 100 10'>hyphen-</span>",
            "</span>"
        ));
        let line = d.ocr_lines()[0];
        let units = ocr_units(line, element_coordinates(line, 1.0, 1.0), 1.0, 1.0);
        assert_eq!(units[0].text, "hyphen\u{00AD}");
    }

    #[test]
    fn compose_emits_invisible_text_operators() {
        let d = doc(concat!(
            "<span class='ocr_line' title='bbox 0 700 400 760'>",
            "<span class='ocrx_word' title='bbox 0 700 180 760'>one</span> ",
            "<span class='ocrx_word' title='bbox 200 700 400 760'>two</span>",
            "</span>"
        ));
        let mut fonts = FontEncoder::new();
        let out = compose_text_layer(&d, 792.0, 0.24, 0.24, &mut fonts);
        assert!(out.starts_with(" BT 3 Tr "));
        assert!(out.ends_with("ET "));
        assert!(out.contains("/Fnt1 10 Tf "));
        assert!(out.contains("Tm "));
        assert!(out.contains("] TJ "));
        // o, n, e, space, t, w: all land in the first bucket.
        assert_eq!(fonts.buckets().len(), 1);
        assert_eq!(fonts.buckets()[0].len(), 6);
    }

    #[test]
    fn zero_area_line_is_dropped() {
        let d = doc("<span class='ocr_line' title='bbox 10 10 10 40'>x</span>");
        let mut fonts = FontEncoder::new();
        let out = compose_text_layer(&d, 792.0, 1.0, 1.0, &mut fonts);
        assert_eq!(out, " BT 3 Tr ET ");
        assert!(fonts.is_empty());
    }
}
