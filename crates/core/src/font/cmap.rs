//! ToUnicode CMap generation for bucket encodings.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use crate::error::Result;

struct BfRange {
    start: usize,
    end: usize,
    uni: u32,
}

/// Build the zlib-compressed ToUnicode CMap stream for one bucket.
///
/// Maximal runs of consecutive code positions whose Unicode values also
/// ascend by one collapse into bfrange entries; everything else is
/// written as individual bfchar lines.
pub fn to_unicode_cmap(enc: &[char]) -> Result<Vec<u8>> {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo\n\
         <<\n\
         \x20 /Registry ( Quire )\n\
         \x20 /Ordering ( Custom )\n\
         \x20 /Supplement 0\n\
         >> def\n\
         /CMapName /Quire-Custom def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <00> <FF>\n\
         endcodespacerange\n",
    );

    let mut ranges: Vec<BfRange> = Vec::new();
    let mut open: Option<BfRange> = None;
    let mut prev: Option<u32> = None;
    let mut n_bfchar = 0usize;

    for (i, &c) in enc.iter().enumerate() {
        let cur = c as u32;
        if prev.is_some_and(|p| cur == p + 1) {
            match open.as_mut() {
                None => {
                    open = Some(BfRange {
                        start: i - 1,
                        end: i,
                        uni: prev.unwrap_or(0),
                    });
                    n_bfchar -= 1;
                }
                Some(r) => r.end = i,
            }
        } else if let Some(r) = open.take() {
            ranges.push(r);
        }

        if open.is_none() {
            n_bfchar += 1;
        }
        prev = Some(cur);
    }
    if let Some(r) = open.take() {
        ranges.push(r);
    }

    if !ranges.is_empty() {
        cmap.push_str(&format!("{} beginbfrange\n", ranges.len()));
        for r in &ranges {
            cmap.push_str(&format!("<{:02X}> <{:02X}> <{:04X}>\n", r.start, r.end, r.uni));
        }
        cmap.push_str("endbfrange\n");
    }

    if n_bfchar > 0 {
        cmap.push_str(&format!("{n_bfchar} beginbfchar\n"));
        for (i, &c) in enc.iter().enumerate() {
            let in_range = ranges.iter().any(|r| i >= r.start && i <= r.end);
            if !in_range {
                cmap.push_str(&format!("<{:02X}> <{:04X}>\n", i, c as u32));
            }
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );

    let mut z = ZlibEncoder::new(Vec::new(), Compression::best());
    z.write_all(cmap.as_bytes())?;
    Ok(z.finish()?)
}
