//! Font resources for the invisible OCR text layer.
//!
//! Every page shares one pool of simple Type1 fonts derived from
//! Times-Roman. Each font covers up to 256 distinct Unicode characters
//! through a custom /Differences encoding; characters beyond that open
//! further fonts. [`FontEncoder`] owns the bucket list and hands out
//! stable (bucket, code position) pairs.

pub mod cmap;
pub mod metrics;

pub use cmap::to_unicode_cmap;
pub use metrics::{FontHeader, TIMES_HEADER, chardata, line_width};

const BUCKET_CAP: usize = 256;

/// Assigns characters to encoding buckets.
///
/// Bucket position 0 always holds a space, so a freshly opened bucket
/// can still show inter-word gaps without switching fonts. Entries are
/// only ever appended; positions handed out earlier stay valid.
#[derive(Debug, Default)]
pub struct FontEncoder {
    buckets: Vec<Vec<char>>,
}

impl FontEncoder {
    pub fn new() -> Self {
        Self {
            buckets: vec![vec![' ']],
        }
    }

    /// Code position for `c`, preferring the bucket `current` when it
    /// already covers the character. This keeps the space character,
    /// present in every bucket, from forcing a font switch.
    pub fn encode(&mut self, c: char, current: Option<usize>) -> (usize, u8) {
        if let Some(cur) = current
            && let Some(slot) = self.buckets.get(cur)
            && let Some(pos) = slot.iter().position(|&x| x == c)
        {
            return (cur, pos as u8);
        }
        for (i, bucket) in self.buckets.iter().enumerate() {
            if let Some(pos) = bucket.iter().position(|&x| x == c) {
                return (i, pos as u8);
            }
        }

        let last = self.buckets.len() - 1;
        if self.buckets[last].len() < BUCKET_CAP {
            self.buckets[last].push(c);
            (last, (self.buckets[last].len() - 1) as u8)
        } else {
            self.buckets.push(vec![' ', c]);
            (last + 1, 1)
        }
    }

    /// Bucket and code position for `c` with no current-bucket bias.
    pub fn classify(&mut self, c: char) -> (usize, u8) {
        self.encode(c, None)
    }

    pub fn buckets(&self) -> &[Vec<char>] {
        &self.buckets
    }

    /// True when no character beyond the initial space was registered.
    pub fn is_empty(&self) -> bool {
        self.buckets.len() == 1 && self.buckets[0].len() == 1
    }
}
