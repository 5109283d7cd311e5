//! PDF values and indirect objects.

use indexmap::IndexMap;

/// Number of an indirect object. Generation is always zero in files we
/// produce, so the number alone identifies the object.
pub type ObjectId = u32;

/// Dictionary with stable key order, so output is deterministic.
pub type PdfDict = IndexMap<String, PdfValue>;

/// A PDF direct value.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    /// Written as `/Name`.
    Name(String),
    /// Literal string, escaped on output. Holds raw bytes so UTF-16BE
    /// text strings pass through unchanged.
    Str(Vec<u8>),
    /// Preformatted PDF text emitted verbatim.
    Raw(String),
    Ref(ObjectId),
    Array(Vec<PdfValue>),
    Dict(PdfDict),
}

impl PdfValue {
    pub fn name(n: impl Into<String>) -> Self {
        Self::Name(n.into())
    }

    pub fn text(s: impl AsRef<[u8]>) -> Self {
        Self::Str(s.as_ref().to_vec())
    }

    /// Serialize this value into `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        match self {
            Self::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
            Self::Int(n) => out.extend_from_slice(n.to_string().as_bytes()),
            Self::Real(r) => out.extend_from_slice(format_real(*r).as_bytes()),
            Self::Name(n) => {
                out.push(b'/');
                out.extend_from_slice(n.as_bytes());
            }
            Self::Str(s) => {
                out.push(b'(');
                for &b in s {
                    match b {
                        b'(' | b')' | b'\\' => {
                            out.push(b'\\');
                            out.push(b);
                        }
                        b'\r' => out.extend_from_slice(b"\\r"),
                        _ => out.push(b),
                    }
                }
                out.push(b')');
            }
            Self::Raw(s) => out.extend_from_slice(s.as_bytes()),
            Self::Ref(id) => {
                out.extend_from_slice(id.to_string().as_bytes());
                out.extend_from_slice(b" 0 R");
            }
            Self::Array(items) => {
                out.extend_from_slice(b"[ ");
                for item in items {
                    item.write(out);
                    out.push(b' ');
                }
                out.push(b']');
            }
            Self::Dict(dict) => write_dict(dict, out),
        }
    }
}

/// Format a real number with up to four fractional digits and no
/// trailing zeros, the way content streams expect coordinates.
pub(crate) fn format_real(r: f64) -> String {
    let mut s = format!("{r:.4}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

pub(crate) fn write_dict(dict: &PdfDict, out: &mut Vec<u8>) {
    out.extend_from_slice(b"<<\n");
    for (key, value) in dict {
        out.push(b'/');
        out.extend_from_slice(key.as_bytes());
        out.push(b' ');
        value.write(out);
        out.push(b'\n');
    }
    out.extend_from_slice(b">>");
}

/// An indirect object: a dictionary, optionally carrying a stream.
#[derive(Debug, Clone)]
pub struct PdfObject {
    pub id: ObjectId,
    pub dict: PdfDict,
    pub stream: Option<Vec<u8>>,
}

impl PdfObject {
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            dict: PdfDict::default(),
            stream: None,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: PdfValue) -> &mut Self {
        self.dict.insert(key.into(), value);
        self
    }

    /// Serialize as `N 0 obj ... endobj`, appending to `out`.
    ///
    /// When a stream is present a `/Length` entry for the exact payload
    /// size is emitted whether or not the dictionary carries one.
    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.id.to_string().as_bytes());
        out.extend_from_slice(b" 0 obj\n");

        out.extend_from_slice(b"<<\n");
        if let Some(stream) = &self.stream {
            out.extend_from_slice(b"/Length ");
            out.extend_from_slice(stream.len().to_string().as_bytes());
            out.push(b'\n');
        }
        for (key, value) in &self.dict {
            if self.stream.is_some() && key == "Length" {
                continue;
            }
            out.push(b'/');
            out.extend_from_slice(key.as_bytes());
            out.push(b' ');
            value.write(out);
            out.push(b'\n');
        }
        out.extend_from_slice(b">>\n");

        if let Some(stream) = &self.stream {
            out.extend_from_slice(b"stream\n");
            out.extend_from_slice(stream);
            out.extend_from_slice(b"\nendstream\n");
        }
        out.extend_from_slice(b"endobj\n");
    }
}
