//! Generic PDF object graph and file serializer.
//!
//! A [`Document`] owns a set of numbered indirect objects, each a
//! dictionary with an optional stream, and writes them out as a complete
//! PDF file with a correct cross-reference table.

mod document;
mod objects;

pub use document::Document;
pub use objects::{ObjectId, PdfDict, PdfObject, PdfValue};
