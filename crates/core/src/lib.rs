//! quire - assemble pre-processed scanned page images into a single PDF file.
//!
//! The approach follows the one typically used for DjVu books: scanned text
//! lives in 1-bit stencil layers painted over an optional halftone background,
//! with an invisible OCR text layer for search and copy support.

pub mod builder;
pub mod error;
pub mod font;
pub mod inspect;
pub mod jbig2;
pub mod labels;
pub mod meta;
pub mod model;
pub mod outline;
pub mod text;

pub use error::{QuireError, Result};
