//! Error types for the quire PDF assembly library.

use thiserror::Error;

/// Primary error type for image inspection and PDF assembly operations.
#[derive(Error, Debug)]
pub enum QuireError {
    #[error("file format not recognized")]
    UnrecognizedFormat,

    #[error("malformed TIFF: {0}")]
    MalformedTiff(String),

    #[error("malformed PNG: {0}")]
    MalformedPng(String),

    #[error("malformed JPEG: {0}")]
    MalformedJpeg(String),

    #[error("malformed JPEG2000: {0}")]
    MalformedJpeg2000(String),

    #[error("malformed JBIG2: {0}")]
    MalformedJbig2(String),

    #[error("unknown JPEG2000 colorspace: enumeration {0}")]
    UnknownColorSpace(u32),

    #[error("TOC indent mixes spaces and tabs at line {0}")]
    InconsistentIndent(usize),

    #[error("TOC entry at line {0} has a wrong indent")]
    BadIndent(usize),

    #[error("document has no catalog object")]
    NoCatalog,

    #[error("document has no info object")]
    NoInfo,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias for QuireError.
pub type Result<T> = std::result::Result<T, QuireError>;
