//! Container inspector - detect basic raster image properties.
//!
//! Reads TIFF, PNG, JPEG and JPEG2000 headers far enough to recover
//! geometry, color space, bit depth, compression method, palette and
//! transparency data, plus the byte ranges holding the already-compressed
//! pixel payload. Pixels are never decoded.

mod jp2;
mod jpeg;
mod png;
mod tiff;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::{QuireError, Result};

pub(crate) use tiff::Endian;
pub use tiff::TAG_ROWS_PER_STRIP;

/// Source container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Tiff,
    Png,
    Jpeg,
    Jpeg2000,
}

/// PDF color space the image data maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    Indexed,
}

impl ColorSpace {
    /// PDF name for the color space, without the leading slash.
    pub fn pdf_name(self) -> &'static str {
        match self {
            Self::DeviceGray => "DeviceGray",
            Self::DeviceRgb => "DeviceRGB",
            Self::DeviceCmyk => "DeviceCMYK",
            Self::Indexed => "Indexed",
        }
    }
}

/// Compression method of the stored pixel data, named after the PDF
/// stream filter that can decode it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    CcittFax,
    Lzw,
    Flate,
    Dct,
    Jpx,
}

impl Compression {
    /// PDF filter name, or `None` for uncompressed data.
    pub fn filter_name(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::CcittFax => Some("CCITTFaxDecode"),
            Self::Lzw => Some("LZWDecode"),
            Self::Flate => Some("FlateDecode"),
            Self::Dct => Some("DCTDecode"),
            Self::Jpx => Some("JPXDecode"),
        }
    }
}

/// Transparency data, format-dependent (PNG tRNS semantics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transparency {
    /// One alpha byte per palette index, up to the last non-opaque entry.
    IndexAlpha(Vec<u8>),
    /// Single 16-bit transparent-gray key.
    GrayKey(u16),
    /// 16-bit transparent-color key per RGB channel.
    RgbKey([u16; 3]),
}

/// A decoded TIFF directory entry value.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Int(i64),
    Text(String),
}

impl TagValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

/// TIFF tag dictionary: tag code to decoded value array.
pub type TagMap = FxHashMap<u16, Vec<TagValue>>;

/// Basic properties of one inspected image.
///
/// Width and height are always set: a source that cannot be parsed far
/// enough to recover them fails `inspect` instead of producing a
/// half-filled descriptor.
#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Resolution in pixels per inch, converted from the source unit
    /// where necessary.
    pub x_dpi: u32,
    pub y_dpi: u32,
    pub depth: u8,
    pub cspace: Option<ColorSpace>,
    /// RGB triples, present only for indexed images.
    pub palette: Option<Vec<[u8; 3]>>,
    pub trans: Option<Transparency>,
    pub compression: Option<Compression>,
    /// (offset, length) ranges of compressed payload within the source.
    /// For JPEG/JPEG2000 the whole file is the payload and this is empty.
    pub data_blocks: Vec<(u64, u64)>,
    /// TIFF tags, populated for TIFF images and JPEG images with EXIF data.
    pub tags: Option<TagMap>,
    next_off: u64,
}

/// Partially filled descriptor used while a format parser is running.
#[derive(Debug, Default)]
pub(crate) struct Inspection {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub x_dpi: Option<u32>,
    pub y_dpi: Option<u32>,
    pub depth: Option<u8>,
    pub cspace: Option<ColorSpace>,
    pub palette: Option<Vec<[u8; 3]>>,
    pub trans: Option<Transparency>,
    pub compression: Option<Compression>,
    pub data_blocks: Vec<(u64, u64)>,
    pub tags: Option<TagMap>,
    pub next_off: u64,
}

impl Inspection {
    fn finish(self, format: ImageFormat) -> Result<ImageDescriptor> {
        let missing = || {
            let msg = "required image properties are missing".to_string();
            match format {
                ImageFormat::Tiff => QuireError::MalformedTiff(msg),
                ImageFormat::Png => QuireError::MalformedPng(msg),
                ImageFormat::Jpeg => QuireError::MalformedJpeg(msg),
                ImageFormat::Jpeg2000 => QuireError::MalformedJpeg2000(msg),
            }
        };
        let width = self.width.ok_or_else(missing)?;
        let height = self.height.ok_or_else(missing)?;
        let depth = self.depth.ok_or_else(missing)?;
        Ok(ImageDescriptor {
            format,
            width,
            height,
            x_dpi: self.x_dpi.unwrap_or(72),
            y_dpi: self.y_dpi.unwrap_or(72),
            depth,
            cspace: self.cspace,
            palette: self.palette,
            trans: self.trans,
            compression: self.compression,
            data_blocks: self.data_blocks,
            tags: self.tags,
            next_off: self.next_off,
        })
    }
}

impl ImageDescriptor {
    /// Inspect an image from a seekable byte stream.
    ///
    /// Dispatches on the signature prefix, extending the read window as
    /// needed: 2 bytes for the JPEG SOI, 4 for the TIFF byte-order marks,
    /// 8 for the PNG signature and 12 for the JPEG2000 `jP  ` box.
    pub fn inspect<R: Read + Seek>(io: &mut R) -> Result<Self> {
        let mut insp = Inspection::default();
        let mut sign = [0u8; 12];

        io.read_exact(&mut sign[..2])?;
        if &sign[..2] == b"\xFF\xD8" {
            insp.compression = Some(Compression::Dct);
            jpeg::examine(io, &mut insp)?;
            return insp.finish(ImageFormat::Jpeg);
        }

        io.read_exact(&mut sign[2..4])?;
        if let Some(en) = Endian::from_tiff_mark(&sign[..4]) {
            tiff::examine(io, en, None, false, &mut insp)?;
            return insp.finish(ImageFormat::Tiff);
        }

        io.read_exact(&mut sign[4..8])?;
        if &sign[..8] == b"\x89PNG\x0D\x0A\x1A\x0A" {
            png::examine(io, &mut insp)?;
            return insp.finish(ImageFormat::Png);
        }

        io.read_exact(&mut sign[8..12])?;
        if &sign[..12] == b"\x00\x00\x00\x0CjP  \x0D\x0A\x87\x0A" {
            insp.compression = Some(Compression::Jpx);
            jp2::examine(io, &mut insp)?;
            return insp.finish(ImageFormat::Jpeg2000);
        }

        Err(QuireError::UnrecognizedFormat)
    }

    /// Inspect an image file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path)?;
        Self::inspect(&mut file)
    }

    /// Return the (possibly compressed) image payload.
    ///
    /// For JPEG and JPEG2000 this is the whole stream as stored; for TIFF
    /// and PNG the container headers are stripped and the raw data ranges
    /// are concatenated.
    pub fn raw_data<R: Read + Seek>(&self, io: &mut R) -> Result<Vec<u8>> {
        match self.format {
            ImageFormat::Jpeg | ImageFormat::Jpeg2000 => {
                let mut data = Vec::new();
                io.seek(SeekFrom::Start(0))?;
                io.read_to_end(&mut data)?;
                Ok(data)
            }
            ImageFormat::Tiff | ImageFormat::Png => {
                let mut data = Vec::new();
                for &(off, len) in &self.data_blocks {
                    io.seek(SeekFrom::Start(off))?;
                    let mut chunk = vec![0u8; len as usize];
                    io.read_exact(&mut chunk)?;
                    data.extend_from_slice(&chunk);
                }
                Ok(data)
            }
        }
    }

    /// Re-point this descriptor at the next image in a multi-image TIFF.
    ///
    /// Returns `false` when the source holds no further images. The
    /// per-image fields (geometry, palette, data ranges) are replaced,
    /// so the sequence of descriptors is finite and non-restartable.
    pub fn next_image<R: Read + Seek>(&mut self, io: &mut R) -> Result<bool> {
        if self.format != ImageFormat::Tiff || self.next_off == 0 {
            return Ok(false);
        }
        io.seek(SeekFrom::Start(0))?;
        let mut sign = [0u8; 4];
        io.read_exact(&mut sign)?;
        let en = Endian::from_tiff_mark(&sign)
            .ok_or_else(|| QuireError::MalformedTiff("no TIFF signature".into()))?;
        let mut insp = Inspection::default();
        tiff::examine(io, en, Some(self.next_off), false, &mut insp)?;
        *self = insp.finish(ImageFormat::Tiff)?;
        Ok(true)
    }

    /// First value of a TIFF tag as an integer, if present.
    pub fn tag_int(&self, code: u16) -> Option<i64> {
        self.tags
            .as_ref()
            .and_then(|t| t.get(&code))
            .and_then(|v| v.first())
            .and_then(TagValue::as_int)
    }
}
