//! TIFF directory parsing.
//!
//! Walks the IFD entry table, decoding each entry into integer or text
//! values, and maps the well-known tags onto image properties. Also used
//! for the TIFF structure embedded in a JPEG APP1 (EXIF) segment.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::error::{QuireError, Result};
use crate::inspect::{ColorSpace, Compression, Inspection, TagMap, TagValue};

pub const TAG_WIDTH: u16 = 0x0100;
pub const TAG_HEIGHT: u16 = 0x0101;
pub const TAG_BITS_PER_SAMPLE: u16 = 0x0102;
pub const TAG_COMPRESSION: u16 = 0x0103;
pub const TAG_PHOTOMETRIC: u16 = 0x0106;
pub const TAG_STRIP_OFFSETS: u16 = 0x0111;
pub const TAG_ROWS_PER_STRIP: u16 = 0x0116;
pub const TAG_STRIP_BYTE_COUNTS: u16 = 0x0117;
pub const TAG_X_RESOLUTION: u16 = 0x011A;
pub const TAG_Y_RESOLUTION: u16 = 0x011B;
pub const TAG_RESOLUTION_UNIT: u16 = 0x0128;
pub const TAG_COLOR_MAP: u16 = 0x0140;
pub const TAG_EXIF_IFD: u16 = 0x8769;

/// TIFF byte order, chosen by the signature bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endian {
    Big,
    Little,
}

impl Endian {
    /// Recognize the `MM\0*` / `II*\0` byte-order mark.
    pub fn from_tiff_mark(sign: &[u8]) -> Option<Self> {
        match sign {
            b"MM\x00\x2A" => Some(Self::Big),
            b"II\x2A\x00" => Some(Self::Little),
            _ => None,
        }
    }

    fn u16<R: Read>(self, io: &mut R) -> Result<u16> {
        Ok(match self {
            Self::Big => io.read_u16::<BigEndian>()?,
            Self::Little => io.read_u16::<LittleEndian>()?,
        })
    }

    fn u32<R: Read>(self, io: &mut R) -> Result<u32> {
        Ok(match self {
            Self::Big => io.read_u32::<BigEndian>()?,
            Self::Little => io.read_u32::<LittleEndian>()?,
        })
    }
}

// TIFF 6.0 field types; everything else is skipped.
const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;
const TYPE_SBYTE: u16 = 6;
const TYPE_UNDEFINED: u16 = 7;
const TYPE_SSHORT: u16 = 8;
const TYPE_SLONG: u16 = 9;
const TYPE_SRATIONAL: u16 = 10;

fn record_len(ftype: u16) -> Result<u64> {
    match ftype {
        TYPE_BYTE | TYPE_SBYTE | TYPE_ASCII | TYPE_UNDEFINED => Ok(1),
        TYPE_SHORT | TYPE_SSHORT => Ok(2),
        TYPE_LONG | TYPE_SLONG => Ok(4),
        TYPE_RATIONAL | TYPE_SRATIONAL => Ok(8),
        _ => Err(QuireError::MalformedTiff(
            "could not read an IFD entry".into(),
        )),
    }
}

/// Decode `cnt` records of a directory entry from `io`.
fn read_values<R: Read + Seek>(
    io: &mut R,
    en: Endian,
    ftype: u16,
    cnt: u64,
) -> Result<Vec<TagValue>> {
    match ftype {
        TYPE_ASCII | TYPE_UNDEFINED => {
            let mut raw = vec![0u8; cnt as usize];
            io.read_exact(&mut raw)?;
            let text = String::from_utf8_lossy(&raw)
                .trim_end_matches(['\0', ' '])
                .to_string();
            Ok(vec![TagValue::Text(text)])
        }
        _ => {
            let mut vals = Vec::with_capacity(cnt as usize);
            for _ in 0..cnt {
                let v = match ftype {
                    TYPE_BYTE => io.read_u8()? as i64,
                    TYPE_SBYTE => io.read_i8()? as i64,
                    TYPE_SHORT | TYPE_SSHORT => en.u16(io)? as i64,
                    TYPE_LONG | TYPE_SLONG => en.u32(io)? as i64,
                    TYPE_RATIONAL | TYPE_SRATIONAL => {
                        let num = en.u32(io)? as i64;
                        let den = en.u32(io)? as i64;
                        if den == 0 {
                            return Err(QuireError::MalformedTiff(
                                "rational value with zero denominator".into(),
                            ));
                        }
                        // Truncating quotient; resolutions are treated as
                        // integer DPI values downstream.
                        num / den
                    }
                    _ => unreachable!(),
                };
                vals.push(TagValue::Int(v));
            }
            Ok(vals)
        }
    }
}

/// Parse one image file directory at `offset`.
///
/// Returns the decoded tag dictionary and the offset of the next IFD
/// (zero when this is the last one). Entries with an unknown field type
/// are dropped.
pub(crate) fn parse_ifd<R: Read + Seek>(
    io: &mut R,
    offset: u64,
    en: Endian,
) -> Result<(TagMap, u64)> {
    io.seek(SeekFrom::Start(offset))?;
    let n_entries = en.u16(io)?;
    let mut tags = TagMap::default();

    for _ in 0..n_entries {
        let tag = en.u16(io)?;
        let ftype = en.u16(io)?;
        let cnt = en.u32(io)? as u64;
        let mut val = [0u8; 4];
        io.read_exact(&mut val)?;

        let rec_len = record_len(ftype)?;
        let total = rec_len * cnt;
        let values = if total > 4 {
            let voff = {
                let mut cur = std::io::Cursor::new(&val[..]);
                en.u32(&mut cur)? as u64
            };
            let here = io.stream_position()?;
            io.seek(SeekFrom::Start(voff))?;
            let values = read_values(io, en, ftype, cnt)?;
            io.seek(SeekFrom::Start(here))?;
            values
        } else {
            let mut cur = std::io::Cursor::new(&val[..]);
            read_values(&mut cur, en, ftype, cnt)?
        };
        tags.insert(tag, values);
    }

    let next = en.u32(io)? as u64;
    Ok((tags, next))
}

fn tag_u32(tags: &TagMap, code: u16) -> Option<u32> {
    tags.get(&code)?.first()?.as_int().map(|v| v as u32)
}

/// Examine a TIFF structure and fill `insp` from its first directory.
///
/// `ifd_offset` overrides the offset read from the header word (used when
/// stepping to a later image). With `embedded` set, only the tags shared
/// with EXIF metadata are interpreted; geometry and strip layout are the
/// business of the enclosing JPEG.
pub(crate) fn examine<R: Read + Seek>(
    io: &mut R,
    en: Endian,
    ifd_offset: Option<u64>,
    embedded: bool,
    insp: &mut Inspection,
) -> Result<()> {
    let offset = match ifd_offset {
        Some(off) => off,
        None => en.u32(io)? as u64,
    };
    let (mut tags, next) = parse_ifd(io, offset, en)?;
    insp.next_off = next;

    if !embedded {
        let required = [
            TAG_WIDTH,
            TAG_HEIGHT,
            TAG_PHOTOMETRIC,
            TAG_STRIP_OFFSETS,
            TAG_STRIP_BYTE_COUNTS,
        ];
        if required.iter().any(|t| !tags.contains_key(t)) {
            return Err(QuireError::MalformedTiff(
                "a required tag is missing".into(),
            ));
        }

        insp.width = tag_u32(&tags, TAG_WIDTH);
        insp.height = tag_u32(&tags, TAG_HEIGHT);

        let offsets = &tags[&TAG_STRIP_OFFSETS];
        let counts = &tags[&TAG_STRIP_BYTE_COUNTS];
        if offsets.len() != counts.len() {
            return Err(QuireError::MalformedTiff(
                "strip offset and byte count arrays differ in length".into(),
            ));
        }
        insp.data_blocks = offsets
            .iter()
            .zip(counts)
            .filter_map(|(o, c)| Some((o.as_int()? as u64, c.as_int()? as u64)))
            .collect();

        insp.cspace = Some(match tag_u32(&tags, TAG_PHOTOMETRIC) {
            Some(0) | Some(1) => ColorSpace::DeviceGray,
            Some(3) => ColorSpace::Indexed,
            Some(5) => ColorSpace::DeviceCmyk,
            _ => ColorSpace::DeviceRgb,
        });

        if insp.cspace == Some(ColorSpace::Indexed)
            && let Some(map) = tags.get(&TAG_COLOR_MAP)
        {
            // The color map stores all red values, then all green, then
            // all blue, 16 bits per component.
            let per_comp = map.len() / 3;
            let mut palette = Vec::with_capacity(per_comp);
            for i in 0..per_comp {
                let comp = |idx: usize| -> u8 {
                    map.get(idx)
                        .and_then(TagValue::as_int)
                        .map(|v| (v / 256) as u8)
                        .unwrap_or(0)
                };
                palette.push([comp(i), comp(per_comp + i), comp(2 * per_comp + i)]);
            }
            insp.palette = Some(palette);
        }

        insp.depth = Some(tag_u32(&tags, TAG_BITS_PER_SAMPLE).unwrap_or(1) as u8);
    }

    // An EXIF sub-directory is folded into the main tag dictionary. Its
    // next-IFD word is ignored so multi-image stepping stays on the main
    // directory chain.
    if let Some(exif_off) = tag_u32(&tags, TAG_EXIF_IFD) {
        let (exif_tags, _) = parse_ifd(io, exif_off as u64, en)?;
        tags.extend(exif_tags);
    }

    match tag_u32(&tags, TAG_COMPRESSION) {
        Some(1) => insp.compression = Some(Compression::None),
        Some(3) | Some(4) => insp.compression = Some(Compression::CcittFax),
        Some(5) => insp.compression = Some(Compression::Lzw),
        Some(8) | Some(32946) => insp.compression = Some(Compression::Flate),
        _ => {}
    }

    if let (Some(x), Some(y)) = (
        tag_u32(&tags, TAG_X_RESOLUTION),
        tag_u32(&tags, TAG_Y_RESOLUTION),
    ) {
        // Unit 3 is pixels per centimeter.
        let (x, y) = if tag_u32(&tags, TAG_RESOLUTION_UNIT) == Some(3) {
            (
                (x as f64 * 2.54).round() as u32,
                (y as f64 * 2.54).round() as u32,
            )
        } else {
            (x, y)
        };
        insp.x_dpi = Some(x);
        insp.y_dpi = Some(y);
    }

    match insp.tags.as_mut() {
        Some(existing) => existing.extend(tags),
        None => insp.tags = Some(tags),
    }
    Ok(())
}
