//! JPEG2000 (JP2) box scanning.
//!
//! A sliding 8-byte window moves over the stream looking for box names;
//! the 4 bytes before the name hold the box length. The `jp2h` header
//! super-box is read whole and its child boxes scanned recursively;
//! scanning stops once a color specification has been seen.

use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{QuireError, Result};
use crate::inspect::{ColorSpace, Inspection};

// Other known box names are recognized only to skip their payload, so
// box-like byte runs inside them cannot confuse the window scan.
const BOXES: [&[u8; 4]; 12] = [
    b"ftyp", b"jp2h", b"ihdr", b"colr", b"res ", b"resc", b"resd", b"prfl", b"bpcc", b"pclr",
    b"cdef", b"jp2i",
];

// Enumerated colorspace values from ISO 15444-1.
const ENUM_SRGB: u32 = 16;
const ENUM_GRAY: u32 = 17;

fn box_at(window: &[u8; 8]) -> Option<&'static [u8; 4]> {
    BOXES.iter().find(|b| &window[4..] == &b[..]).copied()
}

fn scan_boxes<R: Read + Seek>(io: &mut R, insp: &mut Inspection) -> Result<()> {
    let mut window = [0u8; 8];

    loop {
        let mut byte = [0u8; 1];
        if io.read(&mut byte)? == 0 {
            return Ok(());
        }
        window.rotate_left(1);
        window[7] = byte[0];

        let Some(name) = box_at(&window) else {
            continue;
        };
        let mut length = u32::from_be_bytes([window[0], window[1], window[2], window[3]]) as u64;
        if length == 0 {
            // Extended-length escape: the real length follows the name
            // as a 64-bit word covering header and payload both.
            length = io.read_u64::<BigEndian>()?;
            length = length
                .checked_sub(8)
                .ok_or_else(|| QuireError::MalformedJpeg2000("bad extended box length".into()))?;
        }
        let payload = length
            .checked_sub(8)
            .ok_or_else(|| QuireError::MalformedJpeg2000("box length below 8".into()))?;

        match name {
            b"jp2h" => {
                let mut body = vec![0u8; payload as usize];
                io.read_exact(&mut body)?;
                let mut cur = Cursor::new(body);
                return scan_boxes(&mut cur, insp);
            }
            b"ihdr" => {
                if payload != 14 {
                    return Err(QuireError::MalformedJpeg2000(
                        "image header box length is not 22".into(),
                    ));
                }
                insp.height = Some(io.read_u32::<BigEndian>()?);
                insp.width = Some(io.read_u32::<BigEndian>()?);
                let _ncomps = io.read_u16::<BigEndian>()?;
                // Low 7 bits hold depth minus one; the top bit flags
                // signed samples.
                insp.depth = Some((io.read_u8()? & 0x7F) + 1);
            }
            b"colr" => {
                let meth = io.read_u8()?;
                // Precedence and approximation accuracy.
                let mut skip = [0u8; 2];
                io.read_exact(&mut skip)?;
                if meth == 1 {
                    let enumcs = io.read_u32::<BigEndian>()?;
                    insp.cspace = Some(match enumcs {
                        ENUM_SRGB => ColorSpace::DeviceRgb,
                        ENUM_GRAY => ColorSpace::DeviceGray,
                        other => return Err(QuireError::UnknownColorSpace(other)),
                    });
                }
                // The first color specification wins and nothing past
                // it matters for assembly.
                return Ok(());
            }
            _ => {
                io.seek(SeekFrom::Current(payload as i64))?;
            }
        }
    }
}

pub(crate) fn examine<R: Read + Seek>(raw: &mut R, insp: &mut Inspection) -> Result<()> {
    let mut io = BufReader::new(raw);
    scan_boxes(&mut io, insp)?;
    if insp.width.is_none() {
        return Err(QuireError::MalformedJpeg2000("no image header box".into()));
    }
    Ok(())
}
