//! JPEG marker scanning.
//!
//! Walks marker segments from SOI up to the scan data. Geometry comes
//! from the first SOF frame header; JFIF and EXIF application segments
//! contribute resolution data. EXIF payloads are a complete embedded
//! TIFF structure and reuse the TIFF directory parser.

use std::io::{BufReader, Cursor, Read, Seek};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{QuireError, Result};
use crate::inspect::tiff::{self, Endian};
use crate::inspect::{ColorSpace, Inspection};

// Frame headers for every coding process: baseline, extended sequential,
// progressive, lossless and the arithmetic and differential variants.
// C4, C8 and CC define tables rather than frames.
const SOF_MARKERS: [u8; 13] = [
    0xC0, 0xC1, 0xC2, 0xC3, 0xC5, 0xC6, 0xC7, 0xC9, 0xCA, 0xCB, 0xCD, 0xCE, 0xCF,
];
const MARKER_APP0: u8 = 0xE0;
const MARKER_APP1: u8 = 0xE1;
const MARKER_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;

fn next_marker<R: Read>(io: &mut R) -> Result<u8> {
    let eof =
        || QuireError::MalformedJpeg("data ended before the scan was reached".into());
    let mut b = [0u8; 1];
    loop {
        if io.read(&mut b)? == 0 {
            return Err(eof());
        }
        if b[0] != 0xFF {
            continue;
        }
        // Skip fill bytes.
        loop {
            if io.read(&mut b)? == 0 {
                return Err(eof());
            }
            if b[0] != 0xFF {
                return Ok(b[0]);
            }
        }
    }
}

fn read_frame<R: Read>(io: &mut R) -> Result<Vec<u8>> {
    let length = io.read_u16::<BigEndian>()? as usize;
    if length < 2 {
        return Err(QuireError::MalformedJpeg("segment length below 2".into()));
    }
    let mut frame = vec![0u8; length - 2];
    io.read_exact(&mut frame)?;
    Ok(frame)
}

pub(crate) fn examine<R: Read + Seek>(raw: &mut R, insp: &mut Inspection) -> Result<()> {
    let mut io = BufReader::new(raw);

    loop {
        let marker = next_marker(&mut io)?;
        match marker {
            m if SOF_MARKERS.contains(&m) => {
                let frame = read_frame(&mut io)?;
                if frame.len() < 6 || frame.len() != 6 + 3 * frame[5] as usize {
                    return Err(QuireError::MalformedJpeg(
                        "could not read a SOF header".into(),
                    ));
                }
                insp.depth = Some(frame[0]);
                insp.height = Some(u32::from(u16::from_be_bytes([frame[1], frame[2]])));
                insp.width = Some(u32::from(u16::from_be_bytes([frame[3], frame[4]])));
                insp.cspace = Some(match frame[5] {
                    1 => ColorSpace::DeviceGray,
                    4 => ColorSpace::DeviceCmyk,
                    _ => ColorSpace::DeviceRgb,
                });
            }
            MARKER_APP0 => {
                let frame = read_frame(&mut io)?;
                // A JFIF segment is 16 bytes including the length word.
                if frame.len() != 14 || !frame.starts_with(b"JFIF\0") {
                    return Err(QuireError::MalformedJpeg(
                        "could not read JFIF data".into(),
                    ));
                }
                let unit = frame[7];
                let x = u32::from(u16::from_be_bytes([frame[8], frame[9]]));
                let y = u32::from(u16::from_be_bytes([frame[10], frame[11]]));
                // Unit 2 is dots per centimeter.
                let (x, y) = if unit == 2 {
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
            MARKER_APP1 => {
                let frame = read_frame(&mut io)?;
                if frame.starts_with(b"Exif\0\0") && frame.len() > 10 {
                    let body = &frame[6..];
                    if let Some(en) = Endian::from_tiff_mark(&body[..4]) {
                        let mut cur = Cursor::new(body);
                        cur.set_position(4);
                        tiff::examine(&mut cur, en, None, true, insp)?;
                    }
                }
            }
            MARKER_SOS | MARKER_EOI => break,
            // Standalone markers (RST, TEM) carry no length word.
            0x01 | 0xD0..=0xD7 => {}
            _ => {
                let _ = read_frame(&mut io)?;
            }
        }
    }

    if insp.width.is_none() {
        return Err(QuireError::MalformedJpeg("no frame header found".into()));
    }
    Ok(())
}
