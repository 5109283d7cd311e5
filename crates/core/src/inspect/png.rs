//! PNG chunk scanning.
//!
//! The IHDR chunk sits at a fixed position right after the signature and
//! is read directly. A sliding 8-byte window then moves over the rest of
//! the stream looking for known chunk names; the 4 bytes before a
//! matching name hold the chunk length. Pixel-bearing chunks are skipped
//! over with their position recorded, everything else is decoded in place.

use std::io::{BufReader, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{QuireError, Result};
use crate::inspect::{ColorSpace, Compression, Inspection, Transparency};

const CHUNKS: [&[u8; 4]; 18] = [
    b"IHDR", b"PLTE", b"IDAT", b"IEND", b"tRNS", b"cHRM", b"gAMA", b"iCCP", b"sBIT", b"sRGB",
    b"iTXt", b"tEXt", b"zTXt", b"bKGD", b"hIST", b"pHYs", b"sPLT", b"tIME",
];

fn chunk_at(window: &[u8; 8]) -> Option<&'static [u8; 4]> {
    CHUNKS.iter().find(|c| &window[4..] == &c[..]).copied()
}

pub(crate) fn examine<R: Read + Seek>(raw: &mut R, insp: &mut Inspection) -> Result<()> {
    let mut io = BufReader::new(raw);

    // Signature (8) plus the IHDR length and name words (8).
    io.seek(SeekFrom::Start(16))?;
    insp.width = Some(io.read_u32::<BigEndian>()?);
    insp.height = Some(io.read_u32::<BigEndian>()?);
    insp.depth = Some(io.read_u8()?);
    let color = io.read_u8()?;
    let compr = io.read_u8()?;
    let filtr = io.read_u8()?;
    let _interlace = io.read_u8()?;
    if compr == 0 && filtr == 0 {
        insp.compression = Some(Compression::Flate);
    }
    insp.cspace = Some(match color {
        0 | 4 => ColorSpace::DeviceGray,
        3 => ColorSpace::Indexed,
        _ => ColorSpace::DeviceRgb,
    });

    let mut window = [0u8; 8];
    loop {
        let mut byte = [0u8; 1];
        if io.read(&mut byte)? == 0 {
            break;
        }
        window.rotate_left(1);
        window[7] = byte[0];

        let Some(chunk) = chunk_at(&window) else {
            continue;
        };
        let length = u32::from_be_bytes([window[0], window[1], window[2], window[3]]) as u64;

        match chunk {
            b"PLTE" => {
                let mut palette = Vec::with_capacity((length / 3) as usize);
                for _ in 0..length / 3 {
                    let mut rgb = [0u8; 3];
                    io.read_exact(&mut rgb)?;
                    palette.push(rgb);
                }
                insp.palette = Some(palette);
            }
            b"tRNS" => match insp.cspace {
                Some(ColorSpace::Indexed) => {
                    // One alpha byte per palette index, up to the last
                    // non-opaque entry.
                    let mut alphas = vec![0u8; length as usize];
                    io.read_exact(&mut alphas)?;
                    insp.trans = Some(Transparency::IndexAlpha(alphas));
                }
                Some(ColorSpace::DeviceGray) => {
                    insp.trans = Some(Transparency::GrayKey(io.read_u16::<BigEndian>()?));
                }
                _ => {
                    let key = [
                        io.read_u16::<BigEndian>()?,
                        io.read_u16::<BigEndian>()?,
                        io.read_u16::<BigEndian>()?,
                    ];
                    insp.trans = Some(Transparency::RgbKey(key));
                }
            },
            b"pHYs" => {
                // Pixels per meter, converted to DPI through pixels per
                // centimeter with truncation at the first step.
                let x_dpm = io.read_u32::<BigEndian>()? as u64;
                let y_dpm = io.read_u32::<BigEndian>()? as u64;
                insp.x_dpi = Some(((x_dpm / 100) as f64 * 2.54).round() as u32);
                insp.y_dpi = Some(((y_dpm / 100) as f64 * 2.54).round() as u32);
            }
            b"IDAT" => {
                let pos = io.stream_position()?;
                insp.data_blocks.push((pos, length));
                // Skip the payload and its CRC word.
                io.seek(SeekFrom::Start(pos + length + 4))?;
            }
            b"IEND" => break,
            _ => {
                io.seek_relative(length as i64 + 4)?;
            }
        }
    }

    if insp.data_blocks.is_empty() {
        return Err(QuireError::MalformedPng("no IDAT chunks found".into()));
    }
    Ok(())
}
