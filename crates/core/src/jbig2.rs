//! Geometry extraction from JBIG2 embedded streams.
//!
//! The external encoder writes one `.jbig2` bitstream per page plus a
//! shared symbol dictionary. The page info segment of an embedded
//! stream produced that way starts at byte 11 and carries width,
//! height and both resolutions as big-endian 32-bit words.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{QuireError, Result};

const GEOMETRY_OFFSET: usize = 11;

/// Page geometry read from a `.jbig2` stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jbig2Geometry {
    pub width: u32,
    pub height: u32,
    pub x_dpi: u32,
    pub y_dpi: u32,
}

impl Jbig2Geometry {
    pub fn read(data: &[u8]) -> Result<Self> {
        let end = GEOMETRY_OFFSET + 16;
        if data.len() < end {
            return Err(QuireError::MalformedJbig2(
                "stream too short for a page info segment".into(),
            ));
        }
        let fields = &data[GEOMETRY_OFFSET..end];
        Ok(Self {
            width: BigEndian::read_u32(&fields[0..4]),
            height: BigEndian::read_u32(&fields[4..8]),
            x_dpi: BigEndian::read_u32(&fields[8..12]),
            y_dpi: BigEndian::read_u32(&fields[12..16]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_geometry_fields() {
        let mut data = vec![0u8; 40];
        data[11..15].copy_from_slice(&2480u32.to_be_bytes());
        data[15..19].copy_from_slice(&3508u32.to_be_bytes());
        data[19..23].copy_from_slice(&300u32.to_be_bytes());
        data[23..27].copy_from_slice(&300u32.to_be_bytes());
        let geom = Jbig2Geometry::read(&data).unwrap();
        assert_eq!(
            geom,
            Jbig2Geometry {
                width: 2480,
                height: 3508,
                x_dpi: 300,
                y_dpi: 300,
            }
        );
    }

    #[test]
    fn short_stream_is_rejected() {
        assert!(matches!(
            Jbig2Geometry::read(&[0u8; 20]),
            Err(QuireError::MalformedJbig2(_))
        ));
    }
}
