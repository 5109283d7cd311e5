//! Tests for the image container inspector over synthetic TIFF, PNG,
//! JPEG and JPEG2000 fixtures built in memory.

use std::io::Cursor;

use quire_core::QuireError;
use quire_core::inspect::{ColorSpace, Compression, ImageDescriptor, ImageFormat, Transparency};

const TAG_WIDTH: u16 = 0x0100;
const TAG_HEIGHT: u16 = 0x0101;
const TAG_BITS_PER_SAMPLE: u16 = 0x0102;
const TAG_COMPRESSION: u16 = 0x0103;
const TAG_PHOTOMETRIC: u16 = 0x0106;
const TAG_STRIP_OFFSETS: u16 = 0x0111;
const TAG_ROWS_PER_STRIP: u16 = 0x0116;
const TAG_STRIP_BYTE_COUNTS: u16 = 0x0117;
const TAG_X_RESOLUTION: u16 = 0x011A;
const TAG_Y_RESOLUTION: u16 = 0x011B;
const TAG_RESOLUTION_UNIT: u16 = 0x0128;
const TAG_COLOR_MAP: u16 = 0x0140;

const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;

/// Assemble a little-endian TIFF with one IFD at offset 8.
///
/// Entry values are written inline; entries pointing at out-of-line
/// payloads (rationals, strips, color maps) must carry offsets into
/// `tail`, which starts at `tail_base(entries.len())`.
fn build_tiff(entries: &[(u16, u16, u32, u32)], next_ifd: u32, tail: &[u8]) -> Vec<u8> {
    let mut out = vec![b'I', b'I', 0x2A, 0x00];
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for &(tag, ftype, cnt, val) in entries {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&ftype.to_le_bytes());
        out.extend_from_slice(&cnt.to_le_bytes());
        out.extend_from_slice(&val.to_le_bytes());
    }
    out.extend_from_slice(&next_ifd.to_le_bytes());
    out.extend_from_slice(tail);
    out
}

fn tail_base(n_entries: u32) -> u32 {
    8 + 2 + n_entries * 12 + 4
}

fn rational(num: u32, den: u32) -> Vec<u8> {
    let mut out = num.to_le_bytes().to_vec();
    out.extend_from_slice(&den.to_le_bytes());
    out
}

/// The standard single-strip bilevel fixture used by most TIFF tests.
fn bilevel_tiff(compression: u16, res_unit: u16, res: u32, strip: &[u8]) -> Vec<u8> {
    let base = tail_base(11);
    let strip_off = base + 16;
    let entries = [
        (TAG_WIDTH, TYPE_SHORT, 1, 2480u32),
        (TAG_HEIGHT, TYPE_SHORT, 1, 3508),
        (TAG_BITS_PER_SAMPLE, TYPE_SHORT, 1, 1),
        (TAG_COMPRESSION, TYPE_SHORT, 1, compression as u32),
        (TAG_PHOTOMETRIC, TYPE_SHORT, 1, 0),
        (TAG_STRIP_OFFSETS, TYPE_LONG, 1, strip_off),
        (TAG_ROWS_PER_STRIP, TYPE_SHORT, 1, 3508),
        (TAG_STRIP_BYTE_COUNTS, TYPE_LONG, 1, strip.len() as u32),
        (TAG_X_RESOLUTION, TYPE_RATIONAL, 1, base),
        (TAG_Y_RESOLUTION, TYPE_RATIONAL, 1, base + 8),
        (TAG_RESOLUTION_UNIT, TYPE_SHORT, 1, res_unit as u32),
    ];
    let mut tail = rational(res, 1);
    tail.extend_from_slice(&rational(res, 1));
    tail.extend_from_slice(strip);
    build_tiff(&entries, 0, &tail)
}

#[test]
fn single_strip_ccitt_tiff() {
    let strip = b"\x12\x34\x56\x78";
    let data = bilevel_tiff(4, 2, 300, strip);
    let mut io = Cursor::new(&data);
    let insp = ImageDescriptor::inspect(&mut io).unwrap();

    assert_eq!(insp.width, 2480);
    assert_eq!(insp.height, 3508);
    assert_eq!(insp.depth, 1);
    assert_eq!(insp.cspace, Some(ColorSpace::DeviceGray));
    assert_eq!(insp.compression, Some(Compression::CcittFax));
    assert_eq!((insp.x_dpi, insp.y_dpi), (300, 300));
    assert_eq!(insp.tag_int(TAG_ROWS_PER_STRIP), Some(3508));
    assert_eq!(insp.raw_data(&mut io).unwrap(), strip);
}

#[test]
fn centimeter_resolution_converts_to_dpi() {
    // 118 px/cm is 299.72 dpi, rounded to 300.
    let data = bilevel_tiff(1, 3, 118, b"\x00");
    let insp = ImageDescriptor::inspect(&mut Cursor::new(&data)).unwrap();
    assert_eq!(insp.x_dpi, 300);
    assert_eq!(insp.compression, Some(Compression::None));
}

#[test]
fn rational_resolution_truncates() {
    let base = tail_base(11);
    let strip_off = base + 16;
    let entries = [
        (TAG_WIDTH, TYPE_SHORT, 1, 100u32),
        (TAG_HEIGHT, TYPE_SHORT, 1, 100),
        (TAG_BITS_PER_SAMPLE, TYPE_SHORT, 1, 1),
        (TAG_COMPRESSION, TYPE_SHORT, 1, 1),
        (TAG_PHOTOMETRIC, TYPE_SHORT, 1, 0),
        (TAG_STRIP_OFFSETS, TYPE_LONG, 1, strip_off),
        (TAG_ROWS_PER_STRIP, TYPE_SHORT, 1, 100),
        (TAG_STRIP_BYTE_COUNTS, TYPE_LONG, 1, 1),
        (TAG_X_RESOLUTION, TYPE_RATIONAL, 1, base),
        (TAG_Y_RESOLUTION, TYPE_RATIONAL, 1, base + 8),
        (TAG_RESOLUTION_UNIT, TYPE_SHORT, 1, 2),
    ];
    // 601/2 truncates to 300.
    let mut tail = rational(601, 2);
    tail.extend_from_slice(&rational(601, 2));
    tail.push(0);
    let data = build_tiff(&entries, 0, &tail);
    let insp = ImageDescriptor::inspect(&mut Cursor::new(&data)).unwrap();
    assert_eq!(insp.x_dpi, 300);
}

#[test]
fn missing_required_tag_fails() {
    // No ImageWidth entry.
    let entries = [
        (TAG_HEIGHT, TYPE_SHORT, 1, 100u32),
        (TAG_PHOTOMETRIC, TYPE_SHORT, 1, 0),
        (TAG_STRIP_OFFSETS, TYPE_LONG, 1, 200),
        (TAG_STRIP_BYTE_COUNTS, TYPE_LONG, 1, 1),
    ];
    let data = build_tiff(&entries, 0, &[0u8; 64]);
    assert!(matches!(
        ImageDescriptor::inspect(&mut Cursor::new(&data)),
        Err(QuireError::MalformedTiff(_))
    ));
}

#[test]
fn indexed_tiff_palette_is_scaled_to_bytes() {
    let base = tail_base(7);
    let strip_off = base + 12;
    let entries = [
        (TAG_WIDTH, TYPE_SHORT, 1, 10u32),
        (TAG_HEIGHT, TYPE_SHORT, 1, 10),
        (TAG_BITS_PER_SAMPLE, TYPE_SHORT, 1, 1),
        (TAG_PHOTOMETRIC, TYPE_SHORT, 1, 3),
        (TAG_STRIP_OFFSETS, TYPE_LONG, 1, strip_off),
        (TAG_STRIP_BYTE_COUNTS, TYPE_LONG, 1, 1),
        (TAG_COLOR_MAP, TYPE_SHORT, 6, base),
    ];
    // Two entries: black and white, 16 bits per component, stored as
    // all reds, then all greens, then all blues.
    let mut tail = Vec::new();
    for comp in [0u16, 65535, 0, 65535, 0, 65535] {
        tail.extend_from_slice(&comp.to_le_bytes());
    }
    tail.push(0);
    let data = build_tiff(&entries, 0, &tail);
    let insp = ImageDescriptor::inspect(&mut Cursor::new(&data)).unwrap();
    assert_eq!(insp.cspace, Some(ColorSpace::Indexed));
    assert_eq!(
        insp.palette,
        Some(vec![[0, 0, 0], [255, 255, 255]])
    );
}

#[test]
fn next_image_steps_to_second_directory() {
    // First IFD at 8, second appended after the first fixture's tail.
    let first_len;
    let mut data = {
        let d = bilevel_tiff(4, 2, 300, b"\xAA");
        first_len = d.len() as u32;
        d
    };
    // Patch the next-IFD word of the first directory.
    let next_pos = (8 + 2 + 11 * 12) as usize;
    data[next_pos..next_pos + 4].copy_from_slice(&first_len.to_le_bytes());

    // Second directory, minimal, strip data right behind it.
    let entries: [(u16, u16, u32, u32); 5] = [
        (TAG_WIDTH, TYPE_SHORT, 1, 99),
        (TAG_HEIGHT, TYPE_SHORT, 1, 88),
        (TAG_PHOTOMETRIC, TYPE_SHORT, 1, 0),
        (TAG_STRIP_OFFSETS, TYPE_LONG, 1, first_len + tail_base(5) - 8),
        (TAG_STRIP_BYTE_COUNTS, TYPE_LONG, 1, 2),
    ];
    let mut second = (entries.len() as u16).to_le_bytes().to_vec();
    for (tag, ftype, cnt, val) in entries {
        second.extend_from_slice(&tag.to_le_bytes());
        second.extend_from_slice(&ftype.to_le_bytes());
        second.extend_from_slice(&cnt.to_le_bytes());
        second.extend_from_slice(&val.to_le_bytes());
    }
    second.extend_from_slice(&0u32.to_le_bytes());
    second.extend_from_slice(b"\xBB\xCC");
    data.extend_from_slice(&second);

    let mut io = Cursor::new(&data);
    let mut insp = ImageDescriptor::inspect(&mut io).unwrap();
    assert_eq!(insp.width, 2480);

    assert!(insp.next_image(&mut io).unwrap());
    assert_eq!((insp.width, insp.height), (99, 88));
    assert_eq!(insp.raw_data(&mut io).unwrap(), b"\xBB\xCC");

    // The second directory is the last one.
    assert!(!insp.next_image(&mut io).unwrap());
}

#[test]
fn multi_strip_raw_data_concatenates() {
    let base = tail_base(7);
    let strips: [&[u8]; 2] = [b"abc", b"defg"];
    let entries: [(u16, u16, u32, u32); 7] = [
        (TAG_WIDTH, TYPE_SHORT, 1, 8),
        (TAG_HEIGHT, TYPE_SHORT, 1, 8),
        (TAG_PHOTOMETRIC, TYPE_SHORT, 1, 1),
        (TAG_COMPRESSION, TYPE_SHORT, 1, 1),
        (TAG_ROWS_PER_STRIP, TYPE_SHORT, 1, 4),
        (TAG_STRIP_OFFSETS, TYPE_LONG, 2, base),
        (TAG_STRIP_BYTE_COUNTS, TYPE_LONG, 2, base + 8),
    ];
    // Both value arrays exceed 4 bytes, so they live in the tail,
    // followed by the two strips themselves.
    let mut tail = Vec::new();
    tail.extend_from_slice(&(base + 16).to_le_bytes());
    tail.extend_from_slice(&(base + 16 + strips[0].len() as u32).to_le_bytes());
    tail.extend_from_slice(&(strips[0].len() as u32).to_le_bytes());
    tail.extend_from_slice(&(strips[1].len() as u32).to_le_bytes());
    tail.extend_from_slice(strips[0]);
    tail.extend_from_slice(strips[1]);
    let data = build_tiff(&entries, 0, &tail);

    let mut io = Cursor::new(&data);
    let insp = ImageDescriptor::inspect(&mut io).unwrap();
    assert_eq!(insp.data_blocks.len(), 2);
    assert_eq!(insp.raw_data(&mut io).unwrap(), b"abcdefg");
}

fn push_segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    out.push(0xFF);
    out.push(marker);
    out.extend_from_slice(&(payload.len() as u16 + 2).to_be_bytes());
    out.extend_from_slice(payload);
}

/// JFIF JPEG with an SOF0 frame, optionally carrying an APP1 segment.
fn build_jpeg(unit: u8, xres: u16, yres: u16, app1: Option<&[u8]>) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];

    let mut jfif = b"JFIF\0".to_vec();
    jfif.extend_from_slice(&[1, 2, unit]);
    jfif.extend_from_slice(&xres.to_be_bytes());
    jfif.extend_from_slice(&yres.to_be_bytes());
    jfif.extend_from_slice(&[0, 0]);
    push_segment(&mut out, 0xE0, &jfif);

    if let Some(body) = app1 {
        push_segment(&mut out, 0xE1, body);
    }

    // Baseline frame: 8 bits, 1200x1600, three components.
    let mut sof = vec![8];
    sof.extend_from_slice(&1200u16.to_be_bytes());
    sof.extend_from_slice(&1600u16.to_be_bytes());
    sof.push(3);
    for id in 1..=3u8 {
        sof.extend_from_slice(&[id, 0x11, 0]);
    }
    push_segment(&mut out, 0xC0, &sof);

    out.extend_from_slice(&[0xFF, 0xDA]);
    out
}

#[test]
fn jfif_jpeg_geometry_and_resolution() {
    let data = build_jpeg(1, 300, 300, None);
    let mut io = Cursor::new(&data);
    let insp = ImageDescriptor::inspect(&mut io).unwrap();

    assert_eq!(insp.format, ImageFormat::Jpeg);
    assert_eq!((insp.width, insp.height), (1600, 1200));
    assert_eq!(insp.depth, 8);
    assert_eq!(insp.cspace, Some(ColorSpace::DeviceRgb));
    assert_eq!(insp.compression, Some(Compression::Dct));
    assert_eq!((insp.x_dpi, insp.y_dpi), (300, 300));
    // The whole file embeds verbatim.
    assert_eq!(insp.raw_data(&mut io).unwrap(), data);
}

#[test]
fn jfif_centimeter_unit_converts_to_dpi() {
    // Unit 2 is dots per centimeter; 118 rounds to 300 dpi.
    let data = build_jpeg(2, 118, 118, None);
    let insp = ImageDescriptor::inspect(&mut Cursor::new(&data)).unwrap();
    assert_eq!((insp.x_dpi, insp.y_dpi), (300, 300));
}

#[test]
fn exif_app1_merges_into_tags() {
    // Embedded little-endian TIFF: resolution rationals out of line,
    // unit 2 (inches). Offsets are relative to the TIFF header.
    let base: u32 = 8 + 2 + 3 * 12 + 4;
    let entries: [(u16, u16, u32, u32); 3] = [
        (TAG_X_RESOLUTION, TYPE_RATIONAL, 1, base),
        (TAG_Y_RESOLUTION, TYPE_RATIONAL, 1, base + 8),
        (TAG_RESOLUTION_UNIT, TYPE_SHORT, 1, 2),
    ];
    let mut tail = rational(240, 1);
    tail.extend_from_slice(&rational(240, 1));
    let mut body = b"Exif\0\0".to_vec();
    body.extend_from_slice(&build_tiff(&entries, 0, &tail));

    let data = build_jpeg(1, 300, 300, Some(&body));
    let insp = ImageDescriptor::inspect(&mut Cursor::new(&data)).unwrap();

    assert_eq!(insp.tag_int(TAG_X_RESOLUTION), Some(240));
    // EXIF resolution overrides the JFIF value.
    assert_eq!((insp.x_dpi, insp.y_dpi), (240, 240));
    // Geometry still comes from the frame header, not the EXIF block.
    assert_eq!((insp.width, insp.height), (1600, 1200));
}

fn jp2_box(name: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = (payload.len() as u32 + 8).to_be_bytes().to_vec();
    out.extend_from_slice(name);
    out.extend_from_slice(payload);
    out
}

/// JP2 file: signature, ftyp, then a jp2h super-box with ihdr and colr.
fn build_jp2(enumcs: u32, extended_ftyp: bool) -> Vec<u8> {
    let mut out = b"\x00\x00\x00\x0CjP  \x0D\x0A\x87\x0A".to_vec();

    let brand = b"jp2 \x00\x00\x00\x00";
    if extended_ftyp {
        // Length 0 escapes to a 64-bit word covering header, escape
        // word and payload.
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(b"ftyp");
        out.extend_from_slice(&(16 + brand.len() as u64).to_be_bytes());
        out.extend_from_slice(brand);
    } else {
        out.extend_from_slice(&jp2_box(b"ftyp", brand));
    }

    let mut ihdr = 3508u32.to_be_bytes().to_vec();
    ihdr.extend_from_slice(&2480u32.to_be_bytes());
    ihdr.extend_from_slice(&3u16.to_be_bytes());
    // Depth minus one, unsigned; then compression type, UnkC, IPR.
    ihdr.extend_from_slice(&[7, 7, 0, 0]);
    let mut colr = vec![1, 0, 0];
    colr.extend_from_slice(&enumcs.to_be_bytes());

    let mut jp2h = jp2_box(b"ihdr", &ihdr);
    jp2h.extend_from_slice(&jp2_box(b"colr", &colr));
    out.extend_from_slice(&jp2_box(b"jp2h", &jp2h));
    out
}

#[test]
fn jp2_header_boxes_yield_geometry_and_colorspace() {
    let data = build_jp2(16, false);
    let mut io = Cursor::new(&data);
    let insp = ImageDescriptor::inspect(&mut io).unwrap();

    assert_eq!(insp.format, ImageFormat::Jpeg2000);
    assert_eq!((insp.width, insp.height), (2480, 3508));
    assert_eq!(insp.depth, 8);
    assert_eq!(insp.cspace, Some(ColorSpace::DeviceRgb));
    assert_eq!(insp.compression, Some(Compression::Jpx));
    // No resolution box: the default applies.
    assert_eq!((insp.x_dpi, insp.y_dpi), (72, 72));
    assert_eq!(insp.raw_data(&mut io).unwrap(), data);
}

#[test]
fn jp2_extended_length_box_is_skipped() {
    let data = build_jp2(17, true);
    let insp = ImageDescriptor::inspect(&mut Cursor::new(&data)).unwrap();
    assert_eq!((insp.width, insp.height), (2480, 3508));
    assert_eq!(insp.cspace, Some(ColorSpace::DeviceGray));
}

#[test]
fn jp2_unknown_enumerated_colorspace_fails() {
    let data = build_jp2(18, false);
    assert!(matches!(
        ImageDescriptor::inspect(&mut Cursor::new(&data)),
        Err(QuireError::UnknownColorSpace(18))
    ));
}

fn push_chunk(out: &mut Vec<u8>, name: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(data);
    // CRC is never checked.
    out.extend_from_slice(&[0u8; 4]);
}

/// Assemble a PNG from an IHDR tuple and a chunk list.
fn build_png(
    (width, height, depth, color): (u32, u32, u8, u8),
    chunks: &[(&[u8; 4], Vec<u8>)],
) -> Vec<u8> {
    let mut out = b"\x89PNG\x0D\x0A\x1A\x0A".to_vec();
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[depth, color, 0, 0, 0]);
    push_chunk(&mut out, b"IHDR", &ihdr);
    for (name, data) in chunks {
        push_chunk(&mut out, name, data);
    }
    push_chunk(&mut out, b"IEND", &[]);
    out
}

fn phys(dpm: u32) -> Vec<u8> {
    let mut data = dpm.to_be_bytes().to_vec();
    data.extend_from_slice(&dpm.to_be_bytes());
    data.push(1);
    data
}

#[test]
fn indexed_png_with_transparency() {
    let data = build_png(
        (100, 200, 1, 3),
        &[
            (b"PLTE", vec![0, 0, 0, 255, 255, 255]),
            (b"tRNS", vec![0x7F]),
            (b"pHYs", phys(11811)),
            (b"IDAT", b"payload".to_vec()),
        ],
    );
    let mut io = Cursor::new(&data);
    let insp = ImageDescriptor::inspect(&mut io).unwrap();

    assert_eq!((insp.width, insp.height), (100, 200));
    assert_eq!(insp.depth, 1);
    assert_eq!(insp.cspace, Some(ColorSpace::Indexed));
    assert_eq!(insp.compression, Some(Compression::Flate));
    assert_eq!(insp.palette, Some(vec![[0, 0, 0], [255, 255, 255]]));
    assert_eq!(insp.trans, Some(Transparency::IndexAlpha(vec![0x7F])));
    // 11811 dots per meter is 118 px/cm after truncation, 300 dpi.
    assert_eq!((insp.x_dpi, insp.y_dpi), (300, 300));
    assert_eq!(insp.raw_data(&mut io).unwrap(), b"payload");
}

#[test]
fn png_idat_chunks_concatenate() {
    let data = build_png(
        (8, 8, 8, 0),
        &[
            (b"IDAT", b"first".to_vec()),
            (b"IDAT", b"second".to_vec()),
        ],
    );
    let mut io = Cursor::new(&data);
    let insp = ImageDescriptor::inspect(&mut io).unwrap();
    assert_eq!(insp.cspace, Some(ColorSpace::DeviceGray));
    assert_eq!(insp.raw_data(&mut io).unwrap(), b"firstsecond");
}

#[test]
fn gray_png_transparency_key() {
    let data = build_png(
        (8, 8, 16, 0),
        &[
            (b"tRNS", vec![0x01, 0x02]),
            (b"IDAT", b"x".to_vec()),
        ],
    );
    let insp = ImageDescriptor::inspect(&mut Cursor::new(&data)).unwrap();
    assert_eq!(insp.trans, Some(Transparency::GrayKey(0x0102)));
}

#[test]
fn png_without_idat_fails() {
    let data = build_png((8, 8, 8, 0), &[]);
    assert!(matches!(
        ImageDescriptor::inspect(&mut Cursor::new(&data)),
        Err(QuireError::MalformedPng(_))
    ));
}

#[test]
fn unknown_signature_is_rejected() {
    let data = b"GIF89a\x00\x00\x00\x00\x00\x00";
    assert!(matches!(
        ImageDescriptor::inspect(&mut Cursor::new(&data[..])),
        Err(QuireError::UnrecognizedFormat)
    ));
}
