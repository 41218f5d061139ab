//! Fixture builders shared by unit tests.

/// `DateTime` tag id, stored in IFD0
pub const DATE_TIME: u16 = 0x0132;
/// `DateTimeOriginal` tag id, stored in the Exif IFD
pub const DATE_TIME_ORIGINAL: u16 = 0x9003;
/// `DateTimeDigitized` tag id, stored in the Exif IFD
pub const DATE_TIME_DIGITIZED: u16 = 0x9004;

const EXIF_IFD_POINTER: u16 = 0x8769;
const ASCII: u16 = 2;
const LONG: u16 = 4;

/// Build a minimal JPEG (SOI + APP1 Exif + EOI) carrying ASCII tags.
///
/// `ifd0` entries go in the primary image directory, `exif_ifd` entries in
/// the Exif sub-directory. Tags must be given in ascending order.
pub fn jpeg_with_exif(ifd0: &[(u16, &str)], exif_ifd: &[(u16, &str)]) -> Vec<u8> {
    let ifd0_len = 2 + 12 * (ifd0.len() + 1) + 4;
    let exif_offset = 8 + ifd0_len;
    let exif_len = 2 + 12 * exif_ifd.len() + 4;
    let data_base = exif_offset + exif_len;

    let mut tiff = Vec::new();
    let mut data = Vec::new();
    tiff.extend_from_slice(b"II*\0");
    tiff.extend_from_slice(&8u32.to_le_bytes());
    write_ifd(&mut tiff, &mut data, data_base, ifd0, Some(exif_offset as u32));
    write_ifd(&mut tiff, &mut data, data_base, exif_ifd, None);
    tiff.extend_from_slice(&data);

    let segment_len = (2 + 6 + tiff.len()) as u16;
    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&segment_len.to_be_bytes());
    jpeg.extend_from_slice(b"Exif\0\0");
    jpeg.extend_from_slice(&tiff);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

/// JPEG whose only tag is `DateTimeOriginal`
pub fn jpeg_taken_at(datetime: &str) -> Vec<u8> {
    jpeg_with_exif(&[], &[(DATE_TIME_ORIGINAL, datetime)])
}

fn write_ifd(
    tiff: &mut Vec<u8>,
    data: &mut Vec<u8>,
    data_base: usize,
    entries: &[(u16, &str)],
    exif_pointer: Option<u32>,
) {
    let count = entries.len() + usize::from(exif_pointer.is_some());
    tiff.extend_from_slice(&(count as u16).to_le_bytes());

    for (tag, value) in entries {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        tiff.extend_from_slice(&tag.to_le_bytes());
        tiff.extend_from_slice(&ASCII.to_le_bytes());
        tiff.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        if bytes.len() <= 4 {
            bytes.resize(4, 0);
            tiff.extend_from_slice(&bytes);
        } else {
            tiff.extend_from_slice(&((data_base + data.len()) as u32).to_le_bytes());
            data.extend_from_slice(&bytes);
            if data.len() % 2 == 1 {
                data.push(0);
            }
        }
    }

    if let Some(offset) = exif_pointer {
        tiff.extend_from_slice(&EXIF_IFD_POINTER.to_le_bytes());
        tiff.extend_from_slice(&LONG.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&offset.to_le_bytes());
    }

    tiff.extend_from_slice(&0u32.to_le_bytes());
}
