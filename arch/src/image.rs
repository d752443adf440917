//! Layout of a bytecode image.
//!
//! ```text
//! 0      4      magic "TVM\0"
//! 4      8      reserved
//! 12     4      export count
//! 16     20*n   export entries: 16-byte zero padded name + 4-byte address
//! ...           code and data
//! ```
//!
//! All integers are little-endian and all addresses are offsets from the
//! start of the image.

use thiserror::Error;

pub const MAGIC: [u8; 4] = *b"TVM\0";
pub const HEADER_SIZE: usize = 12;
pub const EXPORT_COUNT_OFFSET: usize = HEADER_SIZE;
pub const EXPORT_TABLE_OFFSET: usize = HEADER_SIZE + 4;
pub const EXPORT_NAME_LEN: usize = 16;
pub const EXPORT_ENTRY_SIZE: usize = EXPORT_NAME_LEN + 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("Image is too small: {0} bytes")]
    TooSmall(usize),

    #[error("Bad magic marker: {0:02X?}")]
    BadMagic([u8; 4]),

    #[error("Export table with {count} entries runs past the end of the image ({len} bytes)")]
    ExportOverrun { count: u32, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub addr: u32,
}

/// Zero padded name field. The flag is set when the name had to be truncated.
pub fn encode_name(name: &str) -> ([u8; EXPORT_NAME_LEN], bool) {
    let mut field = [0u8; EXPORT_NAME_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(EXPORT_NAME_LEN);
    field[..len].copy_from_slice(&bytes[..len]);
    (field, bytes.len() > EXPORT_NAME_LEN)
}

fn decode_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn read_u32(image: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&image[at..at + 4]);
    u32::from_le_bytes(buf)
}

/// Validate the header and the export table bounds.
pub fn check(image: &[u8]) -> Result<(), ImageError> {
    if image.len() < EXPORT_TABLE_OFFSET {
        return Err(ImageError::TooSmall(image.len()));
    }
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&image[..4]);
    if magic != MAGIC {
        return Err(ImageError::BadMagic(magic));
    }
    let count = read_u32(image, EXPORT_COUNT_OFFSET);
    let end = (count as usize)
        .checked_mul(EXPORT_ENTRY_SIZE)
        .and_then(|size| size.checked_add(EXPORT_TABLE_OFFSET));
    match end {
        Some(end) if end <= image.len() => Ok(()),
        _ => Err(ImageError::ExportOverrun {
            count,
            len: image.len(),
        }),
    }
}

pub fn exports(image: &[u8]) -> Result<Vec<Export>, ImageError> {
    check(image)?;
    let count = read_u32(image, EXPORT_COUNT_OFFSET) as usize;
    Ok((0..count)
        .map(|idx| {
            let at = EXPORT_TABLE_OFFSET + idx * EXPORT_ENTRY_SIZE;
            Export {
                name: decode_name(&image[at..at + EXPORT_NAME_LEN]),
                addr: read_u32(image, at + EXPORT_NAME_LEN),
            }
        })
        .collect())
}

pub fn find_export(image: &[u8], name: &str) -> Result<Option<u32>, ImageError> {
    Ok(exports(image)?
        .into_iter()
        .find(|export| export.name == name)
        .map(|export| export.addr))
}

/// Offset of the first byte after an export table with `count` entries.
pub fn code_start(count: usize) -> usize {
    EXPORT_TABLE_OFFSET + count * EXPORT_ENTRY_SIZE
}
