//! EXIF metadata reading and writing for JPEG files.
//!
//! This module provides two main functions:
//!
//! - [`read_existing`]: Read the title and description already embedded in an image
//! - [`write_tags`]: Embed a [`TagResult`](crate::tagging::TagResult) into the image in place
//!
//! Text lives in IFD0: `ImageDescription` holds 8-bit text, while the Windows
//! `XPTitle` and `XPKeywords` tags hold NUL-terminated UTF-16LE.

mod reader;
mod writer;

pub use reader::{ExistingMetadata, read_existing};
pub use writer::{join_keywords, write_tags};

// XP* tag IDs (IFD0)
pub(crate) const TAG_XP_TITLE: u16 = 0x9C9B;
pub(crate) const TAG_XP_KEYWORDS: u16 = 0x9C9E;

/// Encode a string as NUL-terminated UTF-16LE bytes (used for XP* tags).
pub fn encode_utf16le(s: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = s
        .encode_utf16()
        .flat_map(|c| c.to_le_bytes())
        .collect();
    // Null terminator
    bytes.push(0);
    bytes.push(0);
    bytes
}

/// Decode UTF-16LE bytes, dropping trailing NULs and invalid code units.
pub fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    char::decode_utf16(units)
        .filter_map(|c| c.ok())
        .collect::<String>()
        .trim_end_matches('\0')
        .to_string()
}
