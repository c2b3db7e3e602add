use anyhow::{Context, Result};
use nom_exif::*;
use serde::Serialize;
use std::path::Path;

use super::{TAG_XP_TITLE, decode_utf16le};

/// Title and description already embedded in an image.
///
/// Both fields are empty when the image carries no metadata or it could not
/// be decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExistingMetadata {
    pub title: String,
    pub description: String,
}

impl ExistingMetadata {
    /// The context hint sent to the tagging service: `"{title} {description}"`, trimmed.
    pub fn context(&self) -> String {
        format!("{} {}", self.title, self.description)
            .trim()
            .to_string()
    }

    /// Whether neither a title nor a description was found.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.description.is_empty()
    }
}

/// Read the existing title (XPTitle) and description (ImageDescription) of an image.
///
/// Best effort: a missing or malformed EXIF container yields empty strings,
/// never an error.
pub fn read_existing(path: &Path) -> ExistingMetadata {
    match try_read(path) {
        Ok(data) if data.is_empty() => {
            log::debug!("No existing title or description in {}", path.display());
            data
        }
        Ok(data) => {
            log::debug!(
                "Existing metadata for {}: title={:?} description={:?}",
                path.display(),
                data.title,
                data.description
            );
            data
        }
        Err(e) => {
            log::debug!("No readable metadata in {}: {e:#}", path.display());
            ExistingMetadata::default()
        }
    }
}

fn try_read(path: &Path) -> Result<ExistingMetadata> {
    let mut parser = MediaParser::new();
    let ms = MediaSource::file_path(path).context("Failed to open image file")?;

    let iter: ExifIter = parser
        .parse(ms)
        .map_err(|e| anyhow::anyhow!("No EXIF data found: {e}"))?;
    let exif: Exif = iter.into();

    let mut data = ExistingMetadata::default();

    if let Some(val) = exif.get_by_ifd_tag_code(0, TAG_XP_TITLE) {
        data.title = utf16_entry_to_string(val);
    }

    if let Some(val) = exif.get(ExifTag::ImageDescription) {
        data.description = text_entry_to_string(val);
    }

    Ok(data)
}

/// XP* tags are stored as BYTE arrays holding UTF-16LE text.
fn utf16_entry_to_string(val: &EntryValue) -> String {
    match val {
        EntryValue::U8Array(bytes) | EntryValue::Undefined(bytes) => decode_utf16le(bytes),
        EntryValue::Text(s) => s.trim_end_matches('\0').to_string(),
        _ => String::new(),
    }
}

fn text_entry_to_string(val: &EntryValue) -> String {
    match val {
        EntryValue::Text(s) => s.trim_end_matches('\0').trim().to_string(),
        EntryValue::U8Array(bytes) | EntryValue::Undefined(bytes) => {
            String::from_utf8_lossy(bytes)
                .trim_end_matches('\0')
                .trim()
                .to_string()
        }
        _ => String::new(),
    }
}
