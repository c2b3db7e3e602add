use img_parts::Bytes;
use img_parts::ImageEXIF;
use img_parts::jpeg::Jpeg;
use little_exif::endian::Endian;
use little_exif::exif_tag::{ExifTag, ExifTagGroup};
use little_exif::exif_tag_format::ExifTagFormat;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use std::path::Path;
use std::sync::Mutex;

use super::{TAG_XP_KEYWORDS, TAG_XP_TITLE, encode_utf16le};
use crate::error::WriteError;
use crate::tagging::TagResult;

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data (after Exif\0\0)
const JPEG_EXIF_OVERHEAD: usize = 10; // 2 + 2 + 6

/// Separator between keywords inside XPKeywords.
const KEYWORD_SEPARATOR: &str = ", ";

/// Join keywords in relevance order into the single XPKeywords string.
pub fn join_keywords(keywords: &[String]) -> String {
    keywords.join(KEYWORD_SEPARATOR)
}

/// Create an XP* tag (UTF-16LE encoded, IFD0 group).
fn make_xp_tag(tag_id: u16, value: &str) -> Result<ExifTag, WriteError> {
    let raw_data = encode_utf16le(value);
    ExifTag::from_u16_with_data(
        tag_id,
        &ExifTagFormat::INT8U,
        &raw_data,
        &Endian::Little,
        &ExifTagGroup::IFD0,
    )
    .map_err(|_| WriteError::Encode { tag: tag_id })
}

/// Build the three tags written for every image: description, title, keywords.
fn build_tags(tags: &TagResult) -> Result<Vec<ExifTag>, WriteError> {
    Ok(vec![
        ExifTag::ImageDescription(tags.description.clone()),
        make_xp_tag(TAG_XP_TITLE, &tags.title)?,
        make_xp_tag(TAG_XP_KEYWORDS, &join_keywords(&tags.keywords))?,
    ])
}

/// Serialises the panic hook swap in [`load_existing_metadata`]; the hook is process-global.
static PANIC_HOOK_LOCK: Mutex<()> = Mutex::new(());

/// Load the existing EXIF container of a file with little_exif.
fn load_existing_metadata(path: &Path) -> Result<Metadata, WriteError> {
    let path_owned = path.to_path_buf();
    // Suppress panics from little_exif. Panics raised by other threads while
    // the silent hook is installed are not printed either.
    let result = {
        let _guard = PANIC_HOOK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let prev_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));
        let result = std::panic::catch_unwind(move || Metadata::new_from_path(&path_owned));
        std::panic::set_hook(prev_hook);
        result
    };

    match result {
        Ok(Ok(m)) => {
            log::debug!("little_exif loaded {} existing EXIF tags", m.data().len());
            Ok(m)
        }
        Ok(Err(e)) => Err(WriteError::Load(e.to_string())),
        Err(_) => Err(WriteError::Load("parser panicked".to_string())),
    }
}

/// Write a tagging result into the EXIF container of a JPEG, in place.
///
/// Sets `ImageDescription`, `XPTitle` and `XPKeywords` and keeps every other
/// tag and segment. All tags are encoded before the file is touched, so a
/// failure leaves the image unmodified.
///
/// Strategy:
/// 1. Read the entire JPEG with img-parts (preserves all segments)
/// 2. Load the existing EXIF with little_exif, or start empty when there is none
/// 3. Merge the new tags and re-encode the APP1 segment
/// 4. Put the segment back where it was and write the file
pub fn write_tags(path: &Path, tags: &TagResult) -> Result<(), WriteError> {
    let new_tags = build_tags(tags)?;

    let file_bytes = std::fs::read(path)?;

    // Parse JPEG structure with img-parts (preserves all segments)
    let mut jpeg =
        Jpeg::from_bytes(Bytes::from(file_bytes)).map_err(|e| WriteError::Jpeg(e.to_string()))?;

    // Remember where the EXIF segment was originally positioned
    let orig_exif_pos = find_exif_segment_pos(&jpeg);

    let mut metadata = if jpeg.exif().is_some() {
        load_existing_metadata(path)?
    } else {
        log::debug!("No EXIF segment in {}, starting fresh", path.display());
        Metadata::new()
    };

    for tag in new_tags {
        metadata.set_tag(tag);
    }

    let exif_bytes = metadata.as_u8_vec(FileExtension::JPEG);
    if exif_bytes.len() <= JPEG_EXIF_OVERHEAD {
        return Err(WriteError::EmptySegment);
    }

    // set_exif() removes the old segment and inserts the new one at position 3
    jpeg.set_exif(Some(Bytes::from(exif_bytes[JPEG_EXIF_OVERHEAD..].to_vec())));

    // Move the EXIF segment back to its original position so EXIF comes
    // before XMP (required for many EXIF parsers).
    if let Some(new_pos) = find_exif_segment_pos(&jpeg) {
        let target_pos = orig_exif_pos.unwrap_or(1); // default: right after APP0
        if target_pos < new_pos {
            let segments = jpeg.segments_mut();
            let seg = segments.remove(new_pos);
            segments.insert(target_pos, seg);
        }
    }

    let output = jpeg.encoder().bytes();
    std::fs::write(path, &output)?;

    log::info!("Metadata written to {}", path.display());
    Ok(())
}

/// Find the position of the EXIF APP1 segment in a JPEG.
/// EXIF segments have marker 0xE1 (APP1) and contents starting with "Exif\0\0".
fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    const EXIF_PREFIX: &[u8] = b"Exif\0\0";
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == 0xE1 && s.contents().starts_with(EXIF_PREFIX))
}
