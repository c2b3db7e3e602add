//! Per-stage failure types.
//!
//! Each stage of the per-image pipeline reports its own error enum; the
//! orchestrator folds them into a [`Failure`] and routes the image to the
//! failed folder.

use thiserror::Error;

/// Why a call to the tagging service produced no usable result.
#[derive(Debug, Error)]
pub enum TagError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Service rejected the API token (status {status}). Check your API token.")]
    Unauthorized { status: u16 },

    #[error("Service error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Malformed service response: {0}")]
    Payload(String),
}

impl From<reqwest::Error> for TagError {
    fn from(err: reqwest::Error) -> Self {
        TagError::Network(err.to_string())
    }
}

/// Why embedding metadata into an image failed.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a valid JPEG: {0}")]
    Jpeg(String),

    #[error("Existing EXIF could not be parsed: {0}")]
    Load(String),

    #[error("Failed to encode tag {tag:#06x}")]
    Encode { tag: u16 },

    #[error("Encoded EXIF segment is empty")]
    EmptySegment,
}

/// Terminal reason for an image ending up in the failed folder.
#[derive(Debug, Error)]
pub enum Failure {
    #[error("Failed to read image: {0}")]
    Read(#[source] std::io::Error),

    #[error("Tagging failed: {0}")]
    Tagging(#[from] TagError),

    #[error("Service returned no title or no keywords")]
    Incomplete,

    #[error("Failed to write metadata: {0}")]
    Write(#[from] WriteError),
}
