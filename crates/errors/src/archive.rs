//! Archive extraction error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArchiveError {
    #[error("unreadable archive: {path}")]
    UnreadableArchive { path: String },

    #[error("invalid checksum in {path}")]
    InvalidChecksum { path: String },

    #[error("invalid entry path: {entry}")]
    InvalidEntryPath { entry: String },

    #[error("unsupported archive format: {path}")]
    UnsupportedFormat { path: String },

    #[error("extraction failed: {message}")]
    ExtractionFailed { message: String },
}

impl UserFacingError for ArchiveError {
    fn user_message(&self) -> Cow<'_, str> {
        let msg = match self {
            Self::UnreadableArchive { .. } => "Unreadable archive.",
            Self::InvalidChecksum { .. } => "Invalid checksum.",
            Self::InvalidEntryPath { .. } => "Invalid entry path.",
            Self::UnsupportedFormat { .. } => "Unsupported archive format.",
            Self::ExtractionFailed { .. } => "Archive extraction failed.",
        };
        Cow::Borrowed(msg)
    }

    fn failure_reason(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::ExtractionFailed { message } => Some(Cow::Borrowed(message.as_str())),
            Self::InvalidEntryPath { entry } => {
                Some(Cow::Owned(format!("entry `{entry}` escapes the destination")))
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::UnreadableArchive { .. } => "archive.unreadable",
            Self::InvalidChecksum { .. } => "archive.invalid_checksum",
            Self::InvalidEntryPath { .. } => "archive.invalid_entry_path",
            Self::UnsupportedFormat { .. } => "archive.unsupported_format",
            Self::ExtractionFailed { .. } => "archive.extraction_failed",
        };
        Some(code)
    }
}
