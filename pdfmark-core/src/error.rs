use thiserror::Error;

use crate::bookmark::BookmarkId;

/// Errors raised by editor operations. Every variant leaves the forest as it
/// was before the failing command.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EditorError {
    #[error("bookmark title must not be empty")]
    EmptyTitle,

    #[error("page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("no bookmark with id {0}")]
    UnknownBookmark(BookmarkId),

    #[error("cannot move bookmark {id}: {reason}")]
    InvalidMove { id: BookmarkId, reason: &'static str },

    #[error("destination picking is not active")]
    NotPicking,
}

/// Errors raised while importing CSV or JSON bookmark files.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid JSON format: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no bookmarks could be read ({skipped} malformed entries skipped)")]
    NoBookmarks { skipped: usize },
}

/// Errors raised while loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
