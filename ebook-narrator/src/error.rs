//! Error taxonomy for document extraction and the chapter cache.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NarratorError {
    #[error("Unsupported format: {0}. Use .epub or .pdf")]
    UnsupportedFormat(String),

    #[error("Failed to read {format}: {message}")]
    Container { format: &'static str, message: String },

    #[error("No chapters found in document")]
    NoChapters,

    #[error("Cache metadata not found in {}", .0.display())]
    CacheNotFound(PathBuf),

    #[error("Source document changed since {} was cached", .0.display())]
    SourceChanged(PathBuf),

    #[error("Cache age out of range: {0} days")]
    InvalidAge(i64),

    #[error("Missing cache files: {}", .missing.join(", "))]
    MissingBlobs { missing: Vec<String> },

    #[error("Invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NarratorError>;
