// Photo Gallery Error Types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("EXIF error: {0}")]
    Exif(String),

    #[error("FFprobe error: {0}")]
    FFprobe(String),

    #[error("Media not found: {0}")]
    MediaNotFound(i64),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for GalleryError {
    fn from(err: anyhow::Error) -> Self {
        GalleryError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GalleryError>;
