// Metadata extraction module
//
// Each reader is a capability the timestamp resolver consumes. The default
// implementations wrap kamadak-exif, ffprobe and the filesystem; tests swap in stubs.

pub mod exif_reader;
pub mod ffprobe;
pub mod filesystem;

use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::MediaExtensions;
use crate::error::Result;

pub use self::exif_reader::ExifTagReader;
pub use self::ffprobe::FFprobeReader;
pub use self::filesystem::SystemFileAttributes;

/// Capture dates found in an image, per EXIF tag family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageDates {
    pub sub_ifd_original: Option<NaiveDateTime>,
    pub sub_ifd_generic: Option<NaiveDateTime>,
    pub ifd0_original: Option<NaiveDateTime>,
    pub ifd0_generic: Option<NaiveDateTime>,
}

impl ImageDates {
    /// All present values, read as UTC epoch millis.
    pub fn candidates(&self) -> Vec<i64> {
        [
            self.sub_ifd_original,
            self.sub_ifd_generic,
            self.ifd0_original,
            self.ifd0_generic,
        ]
        .into_iter()
        .flatten()
        .map(|dt| dt.and_utc().timestamp_millis())
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates().is_empty()
    }
}

/// Filesystem times in epoch millis; `None` where the platform does not report one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTimes {
    pub created: Option<i64>,
    pub accessed: Option<i64>,
    pub modified: Option<i64>,
}

/// Reads embedded capture-time tags from image files.
pub trait ImageTagReader: Send + Sync {
    /// An image without EXIF yields empty dates; an unreadable one is an error.
    fn read_dates(&self, path: &Path) -> Result<ImageDates>;
}

/// Reads the movie-header creation time from video containers.
pub trait VideoContainerReader: Send + Sync {
    fn creation_time(&self, path: &Path) -> Result<Option<i64>>;
}

/// Reads creation/access/modification times from the filesystem.
pub trait FileAttributesReader: Send + Sync {
    fn file_times(&self, path: &Path) -> Result<FileTimes>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

/// Determine media kind from file extension
pub fn detect_media_kind(path: &Path, extensions: &MediaExtensions) -> Option<MediaKind> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())?;

    if extensions.photo.iter().any(|p| *p == ext) {
        Some(MediaKind::Photo)
    } else if extensions.video.iter().any(|v| *v == ext) {
        Some(MediaKind::Video)
    } else {
        None
    }
}
