// Filesystem timestamps via filetime

use std::fs;
use std::path::Path;

use filetime::FileTime;

use super::{FileAttributesReader, FileTimes};
use crate::constants::MS_PER_SECOND;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFileAttributes;

impl FileAttributesReader for SystemFileAttributes {
    fn file_times(&self, path: &Path) -> Result<FileTimes> {
        let meta = fs::metadata(path)?;
        Ok(FileTimes {
            created: FileTime::from_creation_time(&meta).map(to_millis),
            accessed: Some(to_millis(FileTime::from_last_access_time(&meta))),
            modified: Some(to_millis(FileTime::from_last_modification_time(&meta))),
        })
    }
}

/// Last-modified time in epoch millis.
pub fn modified_millis(path: &Path) -> Result<i64> {
    let meta = fs::metadata(path)?;
    Ok(to_millis(FileTime::from_last_modification_time(&meta)))
}

fn to_millis(ft: FileTime) -> i64 {
    ft.unix_seconds() * MS_PER_SECOND + i64::from(ft.nanoseconds() / 1_000_000)
}
