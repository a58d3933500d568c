// Timestamp resolution
//
// Priority cascade, first valid candidate wins:
// embedded metadata, file name, year in path, filesystem times, then mtime unconditionally.

pub mod filename;

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::MediaExtensions;
use crate::constants::LOWER_BOUND_MS;
use crate::metadata::{
    self, ExifTagReader, FFprobeReader, FileAttributesReader, ImageTagReader, MediaKind,
    SystemFileAttributes, VideoContainerReader,
};

/// How a timestamp was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Filename,
    Path,
    FileMetadata,
    FilesystemMetadata,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Filename => "filename",
            Provenance::Path => "path",
            Provenance::FileMetadata => "file_metadata",
            Provenance::FilesystemMetadata => "filesystem_metadata",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "filename" => Some(Provenance::Filename),
            "path" => Some(Provenance::Path),
            "file_metadata" => Some(Provenance::FileMetadata),
            "filesystem_metadata" => Some(Provenance::FilesystemMetadata),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// Epoch millis, UTC.
    pub timestamp: i64,
    pub provenance: Provenance,
    /// The embedded-metadata reader failed on this file.
    pub extraction_failed: bool,
}

/// `LOWER_BOUND < t < now`
pub fn is_valid(timestamp: i64, now_ms: i64) -> bool {
    timestamp > LOWER_BOUND_MS && timestamp < now_ms
}

pub struct TimestampResolver {
    images: Box<dyn ImageTagReader>,
    videos: Box<dyn VideoContainerReader>,
    attributes: Box<dyn FileAttributesReader>,
    extensions: MediaExtensions,
}

impl TimestampResolver {
    /// Resolver backed by kamadak-exif, ffprobe and the filesystem.
    pub fn new(extensions: MediaExtensions) -> Self {
        if !crate::tools::is_ffprobe_available() {
            log::warn!("ffprobe not found, videos will be dated by name, path and filesystem times");
        }
        Self::with_readers(
            Box::new(ExifTagReader),
            Box::new(FFprobeReader::new()),
            Box::new(SystemFileAttributes),
            extensions,
        )
    }

    pub fn with_readers(
        images: Box<dyn ImageTagReader>,
        videos: Box<dyn VideoContainerReader>,
        attributes: Box<dyn FileAttributesReader>,
        extensions: MediaExtensions,
    ) -> Self {
        Self { images, videos, attributes, extensions }
    }

    pub fn extensions(&self) -> &MediaExtensions {
        &self.extensions
    }

    /// Resolve the best timestamp for one file. Never fails.
    pub fn resolve(&self, path: &Path) -> Resolution {
        let now_ms = Utc::now().timestamp_millis();
        let (embedded, extraction_failed) = self.embedded_timestamp(path, now_ms);

        let found = |timestamp, provenance| Resolution { timestamp, provenance, extraction_failed };

        if let Some(ts) = embedded {
            return found(ts, Provenance::FileMetadata);
        }

        let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        if let Some(ts) =
            filename::timestamp_from_name(&stem, filename::has_invert_marker(path), now_ms)
        {
            return found(ts, Provenance::Filename);
        }

        let absolute = absolute_path(path);
        if let Some(ts) = filename::timestamp_from_path(&absolute.to_string_lossy(), now_ms) {
            return found(ts, Provenance::Path);
        }

        if let Some(ts) = self.filesystem_timestamp(path, now_ms) {
            return found(ts, Provenance::FilesystemMetadata);
        }

        let mtime = metadata::filesystem::modified_millis(path).unwrap_or_else(|e| {
            log::warn!("Cannot read mtime of {}: {}", path.display(), e);
            0
        });
        found(mtime, Provenance::FilesystemMetadata)
    }

    /// Earliest valid embedded date, and whether the reader failed.
    fn embedded_timestamp(&self, path: &Path, now_ms: i64) -> (Option<i64>, bool) {
        match metadata::detect_media_kind(path, &self.extensions) {
            Some(MediaKind::Photo) => match self.images.read_dates(path) {
                Ok(dates) => {
                    if dates.is_empty() {
                        log::debug!("No EXIF dates in {}", path.display());
                    }
                    let earliest = dates
                        .candidates()
                        .into_iter()
                        // 2000-01-01T00:00:00Z is a default some cameras write
                        .filter(|ts| *ts != LOWER_BOUND_MS)
                        .filter(|ts| is_valid(*ts, now_ms))
                        .min();
                    (earliest, false)
                }
                Err(e) => {
                    log::warn!("Failed to read EXIF from {}: {}", path.display(), e);
                    (None, true)
                }
            },
            Some(MediaKind::Video) => match self.videos.creation_time(path) {
                Ok(created) => (created.filter(|ts| *ts > 0 && is_valid(*ts, now_ms)), false),
                Err(e) => {
                    log::warn!("Failed to read container of {}: {}", path.display(), e);
                    (None, true)
                }
            },
            None => (None, false),
        }
    }

    fn filesystem_timestamp(&self, path: &Path, now_ms: i64) -> Option<i64> {
        match self.attributes.file_times(path) {
            Ok(times) => [times.created, times.accessed, times.modified]
                .into_iter()
                .flatten()
                .filter(|ts| is_valid(*ts, now_ms))
                .min(),
            Err(e) => {
                log::debug!("No filesystem times for {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::constants::DATE_INVERT_MARKER;
    use crate::error::GalleryError;
    use crate::metadata::{FileTimes, ImageDates};
    use chrono::{NaiveDate, TimeZone};
    use filetime::FileTime;
    use tempfile::TempDir;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap().timestamp_millis()
    }

    /// Temp dir names are random and may carry a plausible year.
    fn path_has_year(path: &Path) -> bool {
        filename::timestamp_from_path(&path.to_string_lossy(), Utc::now().timestamp_millis())
            .is_some()
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"not really media").unwrap();
        path
    }

    fn resolver(images: StubImages, videos: StubVideos, attrs: StubAttributes) -> TimestampResolver {
        TimestampResolver::with_readers(
            Box::new(images),
            Box::new(videos),
            Box::new(attrs),
            MediaExtensions::default(),
        )
    }

    fn exif_dates(dates: &[(i32, u32, u32)]) -> ImageDates {
        let mut it = dates
            .iter()
            .map(|(y, m, d)| NaiveDate::from_ymd_opt(*y, *m, *d).unwrap().and_hms_opt(0, 0, 0).unwrap());
        ImageDates {
            sub_ifd_original: it.next(),
            sub_ifd_generic: it.next(),
            ifd0_original: it.next(),
            ifd0_generic: it.next(),
        }
    }

    #[test]
    fn test_provenance_round_trip() {
        for p in [
            Provenance::Filename,
            Provenance::Path,
            Provenance::FileMetadata,
            Provenance::FilesystemMetadata,
        ] {
            assert_eq!(Provenance::parse(p.as_str()), Some(p));
        }
        assert_eq!(Provenance::parse("exif"), None);
    }

    #[test]
    fn test_validity_bounds() {
        let now = utc(2024, 1, 1, 0, 0, 0);
        assert!(!is_valid(LOWER_BOUND_MS, now));
        assert!(is_valid(LOWER_BOUND_MS + 1, now));
        assert!(!is_valid(now, now));
        assert!(!is_valid(-5, now));
    }

    #[test]
    fn test_filename_datetime() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "20230615143000.jpg");

        let r = offline_resolver().resolve(&path);
        assert_eq!(r.timestamp, utc(2023, 6, 15, 14, 30, 0));
        assert_eq!(r.provenance, Provenance::Filename);
        assert!(!r.extraction_failed);
    }

    #[test]
    fn test_short_date_with_and_without_marker() {
        let tmp = TempDir::new().unwrap();
        let plain = tmp.path().join("plain");
        let marked = tmp.path().join("marked");
        std::fs::create_dir_all(&plain).unwrap();
        std::fs::create_dir_all(&marked).unwrap();
        std::fs::write(marked.join(DATE_INVERT_MARKER), b"").unwrap();

        let resolver = offline_resolver();
        let r = resolver.resolve(&touch(&plain, "230516.jpg"));
        assert_eq!(r.timestamp, utc(2023, 5, 16, 23, 59, 59));
        assert_eq!(r.provenance, Provenance::Filename);

        let r = resolver.resolve(&touch(&marked, "230516.jpg"));
        assert_eq!(r.timestamp, utc(2016, 5, 23, 23, 59, 59));
        assert_eq!(r.provenance, Provenance::Filename);
    }

    #[test]
    fn test_metadata_beats_filename() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "20230615143000.jpg");

        let r = resolver(
            StubImages(Some(exif_dates(&[(2019, 7, 4), (2018, 3, 1)]))),
            StubVideos(Ok(None)),
            StubAttributes(None),
        )
        .resolve(&path);
        assert_eq!(r.timestamp, utc(2018, 3, 1, 0, 0, 0));
        assert_eq!(r.provenance, Provenance::FileMetadata);
    }

    #[test]
    fn test_exif_sentinel_is_discarded() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "IMG_20190704.jpg");

        let r = resolver(
            StubImages(Some(exif_dates(&[(2000, 1, 1)]))),
            StubVideos(Ok(None)),
            StubAttributes(None),
        )
        .resolve(&path);
        assert_eq!(r.provenance, Provenance::Filename);
        assert_eq!(r.timestamp, utc(2019, 7, 4, 23, 59, 59));
    }

    #[test]
    fn test_sentinel_does_not_hide_other_candidates() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "IMG_1.jpg");

        let r = resolver(
            StubImages(Some(exif_dates(&[(2000, 1, 1), (2012, 8, 9)]))),
            StubVideos(Ok(None)),
            StubAttributes(None),
        )
        .resolve(&path);
        assert_eq!(r.provenance, Provenance::FileMetadata);
        assert_eq!(r.timestamp, utc(2012, 8, 9, 0, 0, 0));
    }

    #[test]
    fn test_video_creation_time() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "clip.mp4");
        let created = utc(2017, 2, 3, 4, 5, 6);

        let r = resolver(StubImages(None), StubVideos(Ok(Some(created))), StubAttributes(None))
            .resolve(&path);
        assert_eq!(r.timestamp, created);
        assert_eq!(r.provenance, Provenance::FileMetadata);

        // Zero creation time is "unset" in QuickTime headers
        let r = resolver(StubImages(None), StubVideos(Ok(Some(0))), StubAttributes(None))
            .resolve(&path);
        assert_ne!(r.provenance, Provenance::FileMetadata);
        assert!(!r.extraction_failed);
    }

    #[test]
    fn test_year_from_path() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("Trip 2018");
        std::fs::create_dir_all(&dir).unwrap();
        let path = touch(&dir, "IMG_1.jpg");

        let r = offline_resolver().resolve(&path);
        assert_eq!(r.provenance, Provenance::Path);
        assert_eq!(r.timestamp, utc(2018, 12, 31, 23, 59, 59));
    }

    #[test]
    fn test_filesystem_metadata_takes_earliest_valid() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "IMG_A.jpg");

        let times = FileTimes {
            created: Some(utc(2015, 5, 5, 0, 0, 0)),
            accessed: Some(utc(2021, 1, 1, 0, 0, 0)),
            modified: Some(12),
        };
        let r = resolver(
            StubImages(Some(ImageDates::default())),
            StubVideos(Ok(None)),
            StubAttributes(Some(times)),
        )
        .resolve(&path);

        if !path_has_year(&path) {
            assert_eq!(r.provenance, Provenance::FilesystemMetadata);
            assert_eq!(r.timestamp, utc(2015, 5, 5, 0, 0, 0));
        }
    }

    #[test]
    fn test_system_attributes_via_filetime() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "IMG_B.jpg");
        let mtime = FileTime::from_unix_time(1_300_000_000, 0);
        filetime::set_file_times(&path, mtime, mtime).unwrap();

        let r = TimestampResolver::with_readers(
            Box::new(StubImages(Some(ImageDates::default()))),
            Box::new(StubVideos(Ok(None))),
            Box::new(SystemFileAttributes),
            MediaExtensions::default(),
        )
        .resolve(&path);

        if !path_has_year(&path) {
            assert_eq!(r.provenance, Provenance::FilesystemMetadata);
            assert!(r.timestamp <= 1_300_000_000_000);
        }
    }

    #[test]
    fn test_extraction_failure_falls_through_to_mtime() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "IMG_C.jpg");
        let mtime = FileTime::from_unix_time(1_200_000_000, 0);
        filetime::set_file_mtime(&path, mtime).unwrap();

        let r = resolver(StubImages(None), StubVideos(Ok(None)), StubAttributes(None)).resolve(&path);
        assert!(r.extraction_failed);
        if !path_has_year(&path) {
            assert_eq!(r.provenance, Provenance::FilesystemMetadata);
            assert_eq!(r.timestamp, 1_200_000_000_000);
        }
    }

    #[test]
    fn test_fallback_ignores_validity() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "IMG_D.jpg");
        // 1990: rejected by every stage except the last
        let mtime = FileTime::from_unix_time(640_000_000, 0);
        filetime::set_file_mtime(&path, mtime).unwrap();

        let r = offline_resolver().resolve(&path);
        if !path_has_year(&path) {
            assert_eq!(r.provenance, Provenance::FilesystemMetadata);
            assert_eq!(r.timestamp, 640_000_000_000);
        }
    }

    #[test]
    fn test_missing_file_never_panics() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("IMG_gone.jpg");
        let r = offline_resolver().resolve(&path);
        if !path_has_year(&path) {
            assert_eq!(r.provenance, Provenance::FilesystemMetadata);
            assert_eq!(r.timestamp, 0);
        }
    }

    #[test]
    fn test_video_reader_failure_is_flagged() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "20200101_120000.mp4");
        let r = resolver(
            StubImages(None),
            StubVideos(Err(GalleryError::FFprobe("moov atom not found".into()))),
            StubAttributes(None),
        )
        .resolve(&path);
        assert!(r.extraction_failed);
        assert_eq!(r.provenance, Provenance::Filename);
        assert_eq!(r.timestamp, utc(2020, 1, 1, 12, 0, 0));
    }
}
