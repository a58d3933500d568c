// Photo Gallery Constants
// Filesystem conventions here are shared with existing libraries on disk. Do not rename.

// Paths
pub const APP_NAME: &str = "photogallery";
pub const DB_FILENAME: &str = "photogallery.db";
pub const CONFIG_FILENAME: &str = "config.toml";

// Environment overrides
pub const ENV_CONFIG_PATH: &str = "PHOTOGALLERY_CONFIG";
pub const ENV_ROOTS: &str = "PHOTOGALLERY_ROOTS";
pub const ENV_DB_PATH: &str = "PHOTOGALLERY_DB";
pub const ENV_WORKERS: &str = "PHOTOGALLERY_WORKERS";
pub const ENV_FFPROBE_PATH: &str = "PHOTOGALLERY_FFPROBE_PATH";

// Filesystem side channels
/// A sibling directory with this name marks every file next to it as a placeholder.
pub const BURNED_DIR_NAME: &str = "burned";
/// Presence of this file next to a media file flips `yyMMdd` names to `ddMMyy`.
pub const DATE_INVERT_MARKER: &str = "date-invert-marker.txt";
/// Text file whose first line is the absolute path of the media file to index instead.
pub const SOFT_SYMLINK_EXTENSION: &str = "symlink";
/// Resource-fork previews written by macOS onto foreign filesystems.
pub const MACOS_PREVIEW_PREFIX: &str = "._";

// Time
/// 2000-01-01T00:00:00Z. Candidates at or below this are rejected.
pub const LOWER_BOUND_MS: i64 = 946_684_800_000;
pub const MIN_PATH_YEAR: i32 = 2000;
pub const MS_PER_SECOND: i64 = 1_000;

// Default media extensions (lowercase, no dot)
pub const DEFAULT_PHOTO_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
pub const DEFAULT_VIDEO_EXTENSIONS: [&str; 3] = ["avi", "mp4", "mov"];

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";
