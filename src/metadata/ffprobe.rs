// FFprobe wrapper for container creation time

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;

use super::VideoContainerReader;
use crate::error::{GalleryError, Result};

#[derive(Debug, Deserialize)]
struct FFprobeOutput {
    format: Option<FFprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FFprobeFormat {
    tags: Option<FFprobeTags>,
}

#[derive(Debug, Deserialize)]
struct FFprobeTags {
    creation_time: Option<String>,
}

/// Reads the movie-header creation time that ffprobe reports as `format.tags.creation_time`.
///
/// A host without ffprobe yields no candidate rather than an error, so only unreadable
/// files end up flagged broken.
#[derive(Debug, Clone)]
pub struct FFprobeReader {
    binary: PathBuf,
}

impl FFprobeReader {
    pub fn new() -> Self {
        Self::with_binary(crate::tools::ffprobe_path())
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for FFprobeReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoContainerReader for FFprobeReader {
    fn creation_time(&self, path: &Path) -> Result<Option<i64>> {
        let spawned = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .output();

        let output = match spawned {
            Ok(output) => output,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                log::debug!(
                    "{} not runnable ({}), no container time for {}",
                    self.binary.display(),
                    e,
                    path.display()
                );
                return Ok(None);
            }
            Err(e) => return Err(GalleryError::FFprobe(format!("Failed to run ffprobe: {}", e))),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GalleryError::FFprobe(format!(
                "ffprobe failed on {}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        parse_creation_time(&output.stdout)
    }
}

/// Extract the creation time from ffprobe JSON output as epoch millis.
fn parse_creation_time(stdout: &[u8]) -> Result<Option<i64>> {
    let probe: FFprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| GalleryError::FFprobe(format!("Failed to parse ffprobe output: {}", e)))?;

    let raw = probe
        .format
        .and_then(|f| f.tags)
        .and_then(|t| t.creation_time);

    Ok(raw.as_deref().and_then(parse_container_time))
}

/// Containers write either RFC 3339 or a bare "YYYY-MM-DD HH:MM:SS" (read as UTC).
fn parse_container_time(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}
