// File discovery for indexing

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::MediaExtensions;
use crate::constants::{BURNED_DIR_NAME, MACOS_PREVIEW_PREFIX, SOFT_SYMLINK_EXTENSION};
use crate::metadata::detect_media_kind;

/// Discover all media files under a root, recursively.
///
/// Soft symlinks are replaced by their targets. The result is sorted and may contain a
/// path more than once when several symlinks point at it.
pub fn discover_media_files(root: &Path, extensions: &MediaExtensions) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if let Some(path) = media_path_for(entry.path(), extensions) {
            files.push(path);
        }
    }

    files.sort();
    files
}

/// Media files directly inside `dir` (not recursive), with soft symlinks resolved.
pub fn list_media_files(dir: &Path, extensions: &MediaExtensions) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| media_path_for(&e.path(), extensions))
        .collect();
    files.sort();
    files
}

/// The file to index for `path`: itself if it is media, its target if it is a soft symlink.
fn media_path_for(path: &Path, extensions: &MediaExtensions) -> Option<PathBuf> {
    if is_media_file(path, extensions) {
        Some(path.to_path_buf())
    } else if is_soft_symlink(path) {
        read_soft_symlink(path, extensions)
    } else {
        None
    }
}

/// Regular file with a photo/video extension that is not a macOS preview.
pub fn is_media_file(path: &Path, extensions: &MediaExtensions) -> bool {
    path.is_file() && !is_macos_preview(path) && detect_media_kind(path, extensions).is_some()
}

pub fn is_soft_symlink(path: &Path) -> bool {
    path.is_file()
        && !is_macos_preview(path)
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(SOFT_SYMLINK_EXTENSION))
            .unwrap_or(false)
}

pub fn is_macos_preview(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with(MACOS_PREVIEW_PREFIX))
        .unwrap_or(false)
}

/// Target of a soft symlink, if its first line names a qualifying media file.
pub fn read_soft_symlink(path: &Path, extensions: &MediaExtensions) -> Option<PathBuf> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Cannot read soft symlink {}: {}", path.display(), e);
            return None;
        }
    };

    let target = PathBuf::from(content.lines().next()?.trim());
    if target.is_absolute() && is_media_file(&target, extensions) {
        Some(target)
    } else {
        log::debug!("Soft symlink {} points at {}, ignoring", path.display(), target.display());
        None
    }
}

/// False when the file's directory holds a `burned` subdirectory (the file is a placeholder).
pub fn is_final(path: &Path) -> bool {
    !path
        .parent()
        .map(|dir| dir.join(BURNED_DIR_NAME).is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_discover_filters_extensions_and_previews() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(&root.join("a.jpg"));
        touch(&root.join("nested/deeper/b.MP4"));
        touch(&root.join("nested/._b.mp4"));
        touch(&root.join("notes.txt"));
        touch(&root.join("raw.cr2"));

        let found = discover_media_files(root, &MediaExtensions::default());
        assert_eq!(found, vec![root.join("a.jpg"), root.join("nested/deeper/b.MP4")]);
    }

    #[test]
    fn test_soft_symlink_is_replaced_by_target() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        let elsewhere = tmp.path().join("elsewhere/clip.mp4");
        touch(&elsewhere);
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("clip.symlink"), format!("{}\n", elsewhere.display())).unwrap();
        fs::write(root.join("dangling.symlink"), "/nowhere/at/all.mp4").unwrap();
        fs::write(root.join("text.symlink"), format!("{}", root.join("notes.txt").display())).unwrap();

        let ext = MediaExtensions::default();
        assert_eq!(discover_media_files(&root, &ext), vec![elsewhere.clone()]);
        assert_eq!(list_media_files(&root, &ext), vec![elsewhere]);
    }

    #[test]
    fn test_list_is_not_recursive() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("a.png"));
        touch(&tmp.path().join("sub/b.png"));

        let listed = list_media_files(tmp.path(), &MediaExtensions::default());
        assert_eq!(listed, vec![tmp.path().join("a.png")]);
        assert!(list_media_files(&tmp.path().join("missing"), &MediaExtensions::default()).is_empty());
    }

    #[test]
    fn test_is_final() {
        let tmp = TempDir::new().unwrap();
        let placeholder = tmp.path().join("event/IMG_1.jpg");
        let kept = tmp.path().join("event/burned/IMG_1.jpg");
        touch(&placeholder);
        touch(&kept);

        assert!(!is_final(&placeholder));
        assert!(is_final(&kept));
        assert!(is_final(&tmp.path().join("other/IMG_2.jpg")));
    }

    #[test]
    fn test_burned_file_is_not_a_marker() {
        let tmp = TempDir::new().unwrap();
        let media = tmp.path().join("IMG_1.jpg");
        touch(&media);
        touch(&tmp.path().join(BURNED_DIR_NAME));
        assert!(is_final(&media));
    }
}
