// ffprobe location
//
// Looked up in order: PHOTOGALLERY_FFPROBE_PATH, a copy shipped beside the executable
// (directly or under bin/), then whatever `ffprobe` PATH resolves to.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::constants::ENV_FFPROBE_PATH;

const FFPROBE: &str = "ffprobe";

fn binary_name(stem: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", stem)
    } else {
        stem.to_string()
    }
}

/// Shipped copies next to the running binary, most specific first.
fn bundled_candidates(stem: &str) -> Vec<PathBuf> {
    let Some(dir) = env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) else {
        return Vec::new();
    };
    let name = binary_name(stem);
    vec![dir.join(&name), dir.join("bin").join(&name)]
}

fn locate(env_key: &str, stem: &str) -> PathBuf {
    let overridden = env::var_os(env_key).map(PathBuf::from).filter(|p| p.exists());
    overridden
        .into_iter()
        .chain(bundled_candidates(stem).into_iter().filter(|p| p.exists()))
        .next()
        .unwrap_or_else(|| PathBuf::from(stem))
}

pub fn ffprobe_path() -> PathBuf {
    locate(ENV_FFPROBE_PATH, FFPROBE)
}

/// True when the resolved ffprobe exists on disk or answers `-version` via PATH.
pub fn is_ffprobe_available() -> bool {
    let path = ffprobe_path();
    path.exists()
        || Command::new(&path)
            .arg("-version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
}
