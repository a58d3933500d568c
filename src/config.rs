// Settings: TOML file, environment overrides, root validation

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::constants::{
    APP_NAME, CONFIG_FILENAME, DEFAULT_LOG_LEVEL, DEFAULT_PHOTO_EXTENSIONS,
    DEFAULT_VIDEO_EXTENSIONS, ENV_CONFIG_PATH, ENV_DB_PATH, ENV_ROOTS, ENV_WORKERS,
};
use crate::error::{GalleryError, Result};

/// Lowercase extensions (no dot) that qualify a file as a photo or a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaExtensions {
    pub photo: Vec<String>,
    pub video: Vec<String>,
}

impl MediaExtensions {
    pub fn new<P, V>(photo: P, video: V) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
    {
        Self {
            photo: photo.into_iter().map(normalize_extension).collect(),
            video: video.into_iter().map(normalize_extension).collect(),
        }
    }
}

impl Default for MediaExtensions {
    fn default() -> Self {
        Self::new(DEFAULT_PHOTO_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS)
    }
}

fn normalize_extension(ext: impl AsRef<str>) -> String {
    ext.as_ref().trim().trim_start_matches('.').to_lowercase()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub library: LibrarySettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub indexer: IndexerSettings,

    #[serde(default)]
    pub access: AccessSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibrarySettings {
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    #[serde(default = "default_photo_extensions")]
    pub photo_extensions: Vec<String>,

    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
}

fn default_photo_extensions() -> Vec<String> {
    DEFAULT_PHOTO_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

fn default_video_extensions() -> Vec<String> {
    DEFAULT_VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            photo_extensions: default_photo_extensions(),
            video_extensions: default_video_extensions(),
        }
    }
}

impl LibrarySettings {
    pub fn extensions(&self) -> MediaExtensions {
        MediaExtensions::new(&self.photo_extensions, &self.video_extensions)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSettings {
    pub path: Option<PathBuf>,
}

impl DatabaseSettings {
    /// Configured path, else the platform data directory.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(crate::db::default_db_path)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerSettings {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self { workers: default_workers() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessSettings {
    pub rules_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl Settings {
    /// Parse a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GalleryError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| GalleryError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| GalleryError::Config(e.to_string()))
    }

    /// Load from the explicit path, else `PHOTOGALLERY_CONFIG`, else the platform config
    /// directory, then apply environment overrides. Only a missing default file is tolerated.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from);

        let mut settings = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::load(&path)?,
            None => match default_config_path() {
                Some(path) if path.is_file() => {
                    log::info!("Loading settings from {}", path.display());
                    Self::load(&path)?
                }
                _ => {
                    log::debug!("No settings file found, using defaults");
                    Self::default()
                }
            },
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var_os(key));
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<std::ffi::OsString>,
    {
        if let Some(roots) = lookup(ENV_ROOTS) {
            self.library.roots = std::env::split_paths(&roots)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }

        if let Some(db) = lookup(ENV_DB_PATH) {
            self.database.path = Some(PathBuf::from(db));
        }

        if let Some(workers) = lookup(ENV_WORKERS) {
            match workers.to_string_lossy().trim().parse::<usize>() {
                Ok(n) if n > 0 => self.indexer.workers = n,
                _ => log::warn!("Ignoring invalid {}: {:?}", ENV_WORKERS, workers),
            }
        }
    }

    /// Canonicalize every root. Anything that is not an existing directory is fatal.
    pub fn validate_roots(&mut self) -> Result<()> {
        self.library.roots = validate_roots(&self.library.roots)?;
        Ok(())
    }
}

/// Canonicalize root directories, failing on the first one that is not a directory.
pub fn validate_roots(roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    roots
        .iter()
        .map(|root| {
            if !root.is_dir() {
                return Err(GalleryError::NotADirectory(root.clone()));
            }
            root.canonicalize()
                .map_err(|_| GalleryError::NotADirectory(root.clone()))
        })
        .collect()
}

/// `<platform config dir>/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}
