// Browsing views: memoized, access-filtered entry lists and navigation positions
//
// A view is built once per key and kept until invalidated, so positions always refer to
// the list the user was shown even while the catalog changes underneath.

pub mod listing;


use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use serde::Serialize;

use crate::access::AccessControl;
use crate::config::MediaExtensions;
use crate::db::catalog::find_by_location;
use crate::db::schema::MediaEntity;
use crate::db::CatalogStore;
use crate::error::Result;
use crate::ingest::discover::list_media_files;

pub use listing::{FolderListing, MonthGroup, YearListing};

/// Identifies one browsing context. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKey {
    Folder { principal: String, folder: PathBuf },
    Year { principal: String, year: i32 },
}

impl ViewKey {
    /// Folder key with the path canonicalized when it exists.
    pub fn folder(principal: &str, folder: &Path) -> Self {
        ViewKey::Folder {
            principal: principal.to_string(),
            folder: canonical_folder(folder),
        }
    }

    pub fn year(principal: &str, year: i32) -> Self {
        ViewKey::Year { principal: principal.to_string(), year }
    }
}

/// Where an entry sits in a view. `position` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: i64,
    pub prev_id: i64,
    pub next_id: i64,
    pub position: usize,
    pub total: usize,
}

impl Position {
    /// Answer for an id the view does not hold.
    pub fn degenerate(id: i64) -> Self {
        Self { id, prev_id: id, next_id: id, position: 1, total: 1 }
    }

    /// Wrap-around neighbours of `id` in `entries`.
    pub fn within(entries: &[MediaEntity], id: i64) -> Self {
        let matches: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.id == id)
            .map(|(i, _)| i)
            .collect();

        let Some(&idx) = matches.first() else {
            return Self::degenerate(id);
        };
        if matches.len() > 1 {
            log::warn!("Id {} appears {} times in one view", id, matches.len());
        }

        let total = entries.len();
        let prev = if idx == 0 { total - 1 } else { idx - 1 };
        let next = if idx + 1 == total { 0 } else { idx + 1 };
        Self {
            id,
            prev_id: entries[prev].id,
            next_id: entries[next].id,
            position: idx + 1,
            total,
        }
    }
}

type View = Arc<Vec<MediaEntity>>;

/// One cell per key. Holding its lock while building makes concurrent requests for the
/// same key wait for that build instead of starting their own.
type Slot = Arc<Mutex<Option<View>>>;

pub struct ViewCache {
    store: Arc<dyn CatalogStore>,
    access: Arc<dyn AccessControl>,
    roots: Vec<PathBuf>,
    extensions: MediaExtensions,
    views: Mutex<HashMap<ViewKey, Slot>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ViewCache {
    /// `roots` should already be canonical (see `config::validate_roots`).
    pub fn new(
        store: Arc<dyn CatalogStore>,
        access: Arc<dyn AccessControl>,
        roots: Vec<PathBuf>,
        extensions: MediaExtensions,
    ) -> Self {
        Self {
            store,
            access,
            roots,
            extensions,
            views: Mutex::new(HashMap::new()),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// The memoized view for `key`, building it on first request.
    ///
    /// A failed build leaves nothing cached; the next request retries.
    pub fn get_or_build(&self, key: &ViewKey) -> Result<View> {
        let slot = lock(&self.views).entry(key.clone()).or_default().clone();

        let mut cell = lock(&slot);
        if let Some(view) = cell.as_ref() {
            return Ok(view.clone());
        }

        let view = Arc::new(self.build(key)?);
        log::debug!("Built view {:?} with {} entries", key, view.len());
        *cell = Some(view.clone());
        Ok(view)
    }

    /// The view for `key` if one was already built. Never builds.
    pub fn cached(&self, key: &ViewKey) -> Option<View> {
        let slot = lock(&self.views).get(key).cloned()?;
        let cell = lock(&slot);
        cell.clone()
    }

    /// Position of `id` in the view last shown for `key`.
    pub fn position_of(&self, id: i64, key: &ViewKey) -> Position {
        match self.cached(key) {
            Some(view) => Position::within(&view, id),
            None => Position::degenerate(id),
        }
    }

    pub fn invalidate(&self, key: &ViewKey) {
        lock(&self.views).remove(key);
    }

    pub fn invalidate_all(&self) {
        lock(&self.views).clear();
    }

    fn build(&self, key: &ViewKey) -> Result<Vec<MediaEntity>> {
        match key {
            ViewKey::Folder { principal, folder } => self.build_folder(principal, folder),
            ViewKey::Year { principal, year } => self.build_year(principal, *year),
        }
    }

    fn build_folder(&self, principal: &str, folder: &Path) -> Result<Vec<MediaEntity>> {
        if !self.is_within_roots(folder) || !folder.is_dir() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = list_media_files(folder, &self.extensions)
            .into_iter()
            .filter(|f| self.access.is_allowed(principal, f))
            .collect();
        files.sort_by_key(|f| f.file_name().map(|n| n.to_os_string()));

        let mut entries = Vec::with_capacity(files.len());
        for file in &files {
            if let Some(entity) = find_by_location(self.store.as_ref(), file)? {
                entries.push(entity);
            }
        }
        entries.sort_by_key(MediaEntity::effective_timestamp);
        Ok(entries)
    }

    fn build_year(&self, principal: &str, year: i32) -> Result<Vec<MediaEntity>> {
        let Some((from, to)) = year_bounds(year) else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<MediaEntity> = self
            .store
            .find_by_timestamp_range(from, to)?
            .into_iter()
            .filter(|e| self.access.is_allowed(principal, &e.path()))
            .filter(|e| e.is_final)
            .collect();
        entries.sort_by_key(MediaEntity::effective_timestamp);
        Ok(entries)
    }

    pub fn is_within_roots(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| path.starts_with(root))
    }
}

/// Canonical form of `folder`, or the path as given when it cannot be resolved.
pub fn canonical_folder(folder: &Path) -> PathBuf {
    folder.canonicalize().unwrap_or_else(|_| folder.to_path_buf())
}

/// `[Jan 1 00:00:00.000, Dec 31 23:59:59.999]` of `year`, UTC millis.
pub fn year_bounds(year: i32) -> Option<(i64, i64)> {
    let from = NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let to = NaiveDate::from_ymd_opt(year, 12, 31)?.and_hms_milli_opt(23, 59, 59, 999)?;
    Some((from.and_utc().timestamp_millis(), to.and_utc().timestamp_millis()))
}
