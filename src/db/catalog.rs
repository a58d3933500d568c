// Catalog store capability and its SQLite implementation

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::seq::SliceRandom;
use rusqlite::Connection;

use crate::db::schema::{self, MediaEntity, NewMediaEntity};
use crate::error::{GalleryError, Result};

/// Key-indexed store of media entities. Implementations serialize conflicting writes.
pub trait CatalogStore: Send + Sync {
    fn find_by_file_name(&self, file_name: &str) -> Result<Vec<MediaEntity>>;
    fn find_by_full_path(&self, full_path: &str) -> Result<Vec<MediaEntity>>;
    fn find_by_id(&self, id: i64) -> Result<Option<MediaEntity>>;
    /// Inclusive range over the effective timestamp.
    fn find_by_timestamp_range(&self, from: i64, to: i64) -> Result<Vec<MediaEntity>>;
    /// Persist a new entity and return it with its assigned id.
    fn insert(&self, entity: &NewMediaEntity) -> Result<MediaEntity>;
    fn delete(&self, entities: &[MediaEntity]) -> Result<()>;
    fn list_all(&self) -> Result<Vec<MediaEntity>>;

    fn count(&self) -> Result<usize> {
        Ok(self.list_all()?.len())
    }
}

/// SQLite-backed catalog. One connection guarded by a mutex.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    pub fn new(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }

    /// Run a closure against the underlying connection (for helpers outside the trait).
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        f(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CatalogStore for SqliteCatalog {
    fn find_by_file_name(&self, file_name: &str) -> Result<Vec<MediaEntity>> {
        schema::find_media_by_file_name(&self.lock(), file_name)
    }

    fn find_by_full_path(&self, full_path: &str) -> Result<Vec<MediaEntity>> {
        schema::find_media_by_full_path(&self.lock(), full_path)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<MediaEntity>> {
        schema::get_media(&self.lock(), id)
    }

    fn find_by_timestamp_range(&self, from: i64, to: i64) -> Result<Vec<MediaEntity>> {
        schema::find_media_in_range(&self.lock(), from, to)
    }

    fn insert(&self, entity: &NewMediaEntity) -> Result<MediaEntity> {
        let conn = self.lock();
        let id = schema::insert_media(&conn, entity)?;
        Ok(MediaEntity {
            id,
            file_name: entity.file_name.clone(),
            full_path: entity.full_path.clone(),
            parsed_timestamp: entity.parsed_timestamp,
            override_timestamp: None,
            timestamp_source: entity.timestamp_source,
            is_broken: entity.is_broken,
            is_final: entity.is_final,
        })
    }

    fn delete(&self, entities: &[MediaEntity]) -> Result<()> {
        let ids: Vec<i64> = entities.iter().map(|e| e.id).collect();
        schema::delete_media(&self.lock(), &ids)?;
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<MediaEntity>> {
        schema::list_media(&self.lock())
    }

    fn count(&self) -> Result<usize> {
        let count = schema::count_media(&self.lock())?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

/// The entity with `id`, or `MediaNotFound`.
pub fn require_by_id(store: &dyn CatalogStore, id: i64) -> Result<MediaEntity> {
    store.find_by_id(id)?.ok_or(GalleryError::MediaNotFound(id))
}

/// Find the catalog entry for a file on disk: filename first, then exact path.
///
/// Several rows sharing one path means the store is inconsistent; one of them is
/// returned at random and the condition is logged.
pub fn find_by_location(store: &dyn CatalogStore, path: &Path) -> Result<Option<MediaEntity>> {
    let file_name = match path.file_name() {
        Some(n) => n.to_string_lossy().to_string(),
        None => return Ok(None),
    };

    if store.find_by_file_name(&file_name)?.is_empty() {
        return Ok(None);
    }

    let full_path = path.to_string_lossy();
    let mut by_path = store.find_by_full_path(&full_path)?;
    if by_path.len() > 1 {
        log::error!(
            "Too many entities for {}: {:?}",
            full_path,
            by_path.iter().map(|e| e.id).collect::<Vec<_>>()
        );
        return Ok(by_path.choose(&mut rand::thread_rng()).cloned());
    }

    Ok(by_path.pop().filter(|found| found.full_path == full_path))
}
