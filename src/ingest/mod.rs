// Indexing: keeps the catalog in step with the library roots

pub mod discover;


use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::validate_roots;
use crate::db::catalog::find_by_location;
use crate::db::schema::{MediaEntity, NewMediaEntity};
use crate::db::CatalogStore;
use crate::error::{GalleryError, Result};
use crate::timestamp::{Resolution, TimestampResolver};

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub discovered: usize,
    pub existing: usize,
    pub added: usize,
    pub removed: usize,
    pub clones_skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
    /// Entities in the catalog once the run finished.
    pub catalog_size: usize,
}

pub struct Indexer {
    store: Arc<dyn CatalogStore>,
    resolver: Arc<TimestampResolver>,
    workers: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl Indexer {
    pub fn new(store: Arc<dyn CatalogStore>, resolver: Arc<TimestampResolver>) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self { store, resolver, workers, cancel: None }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Files not yet started are abandoned once the flag is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|f| f.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Remove entities whose files vanished, then index new files under `roots`.
    ///
    /// Every root must be a directory; otherwise nothing is touched.
    pub fn reconcile(&self, roots: &[PathBuf]) -> Result<ReconcileReport> {
        let roots = validate_roots(roots)?;
        let mut report = ReconcileReport::default();

        report.removed = self.remove_missing()?;
        let baseline = self.store.count()?;

        let discovered = self.discover(&roots);
        report.discovered = discovered.len();
        log::info!("Discovered {} media files under {} roots", discovered.len(), roots.len());

        // Exact-path matches are already catalogued
        let mut pending = Vec::new();
        for path in discovered {
            match find_by_location(self.store.as_ref(), &path) {
                Ok(Some(_)) => report.existing += 1,
                Ok(None) => pending.push(path),
                Err(e) => {
                    log::error!("Lookup failed for {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        let resolved = self.resolve_all(&pending)?;
        let total = resolved.len();

        for (idx, (path, resolution)) in resolved.into_iter().enumerate() {
            let Some(resolution) = resolution else {
                report.cancelled = true;
                continue;
            };

            match self.persist(path, resolution) {
                Ok(Some(entity)) => {
                    report.added += 1;
                    log::info!(
                        "[{}/{}] {} saved with id {}",
                        idx + 1,
                        total,
                        path.display(),
                        entity.id
                    );
                }
                Ok(None) => report.clones_skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    log::error!("Failed to save {}: {}", path.display(), e);
                }
            }
        }

        log::info!(
            "Reconcile finished: {} added, {} removed, {} existing, {} clones, {} failed",
            report.added,
            report.removed,
            report.existing,
            report.clones_skipped,
            report.failed
        );

        report.catalog_size = self.store.count()?;
        if report.catalog_size != baseline + report.added {
            log::error!(
                "Entities count mismatch: expected {}, catalog holds {}",
                baseline + report.added,
                report.catalog_size
            );
        }
        Ok(report)
    }

    /// Delete every entity whose backing file no longer exists.
    fn remove_missing(&self) -> Result<usize> {
        let missing: Vec<MediaEntity> = self
            .store
            .list_all()?
            .into_iter()
            .filter(|e| !Path::new(&e.full_path).is_file())
            .collect();

        for entity in &missing {
            log::info!("{} is gone, removing id {}", entity.full_path, entity.id);
        }
        if !missing.is_empty() {
            self.store.delete(&missing)?;
        }
        Ok(missing.len())
    }

    /// Walk every root; paths reached more than once are kept once.
    fn discover(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        let extensions = self.resolver.extensions();
        let mut seen = HashSet::new();
        roots
            .iter()
            .flat_map(|root| discover::discover_media_files(root, extensions))
            .filter(|path| seen.insert(path.clone()))
            .collect()
    }

    /// Resolve timestamps on a bounded pool. `None` marks files skipped by cancellation.
    fn resolve_all<'a>(&self, paths: &'a [PathBuf]) -> Result<Vec<(&'a Path, Option<Resolution>)>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("indexer-{}", i))
            .build()
            .map_err(|e| GalleryError::Other(format!("Failed to start indexer pool: {}", e)))?;

        Ok(pool.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    if self.is_cancelled() {
                        return (path.as_path(), None);
                    }
                    (path.as_path(), Some(self.resolver.resolve(path)))
                })
                .collect()
        }))
    }

    /// Insert one resolved file unless a same-named entity carries the same timestamp.
    ///
    /// Equal name and timestamp is taken to be a copy of an already-indexed asset. This can
    /// miss genuine distinct files (burst shots sharing a name across folders).
    fn persist(&self, path: &Path, resolution: Resolution) -> Result<Option<MediaEntity>> {
        let mut entity = NewMediaEntity::for_path(path, resolution.timestamp, resolution.provenance);

        let twins = self.store.find_by_file_name(&entity.file_name)?;
        if let Some(twin) = twins.iter().find(|e| e.parsed_timestamp == resolution.timestamp) {
            log::info!(
                "{} matches {} (id {}) by name and time, skipping",
                path.display(),
                twin.full_path,
                twin.id
            );
            return Ok(None);
        }

        entity.is_broken = resolution.extraction_failed;
        entity.is_final = discover::is_final(path);
        self.store.insert(&entity).map(Some)
    }
}
