// Folder and calendar listings built on the view cache

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Month};
use serde::Serialize;

use super::{canonical_folder, Position, ViewCache, ViewKey};
use crate::db::schema::MediaEntity;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderListing {
    pub folder: PathBuf,
    /// Parent folder, clamped to the library root.
    pub parent: PathBuf,
    pub sub_folders: Vec<PathBuf>,
    pub entries: Vec<MediaEntity>,
}

impl FolderListing {
    pub fn empty(folder: &Path) -> Self {
        Self {
            folder: folder.to_path_buf(),
            parent: folder.to_path_buf(),
            sub_folders: Vec::new(),
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthGroup {
    /// 1-based
    pub month: u32,
    pub name: String,
    pub entries: Vec<MediaEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearListing {
    pub year: i32,
    /// Always twelve groups, January first.
    pub months: Vec<MonthGroup>,
}

impl ViewCache {
    /// Library roots the principal may open.
    pub fn root_folders(&self, principal: &str) -> Vec<PathBuf> {
        self.roots
            .iter()
            .filter(|root| self.access.is_allowed(principal, root))
            .cloned()
            .collect()
    }

    /// Calendar years holding at least one final entry the principal may see, newest first.
    pub fn years(&self, principal: &str) -> Result<Vec<i32>> {
        let years: BTreeSet<i32> = self
            .store
            .list_all()?
            .iter()
            .filter(|e| e.is_final)
            .filter(|e| self.access.is_allowed(principal, &e.path()))
            .filter_map(|e| e.effective_instant())
            .map(|instant| instant.year())
            .collect();
        Ok(years.into_iter().rev().collect())
    }

    /// Contents of one folder. Folders outside every root list as empty.
    pub fn folder_listing(&self, principal: &str, folder: &Path) -> Result<FolderListing> {
        let folder = canonical_folder(folder);
        if !self.is_within_roots(&folder) || !folder.is_dir() {
            return Ok(FolderListing::empty(&folder));
        }

        let key = ViewKey::Folder {
            principal: principal.to_string(),
            folder: folder.clone(),
        };
        let entries = self.get_or_build(&key)?;

        Ok(FolderListing {
            parent: self.clamped_parent(&folder),
            sub_folders: self.sub_folders(principal, &folder),
            folder,
            entries: entries.as_ref().clone(),
        })
    }

    /// Final entries of a calendar year, grouped by month.
    pub fn year_listing(&self, principal: &str, year: i32) -> Result<YearListing> {
        let entries = self.get_or_build(&ViewKey::year(principal, year))?;

        let mut months: Vec<MonthGroup> = (1..=12u32)
            .map(|m| MonthGroup {
                month: m,
                name: month_name(m),
                entries: Vec::new(),
            })
            .collect();

        for entity in entries.iter() {
            if let Some(instant) = entity.effective_instant() {
                let idx = instant.month0() as usize;
                months[idx].entries.push(entity.clone());
            }
        }

        Ok(YearListing { year, months })
    }

    /// The entity and its place in the view last built for `key`.
    pub fn media_with_position(&self, id: i64, key: &ViewKey) -> Result<Option<(MediaEntity, Position)>> {
        let Some(entity) = self.store.find_by_id(id)? else {
            return Ok(None);
        };
        let position = self.position_of(entity.id, key);
        Ok(Some((entity, position)))
    }

    fn clamped_parent(&self, folder: &Path) -> PathBuf {
        if self.roots.iter().any(|root| root == folder) {
            return folder.to_path_buf();
        }
        match folder.parent() {
            Some(parent) if self.is_within_roots(parent) => parent.to_path_buf(),
            _ => folder.to_path_buf(),
        }
    }

    fn sub_folders(&self, principal: &str, folder: &Path) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(folder) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Cannot list {}: {}", folder.display(), e);
                return Vec::new();
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .filter(|p| self.access.is_allowed(principal, p))
            .collect();
        dirs.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
        dirs
    }
}

fn month_name(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name().to_string())
        .unwrap_or_default()
}
