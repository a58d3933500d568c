// Database schema types and query helpers

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::timestamp::Provenance;

// ----- Media -----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEntity {
    pub id: i64,
    pub file_name: String,
    pub full_path: String,
    pub parsed_timestamp: i64,
    pub override_timestamp: Option<i64>,
    pub timestamp_source: Provenance,
    pub is_broken: bool,
    pub is_final: bool,
}

impl MediaEntity {
    /// Manual override if present, otherwise the resolved timestamp.
    pub fn effective_timestamp(&self) -> i64 {
        self.override_timestamp.unwrap_or(self.parsed_timestamp)
    }

    pub fn effective_instant(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.effective_timestamp())
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.full_path)
    }
}

#[derive(Debug, Clone)]
pub struct NewMediaEntity {
    pub file_name: String,
    pub full_path: String,
    pub parsed_timestamp: i64,
    pub timestamp_source: Provenance,
    pub is_broken: bool,
    pub is_final: bool,
}

impl NewMediaEntity {
    pub fn for_path(path: &Path, parsed_timestamp: i64, timestamp_source: Provenance) -> Self {
        Self {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            full_path: path.to_string_lossy().to_string(),
            parsed_timestamp,
            timestamp_source,
            is_broken: false,
            is_final: true,
        }
    }
}

impl ToSql for Provenance {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Provenance {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Provenance::parse(text).ok_or_else(|| FromSqlError::Other(
            format!("unknown timestamp source: {}", text).into(),
        ))
    }
}

const MEDIA_COLUMNS: &str =
    "id, file_name, full_path, parsed_timestamp, override_timestamp, timestamp_source, is_broken, is_final";

fn map_media(row: &rusqlite::Row) -> rusqlite::Result<MediaEntity> {
    Ok(MediaEntity {
        id: row.get(0)?,
        file_name: row.get(1)?,
        full_path: row.get(2)?,
        parsed_timestamp: row.get(3)?,
        override_timestamp: row.get(4)?,
        timestamp_source: row.get(5)?,
        is_broken: row.get(6)?,
        is_final: row.get(7)?,
    })
}

fn query_media(conn: &Connection, where_clause: &str, params: &[&dyn ToSql]) -> Result<Vec<MediaEntity>> {
    let sql = format!("SELECT {} FROM media {}", MEDIA_COLUMNS, where_clause);
    let mut stmt = conn.prepare(&sql)?;
    let media = stmt.query_map(params, map_media)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(media)
}

pub fn insert_media(conn: &Connection, media: &NewMediaEntity) -> Result<i64> {
    conn.execute(
        "INSERT INTO media (file_name, full_path, parsed_timestamp, timestamp_source, is_broken, is_final)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            media.file_name,
            media.full_path,
            media.parsed_timestamp,
            media.timestamp_source,
            media.is_broken,
            media.is_final,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_media(conn: &Connection, id: i64) -> Result<Option<MediaEntity>> {
    let sql = format!("SELECT {} FROM media WHERE id = ?1", MEDIA_COLUMNS);
    let result = conn.query_row(&sql, params![id], map_media).optional()?;
    Ok(result)
}

pub fn find_media_by_file_name(conn: &Connection, file_name: &str) -> Result<Vec<MediaEntity>> {
    query_media(conn, "WHERE file_name = ?1 ORDER BY id", &[&file_name])
}

pub fn find_media_by_full_path(conn: &Connection, full_path: &str) -> Result<Vec<MediaEntity>> {
    query_media(conn, "WHERE full_path = ?1 ORDER BY id", &[&full_path])
}

/// Media whose effective timestamp lies in `[from, to]` (inclusive, epoch millis).
pub fn find_media_in_range(conn: &Connection, from: i64, to: i64) -> Result<Vec<MediaEntity>> {
    query_media(
        conn,
        "WHERE COALESCE(override_timestamp, parsed_timestamp) BETWEEN ?1 AND ?2
         ORDER BY COALESCE(override_timestamp, parsed_timestamp), id",
        &[&from, &to],
    )
}

pub fn list_media(conn: &Connection) -> Result<Vec<MediaEntity>> {
    query_media(conn, "ORDER BY id", &[])
}

pub fn count_media(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))?;
    Ok(count)
}

/// Delete media rows by id in one transaction. Returns the number of rows removed.
pub fn delete_media(conn: &Connection, ids: &[i64]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut removed = 0;
    {
        let mut stmt = tx.prepare("DELETE FROM media WHERE id = ?1")?;
        for id in ids {
            removed += stmt.execute(params![id])?;
        }
    }
    tx.commit()?;
    Ok(removed)
}

/// Set or clear the manual timestamp correction for a media row.
pub fn set_override_timestamp(conn: &Connection, id: i64, override_timestamp: Option<i64>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE media SET override_timestamp = ?1 WHERE id = ?2",
        params![override_timestamp, id],
    )?;
    Ok(changed > 0)
}
