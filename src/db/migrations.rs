// Database migrations
// Migrations are forward-only. Never edit or delete a migration after it ships.

use rusqlite::Connection;
use anyhow::Result;

/// All migrations in order. Each migration is a SQL string.
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- One row per indexed media file
    CREATE TABLE media (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_name TEXT NOT NULL,
        full_path TEXT NOT NULL,
        parsed_timestamp INTEGER NOT NULL,
        override_timestamp INTEGER,
        timestamp_source TEXT NOT NULL
            CHECK (timestamp_source IN ('filename', 'path', 'file_metadata', 'filesystem_metadata')),
        is_broken INTEGER NOT NULL DEFAULT 0,
        is_final INTEGER NOT NULL DEFAULT 1,
        indexed_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX idx_media_file_name ON media(file_name);
    CREATE INDEX idx_media_full_path ON media(full_path);
    CREATE INDEX idx_media_effective_timestamp
        ON media(COALESCE(override_timestamp, parsed_timestamp));
    "#,
];

fn schema_version(conn: &Connection) -> Result<usize> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(usize::try_from(version).unwrap_or(0))
}

/// Bring the catalog up to the latest schema. Each step commits with its version bump.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current = schema_version(conn)?;
    let latest = MIGRATIONS.len();

    if current > latest {
        anyhow::bail!(
            "Catalog schema version {} is newer than this build supports (max {}). Please upgrade photogallery.",
            current,
            latest
        );
    }

    for (version, sql) in MIGRATIONS.iter().enumerate().map(|(i, sql)| (i + 1, sql)).skip(current) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        tx.commit()?;
        log::info!("Catalog schema migrated to version {}", version);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), MIGRATIONS.len());
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 99").unwrap();
        let err = run_migrations(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than this build"));
        assert_eq!(schema_version(&conn).unwrap(), 99);
    }
}
