//! Persistent record of completed downloads, backed by SQLite.

use std::fs;
use std::path::Path;

use log::debug;
use rusqlite::{params, Connection};

use crate::error::Error;

/// Handle to the dedup database. One row per completed item id; track and
/// album ids share the namespace.
pub struct DownloadsDb {
    connection: Connection,
}

impl DownloadsDb {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let connection = Connection::open(path)?;
        let db = DownloadsDb { connection };
        db.ensure_schema()?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, Error> {
        let db = DownloadsDb {
            connection: Connection::open_in_memory()?,
        };
        db.ensure_schema()?;
        Ok(db)
    }

    fn ensure_schema(&self) -> Result<(), Error> {
        self.connection.execute(
            "CREATE TABLE IF NOT EXISTS downloads (id TEXT UNIQUE NOT NULL)",
            [],
        )?;
        Ok(())
    }

    /// True when the id was already recorded as downloaded.
    pub fn contains(&self, id: &str) -> Result<bool, Error> {
        let count: i64 = self.connection.query_row(
            "SELECT COUNT(*) FROM downloads WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Records a completed download. Re-adding an id is a no-op; returns
    /// whether the id was newly inserted.
    pub fn add(&self, id: &str) -> Result<bool, Error> {
        let inserted = self.connection.execute(
            "INSERT OR IGNORE INTO downloads (id) VALUES (?1)",
            params![id],
        )?;
        if inserted > 0 {
            debug!("Recorded {id} as downloaded");
        }
        Ok(inserted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::DownloadsDb;

    #[test]
    fn test_add_then_contains() {
        let db = DownloadsDb::open_in_memory().expect("db should open");
        assert!(!db.contains("52311").expect("query should succeed"));
        assert!(db.add("52311").expect("insert should succeed"));
        assert!(db.contains("52311").expect("query should succeed"));
    }

    #[test]
    fn test_duplicate_add_is_a_noop() {
        let db = DownloadsDb::open_in_memory().expect("db should open");
        assert!(db.add("0081227971").expect("insert should succeed"));
        assert!(!db.add("0081227971").expect("re-insert should succeed"));
        assert!(db.contains("0081227971").expect("query should succeed"));
    }

    #[test]
    fn test_track_and_album_ids_share_namespace() {
        let db = DownloadsDb::open_in_memory().expect("db should open");
        db.add("52311").expect("insert should succeed");
        db.add("0081227971").expect("insert should succeed");
        assert!(db.contains("52311").expect("query should succeed"));
        assert!(db.contains("0081227971").expect("query should succeed"));
        assert!(!db.contains("other").expect("query should succeed"));
    }
}
