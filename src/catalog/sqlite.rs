//! SQLite backend implementation.

use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::schema::{
    SELECT_LAST_ID, SELECT_PHOTOS, SQLITE_MIGRATIONS, SQLITE_SCHEMA, SQLITE_UPSERT_LAST_ID,
};
use super::{CatalogStore, PhotoRecord, StoreError};

pub struct SqliteStore {
    conn: Mutex<Connection>,
    location: String,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, path.to_path_buf())
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, PathBuf::from(":memory:"))
    }

    fn with_connection(conn: Connection, path: PathBuf) -> Result<Self, StoreError> {
        conn.execute_batch(SQLITE_SCHEMA)?;
        for migration in SQLITE_MIGRATIONS {
            let _ = conn.execute(migration, []);
        }
        Ok(Self {
            conn: Mutex::new(conn),
            location: format!("sqlite:{}", path.display()),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-transaction rolls the transaction back, so the
        // connection is still usable after poisoning.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CatalogStore for SqliteStore {
    fn load(&self) -> Result<Vec<PhotoRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(SELECT_PHOTOS)?;
        let photos = stmt
            .query_map([], |row| {
                Ok(PhotoRecord {
                    id: row.get(0)?,
                    image_path: row.get(1)?,
                    caption: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    fn last_id(&self) -> Result<i64, StoreError> {
        let last_id = self
            .conn()
            .query_row(SELECT_LAST_ID, [], |row| row.get(0))
            .optional()?;
        Ok(last_id.unwrap_or(0))
    }

    fn save(&self, photos: &[PhotoRecord], last_id: i64) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM photo", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO photo (id, image_path, caption, sort_order) VALUES (?, ?, ?, ?)",
            )?;
            for (position, photo) in photos.iter().enumerate() {
                insert.execute(rusqlite::params![
                    photo.id,
                    photo.image_path,
                    photo.caption,
                    position as i64
                ])?;
            }
        }
        tx.execute(SQLITE_UPSERT_LAST_ID, [last_id])?;
        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.location.clone()
    }
}
