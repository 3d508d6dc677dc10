//! Durable catalog of photo records.
//!
//! The catalog is an ordered list of [`PhotoRecord`]s held by one
//! [`CatalogStore`] backend chosen at startup. Every backend replaces the
//! whole persisted list on `save`, so a concurrent `load` sees either the old
//! or the new catalog. Two writers racing on `save` resolve as last writer
//! wins.

mod schema;
pub mod json;
pub mod service;
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

use anyhow::Result;
use serde::{Deserialize, Serialize};
#[cfg(not(feature = "postgres"))]
use anyhow::bail;

pub use json::JsonStore;
pub use service::{CatalogError, CatalogService, FileRemoval, Removal};
pub use sqlite::SqliteStore;

use crate::config::{CatalogBackend, CatalogConfig};

/// Records appended to an empty catalog when `seed_demo_photos` is enabled.
pub const DEMO_PHOTOS: &[(&str, &str)] = &[
    ("1.jpg", "Токио, район Синдзюку"),
    ("2.jpg", "Храм Сэнсо-дзи"),
    ("3.jpg", "Башня Скайтри"),
];

/// One photo in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: i64,
    /// Relative to the static root, e.g. `images/20250101_120000_cat.png`.
    pub image_path: String,
    pub caption: String,
}

/// Failure of the persistence medium. Any variant means the store is unavailable.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Postgres(#[from] ::postgres::Error),

    #[cfg(feature = "postgres")]
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("corrupt catalog: {0}")]
    Corrupt(String),
}

/// Persistence contract shared by every catalog backend.
pub trait CatalogStore: Send + Sync {
    /// Read the full catalog in insertion order. A medium that does not exist
    /// yet reads as an empty catalog.
    fn load(&self) -> Result<Vec<PhotoRecord>, StoreError>;

    /// Highest id ever assigned in this catalog, including ids of removed
    /// records. 0 for a fresh medium or one written before this was tracked.
    fn last_id(&self) -> Result<i64, StoreError>;

    /// Replace the persisted catalog with `photos` and record `last_id`, all
    /// or nothing.
    fn save(&self, photos: &[PhotoRecord], last_id: i64) -> Result<(), StoreError>;

    /// Human readable location, for logs.
    fn describe(&self) -> String;
}

/// Open the backend selected by `config.backend`.
pub fn open_store(config: &CatalogConfig) -> Result<Box<dyn CatalogStore>> {
    match config.backend {
        CatalogBackend::Json => Ok(Box::new(JsonStore::new(&config.json_path))),
        CatalogBackend::Sqlite => Ok(Box::new(SqliteStore::open(&config.sqlite_path)?)),
        CatalogBackend::Postgresql => open_postgres(config),
    }
}

#[cfg(feature = "postgres")]
fn open_postgres(config: &CatalogConfig) -> Result<Box<dyn CatalogStore>> {
    let url = config
        .postgresql_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("PostgreSQL URL not configured"))?;
    let pool_size = config.pool_size.unwrap_or(4);
    Ok(Box::new(postgres::PgStore::open(url, pool_size)?))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(_config: &CatalogConfig) -> Result<Box<dyn CatalogStore>> {
    bail!("catalog backend 'postgresql' requires building with --features postgres")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_json_store() {
        let dir = tempdir().unwrap();
        let config = CatalogConfig {
            backend: CatalogBackend::Json,
            json_path: dir.path().join("photos.json"),
            ..CatalogConfig::default()
        };

        let store = open_store(&config).unwrap();
        assert!(store.load().unwrap().is_empty());
        assert!(store.describe().contains("photos.json"));
    }

    #[test]
    fn test_open_sqlite_store() {
        let dir = tempdir().unwrap();
        let config = CatalogConfig {
            backend: CatalogBackend::Sqlite,
            sqlite_path: dir.path().join("db").join("photos.db"),
            ..CatalogConfig::default()
        };

        let store = open_store(&config).unwrap();
        assert!(store.load().unwrap().is_empty());
        assert!(dir.path().join("db").join("photos.db").exists());
    }

    #[cfg(not(feature = "postgres"))]
    #[test]
    fn test_postgres_requires_feature() {
        let config = CatalogConfig {
            backend: CatalogBackend::Postgresql,
            postgresql_url: Some("postgresql://localhost/photos_db".to_string()),
            ..CatalogConfig::default()
        };

        assert!(open_store(&config).is_err());
    }
}
