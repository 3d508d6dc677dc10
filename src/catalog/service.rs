//! CRUD operations over a [`CatalogStore`].
//!
//! Each mutation is a full load-modify-save against the store. Mutations
//! made through one service are serialized by an internal lock; writers in
//! other processes race as last writer wins.
//!
//! New ids come from the store's persisted `last_id`, so an id freed by a
//! removal is not handed out again, even after a restart.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use super::{CatalogStore, PhotoRecord, StoreError};

/// Column width of `image_path` and `caption` in the SQL backends.
pub const MAX_FIELD_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("photo {0} not found")]
    NotFound(i64),

    #[error("catalog store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

/// What happened to the backing file of a removed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRemoval {
    Deleted,
    /// Nothing was stored at the path.
    Missing,
    /// The path escapes the content root and was left alone.
    Skipped,
    Failed(String),
}

/// A record taken out of the catalog.
#[derive(Debug, Clone)]
pub struct Removal {
    pub record: PhotoRecord,
    pub file: FileRemoval,
}

pub struct CatalogService {
    store: Box<dyn CatalogStore>,
    /// Directory `image_path`s are relative to.
    content_root: PathBuf,
    write_lock: Mutex<()>,
}

impl CatalogService {
    pub fn new(store: Box<dyn CatalogStore>, content_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            content_root: content_root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn store_description(&self) -> String {
        self.store.describe()
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persisted id mark, or the largest id present for media written
    /// before the mark existed.
    fn last_id(&self, photos: &[PhotoRecord]) -> Result<i64, CatalogError> {
        let max_id = photos.iter().map(|p| p.id).max().unwrap_or(0);
        Ok(self.store.last_id()?.max(max_id))
    }

    /// All records in insertion order.
    pub fn list(&self) -> Result<Vec<PhotoRecord>, CatalogError> {
        Ok(self.store.load()?)
    }

    pub fn get(&self, id: i64) -> Result<PhotoRecord, CatalogError> {
        self.store
            .load()?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or(CatalogError::NotFound(id))
    }

    /// Append a record with the next free id and persist it.
    pub fn append(&self, image_path: &str, caption: &str) -> Result<PhotoRecord, CatalogError> {
        let image_path = require_field("image_path", image_path)?;
        let caption = require_field("caption", caption)?;

        let _guard = self.lock();
        let mut photos = self.store.load()?;
        let id = self.last_id(&photos)? + 1;

        let record = PhotoRecord {
            id,
            image_path: image_path.to_string(),
            caption: caption.to_string(),
        };
        photos.push(record.clone());
        self.store.save(&photos, id)?;

        info!(id, image_path = %record.image_path, "Photo added to catalog");
        Ok(record)
    }

    pub fn update_caption(&self, id: i64, new_caption: &str) -> Result<PhotoRecord, CatalogError> {
        let caption = require_field("caption", new_caption)?;

        let _guard = self.lock();
        let mut photos = self.store.load()?;
        let last_id = self.last_id(&photos)?;

        let photo = photos
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(CatalogError::NotFound(id))?;
        photo.caption = caption.to_string();
        let updated = photo.clone();

        self.store.save(&photos, last_id)?;

        info!(id, "Photo caption updated");
        Ok(updated)
    }

    /// Remove a record and its backing file.
    ///
    /// Persisting the shortened catalog and deleting the file are attempted
    /// independently. A file that cannot be deleted is reported in
    /// [`Removal::file`]; a catalog that cannot be saved is returned as
    /// `StoreUnavailable` after the file deletion was still attempted.
    pub fn remove(&self, id: i64) -> Result<Removal, CatalogError> {
        let _guard = self.lock();
        let mut photos = self.store.load()?;
        let last_id = self.last_id(&photos)?;

        let index = photos
            .iter()
            .position(|p| p.id == id)
            .ok_or(CatalogError::NotFound(id))?;
        let record = photos.remove(index);

        let persisted = self.store.save(&photos, last_id);
        if let Err(e) = &persisted {
            error!(id, error = %e, "Failed to persist catalog after removing photo");
        }

        let file = self.remove_file(&record.image_path);
        persisted?;

        info!(id, image_path = %record.image_path, file = ?file, "Photo removed from catalog");
        Ok(Removal { record, file })
    }

    /// Append `seed` entries when the catalog holds no records.
    pub fn seed_if_empty(&self, seed: &[(&str, &str)]) -> Result<usize, CatalogError> {
        if !self.store.load()?.is_empty() {
            return Ok(0);
        }
        for (image_path, caption) in seed {
            self.append(image_path, caption)?;
        }
        info!(count = seed.len(), "Seeded empty catalog");
        Ok(seed.len())
    }

    fn remove_file(&self, image_path: &str) -> FileRemoval {
        let relative = Path::new(image_path);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            warn!(image_path, "Refusing to delete file outside the content root");
            return FileRemoval::Skipped;
        }

        let path = self.content_root.join(relative);
        match fs::remove_file(&path) {
            Ok(()) => FileRemoval::Deleted,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "Photo file already missing");
                FileRemoval::Missing
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to delete photo file");
                FileRemoval::Failed(e.to_string())
            }
        }
    }
}

/// Trimmed `value`, rejecting empty and over-long input.
fn require_field<'a>(name: &str, value: &'a str) -> Result<&'a str, CatalogError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::InvalidInput(format!("{name} must not be empty")));
    }
    if value.chars().count() > MAX_FIELD_CHARS {
        return Err(CatalogError::InvalidInput(format!(
            "{name} must be at most {MAX_FIELD_CHARS} characters"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{JsonStore, SqliteStore};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn service() -> (TempDir, CatalogService) {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("photos.json"));
        let service = CatalogService::new(Box::new(store), dir.path().join("static"));
        (dir, service)
    }

    /// Delegates to a JSON store until `fail` is set.
    struct FlakyStore {
        inner: JsonStore,
        fail: Arc<AtomicBool>,
    }

    impl CatalogStore for FlakyStore {
        fn load(&self) -> Result<Vec<PhotoRecord>, StoreError> {
            self.inner.load()
        }

        fn last_id(&self) -> Result<i64, StoreError> {
            self.inner.last_id()
        }

        fn save(&self, photos: &[PhotoRecord], last_id: i64) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::new(ErrorKind::Other, "disk full")));
            }
            self.inner.save(photos, last_id)
        }

        fn describe(&self) -> String {
            "flaky".to_string()
        }
    }

    fn flaky_service() -> (TempDir, CatalogService, Arc<AtomicBool>) {
        let dir = tempdir().unwrap();
        let fail = Arc::new(AtomicBool::new(false));
        let store = FlakyStore {
            inner: JsonStore::new(dir.path().join("photos.json")),
            fail: fail.clone(),
        };
        let service = CatalogService::new(Box::new(store), dir.path().join("static"));
        (dir, service, fail)
    }

    #[test]
    fn test_first_id_is_one() {
        let (_dir, service) = service();
        let record = service.append("images/a.png", "first").unwrap();
        assert_eq!(record.id, 1);
    }

    #[test]
    fn test_append_id_exceeds_existing() {
        let (dir, service) = service();
        JsonStore::new(dir.path().join("photos.json"))
            .save(
                &[
                    PhotoRecord { id: 9, image_path: "9.jpg".into(), caption: "nine".into() },
                    PhotoRecord { id: 4, image_path: "4.jpg".into(), caption: "four".into() },
                ],
                0,
            )
            .unwrap();

        let record = service.append("images/b.png", "next").unwrap();
        assert_eq!(record.id, 10);
    }

    #[test]
    fn test_append_then_list_contains_record_once() {
        let (_dir, service) = service();
        service.append("1.jpg", "Shinjuku").unwrap();
        let added = service.append("images/cat.png", "  A cat  ").unwrap();

        let photos = service.list().unwrap();
        let matching: Vec<_> = photos.iter().filter(|p| p.id == added.id).collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].image_path, "images/cat.png");
        assert_eq!(matching[0].caption, "A cat");
        assert_eq!(photos.last().unwrap().id, added.id);
    }

    #[test]
    fn test_append_rejects_empty_and_long_fields() {
        let (_dir, service) = service();
        assert!(matches!(
            service.append("images/a.png", "   "),
            Err(CatalogError::InvalidInput(_))
        ));
        assert!(matches!(service.append("", "caption"), Err(CatalogError::InvalidInput(_))));
        assert!(matches!(
            service.append("images/a.png", &"x".repeat(MAX_FIELD_CHARS + 1)),
            Err(CatalogError::InvalidInput(_))
        ));
        assert!(service.list().unwrap().is_empty());
    }

    #[test]
    fn test_update_caption() {
        let (_dir, service) = service();
        let record = service.append("1.jpg", "old").unwrap();

        let updated = service.update_caption(record.id, "new").unwrap();
        assert_eq!(updated.caption, "new");
        assert_eq!(service.get(record.id).unwrap().caption, "new");
    }

    #[test]
    fn test_update_caption_empty_is_rejected() {
        let (_dir, service) = service();
        let record = service.append("1.jpg", "kept").unwrap();

        assert!(matches!(
            service.update_caption(record.id, ""),
            Err(CatalogError::InvalidInput(_))
        ));
        assert_eq!(service.get(record.id).unwrap().caption, "kept");
    }

    #[test]
    fn test_update_caption_unknown_id() {
        let (_dir, service) = service();
        service.append("1.jpg", "one").unwrap();
        assert!(matches!(
            service.update_caption(42, "nope"),
            Err(CatalogError::NotFound(42))
        ));
    }

    #[test]
    fn test_remove_deletes_record_and_file() {
        let (dir, service) = service();
        fs::create_dir_all(dir.path().join("static/images")).unwrap();
        fs::write(dir.path().join("static/images/a.png"), b"png").unwrap();

        let keep = service.append("1.jpg", "keep").unwrap();
        let gone = service.append("images/a.png", "gone").unwrap();

        let removal = service.remove(gone.id).unwrap();
        assert_eq!(removal.record, gone);
        assert_eq!(removal.file, FileRemoval::Deleted);
        assert!(!dir.path().join("static/images/a.png").exists());
        assert_eq!(service.list().unwrap(), vec![keep]);
    }

    #[test]
    fn test_remove_unknown_id_leaves_catalog() {
        let (_dir, service) = service();
        service.append("1.jpg", "one").unwrap();
        let before = service.list().unwrap();

        assert!(matches!(service.remove(7), Err(CatalogError::NotFound(7))));
        assert_eq!(service.list().unwrap(), before);
    }

    #[test]
    fn test_remove_with_missing_file_still_removes_record() {
        let (_dir, service) = service();
        let record = service.append("images/never-stored.png", "ghost").unwrap();

        let removal = service.remove(record.id).unwrap();
        assert_eq!(removal.file, FileRemoval::Missing);
        assert!(service.list().unwrap().is_empty());
    }

    #[test]
    fn test_remove_skips_paths_outside_root() {
        let (dir, service) = service();
        fs::write(dir.path().join("secret.txt"), b"keep me").unwrap();
        let record = service.append("../secret.txt", "escape").unwrap();

        let removal = service.remove(record.id).unwrap();
        assert_eq!(removal.file, FileRemoval::Skipped);
        assert!(dir.path().join("secret.txt").exists());
    }

    #[test]
    fn test_removed_newest_id_is_not_reused() {
        let (_dir, service) = service();
        service.append("1.jpg", "one").unwrap();
        let newest = service.append("2.jpg", "two").unwrap();
        service.remove(newest.id).unwrap();

        let next = service.append("3.jpg", "three").unwrap();
        assert_eq!(next.id, newest.id + 1);
    }

    #[test]
    fn test_removed_id_stays_retired_after_reopen_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photos.json");

        let first = CatalogService::new(Box::new(JsonStore::new(&path)), dir.path());
        first.append("1.jpg", "one").unwrap();
        let newest = first.append("2.jpg", "two").unwrap();
        first.remove(newest.id).unwrap();
        drop(first);

        let reopened = CatalogService::new(Box::new(JsonStore::new(&path)), dir.path());
        assert_eq!(reopened.append("3.jpg", "three").unwrap().id, newest.id + 1);
    }

    #[test]
    fn test_removed_id_stays_retired_after_reopen_sqlite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photos.db");

        let first = CatalogService::new(Box::new(SqliteStore::open(&path).unwrap()), dir.path());
        first.append("1.jpg", "one").unwrap();
        let newest = first.append("2.jpg", "two").unwrap();
        first.remove(newest.id).unwrap();
        drop(first);

        let reopened =
            CatalogService::new(Box::new(SqliteStore::open(&path).unwrap()), dir.path());
        assert_eq!(reopened.append("3.jpg", "three").unwrap().id, newest.id + 1);
        assert_eq!(reopened.list().unwrap().iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_store_failure_on_append() {
        let (_dir, service, fail) = flaky_service();
        service.append("1.jpg", "one").unwrap();

        fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            service.append("2.jpg", "two"),
            Err(CatalogError::StoreUnavailable(_))
        ));

        fail.store(false, Ordering::SeqCst);
        let photos = service.list().unwrap();
        assert_eq!(photos.len(), 1);
        // The id of the failed append was never persisted
        assert_eq!(service.append("2.jpg", "two").unwrap().id, 2);
    }

    #[test]
    fn test_store_failure_on_remove_still_deletes_file() {
        let (dir, service, fail) = flaky_service();
        fs::create_dir_all(dir.path().join("static")).unwrap();
        fs::write(dir.path().join("static/1.jpg"), b"jpg").unwrap();
        let record = service.append("1.jpg", "one").unwrap();

        fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            service.remove(record.id),
            Err(CatalogError::StoreUnavailable(_))
        ));
        assert!(!dir.path().join("static/1.jpg").exists());

        fail.store(false, Ordering::SeqCst);
        assert_eq!(service.list().unwrap(), vec![record]);
    }

    #[test]
    fn test_seed_if_empty() {
        let (_dir, service) = service();
        let seed = [("1.jpg", "one"), ("2.jpg", "two")];

        assert_eq!(service.seed_if_empty(&seed).unwrap(), 2);
        assert_eq!(service.seed_if_empty(&seed).unwrap(), 0);
        assert_eq!(service.list().unwrap().len(), 2);
    }
}
