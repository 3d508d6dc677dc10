//! Flat JSON document backend.
//!
//! The document is `{"photos": [{"id", "image_path", "caption"}, ...],
//! "last_id": n}`. Documents without `last_id` read as 0.
//! `save` writes a sibling temp file, syncs it and renames it over the
//! document, so readers never observe a partial write.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{CatalogStore, PhotoRecord, StoreError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    photos: Vec<PhotoRecord>,

    #[serde(default)]
    last_id: i64,
}

pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn read_document(&self) -> Result<CatalogDocument, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CatalogDocument::default()),
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl CatalogStore for JsonStore {
    fn load(&self) -> Result<Vec<PhotoRecord>, StoreError> {
        Ok(self.read_document()?.photos)
    }

    fn last_id(&self) -> Result<i64, StoreError> {
        Ok(self.read_document()?.last_id)
    }

    fn save(&self, photos: &[PhotoRecord], last_id: i64) -> Result<(), StoreError> {
        let dir = self.parent_dir();
        fs::create_dir_all(dir)?;

        // Dropped (and deleted) on any early return below.
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(
                &mut writer,
                &CatalogDocument {
                    photos: photos.to_vec(),
                    last_id,
                },
            )?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}
