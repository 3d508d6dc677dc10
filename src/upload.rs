//! Validation and storage of uploaded photo files.
//!
//! A file is checked against [`UploadGate::validate`] before anything is
//! written. Content goes to a hidden temp file in the images directory, is
//! synced, and only then renamed to its final name, so a failed upload never
//! leaves a partial file and a catalog record never points at unsynced data.

use chrono::{Local, NaiveDateTime};
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use tempfile::Builder;
use tracing::{error, info, warn};

use crate::catalog::service::MAX_FIELD_CHARS;
use crate::catalog::{CatalogError, CatalogService, PhotoRecord};
use crate::config::Config;

/// Renames tried when a storage name is already taken.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Width of the longest `_{n}` suffix a collision rename adds.
const COLLISION_SUFFIX_CHARS: usize = 3;

/// Width of the `YYYYMMDD_HHMMSS_` prefix.
const TIMESTAMP_CHARS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("missing-file")]
    MissingFile,

    #[error("unsupported-type")]
    UnsupportedType,

    #[error("too-large")]
    TooLarge,

    #[error("missing-caption")]
    MissingCaption,
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::MissingFile => "missing-file",
            Rejection::UnsupportedType => "unsupported-type",
            Rejection::TooLarge => "too-large",
            Rejection::MissingCaption => "missing-caption",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("failed to store upload: {0}")]
    StorageFailure(#[source] io::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// A file written to the images directory.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub file_name: String,
    pub path: PathBuf,
    /// Path recorded in the catalog, relative to the static root.
    pub image_path: String,
}

pub struct UploadGate {
    images_dir: PathBuf,
    image_path_prefix: String,
    allowed_extensions: Vec<String>,
    max_bytes: u64,
    /// Longest storage name whose catalog `image_path` still fits a field.
    max_name_chars: usize,
}

impl UploadGate {
    pub fn new(
        images_dir: impl Into<PathBuf>,
        image_path_prefix: &str,
        allowed_extensions: &[String],
        max_bytes: u64,
    ) -> Self {
        let image_path_prefix = image_path_prefix.trim_matches('/').to_string();
        let prefix_chars = match image_path_prefix.chars().count() {
            0 => 0,
            n => n + 1,
        };

        Self {
            images_dir: images_dir.into(),
            max_name_chars: MAX_FIELD_CHARS.saturating_sub(prefix_chars + COLLISION_SUFFIX_CHARS),
            image_path_prefix,
            allowed_extensions: allowed_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            max_bytes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.images_dir(),
            &config.upload.images_subdir,
            &config.upload.allowed_extensions,
            config.upload.max_bytes,
        )
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Check an upload and return the name it will be stored under.
    ///
    /// Rules apply in order and the first failure wins: non-empty filename,
    /// allowed extension, size ceiling, non-blank caption.
    pub fn validate(
        &self,
        filename: &str,
        declared_size: u64,
        caption: &str,
    ) -> Result<String, Rejection> {
        self.validate_at(filename, declared_size, caption, Local::now().naive_local())
    }

    fn validate_at(
        &self,
        filename: &str,
        declared_size: u64,
        caption: &str,
        now: NaiveDateTime,
    ) -> Result<String, Rejection> {
        if filename.trim().is_empty() {
            return Err(Rejection::MissingFile);
        }

        let extension = extension_of(filename).ok_or(Rejection::UnsupportedType)?;
        if !self.allowed_extensions.contains(&extension) {
            return Err(Rejection::UnsupportedType);
        }

        if declared_size > self.max_bytes {
            return Err(Rejection::TooLarge);
        }

        if caption.trim().is_empty() {
            return Err(Rejection::MissingCaption);
        }

        Ok(storage_name(filename, now, self.max_name_chars))
    }

    /// Write `content` under `storage_name`, or a numbered variant of it if
    /// the name is taken.
    pub fn store(&self, storage_name: &str, content: &[u8]) -> io::Result<StoredUpload> {
        fs::create_dir_all(&self.images_dir)?;

        // Removed on drop unless persisted
        let mut tmp = Builder::new()
            .prefix(".upload-")
            .tempfile_in(&self.images_dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;

        let (stem, extension) = split_name(storage_name);
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = if attempt == 0 {
                storage_name.to_string()
            } else {
                format!("{stem}_{attempt}{extension}")
            };
            let path = self.images_dir.join(&file_name);

            match tmp.persist_noclobber(&path) {
                Ok(_) => {
                    let image_path = if self.image_path_prefix.is_empty() {
                        file_name.clone()
                    } else {
                        format!("{}/{}", self.image_path_prefix, file_name)
                    };
                    return Ok(StoredUpload {
                        file_name,
                        path,
                        image_path,
                    });
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => tmp = e.file,
                Err(e) => return Err(e.error),
            }
        }

        Err(io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free storage name for {storage_name}"),
        ))
    }

    /// Delete a stored file whose catalog record could not be created.
    pub fn discard(&self, stored: &StoredUpload) {
        match fs::remove_file(&stored.path) {
            Ok(()) => info!(path = %stored.path.display(), "Discarded uploaded file"),
            Err(e) => error!(
                path = %stored.path.display(),
                error = %e,
                "Failed to discard uploaded file"
            ),
        }
    }
}

/// Validate, store and catalog one upload.
///
/// The stored file is deleted again when the catalog append fails.
pub fn accept(
    gate: &UploadGate,
    catalog: &CatalogService,
    filename: &str,
    content: &[u8],
    caption: &str,
) -> Result<PhotoRecord, UploadError> {
    let storage_name = gate
        .validate(filename, content.len() as u64, caption)
        .inspect_err(|rejection| {
            warn!(filename, size = content.len(), reason = rejection.reason(), "Upload rejected");
        })?;

    let stored = gate.store(&storage_name, content).map_err(|e| {
        error!(filename, storage_name = %storage_name, error = %e, "Failed to store upload");
        UploadError::StorageFailure(e)
    })?;

    match catalog.append(&stored.image_path, caption) {
        Ok(record) => Ok(record),
        Err(e) => {
            error!(image_path = %stored.image_path, error = %e, "Failed to catalog upload");
            gate.discard(&stored);
            Err(e.into())
        }
    }
}

/// Lowercased substring after the final `.` of the file's base name.
fn extension_of(filename: &str) -> Option<String> {
    let (_, extension) = base_name(filename).rsplit_once('.')?;
    if extension.is_empty() {
        None
    } else {
        Some(extension.to_ascii_lowercase())
    }
}

fn base_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

/// `YYYYMMDD_HHMMSS_` followed by the sanitized base name, at most
/// `max_chars` long.
pub fn storage_name(filename: &str, now: NaiveDateTime, max_chars: usize) -> String {
    format!(
        "{}{}",
        now.format("%Y%m%d_%H%M%S_"),
        sanitize_filename(filename, max_chars.saturating_sub(TIMESTAMP_CHARS))
    )
}

/// Reduce a client filename to `[A-Za-z0-9._-]` with a lowercase extension,
/// shortening the stem to keep the result within `max_chars`.
pub fn sanitize_filename(filename: &str, max_chars: usize) -> String {
    let base = base_name(filename);
    let (stem, extension) = match base.rsplit_once('.') {
        Some((stem, extension)) => (stem, Some(extension)),
        None => (base, None),
    };

    let extension: String = extension
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let extension_chars = if extension.is_empty() { 0 } else { extension.len() + 1 };
    let stem_budget = max_chars.saturating_sub(extension_chars).max(1);

    let cleaned: String = stem
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    let mut stem = cleaned.trim_matches(|c| c == '.' || c == '_').to_string();
    if stem.is_empty() {
        stem = "upload".to_string();
    }
    // Only ASCII survives the filter, so any byte index is a char boundary
    stem.truncate(stem_budget);
    let stem = stem.trim_end_matches(|c| c == '.' || c == '_');

    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{extension}")
    }
}

/// `("name", ".ext")`, or `("name", "")` without an extension.
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}
