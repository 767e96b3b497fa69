//! Per-network publication indexes (data/archive.json, data/atproto_posts.json)
//!
//! Each index is a JSON object holding a single array of records keyed by the
//! note's uuid. Loading never fails: a missing, malformed or mis-shaped file
//! degrades to an empty record list with a log line. Saving keeps a `.bak`
//! copy of the previous file and replaces the destination through a temp file
//! and an atomic rename, so readers never observe a half-written index.

pub mod archive;
pub mod posts;
pub mod sanitize;

pub use archive::{record_upload, ArchiveHash, ArchiveRecord};
pub use posts::{record_post, PostRecord};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// A record stored in one of the publication indexes
pub trait IndexRecord: Serialize + DeserializeOwned + Clone {
    /// Top-level JSON key holding the record array ("files" or "posts")
    const COLLECTION_KEY: &'static str;

    /// The note uuid this record belongs to
    fn identifier(&self) -> &str;
}

/// Index persistence failure
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to create index directory {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize index {}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write index {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// File-backed store for one network's records
#[derive(Debug, Clone)]
pub struct IndexStore<R> {
    path: PathBuf,
    _record: PhantomData<R>,
}

impl<R: IndexRecord> IndexStore<R> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling holding the previous version of the index
    pub fn backup_path(&self) -> PathBuf {
        with_added_suffix(&self.path, "bak")
    }

    /// Sibling the new index is written to before the rename
    pub fn temp_path(&self) -> PathBuf {
        with_added_suffix(&self.path, "tmp")
    }

    /// Load all records, or an empty list if the index cannot be used
    pub fn load(&self) -> Vec<R> {
        if !self.path.exists() {
            warn!(
                "Index file not found at {}, returning empty list.",
                self.path.display()
            );
            return Vec::new();
        }

        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Error reading index file {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        let repaired = sanitize::strip_trailing_commas(&raw);
        let mut document: serde_json::Value = match serde_json::from_str(&repaired) {
            Ok(value) => value,
            Err(e) => {
                error!("Error parsing index file {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        let Some(records) = document
            .as_object_mut()
            .and_then(|obj| obj.remove(R::COLLECTION_KEY))
        else {
            warn!(
                "Index {} has invalid structure (no '{}' key), returning empty list.",
                self.path.display(),
                R::COLLECTION_KEY
            );
            return Vec::new();
        };

        if !records.is_array() {
            error!(
                "Index {} '{}' key is not a list.",
                self.path.display(),
                R::COLLECTION_KEY
            );
            return Vec::new();
        }

        match serde_json::from_value::<Vec<R>>(records) {
            Ok(records) => {
                info!("Loaded {} entries from {}", records.len(), self.path.display());
                records
            }
            Err(e) => {
                error!(
                    "Index {} contains malformed records: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Replace the index with `records`.
    ///
    /// On failure the destination is restored from the `.bak` sibling, but
    /// only when that backup was taken by this call.
    pub fn save(&self, records: &[R]) -> Result<(), IndexError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| IndexError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let backup = self.backup_path();
        let backed_up = self.path.exists()
            && match fs::copy(&self.path, &backup) {
                Ok(_) => {
                    debug!("Created backup of index at {}", backup.display());
                    true
                }
                Err(e) => {
                    warn!("Failed to create index backup {}: {}", backup.display(), e);
                    false
                }
            };

        match self.write_atomically(records) {
            Ok(()) => {
                info!(
                    "Successfully saved {} entries to {}",
                    records.len(),
                    self.path.display()
                );
                Ok(())
            }
            Err(e) => {
                error!("Error saving index file {}: {}", self.path.display(), e);
                let _ = fs::remove_file(self.temp_path());
                if backed_up {
                    match fs::copy(&backup, &self.path) {
                        Ok(_) => info!(
                            "Restored index from backup {} after save error.",
                            backup.display()
                        ),
                        Err(restore) => {
                            error!("Failed to restore index from backup: {}", restore)
                        }
                    }
                }
                Err(e)
            }
        }
    }

    fn write_atomically(&self, records: &[R]) -> Result<(), IndexError> {
        let mut document = serde_json::Map::new();
        let array = serde_json::to_value(records).map_err(|source| IndexError::Serialize {
            path: self.path.clone(),
            source,
        })?;
        document.insert(R::COLLECTION_KEY.to_string(), array);

        let content = serde_json::to_string_pretty(&serde_json::Value::Object(document))
            .map_err(|source| IndexError::Serialize {
                path: self.path.clone(),
                source,
            })?;

        let temp = self.temp_path();
        let write_err = |source: std::io::Error| IndexError::Write {
            path: temp.clone(),
            source,
        };
        let mut file = fs::File::create(&temp).map_err(write_err)?;
        file.write_all(content.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        fs::rename(&temp, &self.path).map_err(|source| IndexError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Update the record for `identifier` in place, or append a new one.
///
/// Returns true when a new record was appended.
pub fn find_or_append<R: IndexRecord>(
    records: &mut Vec<R>,
    identifier: &str,
    create: impl FnOnce() -> R,
    update: impl FnOnce(&mut R),
) -> bool {
    match records.iter_mut().find(|r| r.identifier() == identifier) {
        Some(existing) => {
            update(existing);
            debug!("Updated existing index entry for {}", identifier);
            false
        }
        None => {
            records.push(create());
            debug!("Created new index entry for {}", identifier);
            true
        }
    }
}

fn with_added_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
