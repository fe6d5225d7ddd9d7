//! File Tier
//!
//! The durable tier: one zlib-compressed JSON record per key, stored directly
//! in the cache directory under the key itself. Reads are fail-safe; a file
//! that cannot be decompressed or decoded is deleted on first contact.

use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use crate::cache::key::is_valid_key;
use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

/// Suffix of in-progress writes
const TEMP_SUFFIX: &str = "tmp";

// == File Store ==
/// Compressed per-key files in a single directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path used for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    // == Read ==
    /// Loads the entry for `key`.
    ///
    /// Any failure reads as absent. A file that exists but cannot be
    /// decompressed or decoded is removed.
    pub fn read(&self, key: &str) -> Option<CacheEntry> {
        let path = self.path_for(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("Failed to read cache file {}: {}", path.display(), err);
                return None;
            }
        };

        match decode(&raw) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Removing corrupted cache file {}: {}", path.display(), err);
                if let Err(err) = self.delete(key) {
                    warn!("Failed to remove corrupted cache file: {}", err);
                }
                None
            }
        }
    }

    // == Write ==
    /// Persists `entry` under `key`, replacing any existing file.
    ///
    /// The record is written to a temporary sibling and renamed into place.
    pub fn write(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        self.ensure_dir()?;

        let bytes = encode(entry)?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{}.{}", key, TEMP_SUFFIX));

        fs::write(&tmp, &bytes).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            CacheError::Io {
                path: path.clone(),
                source,
            }
        })?;

        debug!("Wrote cache file {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    // == Delete ==
    /// Removes the file for `key`. A missing file is not an error.
    pub fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    // == List Keys ==
    /// Lists the keys stored in the directory.
    ///
    /// A missing or unreadable directory yields no keys. Names that are not
    /// valid keys, such as in-progress temporary files, are skipped.
    pub fn list_keys(&self) -> Vec<String> {
        let Ok(dir) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        dir.filter_map(|item| item.ok())
            .filter(|item| item.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|item| item.file_name().into_string().ok())
            .filter(|name| is_valid_key(name))
            .collect()
    }

    fn ensure_dir(&self) -> Result<()> {
        if self.dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })
    }
}

fn encode(entry: &CacheEntry) -> Result<Vec<u8>> {
    let text = entry.to_json()?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(text.as_bytes())
        .and_then(|_| encoder.finish())
        .map_err(|err| CacheError::Serialization(format!("compression failed: {}", err)))
}

fn decode(raw: &[u8]) -> Result<CacheEntry> {
    let mut text = String::new();
    ZlibDecoder::new(raw)
        .read_to_string(&mut text)
        .map_err(|err| CacheError::Serialization(format!("decompression failed: {}", err)))?;
    CacheEntry::from_json(&text)
}
