//! File-backed credential store
//!
//! The cache lives in a single JSON file. Replacement writes the new mapping
//! to a temporary file in the same directory, syncs it, and renames it over
//! the live file. Rename is atomic on POSIX filesystems, so a reader that
//! opens the path gets either the previous file or the new one in full.
//! The sync daemon and the login hook usually run as different processes;
//! this file is the only thing they share.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{CredentialMap, CredentialStore};
use crate::error::StoreError;
use crate::types::CredentialEntry;

/// Default cache directory
pub const DEFAULT_CACHE_DIR: &str = "/var/tmp/k8s_ssh_cache";

/// Cache file name inside the cache directory
const CACHE_FILE_NAME: &str = "credentials.json";

/// On-disk format version
const CACHE_FORMAT_VERSION: u32 = 1;

/// Get the default cache file path
pub fn default_cache_path() -> PathBuf {
    Path::new(DEFAULT_CACHE_DIR).join(CACHE_FILE_NAME)
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    version: u32,
    entries: &'a CredentialMap,
}

#[derive(Deserialize)]
struct CacheFile {
    version: u32,
    #[serde(default)]
    entries: CredentialMap,
}

/// Credential store persisted as a JSON file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Reader handle on `path`. Touches nothing on disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Writer handle on `path`.
    ///
    /// Creates the parent directory, and an empty cache if none exists yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(path);
        if !store.path.exists() {
            tracing::info!("Creating empty credential cache at {:?}", store.path);
            store.replace_all(CredentialMap::new())?;
        }
        Ok(store)
    }

    /// Path of the live cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<CredentialMap, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            // Nothing synced yet: an empty cache, not a broken one
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CredentialMap::new()),
            Err(source) => {
                return Err(StoreError::Unavailable {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let file: CacheFile =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        if file.version != CACHE_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path: self.path.clone(),
                version: file.version,
            });
        }

        Ok(file.entries)
    }

    fn write_atomically(&self, entries: &CredentialMap) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".credentials-")
            .suffix(".tmp")
            .tempfile_in(dir)?;

        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            let contents = CacheFileRef {
                version: CACHE_FORMAT_VERSION,
                entries,
            };
            serde_json::to_writer(&mut writer, &contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            writer.flush()?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        // Make the rename itself durable
        // The new file is already in place; a failed directory sync only
        // weakens durability across a crash
        if let Err(e) = sync_dir(dir) {
            tracing::warn!("Failed to sync cache directory {:?}: {}", dir, e);
        }

        Ok(())
    }
}

/// Flush directory metadata so a completed rename survives a crash
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

impl CredentialStore for FileStore {
    fn get(&self, identity: &str) -> Result<Option<CredentialEntry>, StoreError> {
        Ok(self.read()?.remove(identity))
    }

    fn replace_all(&self, entries: CredentialMap) -> Result<(), StoreError> {
        self.write_atomically(&entries)
            .map_err(|source| StoreError::Commit {
                path: self.path.clone(),
                source,
            })?;
        tracing::debug!("Committed {} credentials to {:?}", entries.len(), self.path);
        Ok(())
    }

    fn snapshot(&self) -> Result<CredentialMap, StoreError> {
        self.read()
    }
}
