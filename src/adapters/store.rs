//! Document storage adapters.
//!
//! Implements [`StoragePort`] for the controller.
//!
//! - [`FileStore`]: one JSON file per document at
//!   `<root>/<namespace>/<key>.json`.  Writes go to a temporary file that
//!   is renamed over the target, so a crash mid-write leaves the previous
//!   document intact.
//! - [`MemoryStore`]: in-process map used by tests and `--dry-run`.
//!
//! Namespace isolation: each subsystem (history, presets, settings) uses
//! its own directory.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the data directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            warn!("FileStore: cannot create {}: {}", root.display(), e);
            StorageError::IoError
        })?;
        info!("FileStore: data directory {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, namespace: &str, key: &str) -> Result<PathBuf, StorageError> {
        // Names become path components; refuse anything that could escape the root.
        let safe = |s: &str| {
            !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\', '\0'])
        };
        if !safe(namespace) || !safe(key) {
            return Err(StorageError::NotFound);
        }
        Ok(self.root.join(namespace).join(format!("{key}.json")))
    }
}

impl StoragePort for FileStore {
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path(namespace, key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound,
            _ => {
                warn!("FileStore: read {} failed: {}", path.display(), e);
                StorageError::IoError
            }
        })
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path(namespace, key)?;
        let dir = self.root.join(namespace);
        let tmp = dir.join(format!(".{key}.json.tmp"));

        let result = fs::create_dir_all(&dir)
            .and_then(|()| {
                let mut file = fs::File::create(&tmp)?;
                file.write_all(data)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&tmp, &path));

        result.map_err(|e| {
            warn!("FileStore: write {} failed: {}", path.display(), e);
            let _ = fs::remove_file(&tmp);
            StorageError::IoError
        })
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let path = self.path(namespace, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("FileStore: delete {} failed: {}", path.display(), e);
                Err(StorageError::IoError)
            }
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.path(namespace, key).is_ok_and(|p| p.is_file())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    docs: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{namespace}::{key}")
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl StoragePort for MemoryStore {
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.docs
            .get(&Self::composite_key(namespace, key))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.docs
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.docs.remove(&Self::composite_key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.docs.contains_key(&Self::composite_key(namespace, key))
    }
}
