// Artifact storage: where generated etudes live between requests.
//
// `ArtifactStore` is the seam between the orchestrator and the medium. The
// contract the orchestrator relies on:
// - `stat` reports presence, modification time and length without reading
//   the body;
// - `write_atomic` either replaces the artifact in full or leaves the prior
//   one untouched, so readers never observe a partial file;
// - `open` hands back a reader over one complete version of the artifact.
//
// `FsStore` is the production store: one file per key in a flat directory,
// written through a `tempfile::NamedTempFile` in that same directory and
// persisted (renamed) onto the final name. `MemoryStore` backs the
// orchestrator tests and lets them plant artifacts with chosen mtimes.

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use rustc_hash::FxHashMap;
use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::key::ArtifactKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArtifactMetadata {
    pub modified: SystemTime,
    pub len: u64,
}

/// One complete version of an artifact, ready to stream.
pub struct ArtifactReader {
    pub reader: Box<dyn Read + Send>,
    pub len: u64,
}

impl ArtifactReader {
    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.len as usize);
        self.reader.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

pub trait ArtifactStore: Send + Sync {
    fn stat(&self, key: &ArtifactKey) -> Result<Option<ArtifactMetadata>, StoreError>;
    fn write_atomic(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<(), StoreError>;
    fn open(&self, key: &ArtifactKey) -> Result<ArtifactReader, StoreError>;
}

pub(crate) fn lock_with_recovery<'a, T>(
    mutex: &'a Mutex<T>,
    name: &'static str,
) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(lock = name, "mutex poisoned; recovering inner state");
            poisoned.into_inner()
        }
    }
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    /// Open (creating if needed) the artifact directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Dir {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    fn path(&self, key: &ArtifactKey) -> PathBuf {
        self.dir.join(key.as_str())
    }
}

impl ArtifactStore for FsStore {
    fn stat(&self, key: &ArtifactKey) -> Result<Option<ArtifactMetadata>, StoreError> {
        match fs::metadata(self.path(key)) {
            Ok(meta) => {
                let modified = meta
                    .modified()
                    .map_err(|e| StoreError::io("stat", key, e))?;
                Ok(Some(ArtifactMetadata {
                    modified,
                    len: meta.len(),
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io("stat", key, e)),
        }
    }

    fn write_atomic(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<(), StoreError> {
        // Same directory as the target so the final rename never crosses
        // filesystems.
        let mut tmp =
            NamedTempFile::new_in(&self.dir).map_err(|e| StoreError::io("create", key, e))?;
        tmp.write_all(bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io("write", key, e))?;
        tmp.persist(self.path(key))
            .map_err(|e| StoreError::io("persist", key, e.error))?;
        Ok(())
    }

    fn open(&self, key: &ArtifactKey) -> Result<ArtifactReader, StoreError> {
        let file = match File::open(self.path(key)) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.clone()));
            }
            Err(e) => return Err(StoreError::io("open", key, e)),
        };
        // Length from the open handle, not the path: a concurrent rename
        // replaces the directory entry but not this file.
        let len = file
            .metadata()
            .map_err(|e| StoreError::io("open", key, e))?
            .len();
        Ok(ArtifactReader {
            reader: Box::new(file),
            len,
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

struct StoredArtifact {
    bytes: Vec<u8>,
    modified: SystemTime,
}

#[derive(Default)]
pub struct MemoryStore {
    artifacts: Mutex<FxHashMap<ArtifactKey, StoredArtifact>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` under `key` as if written at `modified`.
    pub fn insert_with_mtime(&self, key: ArtifactKey, bytes: Vec<u8>, modified: SystemTime) {
        lock_with_recovery(&self.artifacts, "memory_store")
            .insert(key, StoredArtifact { bytes, modified });
    }

    pub fn len(&self) -> usize {
        lock_with_recovery(&self.artifacts, "memory_store").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for MemoryStore {
    fn stat(&self, key: &ArtifactKey) -> Result<Option<ArtifactMetadata>, StoreError> {
        Ok(lock_with_recovery(&self.artifacts, "memory_store")
            .get(key)
            .map(|a| ArtifactMetadata {
                modified: a.modified,
                len: a.bytes.len() as u64,
            }))
    }

    fn write_atomic(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<(), StoreError> {
        self.insert_with_mtime(key.clone(), bytes.to_vec(), SystemTime::now());
        Ok(())
    }

    fn open(&self, key: &ArtifactKey) -> Result<ArtifactReader, StoreError> {
        let artifacts = lock_with_recovery(&self.artifacts, "memory_store");
        let artifact = artifacts
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        Ok(ArtifactReader {
            reader: Box::new(Cursor::new(artifact.bytes.clone())),
            len: artifact.bytes.len() as u64,
        })
    }
}
