//! Whole-collection load/save backends.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use super::StoreError;

/// Reads and replaces one ordered collection as a unit.
///
/// There is no row-level API: callers always receive the full collection
/// and hand back the full collection.
pub trait CollectionBackend<T>: Send + Sync {
    /// Stable name of the backing location; doubles as the lock key.
    fn location(&self) -> &str;

    /// Current records, or an empty collection if nothing usable is stored.
    fn load_all(&self) -> Vec<T>;

    /// Replace the stored collection with `records`.
    fn save_all(&self, records: &[T]) -> Result<(), StoreError>;
}

/// JSON array in a single file, rewritten in full on every save.
pub struct JsonFileBackend<T> {
    path: PathBuf,
    location: String,
    _records: PhantomData<fn() -> T>,
}

impl<T> JsonFileBackend<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let location = location_key(&path);
        Self {
            path,
            location,
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, source: std::io::Error) -> StoreError {
        StoreError::Unavailable {
            location: self.location.clone(),
            source,
        }
    }
}

impl<T> CollectionBackend<T> for JsonFileBackend<T>
where
    T: Serialize + DeserializeOwned,
{
    fn location(&self) -> &str {
        &self.location
    }

    fn load_all(&self) -> Vec<T> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Collection file unreadable, treating as empty"
                );
                return Vec::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Collection file is not a valid record array, treating as empty"
                );
                Vec::new()
            }
        }
    }

    fn save_all(&self, records: &[T]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(records).map_err(|source| StoreError::Encode {
            location: self.location.clone(),
            source,
        })?;

        write_atomic(&self.path, &json).map_err(|e| self.unavailable(e))?;
        Ok(())
    }
}

/// Lock key for a file: the absolute path with `.` components removed, so
/// `./data/users.json` and `data/users.json` share one lock.
pub(crate) fn location_key(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// Replace `path` with `bytes`: temp file in the same directory, fsync, rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    // Same directory as the target so the rename stays on one filesystem.
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Collection held in process memory. Used by tests and ephemeral setups.
pub struct MemoryBackend<T> {
    location: String,
    records: Mutex<Vec<T>>,
}

impl<T> MemoryBackend<T> {
    pub fn new(location: impl Into<String>) -> Self {
        Self::with_records(location, Vec::new())
    }

    pub fn with_records(location: impl Into<String>, records: Vec<T>) -> Self {
        Self {
            location: location.into(),
            records: Mutex::new(records),
        }
    }
}

impl<T> CollectionBackend<T> for MemoryBackend<T>
where
    T: Clone + Send,
{
    fn location(&self) -> &str {
        &self.location
    }

    fn load_all(&self) -> Vec<T> {
        self.records.lock().clone()
    }

    fn save_all(&self, records: &[T]) -> Result<(), StoreError> {
        *self.records.lock() = records.to_vec();
        Ok(())
    }
}
