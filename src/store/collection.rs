//! Read-modify-write over one backing collection.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use super::{CollectionBackend, JsonFileBackend, LockRegistry, MemoryBackend, StoreError};

/// Generic load → compute → save cycle over a named collection.
///
/// Reads ([`load_all`](Self::load_all), [`find`](Self::find)) run without the
/// lock and may observe a concurrent writer's result. Writes
/// ([`mutate`](Self::mutate), [`save_all`](Self::save_all)) hold the
/// location's lock for the whole cycle, so concurrent writers are serialized
/// and never overwrite each other's changes.
pub struct CollectionStore<T> {
    backend: Arc<dyn CollectionBackend<T>>,
    locks: Arc<LockRegistry>,
}

impl<T> Clone for CollectionStore<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<T> CollectionStore<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(backend: Arc<dyn CollectionBackend<T>>, locks: Arc<LockRegistry>) -> Self {
        Self { backend, locks }
    }

    /// Collection persisted as a JSON array at `path`.
    pub fn json_file(path: impl Into<PathBuf>, locks: Arc<LockRegistry>) -> Self
    where
        T: Serialize + DeserializeOwned,
    {
        Self::new(Arc::new(JsonFileBackend::new(path)), locks)
    }

    /// Collection held in memory under `name`.
    pub fn in_memory(name: impl Into<String>, locks: Arc<LockRegistry>) -> Self {
        Self::new(Arc::new(MemoryBackend::new(name)), locks)
    }

    pub fn location(&self) -> &str {
        self.backend.location()
    }

    pub fn load_all(&self) -> Vec<T> {
        self.backend.load_all()
    }

    /// Replace the whole collection.
    pub fn save_all(&self, records: &[T]) -> Result<(), StoreError> {
        self.locks
            .with_exclusive(self.location(), || self.backend.save_all(records))
    }

    /// First record matching `pred` in the current snapshot.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.load_all().into_iter().find(|record| pred(record))
    }

    pub fn exists(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.load_all().iter().any(pred)
    }

    /// Load the collection, let `f` edit it, then persist the result.
    ///
    /// The lock is held from before the load until after the save. If `f`
    /// fails nothing is written.
    pub fn mutate<R, E>(&self, f: impl FnOnce(&mut Vec<T>) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        self.locks.with_exclusive(self.location(), || {
            let mut records = self.backend.load_all();
            let outcome = f(&mut records)?;
            self.backend.save_all(&records)?;
            Ok(outcome)
        })
    }
}
