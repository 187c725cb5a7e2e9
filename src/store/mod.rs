//! Flat-file record collections.
//!
//! Provides:
//! - A load/save abstraction over one ordered collection ([`CollectionBackend`])
//!   with a JSON-file implementation and an in-memory one
//! - A per-location write lock registry with bounded waits ([`LockRegistry`])
//! - [`CollectionStore`], which runs every mutation as
//!   load → compute → save while holding the location's lock
//! - [`IdSequence`], a persisted high-water mark so deleted ids stay retired
//!
//! ## Design Decisions
//! - No cache: every operation re-reads the backing file.
//! - A missing, unreadable or unparsable file loads as an empty collection.
//!   A corrupt file is therefore overwritten by the next successful write;
//!   the warning logged on load is the only trace of it.
//! - Readers never take the lock. Writers swap the whole file via
//!   temp-file-then-rename, so a reader sees either the old or the new
//!   collection, never a torn write.

pub mod backend;
pub mod collection;
pub mod lock;
pub mod sequence;

use std::time::Duration;

pub use backend::{CollectionBackend, JsonFileBackend, MemoryBackend};
pub use collection::CollectionStore;
pub use lock::LockRegistry;
pub use sequence::IdSequence;

/// Default bound on how long a writer waits for a collection's lock.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_millis(2_000);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("timed out after {waited:?} waiting for the write lock on {location}")]
    Busy { location: String, waited: Duration },

    #[error("cannot write collection {location}: {source}")]
    Unavailable {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode collection {location}: {source}")]
    Encode {
        location: String,
        #[source]
        source: serde_json::Error,
    },
}
