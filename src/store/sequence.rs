//! Persisted high-water mark for record ids.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::backend::write_atomic;
use super::StoreError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SequenceFile {
    last_id: u64,
}

/// Hands out ids that are never reused, even after the record holding the
/// highest id is deleted.
///
/// Not locked itself: call [`advance`](Self::advance) from inside the owning
/// collection's `mutate` so the collection lock covers it.
#[derive(Debug)]
pub enum IdSequence {
    /// `{"last_id": n}` in a file next to the collection.
    File { path: PathBuf },
    Memory(Mutex<u64>),
}

impl IdSequence {
    /// Sequence stored beside `collection_path`, as `<file>.seq`.
    pub fn beside(collection_path: &Path) -> Self {
        let mut name = collection_path.as_os_str().to_owned();
        name.push(".seq");
        Self::File {
            path: PathBuf::from(name),
        }
    }

    pub fn in_memory() -> Self {
        Self::Memory(Mutex::new(0))
    }

    /// Highest id handed out so far (0 if none, or if the file is unusable).
    pub fn last(&self) -> u64 {
        match self {
            Self::File { path } => read_last(path),
            Self::Memory(last) => *last.lock(),
        }
    }

    /// Reserve the next id. `floor` is the highest id present in the
    /// collection, so a missing or stale sequence file never yields a
    /// duplicate.
    pub fn advance(&self, floor: u64) -> Result<u64, StoreError> {
        match self {
            Self::File { path } => {
                let next = read_last(path).max(floor) + 1;
                let json = serde_json::to_vec(&SequenceFile { last_id: next }).map_err(
                    |source| StoreError::Encode {
                        location: path.display().to_string(),
                        source,
                    },
                )?;
                write_atomic(path, &json).map_err(|source| StoreError::Unavailable {
                    location: path.display().to_string(),
                    source,
                })?;
                Ok(next)
            }
            Self::Memory(last) => {
                let mut last = last.lock();
                *last = (*last).max(floor) + 1;
                Ok(*last)
            }
        }
    }
}

fn read_last(path: &Path) -> u64 {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Id sequence unreadable");
            return 0;
        }
    };
    match serde_json::from_slice::<SequenceFile>(&bytes) {
        Ok(file) => file.last_id,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Id sequence corrupt");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn beside_appends_seq_suffix() {
        match IdSequence::beside(Path::new("/srv/data/items.json")) {
            IdSequence::File { path } => {
                assert_eq!(path, PathBuf::from("/srv/data/items.json.seq"));
            }
            other => panic!("expected file sequence, got {other:?}"),
        }
    }

    #[test]
    fn file_sequence_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let items = tmp.path().join("items.json");

        let seq = IdSequence::beside(&items);
        assert_eq!(seq.last(), 0);
        assert_eq!(seq.advance(0).unwrap(), 1);
        assert_eq!(seq.advance(0).unwrap(), 2);

        let reopened = IdSequence::beside(&items);
        assert_eq!(reopened.last(), 2);
        assert_eq!(reopened.advance(0).unwrap(), 3);
    }

    #[test]
    fn floor_wins_over_a_stale_counter() {
        let tmp = TempDir::new().unwrap();
        let seq = IdSequence::beside(&tmp.path().join("items.json"));
        assert_eq!(seq.advance(41).unwrap(), 42);
        assert_eq!(seq.advance(5).unwrap(), 43);

        let mem = IdSequence::in_memory();
        assert_eq!(mem.advance(9).unwrap(), 10);
        assert_eq!(mem.advance(0).unwrap(), 11);
    }

    #[test]
    fn corrupt_file_restarts_from_floor() {
        let tmp = TempDir::new().unwrap();
        let items = tmp.path().join("items.json");
        std::fs::write(tmp.path().join("items.json.seq"), b"garbage").unwrap();

        let seq = IdSequence::beside(&items);
        assert_eq!(seq.last(), 0);
        assert_eq!(seq.advance(7).unwrap(), 8);
    }
}
