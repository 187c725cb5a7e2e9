//! Per-location write locks.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::StoreError;

/// Hands out one exclusive lock per backing location.
///
/// Locks are held for a closure's full extent and released when it returns,
/// including on error or panic. Acquisition waits at most `wait`.
#[derive(Debug)]
pub struct LockRegistry {
    wait: Duration,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    fn lock_for(&self, location: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(location.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` while holding the exclusive lock for `location`.
    pub fn with_exclusive<R, E>(
        &self,
        location: &str,
        f: impl FnOnce() -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let lock = self.lock_for(location);
        let started = Instant::now();

        let Some(_guard) = lock.try_lock_for(self.wait) else {
            tracing::warn!(
                location,
                wait_ms = self.wait.as_millis() as u64,
                "Write lock contention exceeded wait bound"
            );
            return Err(StoreError::Busy {
                location: location.to_owned(),
                waited: started.elapsed(),
            }
            .into());
        };

        let waited = started.elapsed();
        if waited >= Duration::from_millis(50) {
            tracing::debug!(location, waited_ms = waited.as_millis() as u64, "Write lock acquired");
        }

        f()
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new(super::DEFAULT_LOCK_WAIT)
    }
}
