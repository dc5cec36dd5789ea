//! Per-entity critical sections.
//!
//! Concurrent executes for the same action, or concurrent dismissals
//! of the same alert, must serialize; requests for different entities
//! proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of async mutexes keyed by entity identifier. Entries are
/// created on first use; an entry whose only reference is the map
/// itself (no guard held, no waiter) is swept on the next `lock`
/// call, so the map tracks contended keys rather than every key ever
/// seen.
#[derive(Clone, Debug, Default)]
pub struct KeyedMutex {
    entries: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut entries = match self.entries.lock() {
                Ok(entries) => entries,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Guards and waiters each hold a clone of the entry Arc.
            entries.retain(|_, entry| Arc::strong_count(entry) > 1);
            entries.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };

        entry.lock_owned().await
    }

    #[cfg(test)]
    fn entry_count(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
