//! Concurrency-safe storage of per-identity state.
//!
//! The store is a map from identity to a separately locked slot. Holding a
//! slot's guard gives exclusive access to that identity only; other
//! identities never wait on it. Guards are async-aware so they may be held
//! across the dispatch that sits between a check and its record.

use dashmap::DashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::state::RateState;

#[derive(Debug, Default)]
struct Slot {
    state: RateState,
    /// Set under the slot lock when the slot is removed from the map.
    evicted: bool,
}

/// Exclusive access to one identity's state.
#[derive(Debug)]
pub struct EntryGuard {
    identity: String,
    slot: OwnedMutexGuard<Slot>,
}

impl EntryGuard {
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl Deref for EntryGuard {
    type Target = RateState;

    fn deref(&self) -> &RateState {
        &self.slot.state
    }
}

impl DerefMut for EntryGuard {
    fn deref_mut(&mut self) -> &mut RateState {
        &mut self.slot.state
    }
}

/// Outcome of one pass over the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries visited
    pub scanned: usize,
    /// Entries removed
    pub evicted: usize,
    /// Entries skipped because a request held them
    pub skipped_busy: usize,
}

/// Map from identity to rate limit state.
#[derive(Debug, Default)]
pub struct Store {
    entries: DashMap<String, Arc<Mutex<Slot>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the entry for `identity`, creating an empty one if needed.
    pub async fn lock(&self, identity: &str) -> EntryGuard {
        loop {
            let slot = self.slot(identity);
            let guard = slot.lock_owned().await;
            // The sweeper may have removed the slot between lookup and lock.
            if !guard.evicted {
                return EntryGuard {
                    identity: identity.to_string(),
                    slot: guard,
                };
            }
        }
    }

    /// Remove an identity's entry, waiting for any holder to finish.
    ///
    /// Returns `true` if an entry existed.
    pub async fn delete(&self, identity: &str) -> bool {
        let Some(slot) = self.entries.get(identity).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        let mut guard = slot.lock_owned().await;
        if guard.evicted {
            return false;
        }
        guard.evicted = true;
        self.entries.remove(identity);
        true
    }

    /// Visit every entry that is not currently locked, removing those for
    /// which `evict` returns `true`.
    ///
    /// Locked entries are skipped rather than waited on, so a pass never
    /// blocks on in-flight requests.
    pub fn sweep<F>(&self, mut evict: F) -> SweepReport
    where
        F: FnMut(&str, &mut RateState) -> bool,
    {
        let mut report = SweepReport::default();

        self.entries.retain(|identity, slot| {
            report.scanned += 1;
            match slot.try_lock() {
                Ok(mut guard) => {
                    if evict(identity, &mut guard.state) {
                        guard.evicted = true;
                        report.evicted += 1;
                        false
                    } else {
                        true
                    }
                }
                Err(_) => {
                    report.skipped_busy += 1;
                    true
                }
            }
        });

        report
    }

    /// Copy of an identity's state, without creating an entry.
    pub async fn snapshot(&self, identity: &str) -> Option<RateState> {
        let slot = self.entries.get(identity).map(|s| Arc::clone(s.value()))?;
        let guard = slot.lock().await;
        let state = (!guard.evicted).then(|| guard.state.clone());
        state
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.contains_key(identity)
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn slot(&self, identity: &str) -> Arc<Mutex<Slot>> {
        if let Some(slot) = self.entries.get(identity) {
            return Arc::clone(slot.value());
        }
        let slot = self.entries.entry(identity.to_string()).or_default();
        Arc::clone(slot.value())
    }
}
