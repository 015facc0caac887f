use crate::types::{MovieGroups, RetrievalState, TargetCode};
use indexmap::{IndexMap, IndexSet};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct StoreInner {
    results: IndexMap<TargetCode, MovieGroups>,
    empty: IndexSet<TargetCode>,
    /// Output order: codes that answered in pass 1, then later recoveries.
    slots: IndexSet<TargetCode>,
}

impl StoreInner {
    fn ordered(&self) -> StoreSnapshot {
        self.slots
            .iter()
            .filter_map(|code| self.results.get_key_value(code))
            .map(|(code, groups)| (code.clone(), groups.clone()))
            .collect()
    }
}

/// In-run store of parsed results and the set of codes still empty.
///
/// Both collections sit behind one lock so a code is never observed in both
/// or in neither while it moves between them.
#[derive(Debug, Default)]
pub struct ResultStore {
    inner: Mutex<StoreInner>,
}

/// Point-in-time copy of the parsed results, in output order.
pub type StoreSnapshot = IndexMap<TargetCode, MovieGroups>;

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // A panic while holding the lock cannot leave the maps half-updated
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records a non-empty result and clears the code from the empty set.
    pub fn record_fetched(&self, code: &str, groups: MovieGroups) {
        let mut inner = self.lock();
        inner.empty.shift_remove(code);
        inner.slots.insert(code.to_string());
        inner.results.insert(code.to_string(), groups);
        debug!("Stored results for {}", code);
    }

    /// Marks a code as empty unless an earlier pass already recovered it.
    pub fn mark_empty(&self, code: &str) {
        let mut inner = self.lock();
        if !inner.results.contains_key(code) {
            inner.empty.insert(code.to_string());
        }
    }

    /// Marks a code empty while keeping its output position for a later recovery.
    ///
    /// Used for pass-1 answers that parsed to nothing; codes that errored get
    /// no slot and are placed where they are eventually recovered.
    pub fn reserve_empty(&self, code: &str) {
        let mut inner = self.lock();
        if !inner.results.contains_key(code) {
            inner.empty.insert(code.to_string());
        }
        inner.slots.insert(code.to_string());
    }

    pub fn state(&self, code: &str) -> RetrievalState {
        let inner = self.lock();
        if inner.results.contains_key(code) {
            RetrievalState::Fetched
        } else if inner.empty.contains(code) {
            RetrievalState::Empty
        } else {
            RetrievalState::Unfetched
        }
    }

    /// Codes currently in the empty set, in the order they failed.
    pub fn empty_codes(&self) -> Vec<TargetCode> {
        self.lock().empty.iter().cloned().collect()
    }

    pub fn fetched_count(&self) -> usize {
        self.lock().results.len()
    }

    pub fn empty_count(&self) -> usize {
        self.lock().empty.len()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().ordered()
    }

    pub fn into_results(self) -> StoreSnapshot {
        self.inner
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .ordered()
    }
}
