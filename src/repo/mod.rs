//! Thread-safe repository for store definitions and liveness state.
//!
//! The repository is the single owner of the live collections. The monitor
//! writes status observations, the web layer reads snapshots and performs
//! CRUD; nothing outside this module ever touches the maps directly.

mod models;

pub use models::*;

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Local};

/// Point-in-time copy of repository state. Owned data, safe to iterate
/// without holding any lock. Maps are ordered by store number so iteration
/// order is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub stores: BTreeMap<String, Store>,
    pub status: BTreeMap<String, bool>,
    pub last_change: BTreeMap<String, DateTime<Local>>,
}

#[derive(Default)]
struct State {
    stores: BTreeMap<String, Store>,
    status: BTreeMap<String, bool>,
    last_change: BTreeMap<String, DateTime<Local>>,
}

/// Single source of truth for store definitions, current status and
/// last-change timestamps. Every operation holds the lock for its full
/// duration; reads hand out owned copies.
pub struct Repo {
    state: Mutex<State>,
}

impl Repo {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Pre-populate from the persisted store list. Numbers are normalized;
    /// entries with an empty number are skipped.
    pub fn with_stores<I>(stores: I) -> Self
    where
        I: IntoIterator<Item = Store>,
    {
        let repo = Self::new();
        {
            let mut state = repo.state.lock().unwrap();
            for mut store in stores {
                store.number = normalize_number(&store.number);
                if store.number.is_empty() {
                    continue;
                }
                state.stores.insert(store.number.clone(), store);
            }
        }
        repo
    }

    /// Insert or fully replace a store by number.
    pub fn upsert(&self, store: Store) {
        let number = normalize_number(&store.number);
        if number.is_empty() {
            tracing::warn!("ignoring upsert of store with empty number");
            return;
        }
        let mut state = self.state.lock().unwrap();
        state.stores.insert(number.clone(), Store { number, ..store });
    }

    /// Look up a store by number. Returns an owned copy.
    pub fn get(&self, number: &str) -> Option<Store> {
        let key = normalize_number(number);
        self.state.lock().unwrap().stores.get(&key).cloned()
    }

    /// Remove a store together with its status and last-change record.
    /// No-op when absent.
    pub fn remove(&self, number: &str) {
        let key = normalize_number(number);
        let mut state = self.state.lock().unwrap();
        state.stores.remove(&key);
        state.status.remove(&key);
        state.last_change.remove(&key);
    }

    /// Remove every store and all derived state.
    pub fn clear_all(&self) {
        let mut state = self.state.lock().unwrap();
        state.stores.clear();
        state.status.clear();
        state.last_change.clear();
    }

    /// Record a new online/offline observation and return the previously
    /// stored status. The last-change time is stamped only when a prior
    /// status exists and differs. Observations for numbers with no store
    /// entry are dropped so a concurrent remove leaves no trace behind.
    pub fn set_status(&self, number: &str, online: bool) -> Option<bool> {
        let key = normalize_number(number);
        let mut state = self.state.lock().unwrap();
        if !state.stores.contains_key(&key) {
            return None;
        }
        let prev = state.status.insert(key.clone(), online);
        if let Some(prev) = prev {
            if prev != online {
                state.last_change.insert(key, Local::now());
            }
        }
        prev
    }

    /// One consistent copy of stores, statuses and last-change times.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().unwrap();
        Snapshot {
            stores: state.stores.clone(),
            status: state.status.clone(),
            last_change: state.last_change.clone(),
        }
    }

    /// Current store list in snapshot order, for the persistence layer.
    pub fn store_list(&self) -> Vec<Store> {
        self.state.lock().unwrap().stores.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Repo {
    fn default() -> Self {
        Self::new()
    }
}
