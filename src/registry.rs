use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, Mutex, RwLock};

/// Entry types that can be flagged when the vendor stops returning them.
/// Entries are never evicted; a stale flag keeps the last-known-good data
/// readable while signalling disappearance to consumers.
pub trait Stale {
    fn is_stale(&self) -> bool;
    fn set_stale(&mut self, stale: bool);
}

/// Insert-only concurrent map from device identity to registry entry.
/// Readable from any number of threads while a refresh cycle writes;
/// entries are individually locked so facet merges are never observed
/// torn.
pub struct Registry<K, V> {
    entries: RwLock<HashMap<K, Arc<Mutex<V>>>>,
}

impl<K, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V> Registry<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<Arc<Mutex<V>>> {
        self.entries.read().unwrap().get(key).cloned()
    }

    /// Look up or lazily create an entry. Returns the entry and whether
    /// this call created it; creation is the only point identity is
    /// established, and racing discoveries resolve to a single entry.
    pub fn get_or_insert_with(&self, key: &K, make: impl FnOnce() -> V) -> (Arc<Mutex<V>>, bool) {
        if let Some(existing) = self.get(key) {
            return (existing, false);
        }
        let mut entries = self.entries.write().unwrap();
        match entries.get(key) {
            Some(existing) => (existing.clone(), false),
            None => {
                let entry = Arc::new(Mutex::new(make()));
                entries.insert(key.clone(), entry.clone());
                (entry, true)
            }
        }
    }

    pub fn keys(&self) -> Vec<K> {
        self.entries.read().unwrap().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(K, Arc<Mutex<V>>)> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl<K: Eq + Hash + Clone, V: Stale> Registry<K, V> {
    /// Reconcile stale flags against the identities seen in the latest
    /// device list. Returns whether any flag flipped.
    pub fn mark_stale_except(&self, seen: &HashSet<K>) -> bool {
        let mut changed = false;
        for (key, entry) in self.entries() {
            let stale = !seen.contains(&key);
            let mut entry = entry.lock().unwrap();
            if entry.is_stale() != stale {
                entry.set_stale(stale);
                changed = true;
            }
        }
        changed
    }
}
