//! Insertion-stable hash container tolerant of mid-iteration mutation
//! (spec §4.4, §9).
//!
//! Grounded on `indexmap::IndexMap` (enrichment pulled from the
//! `MystenLabs-sui` dependency stack, which reaches for `indexmap`
//! wherever it needs insertion order preserved under mutation). A plain
//! `IndexMap` already preserves insertion order, but removing an entry
//! shifts every later index, invalidating any concurrently running
//! iterator — spec §9 calls this out explicitly. We add a tombstone
//! flag per entry instead of ever calling `IndexMap::shift_remove`, so
//! live iterators can keep their index valid and observe a skipped,
//! dead entry rather than a shuffled table.

use indexmap::IndexMap;
use std::hash::Hash;

struct Slot<V> {
    // `None` only ever after a tombstoning `remove`; every live slot
    // (`dead == false`) always holds `Some`.
    value: Option<V>,
    dead: bool,
}

/// A map that never physically removes an entry on `remove`, only marks
/// it dead. `len`/`iter` report only live entries; `compact` is the only
/// thing that actually frees tombstoned storage, and must only be called
/// when no search is outstanding.
pub struct TombstoneMap<K, V> {
    entries: IndexMap<K, Slot<V>>,
    live_count: usize,
}

impl<K, V> TombstoneMap<K, V>
where
    K: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        TombstoneMap {
            entries: IndexMap::new(),
            live_count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.live_count
    }

    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Insert or overwrite. Resurrects a tombstoned slot in place rather
    /// than appending, so its iteration position is reused.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.entries.get_mut(&key) {
            Some(slot) => {
                let was_dead = slot.dead;
                let old = slot.value.replace(value);
                slot.dead = false;
                if was_dead {
                    self.live_count += 1;
                    None
                } else {
                    old
                }
            }
            None => {
                self.entries.insert(
                    key,
                    Slot {
                        value: Some(value),
                        dead: false,
                    },
                );
                self.live_count += 1;
                None
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|slot| !slot.dead)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries
            .get_mut(key)
            .filter(|slot| !slot.dead)
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Mark the entry dead and hand back its value. The slot itself (and
    /// thus any iterator's position) survives until [`Self::compact`].
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.get_mut(key)?;
        if slot.dead {
            return None;
        }
        slot.dead = true;
        self.live_count -= 1;
        slot.value.take()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries
            .iter()
            .filter(|(_, slot)| !slot.dead)
            .filter_map(|(k, slot)| slot.value.as_ref().map(|v| (k, v)))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    /// Physically drop all tombstoned slots, reclaiming storage. Only
    /// safe when no [`super::array::ArraySearch`] holds an index into
    /// this table.
    pub fn compact(&mut self) {
        self.entries.retain(|_, slot| !slot.dead);
    }

    /// Snapshot of keys in insertion order, used to hand a stable
    /// ordinal-indexed view to an array search.
    pub fn ordered_keys(&self) -> Vec<K> {
        self.entries
            .iter()
            .filter(|(_, slot)| !slot.dead)
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl<K, V> Default for TombstoneMap<K, V>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut m: TombstoneMap<String, i32> = TombstoneMap::new();
        m.insert("a".into(), 1);
        assert_eq!(m.get(&"a".to_string()), Some(&1));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn remove_tombstones_without_shifting() {
        let mut m: TombstoneMap<String, i32> = TombstoneMap::new();
        m.insert("a".into(), 1);
        m.insert("b".into(), 2);
        m.insert("c".into(), 3);
        let order_before: Vec<String> = m.ordered_keys();
        m.remove(&"b".to_string());
        assert!(!m.contains_key(&"b".to_string()));
        assert_eq!(m.len(), 2);
        let order_after: Vec<String> = m.ordered_keys();
        assert_eq!(order_after, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(order_before.len(), 3);
    }

    #[test]
    fn resurrect_after_tombstone_reuses_slot() {
        let mut m: TombstoneMap<String, i32> = TombstoneMap::new();
        m.insert("a".into(), 1);
        m.remove(&"a".to_string());
        assert!(!m.contains_key(&"a".to_string()));
        m.insert("a".into(), 2);
        assert_eq!(m.get(&"a".to_string()), Some(&2));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn iter_skips_tombstones() {
        let mut m: TombstoneMap<String, i32> = TombstoneMap::new();
        m.insert("a".into(), 1);
        m.insert("b".into(), 2);
        m.remove(&"a".to_string());
        let seen: Vec<&String> = m.iter().map(|(k, _)| k).collect();
        assert_eq!(seen, vec![&"b".to_string()]);
    }
}
