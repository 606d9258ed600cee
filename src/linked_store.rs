//! LinkedStore: hash index over a linked chain, with optional recency
//! ordering and a capacity bound.

use crate::chain::{Chain, Link, Slots};
use crate::cursor::{Cursor, Direction};
use crate::guard::IndexProbeGuard;
use crate::key_gen::KeyGenerator;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_table::Entry;
use hashbrown::HashTable;
use serde::{Deserialize, Serialize};
use slotmap::DefaultKey;
use std::collections::hash_map::RandomState;

/// Construction options for a store.
///
/// `max_count == 0` means unbounded. With `cache_mode` set, reads and
/// writes move an entry to the back, so the front is the least recently
/// used entry instead of the oldest inserted one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreOptions {
    pub max_count: usize,
    pub cache_mode: bool,
}

impl StoreOptions {
    /// Insertion-ordered store holding at most `max_count` entries.
    pub fn bounded(max_count: usize) -> Self {
        Self {
            max_count,
            cache_mode: false,
        }
    }

    /// Least-recently-used cache holding at most `max_count` entries.
    pub fn lru(max_count: usize) -> Self {
        Self {
            max_count,
            cache_mode: true,
        }
    }
}

pub struct LinkedStore<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    pub(crate) chain: Chain<K, V>,
    pub(crate) cursor: Cursor,
    max_count: usize,
    cache_mode: bool,
    ids: KeyGenerator,
    index_guard: IndexProbeGuard,
}

impl<K, V> LinkedStore<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    pub fn with_options(options: StoreOptions) -> Self {
        Self::with_options_and_hasher(options, RandomState::new())
    }
}

impl<K, V> Default for LinkedStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> LinkedStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_options_and_hasher(StoreOptions::default(), hasher)
    }

    pub fn with_options_and_hasher(options: StoreOptions, hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            chain: Chain::new(),
            cursor: Cursor::new(),
            max_count: options.max_count,
            cache_mode: options.cache_mode,
            ids: KeyGenerator::new(),
            index_guard: IndexProbeGuard::new(),
        }
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Number of entries; same as `len`.
    pub fn count(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn is_cache(&self) -> bool {
        self.cache_mode
    }

    pub fn options(&self) -> StoreOptions {
        StoreOptions {
            max_count: self.max_count,
            cache_mode: self.cache_mode,
        }
    }

    /// Change the capacity bound, evicting from the front until it holds.
    pub fn set_max_count(&mut self, max_count: usize) {
        self.max_count = max_count;
        self.evict_overflow();
    }

    pub fn key_generator(&self) -> &KeyGenerator {
        &self.ids
    }

    pub fn key_generator_mut(&mut self) -> &mut KeyGenerator {
        &mut self.ids
    }

    pub(crate) fn find_slot<Q>(&self, q: &Q) -> Option<DefaultKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.index_guard.enter("find_slot");
        let hash = self.make_hash(q);
        self.index
            .find(hash, |&s| {
                self.chain
                    .get(s)
                    .map(|r| r.key.borrow() == q)
                    .unwrap_or(false)
            })
            .copied()
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_slot(q).is_some()
    }

    /// Insert or update. A new key goes to the back; an existing key keeps
    /// its place unless this is a cache, in which case it moves to the back.
    /// If the bound is exceeded the front entry is evicted silently.
    pub fn set(&mut self, key: K, value: V) {
        self.set_slot(key, value);
    }

    pub(crate) fn set_slot(&mut self, key: K, value: V) -> DefaultKey {
        let slot = {
            let _g = self.index_guard.enter("set_slot");
            let hash = self.make_hash(&key);
            match self.index.entry(
                hash,
                |&s| self.chain.get(s).map(|r| r.key == key).unwrap_or(false),
                |&s| self.chain.get(s).map(|r| r.hash).unwrap_or(0),
            ) {
                Entry::Occupied(o) => {
                    let slot = *o.get();
                    if let Some(r) = self.chain.get_mut(slot) {
                        r.value = value;
                    }
                    if self.cache_mode {
                        self.chain.move_to_back(slot);
                    }
                    slot
                }
                Entry::Vacant(v) => {
                    let slot = self.chain.push_back(key, value, hash);
                    let _ = v.insert(slot);
                    slot
                }
            }
        };
        // The new record sits at the back, so it survives while max_count >= 1.
        self.evict_overflow();
        slot
    }

    /// Insert every entry in order.
    pub fn add_all<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in entries {
            self.set(k, v);
        }
    }

    fn evict_overflow(&mut self) {
        while self.max_count > 0 && self.chain.len() > self.max_count {
            let Link::Node(slot) = self.chain.front() else {
                break;
            };
            if self.remove_slot(slot).is_some() {
                tracing::debug!(
                    len = self.chain.len(),
                    max_count = self.max_count,
                    "evicted front entry"
                );
            }
        }
    }

    /// Lookup; in a cache this promotes the entry to most recently used.
    pub fn get<Q>(&mut self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find_slot(q)?;
        if self.cache_mode {
            self.chain.move_to_back(slot);
        }
        self.chain.get(slot).map(|r| &r.value)
    }

    /// Lookup that never reorders.
    pub fn peek<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find_slot(q)?;
        self.chain.get(slot).map(|r| &r.value)
    }

    pub fn peek_first(&self) -> Option<&V> {
        self.value_at(self.chain.front())
    }

    pub fn peek_last(&self) -> Option<&V> {
        self.value_at(self.chain.back())
    }

    pub(crate) fn entry_at(&self, at: Link) -> Option<(&K, &V)> {
        match at {
            Link::Sentinel => None,
            Link::Node(slot) => self.chain.get(slot).map(|r| (&r.key, &r.value)),
        }
    }

    pub(crate) fn value_at(&self, at: Link) -> Option<&V> {
        self.entry_at(at).map(|(_, v)| v)
    }

    /// Remove by key; returns whether an entry existed.
    pub fn remove<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).is_some()
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find_slot(q)?;
        self.remove_slot(slot)
    }

    /// Remove and return the front (oldest / least recently used) entry.
    pub fn pop_front(&mut self) -> Option<(K, V)> {
        let Link::Node(slot) = self.chain.front() else {
            return None;
        };
        self.remove_slot(slot)
    }

    /// Remove and return the back (newest / most recently used) entry.
    pub fn pop_back(&mut self) -> Option<(K, V)> {
        let Link::Node(slot) = self.chain.back() else {
            return None;
        };
        self.remove_slot(slot)
    }

    fn remove_slot(&mut self, slot: DefaultKey) -> Option<(K, V)> {
        let _g = self.index_guard.enter("remove_slot");
        let hash = self.chain.get(slot)?.hash;

        // Move the cursor off the record before it is freed.
        if self.cursor.position() == Link::Node(slot) {
            if self.chain.len() == 1 {
                self.cursor.reset();
            } else {
                self.cursor.advance(&self.chain, Direction::Forward);
            }
        }

        let found = self.index.find_entry(hash, |&s| s == slot);
        debug_assert!(found.is_ok(), "chain record missing from the index");
        if let Ok(entry) = found {
            let _ = entry.remove();
        }
        let record = self.chain.remove(slot)?;
        Some((record.key, record.value))
    }

    pub fn clear(&mut self) {
        let _g = self.index_guard.enter("clear");
        self.index.clear();
        self.chain.clear();
        self.cursor.reset();
    }

    /// Entries in chain order: oldest (or least recently used) first.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            chain: &self.chain,
            slots: self.chain.slots(),
        }
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator + '_ {
        self.iter().map(|(_, v)| v)
    }

    #[cfg(test)]
    pub(crate) fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Every chain record is reachable through the index under its own key.
    #[cfg(test)]
    pub(crate) fn index_matches_chain(&self) -> bool {
        self.chain.slots().all(|slot| {
            self.chain
                .get(slot)
                .map(|r| self.index.find(r.hash, |&s| s == slot).is_some())
                .unwrap_or(false)
        }) && self.index.iter().all(|&s| self.chain.get(s).is_some())
    }

    /// Visit every entry in chain order with mutable access to the value.
    pub(crate) fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V),
    {
        let slots: Vec<DefaultKey> = self.chain.slots().collect();
        for slot in slots {
            if let Some(r) = self.chain.get_mut(slot) {
                f(&r.key, &mut r.value);
            }
        }
    }
}

/// Iterator over entries in chain order.
pub struct Iter<'a, K, V> {
    chain: &'a Chain<K, V>,
    slots: Slots<'a, K, V>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.slots.next()?;
        self.chain.get(slot).map(|r| (&r.key, &r.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let slot = self.slots.next_back()?;
        self.chain.get(slot).map(|r| (&r.key, &r.value))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<'a, K, V, S> IntoIterator for &'a LinkedStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> Extend<(K, V)> for LinkedStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.add_all(iter);
    }
}

impl<K, V> FromIterator<(K, V)> for LinkedStore<K, V>
where
    K: Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = Self::new();
        store.add_all(iter);
        store
    }
}

impl<K, V, S> fmt::Debug for LinkedStore<K, V, S>
where
    K: Eq + Hash + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
