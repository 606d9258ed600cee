//! Persistent cursor into a `LinkedStore`.
//!
//! The cursor is a position in the chain, not a borrow of it, so it
//! survives any mutation of the store. It starts at the sentinel; moving
//! it cycles endlessly through the live records and skips the sentinel
//! whenever the store is non-empty. When the record it references is
//! removed (or evicted) the store moves it forward first, so it never
//! names a freed record.

use crate::chain::{Chain, Link};
use crate::linked_store::LinkedStore;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};

/// Direction of a cursor move.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

#[derive(Debug, Default)]
pub(crate) struct Cursor {
    position: Link,
}

impl Cursor {
    pub(crate) const fn new() -> Self {
        Self {
            position: Link::Sentinel,
        }
    }

    pub(crate) fn position(&self) -> Link {
        self.position
    }

    pub(crate) fn reset(&mut self) {
        self.position = Link::Sentinel;
    }

    pub(crate) fn point_at(&mut self, at: Link) {
        self.position = at;
    }

    pub(crate) fn advance<K, V>(&mut self, chain: &Chain<K, V>, dir: Direction) -> Link {
        let mut at = chain.step(self.position, dir);
        if at == Link::Sentinel && !chain.is_empty() {
            at = chain.step(at, dir);
        }
        self.position = at;
        at
    }
}

impl<K, V, S> LinkedStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Move the cursor one step and return the value it lands on.
    ///
    /// Returns `None` only when the store is empty.
    pub fn advance(&mut self, dir: Direction) -> Option<&V> {
        let at = self.cursor.advance(&self.chain, dir);
        self.value_at(at)
    }

    /// Cyclic forward iteration; see [`LinkedStore::advance`].
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&V> {
        self.advance(Direction::Forward)
    }

    /// Cyclic backward iteration; see [`LinkedStore::advance`].
    pub fn prev(&mut self) -> Option<&V> {
        self.advance(Direction::Backward)
    }

    /// Point the cursor at `key` and return its value.
    ///
    /// An absent key leaves the cursor where it was. In a cache the entry
    /// is promoted exactly as `get` would.
    pub fn set_cursor<Q>(&mut self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find_slot(q)?;
        self.cursor.point_at(Link::Node(slot));
        self.get(q)
    }

    /// Key and value under the cursor, or `None` at the sentinel.
    pub fn current(&self) -> Option<(&K, &V)> {
        self.entry_at(self.cursor.position())
    }

    /// Put the cursor back on the sentinel.
    pub fn reset_cursor(&mut self) {
        self.cursor.reset();
    }

    /// 1-based ordinal of the first entry, scanning from the front, for
    /// which `pred(value, key)` holds.
    pub fn locate<F>(&self, mut pred: F) -> Option<usize>
    where
        F: FnMut(&V, &K) -> bool,
    {
        self.iter().position(|(k, v)| pred(v, k)).map(|i| i + 1)
    }

    /// 1-based ordinal of the cursor's record, `None` at the sentinel.
    pub fn cursor_ordinal(&self) -> Option<usize> {
        let Link::Node(target) = self.cursor.position() else {
            return None;
        };
        self.chain.slots().position(|s| s == target).map(|i| i + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linked_store::StoreOptions;

    fn abc() -> LinkedStore<&'static str, i32> {
        [("a", 1), ("b", 2), ("c", 3)].into_iter().collect()
    }

    /// Invariant: calling next() len() times returns to the starting value.
    #[test]
    fn next_is_cyclic() {
        let mut m = abc();
        let seen: Vec<_> = (0..7).map(|_| *m.next().unwrap()).collect();
        assert_eq!(seen, [1, 2, 3, 1, 2, 3, 1]);
        let start = *m.current().unwrap().1;
        for _ in 0..m.len() {
            m.next();
        }
        assert_eq!(m.current().map(|(_, v)| *v), Some(start));
    }

    /// Invariant: prev() from the sentinel starts at the back and cycles.
    #[test]
    fn prev_is_cyclic() {
        let mut m = abc();
        let seen: Vec<_> = (0..4).map(|_| *m.prev().unwrap()).collect();
        assert_eq!(seen, [3, 2, 1, 3]);
    }

    /// Invariant: on an empty store moves return None and stay on the sentinel.
    #[test]
    fn empty_store_cursor() {
        let mut m: LinkedStore<&str, i32> = LinkedStore::new();
        assert_eq!(m.next(), None);
        assert_eq!(m.prev(), None);
        assert_eq!(m.current(), None);
        assert_eq!(m.cursor_ordinal(), None);
        assert_eq!(m.set_cursor(&"x"), None);
    }

    /// Invariant: set_cursor repositions on hit and leaves the cursor alone on miss.
    #[test]
    fn set_cursor_hit_and_miss() {
        let mut m = abc();
        assert_eq!(m.set_cursor(&"b"), Some(&2));
        assert_eq!(m.cursor_ordinal(), Some(2));
        assert_eq!(m.set_cursor(&"zz"), None);
        assert_eq!(m.current(), Some((&"b", &2)));
        assert_eq!(m.next(), Some(&3));
    }

    /// Invariant: removing the cursor's record moves it to the next live record,
    /// wrapping past the sentinel, and resets it once the store is empty.
    #[test]
    fn cursor_self_heals_on_remove() {
        let mut m = abc();
        m.set_cursor(&"b");
        assert!(m.remove(&"b"));
        assert_eq!(m.current(), Some((&"c", &3)));

        assert!(m.remove(&"c"));
        assert_eq!(m.current(), Some((&"a", &1)));

        assert!(m.remove(&"a"));
        assert_eq!(m.current(), None);
        assert_eq!(m.next(), None);

        m.set("d", 4);
        assert_eq!(m.next(), Some(&4));
    }

    /// Invariant: eviction of the cursor's record heals the cursor the same way.
    #[test]
    fn cursor_survives_eviction() {
        let mut m: LinkedStore<&str, i32> = LinkedStore::with_options(StoreOptions::bounded(2));
        m.set("a", 1);
        m.set("b", 2);
        assert_eq!(m.next(), Some(&1));
        m.set("c", 3);
        assert_eq!(m.current(), Some((&"b", &2)));
        assert_eq!(m.next(), Some(&3));
    }

    /// Invariant: in a cache, set_cursor promotes the entry to the back.
    #[test]
    fn set_cursor_promotes_in_cache() {
        let mut m: LinkedStore<&str, i32> = LinkedStore::with_options(StoreOptions::lru(0));
        m.add_all([("a", 1), ("b", 2), ("c", 3)]);
        m.set_cursor(&"a");
        assert_eq!(m.keys().copied().collect::<Vec<_>>(), ["b", "c", "a"]);
        assert_eq!(m.cursor_ordinal(), Some(3));
        assert_eq!(m.next(), Some(&2));
    }

    /// Invariant: locate is 1-based and returns None when nothing matches.
    #[test]
    fn locate_ordinals() {
        let m = abc();
        assert_eq!(m.locate(|v, _| *v == 1), Some(1));
        assert_eq!(m.locate(|_, k| *k == "c"), Some(3));
        assert_eq!(m.locate(|v, _| *v > 10), None);
    }

    /// Invariant: clear resets the cursor to the sentinel.
    #[test]
    fn clear_resets_cursor() {
        let mut m = abc();
        m.next();
        m.next();
        m.clear();
        assert_eq!(m.current(), None);
        m.set("z", 26);
        assert_eq!(m.next(), Some(&26));
        m.reset_cursor();
        assert_eq!(m.current(), None);
    }
}
