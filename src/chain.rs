//! Chain: sentinel-anchored circular doubly-linked list over a slot arena.
//!
//! Records live in a `SlotMap` and refer to their neighbours by `Link`
//! rather than by pointer. The sentinel is not stored in the arena; its
//! two links are the chain's `front` (sentinel.next) and `back`
//! (sentinel.prev). An empty chain has both pointing back at the sentinel.

use crate::cursor::Direction;
use slotmap::{DefaultKey, SlotMap};

/// A position in the chain: either the sentinel or a live record.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub(crate) enum Link {
    #[default]
    Sentinel,
    Node(DefaultKey),
}

#[derive(Debug)]
pub(crate) struct Record<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u64,
    prev: Link,
    next: Link,
}

pub(crate) struct Chain<K, V> {
    records: SlotMap<DefaultKey, Record<K, V>>,
    front: Link,
    back: Link,
}

impl<K, V> Chain<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            records: SlotMap::with_key(),
            front: Link::Sentinel,
            back: Link::Sentinel,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn front(&self) -> Link {
        self.front
    }

    pub(crate) fn back(&self) -> Link {
        self.back
    }

    pub(crate) fn get(&self, slot: DefaultKey) -> Option<&Record<K, V>> {
        self.records.get(slot)
    }

    pub(crate) fn get_mut(&mut self, slot: DefaultKey) -> Option<&mut Record<K, V>> {
        self.records.get_mut(slot)
    }

    /// The neighbour of `at` in direction `dir`. Stepping from a stale
    /// slot lands on the sentinel.
    pub(crate) fn step(&self, at: Link, dir: Direction) -> Link {
        match (at, dir) {
            (Link::Sentinel, Direction::Forward) => self.front,
            (Link::Sentinel, Direction::Backward) => self.back,
            (Link::Node(slot), dir) => match self.records.get(slot) {
                Some(r) if dir == Direction::Forward => r.next,
                Some(r) => r.prev,
                None => Link::Sentinel,
            },
        }
    }

    fn set_next(&mut self, at: Link, to: Link) {
        match at {
            Link::Sentinel => self.front = to,
            Link::Node(slot) => {
                if let Some(r) = self.records.get_mut(slot) {
                    r.next = to;
                }
            }
        }
    }

    fn set_prev(&mut self, at: Link, to: Link) {
        match at {
            Link::Sentinel => self.back = to,
            Link::Node(slot) => {
                if let Some(r) = self.records.get_mut(slot) {
                    r.prev = to;
                }
            }
        }
    }

    /// Allocate a record and splice it in at the back.
    pub(crate) fn push_back(&mut self, key: K, value: V, hash: u64) -> DefaultKey {
        let slot = self.records.insert(Record {
            key,
            value,
            hash,
            prev: Link::Sentinel,
            next: Link::Sentinel,
        });
        self.link_back(slot);
        slot
    }

    fn link_back(&mut self, slot: DefaultKey) {
        let old_back = self.back;
        if let Some(r) = self.records.get_mut(slot) {
            r.prev = old_back;
            r.next = Link::Sentinel;
        }
        self.set_next(old_back, Link::Node(slot));
        self.back = Link::Node(slot);
    }

    fn unlink(&mut self, slot: DefaultKey) {
        let Some(r) = self.records.get(slot) else {
            return;
        };
        let (prev, next) = (r.prev, r.next);
        self.set_next(prev, next);
        self.set_prev(next, prev);
    }

    /// Re-splice a record at the back (most-recently-used end).
    pub(crate) fn move_to_back(&mut self, slot: DefaultKey) {
        if self.back == Link::Node(slot) || !self.records.contains_key(slot) {
            return;
        }
        self.unlink(slot);
        self.link_back(slot);
    }

    /// Unlink and free a record.
    pub(crate) fn remove(&mut self, slot: DefaultKey) -> Option<Record<K, V>> {
        self.unlink(slot);
        self.records.remove(slot)
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.front = Link::Sentinel;
        self.back = Link::Sentinel;
    }

    /// Slots in chain order, front to back.
    pub(crate) fn slots(&self) -> Slots<'_, K, V> {
        Slots {
            chain: self,
            head: self.front,
            tail: self.back,
            remaining: self.len(),
        }
    }
}

/// Double-ended walk over the live slots of a chain.
pub(crate) struct Slots<'a, K, V> {
    chain: &'a Chain<K, V>,
    head: Link,
    tail: Link,
    remaining: usize,
}

impl<K, V> Iterator for Slots<'_, K, V> {
    type Item = DefaultKey;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let Link::Node(slot) = self.head else {
            return None;
        };
        self.head = self.chain.step(self.head, Direction::Forward);
        self.remaining -= 1;
        Some(slot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Slots<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let Link::Node(slot) = self.tail else {
            return None;
        };
        self.tail = self.chain.step(self.tail, Direction::Backward);
        self.remaining -= 1;
        Some(slot)
    }
}

impl<K, V> ExactSizeIterator for Slots<'_, K, V> {}
